//! Repository interfaces consumed by the core
//!
//! Storage technology is an adapter concern: `mushbbs-server` implements these
//! traits over PostgreSQL, [`memory::MemoryRepo`] implements them in-process.
//!
//! Implementations must:
//! - exclude soft-deleted rows from key lookups and listings
//! - compute `max(order) + 1` inside the same transaction as the insert
//! - report unique `(faction, order)` violations as `BbsError::Conflict`

pub mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ActingIdentity, Board, BoardChanges, BoardName, Faction, Membership, NewPost, Post,
    PostChanges, PostKey,
};

pub use memory::MemoryRepo;

/// Binds request credentials to an acting identity
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// `NotFound` unless `character_id` exists and belongs to `user_id`
    async fn find_acting(&self, user_id: Uuid, character_id: Uuid) -> Result<ActingIdentity>;
}

/// Read-only view of the faction subsystem
#[async_trait]
pub trait FactionDirectory: Send + Sync {
    /// Case-insensitive abbreviation lookup; `NotFound` if unmatched
    async fn find_faction_by_abbreviation(&self, abbreviation: &str) -> Result<Faction>;

    async fn get_faction(&self, id: i64) -> Result<Faction>;

    /// `None` means "not a member", never an error
    async fn get_membership(
        &self,
        faction: &Faction,
        character_id: Uuid,
    ) -> Result<Option<Membership>>;
}

/// Board and post persistence
#[async_trait]
pub trait BoardRepository: Send + Sync {
    /// `NotFound` if absent or soft-deleted
    async fn get_board_by_key(&self, board_key: &str) -> Result<Board>;

    /// Non-deleted boards ordered by faction, then board order
    async fn list_boards(&self) -> Result<Vec<Board>>;

    /// `Conflict` on duplicate `(faction, order)` among live boards
    async fn create_board(
        &self,
        faction: Option<&Faction>,
        board_order: i32,
        name: &BoardName,
    ) -> Result<Board>;

    /// Writes the present fields and always bumps `updated_at`
    async fn update_board(&self, board: &Board, changes: &BoardChanges) -> Result<Board>;

    /// Soft delete; returns the row with `deleted_at` set
    async fn delete_board(&self, board: &Board) -> Result<Board>;

    async fn get_post_by_key(&self, board: &Board, key: PostKey) -> Result<Post>;

    /// Non-deleted posts ordered by `(post_order, sub_order)`
    fn list_posts_for_board<'a>(&'a self, board: &'a Board) -> BoxStream<'a, Result<Post>>;

    /// Top-level post at `max(post_order) + 1`; records the author's read receipt
    async fn create_post(
        &self,
        board: &Board,
        post: &NewPost,
        author: &ActingIdentity,
    ) -> Result<Post>;

    /// Reply under `parent.post_order` at `max(sub_order) + 1`
    async fn create_reply(
        &self,
        board: &Board,
        parent: &Post,
        reply: &NewPost,
        author: &ActingIdentity,
    ) -> Result<Post>;

    /// Writes the present fields and always bumps `modified_at`
    async fn update_post(&self, post: &Post, changes: &PostChanges) -> Result<Post>;

    async fn delete_post(&self, post: &Post) -> Result<Post>;

    async fn mark_read(&self, post: &Post, user_id: Uuid) -> Result<()>;

    /// Live posts on `board` the user has no read receipt for
    async fn unread_count(&self, board: &Board, user_id: Uuid) -> Result<i64>;
}
