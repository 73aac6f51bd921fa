//! PostgreSQL repositories
//!
//! Each repository borrows the pool and follows these patterns:
//! - Reads go through `board_view` / `board_post_view` so keys and names come joined
//! - Order allocation runs in the same transaction as the insert
//! - Unique violations surface as `DbError::Conflict`, never as a raw sqlx error
//!
//! [`PgStore`] owns the pool and implements the core repository traits by
//! delegating to the borrowed repositories.

pub mod boards;
pub mod factions;
pub mod identities;
pub mod posts;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use sqlx::PgPool;
use uuid::Uuid;

use mushbbs_core::models::{
    ActingIdentity, Board, BoardChanges, BoardName, Faction, Membership, NewPost, Post,
    PostChanges, PostKey,
};
use mushbbs_core::{BbsError, BoardRepository, FactionDirectory, IdentityDirectory};

pub use boards::BoardRepo;
pub use factions::FactionRepo;
pub use identities::IdentityRepo;
pub use posts::PostRepo;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("not found: {resource} '{id}'")]
    NotFound { resource: &'static str, id: String },

    #[error("{0}")]
    Conflict(String),
}

impl From<DbError> for BbsError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { resource, id } => BbsError::not_found(resource, id),
            DbError::Conflict(msg) => BbsError::Conflict(msg),
            DbError::Sqlx(e) => BbsError::storage(e),
        }
    }
}

/// Map a unique-constraint violation onto `Conflict`, leave the rest alone
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: impl FnOnce() -> String) -> DbError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => DbError::Conflict(message()),
        _ => DbError::Sqlx(err),
    }
}

/// Pool-owning store implementing the core repository traits
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityDirectory for PgStore {
    async fn find_acting(
        &self,
        user_id: Uuid,
        character_id: Uuid,
    ) -> mushbbs_core::Result<ActingIdentity> {
        Ok(IdentityRepo::new(&self.pool).find_acting(user_id, character_id).await?)
    }
}

#[async_trait]
impl FactionDirectory for PgStore {
    async fn find_faction_by_abbreviation(&self, abbreviation: &str) -> mushbbs_core::Result<Faction> {
        Ok(FactionRepo::new(&self.pool).find_by_abbreviation(abbreviation).await?)
    }

    async fn get_faction(&self, id: i64) -> mushbbs_core::Result<Faction> {
        Ok(FactionRepo::new(&self.pool).get(id).await?)
    }

    async fn get_membership(
        &self,
        faction: &Faction,
        character_id: Uuid,
    ) -> mushbbs_core::Result<Option<Membership>> {
        Ok(FactionRepo::new(&self.pool)
            .membership(faction.id, character_id)
            .await?)
    }
}

#[async_trait]
impl BoardRepository for PgStore {
    async fn get_board_by_key(&self, board_key: &str) -> mushbbs_core::Result<Board> {
        Ok(BoardRepo::new(&self.pool).get_by_key(board_key).await?)
    }

    async fn list_boards(&self) -> mushbbs_core::Result<Vec<Board>> {
        Ok(BoardRepo::new(&self.pool).list().await?)
    }

    async fn create_board(
        &self,
        faction: Option<&Faction>,
        board_order: i32,
        name: &BoardName,
    ) -> mushbbs_core::Result<Board> {
        Ok(BoardRepo::new(&self.pool)
            .create(faction, board_order, name)
            .await?)
    }

    async fn update_board(
        &self,
        board: &Board,
        changes: &BoardChanges,
    ) -> mushbbs_core::Result<Board> {
        Ok(BoardRepo::new(&self.pool).update(board.id, changes).await?)
    }

    async fn delete_board(&self, board: &Board) -> mushbbs_core::Result<Board> {
        Ok(BoardRepo::new(&self.pool).soft_delete(board.id).await?)
    }

    async fn get_post_by_key(&self, board: &Board, key: PostKey) -> mushbbs_core::Result<Post> {
        Ok(PostRepo::new(&self.pool).get_by_key(board.id, key).await?)
    }

    fn list_posts_for_board<'a>(
        &'a self,
        board: &'a Board,
    ) -> BoxStream<'a, mushbbs_core::Result<Post>> {
        PostRepo::new(&self.pool)
            .stream_for_board(board.id)
            .map(|row| row.map_err(BbsError::from))
            .boxed()
    }

    async fn create_post(
        &self,
        board: &Board,
        post: &NewPost,
        author: &ActingIdentity,
    ) -> mushbbs_core::Result<Post> {
        Ok(PostRepo::new(&self.pool).create(board.id, post, author).await?)
    }

    async fn create_reply(
        &self,
        board: &Board,
        parent: &Post,
        reply: &NewPost,
        author: &ActingIdentity,
    ) -> mushbbs_core::Result<Post> {
        Ok(PostRepo::new(&self.pool)
            .create_reply(board.id, parent.post_order, reply, author)
            .await?)
    }

    async fn update_post(
        &self,
        post: &Post,
        changes: &PostChanges,
    ) -> mushbbs_core::Result<Post> {
        Ok(PostRepo::new(&self.pool).update(post.id, changes).await?)
    }

    async fn delete_post(&self, post: &Post) -> mushbbs_core::Result<Post> {
        Ok(PostRepo::new(&self.pool).soft_delete(post.id).await?)
    }

    async fn mark_read(&self, post: &Post, user_id: Uuid) -> mushbbs_core::Result<()> {
        Ok(PostRepo::new(&self.pool).mark_read(post.id, user_id).await?)
    }

    async fn unread_count(&self, board: &Board, user_id: Uuid) -> mushbbs_core::Result<i64> {
        Ok(PostRepo::new(&self.pool).unread_count(board.id, user_id).await?)
    }
}
