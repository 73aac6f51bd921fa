//! In-process repository
//!
//! Every mutation takes the single write guard, so `max + 1` ordering and the
//! uniqueness checks are atomic with the insert.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use futures::FutureExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BoardRepository, FactionDirectory, IdentityDirectory};
use crate::error::{BbsError, Result};
use crate::lock::Locks;
use crate::models::{
    ActingIdentity, Board, BoardChanges, BoardName, Faction, Membership, NewPost, Post,
    PostChanges, PostKey,
};

#[derive(Default)]
struct Store {
    identities: HashMap<Uuid, ActingIdentity>,
    factions: BTreeMap<i64, Faction>,
    memberships: HashMap<(i64, Uuid), Membership>,
    boards: Vec<Board>,
    posts: Vec<Post>,
    /// (post id, user id)
    receipts: HashSet<(i64, Uuid)>,
    next_board_id: i64,
    next_post_id: i64,
}

impl Store {
    fn live_board_mut(&mut self, id: i64) -> Result<&mut Board> {
        self.boards
            .iter_mut()
            .find(|b| b.id == id && !b.is_deleted())
            .ok_or_else(|| BbsError::not_found("board", id.to_string()))
    }

    fn live_post_mut(&mut self, id: i64) -> Result<&mut Post> {
        self.posts
            .iter_mut()
            .find(|p| p.id == id && !p.is_deleted())
            .ok_or_else(|| BbsError::not_found("post", id.to_string()))
    }

    fn order_taken(&self, faction_id: Option<i64>, board_order: i32, except: Option<i64>) -> bool {
        self.boards.iter().any(|b| {
            !b.is_deleted()
                && b.faction_id == faction_id
                && b.board_order == board_order
                && Some(b.id) != except
        })
    }

    fn insert_post(
        &mut self,
        board: &Board,
        key: PostKey,
        post: &NewPost,
        author: &ActingIdentity,
    ) -> Post {
        self.next_post_id += 1;
        let now = Utc::now();
        let row = Post {
            id: self.next_post_id,
            board_id: board.id,
            post_key: key.to_string(),
            post_order: key.post_order,
            sub_order: key.sub_order,
            title: post.title.as_str().to_owned(),
            body: post.body.as_str().to_owned(),
            user_id: author.user.id,
            character_id: Some(author.character_id()),
            character_name: Some(author.character.name.clone()),
            spoofed_name: author.character.name.clone(),
            created_at: now,
            modified_at: now,
            deleted_at: None,
        };
        self.posts.push(row.clone());
        self.receipts.insert((row.id, author.user.id));
        row
    }
}

/// Repository holding everything in memory behind one `RwLock`
#[derive(Default)]
pub struct MemoryRepo {
    store: RwLock<Store>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a faction by id
    pub async fn add_faction(&self, faction: Faction) -> Faction {
        let mut store = self.store.write().await;
        store.factions.insert(faction.id, faction.clone());
        faction
    }

    /// Insert or replace a membership row
    pub async fn add_membership(&self, membership: Membership) {
        let mut store = self.store.write().await;
        store
            .memberships
            .insert((membership.faction_id, membership.character_id), membership);
    }

    /// Register a (user, character) pair for identity binding
    pub async fn add_identity(&self, actor: ActingIdentity) {
        let mut store = self.store.write().await;
        store.identities.insert(actor.character_id(), actor);
    }

    pub async fn remove_membership(&self, faction_id: i64, character_id: Uuid) {
        let mut store = self.store.write().await;
        store.memberships.remove(&(faction_id, character_id));
    }
}

#[async_trait]
impl IdentityDirectory for MemoryRepo {
    async fn find_acting(&self, user_id: Uuid, character_id: Uuid) -> Result<ActingIdentity> {
        let store = self.store.read().await;
        store
            .identities
            .get(&character_id)
            .filter(|actor| actor.user.id == user_id)
            .cloned()
            .ok_or_else(|| BbsError::not_found("character", character_id.to_string()))
    }
}

#[async_trait]
impl FactionDirectory for MemoryRepo {
    async fn find_faction_by_abbreviation(&self, abbreviation: &str) -> Result<Faction> {
        let store = self.store.read().await;
        store
            .factions
            .values()
            .find(|f| f.deleted_at.is_none() && f.abbreviation.eq_ignore_ascii_case(abbreviation))
            .cloned()
            .ok_or_else(|| BbsError::not_found("faction", abbreviation))
    }

    async fn get_faction(&self, id: i64) -> Result<Faction> {
        let store = self.store.read().await;
        store
            .factions
            .get(&id)
            .cloned()
            .ok_or_else(|| BbsError::not_found("faction", id.to_string()))
    }

    async fn get_membership(
        &self,
        faction: &Faction,
        character_id: Uuid,
    ) -> Result<Option<Membership>> {
        let store = self.store.read().await;
        Ok(store.memberships.get(&(faction.id, character_id)).cloned())
    }
}

#[async_trait]
impl BoardRepository for MemoryRepo {
    async fn get_board_by_key(&self, board_key: &str) -> Result<Board> {
        let store = self.store.read().await;
        store
            .boards
            .iter()
            .find(|b| !b.is_deleted() && b.board_key.eq_ignore_ascii_case(board_key))
            .cloned()
            .ok_or_else(|| BbsError::not_found("board", board_key))
    }

    async fn list_boards(&self) -> Result<Vec<Board>> {
        let store = self.store.read().await;
        let mut boards: Vec<Board> = store
            .boards
            .iter()
            .filter(|b| !b.is_deleted())
            .cloned()
            .collect();
        boards.sort_by_key(|b| (b.faction_id.unwrap_or(0), b.board_order));
        Ok(boards)
    }

    async fn create_board(
        &self,
        faction: Option<&Faction>,
        board_order: i32,
        name: &BoardName,
    ) -> Result<Board> {
        let mut store = self.store.write().await;
        let faction_id = faction.map(|f| f.id);
        let abbreviation = faction.map(|f| f.abbreviation.clone());
        let board_key = format!("{}{}", abbreviation.as_deref().unwrap_or_default(), board_order);

        if store.order_taken(faction_id, board_order, None) {
            return Err(BbsError::Conflict(format!("board {board_key} already exists")));
        }

        store.next_board_id += 1;
        let now = Utc::now();
        let board = Board {
            id: store.next_board_id,
            board_key,
            name: name.as_str().to_owned(),
            description: None,
            anonymous_name: None,
            faction_id,
            faction_name: faction.map(|f| f.name.clone()),
            faction_abbreviation: abbreviation,
            board_order,
            locks: Locks::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        store.boards.push(board.clone());
        Ok(board)
    }

    async fn update_board(&self, board: &Board, changes: &BoardChanges) -> Result<Board> {
        let mut store = self.store.write().await;

        if let Some(order) = changes.board_order {
            if store.order_taken(board.faction_id, order, Some(board.id)) {
                return Err(BbsError::Conflict(format!(
                    "board order {order} is already in use"
                )));
            }
        }

        let row = store.live_board_mut(board.id)?;
        changes.apply(row);
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_board(&self, board: &Board) -> Result<Board> {
        let mut store = self.store.write().await;
        let row = store.live_board_mut(board.id)?;
        row.deleted_at = Some(Utc::now());
        Ok(row.clone())
    }

    async fn get_post_by_key(&self, board: &Board, key: PostKey) -> Result<Post> {
        let store = self.store.read().await;
        store
            .posts
            .iter()
            .find(|p| p.board_id == board.id && !p.is_deleted() && p.key() == key)
            .cloned()
            .ok_or_else(|| BbsError::not_found("post", key.to_string()))
    }

    fn list_posts_for_board<'a>(&'a self, board: &'a Board) -> BoxStream<'a, Result<Post>> {
        async move {
            let store = self.store.read().await;
            let mut posts: Vec<Post> = store
                .posts
                .iter()
                .filter(|p| p.board_id == board.id && !p.is_deleted())
                .cloned()
                .collect();
            posts.sort_by_key(Post::key);
            stream::iter(posts.into_iter().map(Ok))
        }
        .flatten_stream()
        .boxed()
    }

    async fn create_post(
        &self,
        board: &Board,
        post: &NewPost,
        author: &ActingIdentity,
    ) -> Result<Post> {
        let mut store = self.store.write().await;
        // Deleted posts still count so orders are never reused
        let next = store
            .posts
            .iter()
            .filter(|p| p.board_id == board.id)
            .map(|p| p.post_order)
            .max()
            .unwrap_or(0)
            + 1;
        Ok(store.insert_post(board, PostKey::top_level(next), post, author))
    }

    async fn create_reply(
        &self,
        board: &Board,
        parent: &Post,
        reply: &NewPost,
        author: &ActingIdentity,
    ) -> Result<Post> {
        let mut store = self.store.write().await;
        let next = store
            .posts
            .iter()
            .filter(|p| p.board_id == board.id && p.post_order == parent.post_order)
            .map(|p| p.sub_order)
            .max()
            .unwrap_or(0)
            + 1;
        let key = PostKey {
            post_order: parent.post_order,
            sub_order: next,
        };
        Ok(store.insert_post(board, key, reply, author))
    }

    async fn update_post(&self, post: &Post, changes: &PostChanges) -> Result<Post> {
        let mut store = self.store.write().await;
        let row = store.live_post_mut(post.id)?;
        changes.apply(row);
        row.modified_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_post(&self, post: &Post) -> Result<Post> {
        let mut store = self.store.write().await;
        let row = store.live_post_mut(post.id)?;
        row.deleted_at = Some(Utc::now());
        Ok(row.clone())
    }

    async fn mark_read(&self, post: &Post, user_id: Uuid) -> Result<()> {
        let mut store = self.store.write().await;
        store.receipts.insert((post.id, user_id));
        Ok(())
    }

    async fn unread_count(&self, board: &Board, user_id: Uuid) -> Result<i64> {
        let store = self.store.read().await;
        let unread = store
            .posts
            .iter()
            .filter(|p| p.board_id == board.id && !p.is_deleted())
            .filter(|p| !store.receipts.contains(&(p.id, user_id)))
            .count();
        Ok(unread as i64)
    }
}
