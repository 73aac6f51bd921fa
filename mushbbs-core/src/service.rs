//! Board service: validate, authorize, mutate, mask, fan out
//!
//! Every mutation returns a [`Mutation`] whose `fanout` handle resolves once
//! notifications have been delivered. Callers that answer a request drop the
//! handle; the fanout keeps running in the background either way.

use std::sync::Arc;

use futures::TryStreamExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

use crate::access::{AccessConfig, AccessKind, AccessPolicy};
use crate::error::{BbsError, Result};
use crate::events::{EventKind, Notification, PostSummary};
use crate::fanout::{Audience, EventSink, Fanout, FanoutReport, OnlineRoster};
use crate::lock::ExpressionEvaluator;
use crate::masking::mask_post;
use crate::models::{
    ActingIdentity, Board, BoardCreate, BoardKey, BoardName, BoardPatch, NewPost, Post, PostBody,
    PostCreate, PostKey, PostPatch, PostTitle, ReplyCreate,
};
use crate::repo::{BoardRepository, FactionDirectory};

/// Result of a mutation plus the handle of its notification fanout
#[derive(Debug)]
pub struct Mutation<T> {
    pub value: T,
    pub fanout: JoinHandle<FanoutReport>,
}

/// Board as listed for one viewer
#[derive(Debug, Clone, Serialize)]
pub struct BoardListing {
    #[serde(flatten)]
    pub board: Board,
    pub unread: i64,
}

#[derive(Clone)]
pub struct BoardService {
    boards: Arc<dyn BoardRepository>,
    policy: AccessPolicy,
    fanout: Fanout,
}

impl BoardService {
    pub fn new(boards: Arc<dyn BoardRepository>, policy: AccessPolicy, fanout: Fanout) -> Self {
        Self {
            boards,
            policy,
            fanout,
        }
    }

    /// Wire the stock evaluator, policy and fanout around one store
    pub fn from_parts<R>(
        store: Arc<R>,
        roster: Arc<dyn OnlineRoster>,
        sink: Arc<dyn EventSink>,
        config: AccessConfig,
    ) -> Self
    where
        R: BoardRepository + FactionDirectory + 'static,
    {
        let evaluator = Arc::new(ExpressionEvaluator::new(store.clone()));
        let policy = AccessPolicy::new(store.clone(), evaluator, config);
        let fanout = Fanout::new(policy.clone(), roster, sink);
        Self::new(store, policy, fanout)
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    async fn require(
        &self,
        board: &Board,
        actor: &ActingIdentity,
        kind: AccessKind,
        action: &'static str,
    ) -> Result<()> {
        if self.policy.access(board, actor, &kind).await? {
            Ok(())
        } else {
            Err(BbsError::Forbidden { action })
        }
    }

    pub async fn create_board(
        &self,
        actor: &ActingIdentity,
        request: BoardCreate,
    ) -> Result<Mutation<Board>> {
        let name = BoardName::new(&request.name)?;
        let key = BoardKey::parse(&request.board_key)?;

        let faction = match &key.abbreviation {
            Some(abbr) => Some(self.policy.directory().find_faction_by_abbreviation(abbr).await?),
            None => None,
        };

        if !self.policy.board_admin(actor, faction.as_ref()).await? {
            return Err(BbsError::Forbidden {
                action: "create a board",
            });
        }

        let board = self
            .boards
            .create_board(faction.as_ref(), key.order, &name)
            .await?;
        info!(board_key = %board.board_key, character = %actor.character_id(), "board created");

        let event = Notification::new(&board, &actor.character.name, EventKind::BoardCreate);
        let fanout = self.fanout.spawn(board.clone(), Audience::Admins(event));
        Ok(Mutation {
            value: board,
            fanout,
        })
    }

    pub async fn get_board(&self, actor: &ActingIdentity, board_key: &str) -> Result<Board> {
        let board = self.boards.get_board_by_key(board_key).await?;
        self.require(&board, actor, AccessKind::Read, "read this board")
            .await?;
        Ok(board)
    }

    /// Boards the actor may read, with their unread counts
    pub async fn list_boards(&self, actor: &ActingIdentity) -> Result<Vec<BoardListing>> {
        let mut listings = Vec::new();
        for board in self.boards.list_boards().await? {
            if !self.policy.access(&board, actor, &AccessKind::Read).await? {
                continue;
            }
            let unread = self.boards.unread_count(&board, actor.user.id).await?;
            listings.push(BoardListing { board, unread });
        }
        Ok(listings)
    }

    pub async fn update_board(
        &self,
        actor: &ActingIdentity,
        board_key: &str,
        patch: BoardPatch,
    ) -> Result<Mutation<Board>> {
        let changes = patch.validate()?;
        let board = self.boards.get_board_by_key(board_key).await?;
        self.require(&board, actor, AccessKind::Admin, "update this board")
            .await?;

        let diff = changes.diff(&board);
        let updated = self.boards.update_board(&board, &changes).await?;
        info!(
            board_key = %updated.board_key,
            character = %actor.character_id(),
            fields = diff.len(),
            "board updated"
        );

        let event = Notification::new(
            &updated,
            &actor.character.name,
            EventKind::BoardUpdate { changes: diff },
        );
        let fanout = self.fanout.spawn(updated.clone(), Audience::Readers(event));
        Ok(Mutation {
            value: updated,
            fanout,
        })
    }

    pub async fn delete_board(
        &self,
        actor: &ActingIdentity,
        board_key: &str,
    ) -> Result<Mutation<Board>> {
        let board = self.boards.get_board_by_key(board_key).await?;
        self.require(&board, actor, AccessKind::Admin, "delete this board")
            .await?;

        let deleted = self.boards.delete_board(&board).await?;
        info!(board_key = %board.board_key, character = %actor.character_id(), "board deleted");

        let event = Notification::new(&board, &actor.character.name, EventKind::BoardDelete);
        // Audience is computed against the board as it was before deletion
        let fanout = self.fanout.spawn(board, Audience::Readers(event));
        Ok(Mutation {
            value: deleted,
            fanout,
        })
    }

    pub async fn list_posts(&self, actor: &ActingIdentity, board_key: &str) -> Result<Vec<Post>> {
        let board = self.get_board(actor, board_key).await?;
        let admin = self.policy.is_board_admin(&board, actor).await?;

        self.boards
            .list_posts_for_board(&board)
            .map_ok(|post| mask_post(&board, post, admin))
            .try_collect()
            .await
    }

    /// Fetch one post and record the viewer's read receipt
    pub async fn get_post(
        &self,
        actor: &ActingIdentity,
        board_key: &str,
        post_key: &str,
    ) -> Result<Post> {
        let key: PostKey = post_key.parse()?;
        let board = self.get_board(actor, board_key).await?;
        let post = self.boards.get_post_by_key(&board, key).await?;
        self.boards.mark_read(&post, actor.user.id).await?;

        let admin = self.policy.is_board_admin(&board, actor).await?;
        Ok(mask_post(&board, post, admin))
    }

    pub async fn create_post(
        &self,
        actor: &ActingIdentity,
        board_key: &str,
        request: PostCreate,
    ) -> Result<Mutation<Post>> {
        let new_post = request.validate()?;
        let board = self.boards.get_board_by_key(board_key).await?;
        self.require(&board, actor, AccessKind::Post, "write to this board")
            .await?;

        let post = self.boards.create_post(&board, &new_post, actor).await?;
        info!(
            board_key = %board.board_key,
            post_key = %post.post_key,
            character = %actor.character_id(),
            "post created"
        );

        self.finish_post(actor, board, post, None, |post| EventKind::PostCreate { post })
            .await
    }

    /// Reply to a thread; a reply key such as `3.1` replies to thread `3`
    pub async fn create_reply(
        &self,
        actor: &ActingIdentity,
        board_key: &str,
        parent_key: &str,
        request: ReplyCreate,
    ) -> Result<Mutation<Post>> {
        let key: PostKey = parent_key.parse()?;
        let body = PostBody::new(&request.body)?;
        let board = self.boards.get_board_by_key(board_key).await?;
        self.require(&board, actor, AccessKind::Post, "write to this board")
            .await?;

        let parent = self
            .boards
            .get_post_by_key(&board, PostKey::top_level(key.post_order))
            .await?;
        let reply = NewPost {
            title: PostTitle::reply_to(&parent.title),
            body,
        };
        let post = self.boards.create_reply(&board, &parent, &reply, actor).await?;
        info!(
            board_key = %board.board_key,
            post_key = %post.post_key,
            character = %actor.character_id(),
            "reply created"
        );

        self.finish_post(actor, board, post, None, |post| EventKind::ReplyCreate { post })
            .await
    }

    pub async fn update_post(
        &self,
        actor: &ActingIdentity,
        board_key: &str,
        post_key: &str,
        patch: PostPatch,
    ) -> Result<Mutation<Post>> {
        let key: PostKey = post_key.parse()?;
        let changes = patch.validate()?;
        let board = self.boards.get_board_by_key(board_key).await?;
        self.require(&board, actor, AccessKind::Admin, "update this post")
            .await?;

        let post = self.boards.get_post_by_key(&board, key).await?;
        let diff = changes.diff(&post);
        let updated = self.boards.update_post(&post, &changes).await?;
        info!(
            board_key = %board.board_key,
            post_key = %updated.post_key,
            character = %actor.character_id(),
            "post updated"
        );

        let enactor = actor.character.name.clone();
        self.finish_post(actor, board, updated, Some(enactor), move |post| {
            EventKind::PostUpdate {
                post,
                changes: diff.clone(),
            }
        })
        .await
    }

    pub async fn delete_post(
        &self,
        actor: &ActingIdentity,
        board_key: &str,
        post_key: &str,
    ) -> Result<Mutation<Post>> {
        let key: PostKey = post_key.parse()?;
        let board = self.boards.get_board_by_key(board_key).await?;
        self.require(&board, actor, AccessKind::Admin, "delete this post")
            .await?;

        let post = self.boards.get_post_by_key(&board, key).await?;
        let deleted = self.boards.delete_post(&post).await?;
        info!(
            board_key = %board.board_key,
            post_key = %deleted.post_key,
            character = %actor.character_id(),
            "post deleted"
        );

        let enactor = actor.character.name.clone();
        self.finish_post(actor, board, deleted, Some(enactor), |post| EventKind::PostDelete { post })
            .await
    }

    /// Mask the post for the caller and fan out the two-tier event.
    ///
    /// Without an explicit `enactor` the event names the (masked) poster.
    async fn finish_post<F>(
        &self,
        actor: &ActingIdentity,
        board: Board,
        post: Post,
        enactor: Option<String>,
        kind: F,
    ) -> Result<Mutation<Post>>
    where
        F: Fn(PostSummary) -> EventKind,
    {
        let admin_view = mask_post(&board, post.clone(), true);
        let reader_view = mask_post(&board, post, false);

        let event = |view: &Post| {
            let name = enactor.clone().unwrap_or_else(|| view.spoofed_name.clone());
            Notification::new(&board, name, kind(PostSummary::from(view)))
        };
        let audience = Audience::Tiered {
            admin: event(&admin_view),
            reader: event(&reader_view),
        };

        let value = if self.policy.is_board_admin(&board, actor).await? {
            admin_view
        } else {
            reader_view
        };
        let fanout = self.fanout.spawn(board, audience);
        Ok(Mutation { value, fanout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{acting, faction, membership};
    use crate::repo::MemoryRepo;

    struct Nobody;

    #[async_trait::async_trait]
    impl OnlineRoster for Nobody {
        async fn list_online(&self) -> Vec<ActingIdentity> {
            Vec::new()
        }
    }

    #[async_trait::async_trait]
    impl EventSink for Nobody {
        async fn deliver(
            &self,
            character_id: uuid::Uuid,
            _event: &Notification,
        ) -> std::result::Result<(), crate::fanout::DeliveryError> {
            Err(crate::fanout::DeliveryError::NotConnected(character_id))
        }
    }

    fn service(repo: Arc<MemoryRepo>) -> BoardService {
        BoardService::from_parts(repo, Arc::new(Nobody), Arc::new(Nobody), AccessConfig::default())
    }

    fn create(key: &str, name: &str) -> BoardCreate {
        BoardCreate {
            board_key: key.into(),
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn create_board_requires_bbadmin_or_leadership() {
        let repo = Arc::new(MemoryRepo::new());
        let knights = repo.add_faction(faction(1, "Knights", "F")).await;
        let svc = service(repo.clone());

        let stranger = acting("s", "Stranger", 0);
        let err = svc.create_board(&stranger, create("F3", "Orders")).await.unwrap_err();
        assert_eq!(err.to_string(), "you do not have permission to create a board");

        let leader = acting("l", "Leader", 0);
        repo.add_membership(membership(&knights, leader.character_id(), 1)).await;
        let created = svc.create_board(&leader, create("F3", "Orders")).await.unwrap();
        assert_eq!(created.value.board_key, "F3");
        assert_eq!(created.value.faction_name.as_deref(), Some("Knights"));
        assert_eq!(created.fanout.await.unwrap(), FanoutReport::default());
    }

    #[tokio::test]
    async fn validation_and_key_errors_come_first() {
        let repo = Arc::new(MemoryRepo::new());
        let svc = service(repo);
        let wiz = acting("w", "Wiz", 9);

        assert!(matches!(
            svc.create_board(&wiz, create("3", "  ")).await,
            Err(BbsError::Validation(_))
        ));
        assert!(matches!(
            svc.create_board(&wiz, create("F", "Orders")).await,
            Err(BbsError::InvalidFormat { .. })
        ));
        assert!(matches!(
            svc.create_board(&wiz, create("Z1", "Orders")).await,
            Err(BbsError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn reply_to_a_reply_joins_the_thread() {
        let repo = Arc::new(MemoryRepo::new());
        let svc = service(repo);
        let wiz = acting("w", "Wiz", 9);
        svc.create_board(&wiz, create("1", "Public")).await.unwrap();

        let post = PostCreate {
            title: "Muster".into(),
            body: "Tonight".into(),
        };
        svc.create_post(&wiz, "1", post).await.unwrap();
        let reply = ReplyCreate { body: "Aye".into() };
        let first = svc.create_reply(&wiz, "1", "1", reply.clone()).await.unwrap();
        let second = svc.create_reply(&wiz, "1", "1.1", reply).await.unwrap();

        assert_eq!(first.value.post_key, "1.1");
        assert_eq!(second.value.post_key, "1.2");
        assert_eq!(second.value.title, "RE: Muster");
    }

    #[tokio::test]
    async fn post_edits_are_admin_only() {
        let repo = Arc::new(MemoryRepo::new());
        let svc = service(repo);
        let wiz = acting("w", "Wiz", 9);
        let poster = acting("p", "Poster", 0);

        svc.create_board(&wiz, create("1", "Public")).await.unwrap();
        let patch: BoardPatch =
            serde_json::from_value(serde_json::json!({"locks": {"post": "all()"}})).unwrap();
        svc.update_board(&wiz, "1", patch).await.unwrap();

        let post = PostCreate {
            title: "Mine".into(),
            body: "text".into(),
        };
        svc.create_post(&poster, "1", post).await.unwrap();

        let patch: PostPatch = serde_json::from_str(r#"{"title": "Edited"}"#).unwrap();
        assert!(matches!(
            svc.update_post(&poster, "1", "1", patch.clone()).await,
            Err(BbsError::Forbidden { action: "update this post" })
        ));
        let edited = svc.update_post(&wiz, "1", "1", patch).await.unwrap();
        assert_eq!(edited.value.title, "Edited");

        assert!(matches!(
            svc.delete_post(&poster, "1", "1").await,
            Err(BbsError::Forbidden { .. })
        ));
        svc.delete_post(&wiz, "1", "1").await.unwrap();
        assert!(svc.list_posts(&poster, "1").await.unwrap().is_empty());
    }
}
