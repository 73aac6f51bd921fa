//! Notification fanout to online sessions
//!
//! The audience of every event is decided per actor by re-running the access
//! policy against a snapshot of the online roster. Per-recipient failures are
//! logged and counted; they never fail the mutation that caused the event.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::access::{AccessKind, AccessPolicy};
use crate::events::Notification;
use crate::models::{ActingIdentity, Board};

/// Source of the currently connected actors
#[async_trait]
pub trait OnlineRoster: Send + Sync {
    async fn list_online(&self) -> Vec<ActingIdentity>;
}

/// Outbound channel to a connected character
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, character_id: Uuid, event: &Notification) -> Result<(), DeliveryError>;
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("character {0} is not connected")]
    NotConnected(Uuid),

    #[error("session for character {0} is closed")]
    Closed(Uuid),
}

/// Who receives an event
#[derive(Debug, Clone)]
pub enum Audience {
    /// Actors passing `admin` on the board
    Admins(Notification),
    /// Actors passing `read` on the board
    Readers(Notification),
    /// Admins get the unmasked variant, remaining readers the masked one
    Tiered {
        admin: Notification,
        reader: Notification,
    },
}

impl Audience {
    fn event_name(&self) -> &'static str {
        match self {
            Self::Admins(n) | Self::Readers(n) => n.kind.name(),
            Self::Tiered { admin, .. } => admin.kind.name(),
        }
    }
}

/// Outcome counts of one fanout run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub delivered: usize,
    pub denied: usize,
    pub failed: usize,
}

enum Outcome {
    Delivered,
    Denied,
    Failed,
}

#[derive(Clone)]
pub struct Fanout {
    policy: AccessPolicy,
    roster: Arc<dyn OnlineRoster>,
    sink: Arc<dyn EventSink>,
}

impl Fanout {
    pub fn new(policy: AccessPolicy, roster: Arc<dyn OnlineRoster>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            policy,
            roster,
            sink,
        }
    }

    /// Run the fanout on a background task
    pub fn spawn(&self, board: Board, audience: Audience) -> JoinHandle<FanoutReport> {
        let fanout = self.clone();
        tokio::spawn(async move { fanout.broadcast(&board, &audience).await })
    }

    pub async fn broadcast(&self, board: &Board, audience: &Audience) -> FanoutReport {
        let mut seen = HashSet::new();
        let online: Vec<ActingIdentity> = self
            .roster
            .list_online()
            .await
            .into_iter()
            .filter(|actor| seen.insert(actor.character_id()))
            .collect();

        let outcomes = join_all(
            online
                .iter()
                .map(|actor| self.deliver_to(board, audience, actor)),
        )
        .await;

        let mut report = FanoutReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Delivered => report.delivered += 1,
                Outcome::Denied => report.denied += 1,
                Outcome::Failed => report.failed += 1,
            }
        }

        debug!(
            event = audience.event_name(),
            board_key = %board.board_key,
            delivered = report.delivered,
            denied = report.denied,
            failed = report.failed,
            "fanout complete"
        );
        report
    }

    async fn deliver_to(&self, board: &Board, audience: &Audience, actor: &ActingIdentity) -> Outcome {
        let character = actor.character_id();
        let selected = match self.select(board, audience, actor).await {
            Ok(selected) => selected,
            Err(e) => {
                warn!(%character, error = %e, "access check failed during fanout");
                return Outcome::Failed;
            }
        };

        let Some(event) = selected else {
            return Outcome::Denied;
        };

        match self.sink.deliver(character, event).await {
            Ok(()) => Outcome::Delivered,
            Err(e) => {
                warn!(%character, error = %e, "notification delivery failed");
                Outcome::Failed
            }
        }
    }

    async fn select<'a>(
        &self,
        board: &Board,
        audience: &'a Audience,
        actor: &ActingIdentity,
    ) -> crate::error::Result<Option<&'a Notification>> {
        let policy = &self.policy;
        let admin_kind = AccessKind::Admin;
        let read_kind = AccessKind::Read;

        Ok(match audience {
            Audience::Admins(event) => policy.access(board, actor, &admin_kind).await?.then_some(event),
            Audience::Readers(event) => policy.access(board, actor, &read_kind).await?.then_some(event),
            Audience::Tiered { admin, reader } => {
                if policy.access(board, actor, &admin_kind).await? {
                    Some(admin)
                } else if policy.access(board, actor, &read_kind).await? {
                    Some(reader)
                } else {
                    None
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessConfig;
    use crate::events::EventKind;
    use crate::lock::{ExpressionEvaluator, Locks};
    use crate::repo::MemoryRepo;
    use crate::testing::{acting, board};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        online: Vec<ActingIdentity>,
        closed: HashSet<Uuid>,
        received: Mutex<Vec<(Uuid, Notification)>>,
    }

    #[async_trait]
    impl OnlineRoster for Recorder {
        async fn list_online(&self) -> Vec<ActingIdentity> {
            self.online.clone()
        }
    }

    #[async_trait]
    impl EventSink for Recorder {
        async fn deliver(&self, character_id: Uuid, event: &Notification) -> Result<(), DeliveryError> {
            if self.closed.contains(&character_id) {
                return Err(DeliveryError::Closed(character_id));
            }
            self.received.lock().await.push((character_id, event.clone()));
            Ok(())
        }
    }

    fn fanout(recorder: Arc<Recorder>) -> Fanout {
        let repo = Arc::new(MemoryRepo::new());
        let evaluator = Arc::new(ExpressionEvaluator::new(repo.clone()));
        let policy = AccessPolicy::new(repo, evaluator, AccessConfig::default());
        Fanout::new(policy, recorder.clone(), recorder)
    }

    #[tokio::test]
    async fn readers_only_and_duplicates_collapse() {
        let reader = acting("r", "Reader", 0);
        let outsider = acting("o", "Outsider", 0);
        let recorder = Arc::new(Recorder {
            online: vec![reader.clone(), outsider.clone(), reader.clone()],
            ..Recorder::default()
        });

        let mut open = board(1, None, 1);
        open.locks = Locks::new().with("read", "name(Reader)");
        let event = Notification::new(&open, "Wiz", EventKind::BoardDelete);

        let report = fanout(recorder.clone())
            .broadcast(&open, &Audience::Readers(event))
            .await;
        assert_eq!(
            report,
            FanoutReport {
                delivered: 1,
                denied: 1,
                failed: 0
            }
        );
        let received = recorder.received.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, reader.character_id());
    }

    #[tokio::test]
    async fn closed_channel_does_not_stop_the_rest() {
        let gone = acting("g", "Gone", 9);
        let here = acting("h", "Here", 9);
        let recorder = Arc::new(Recorder {
            online: vec![gone.clone(), here.clone()],
            closed: HashSet::from([gone.character_id()]),
            ..Recorder::default()
        });

        let open = board(1, None, 1);
        let event = Notification::new(&open, "Wiz", EventKind::BoardCreate);
        let report = fanout(recorder.clone())
            .spawn(open, Audience::Admins(event))
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(recorder.received.lock().await[0].0, here.character_id());
    }
}
