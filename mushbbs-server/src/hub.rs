//! Connected sessions
//!
//! One unbounded channel per character. The SSE route owns the receiver; a
//! dropped receiver leaves a closed sender behind, which is pruned the next
//! time the roster is listed or a delivery to it fails.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use mushbbs_core::models::ActingIdentity;
use mushbbs_core::{DeliveryError, EventSink, Notification, OnlineRoster};

type Session = (ActingIdentity, mpsc::UnboundedSender<Notification>);

#[derive(Default)]
pub struct SessionHub {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `actor` as online, replacing any previous session for the character
    pub async fn connect(&self, actor: ActingIdentity) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        let character_id = actor.character_id();
        let previous = self
            .sessions
            .write()
            .await
            .insert(character_id, (actor, tx));
        if previous.is_some() {
            debug!(character = %character_id, "replaced existing session");
        }
        rx
    }

    pub async fn disconnect(&self, character_id: Uuid) {
        self.sessions.write().await.remove(&character_id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl OnlineRoster for SessionHub {
    async fn list_online(&self) -> Vec<ActingIdentity> {
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, (_, tx)| !tx.is_closed());
        sessions.values().map(|(actor, _)| actor.clone()).collect()
    }
}

#[async_trait]
impl EventSink for SessionHub {
    async fn deliver(&self, character_id: Uuid, event: &Notification) -> Result<(), DeliveryError> {
        let sent = {
            let sessions = self.sessions.read().await;
            let (_, tx) = sessions
                .get(&character_id)
                .ok_or(DeliveryError::NotConnected(character_id))?;
            tx.send(event.clone()).is_ok()
        };

        if sent {
            Ok(())
        } else {
            self.disconnect(character_id).await;
            Err(DeliveryError::Closed(character_id))
        }
    }
}
