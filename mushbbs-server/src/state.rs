//! Application state shared across handlers

use std::sync::Arc;

use sqlx::PgPool;

use mushbbs_core::{AccessConfig, BoardRepository, BoardService, FactionDirectory, IdentityDirectory};

use crate::hub::SessionHub;

/// Shared application state
pub struct AppState {
    pub service: BoardService,
    pub identities: Arc<dyn IdentityDirectory>,
    pub hub: Arc<SessionHub>,
    /// Pool behind the store when it is PostgreSQL; pinged by `/health`
    pub database: Option<PgPool>,
}

impl AppState {
    /// Wire the service, its fanout and a fresh session hub around one store
    pub fn with_store<R>(store: Arc<R>, access: AccessConfig) -> Self
    where
        R: BoardRepository + FactionDirectory + IdentityDirectory + 'static,
    {
        let hub = Arc::new(SessionHub::new());
        let service = BoardService::from_parts(store.clone(), hub.clone(), hub.clone(), access);
        Self {
            service,
            identities: store,
            hub,
            database: None,
        }
    }

    pub fn with_database(mut self, pool: PgPool) -> Self {
        self.database = Some(pool);
        self
    }
}
