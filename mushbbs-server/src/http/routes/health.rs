//! Liveness: store reachability and connected session count

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::db::ping;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database does not answer
    pub status: &'static str,
    pub version: &'static str,
    /// `postgres`, `unreachable`, or `memory` when no pool is attached
    pub store: &'static str,
    pub sessions: usize,
}

/// GET /health - no identity required
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let store = match &state.database {
        None => "memory",
        Some(pool) => match ping(pool).await {
            Ok(()) => "postgres",
            Err(e) => {
                tracing::warn!(error = %e, "health check could not reach the database");
                "unreachable"
            }
        },
    };
    let (code, status) = if store == "unreachable" {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            store,
            sessions: state.hub.len().await,
        }),
    )
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mushbbs_core::testing::acting;
    use mushbbs_core::{AccessConfig, MemoryRepo};

    #[tokio::test]
    async fn memory_store_reports_sessions() {
        let state = Arc::new(AppState::with_store(
            Arc::new(MemoryRepo::new()),
            AccessConfig::default(),
        ));
        let _rx = state.hub.connect(acting("alice", "Alys", 0)).await;

        let (code, Json(body)) = health(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.store, "memory");
        assert_eq!(body.sessions, 1);
    }
}
