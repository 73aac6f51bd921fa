//! Board endpoints
//!
//! Mutations answer as soon as the write commits; the notification fanout
//! keeps running on its own task.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use mushbbs_core::models::{Board, BoardCreate, BoardPatch};
use mushbbs_core::BoardListing;

use crate::http::error::ApiError;
use crate::http::extractors::{Acting, JsonBody};
use crate::state::AppState;

/// GET /boards - boards the caller may read, with unread counts
async fn list_boards(
    State(state): State<Arc<AppState>>,
    Acting(actor): Acting,
) -> Result<Json<Vec<BoardListing>>, ApiError> {
    Ok(Json(state.service.list_boards(&actor).await?))
}

/// POST /boards
async fn create_board(
    State(state): State<Arc<AppState>>,
    Acting(actor): Acting,
    JsonBody(req): JsonBody<BoardCreate>,
) -> Result<(StatusCode, Json<Board>), ApiError> {
    let created = state.service.create_board(&actor, req).await?;
    Ok((StatusCode::CREATED, Json(created.value)))
}

/// GET /boards/{key}
async fn get_board(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Acting(actor): Acting,
) -> Result<Json<Board>, ApiError> {
    Ok(Json(state.service.get_board(&actor, &key).await?))
}

/// PATCH /boards/{key}
async fn update_board(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Acting(actor): Acting,
    JsonBody(patch): JsonBody<BoardPatch>,
) -> Result<Json<Board>, ApiError> {
    let updated = state.service.update_board(&actor, &key, patch).await?;
    Ok(Json(updated.value))
}

/// DELETE /boards/{key} - soft delete, returns the deleted row
async fn delete_board(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Acting(actor): Acting,
) -> Result<Json<Board>, ApiError> {
    let deleted = state.service.delete_board(&actor, &key).await?;
    Ok(Json(deleted.value))
}

/// Board routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/boards", get(list_boards).post(create_board))
        .route(
            "/boards/{key}",
            get(get_board).patch(update_board).delete(delete_board),
        )
}
