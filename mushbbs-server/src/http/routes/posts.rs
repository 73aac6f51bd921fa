//! Post endpoints
//!
//! `POST /boards/{key}/posts/{post_key}` replies to the thread that
//! `post_key` belongs to.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use mushbbs_core::models::{Post, PostCreate, PostPatch, ReplyCreate};

use crate::http::error::ApiError;
use crate::http::extractors::{Acting, JsonBody};
use crate::state::AppState;

/// GET /boards/{key}/posts
async fn list_posts(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Acting(actor): Acting,
) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(state.service.list_posts(&actor, &key).await?))
}

/// POST /boards/{key}/posts
async fn create_post(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Acting(actor): Acting,
    JsonBody(req): JsonBody<PostCreate>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let created = state.service.create_post(&actor, &key, req).await?;
    Ok((StatusCode::CREATED, Json(created.value)))
}

/// GET /boards/{key}/posts/{post_key} - also marks the post read
async fn get_post(
    State(state): State<Arc<AppState>>,
    Path((key, post_key)): Path<(String, String)>,
    Acting(actor): Acting,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.service.get_post(&actor, &key, &post_key).await?))
}

/// POST /boards/{key}/posts/{post_key}
async fn create_reply(
    State(state): State<Arc<AppState>>,
    Path((key, post_key)): Path<(String, String)>,
    Acting(actor): Acting,
    JsonBody(req): JsonBody<ReplyCreate>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let created = state
        .service
        .create_reply(&actor, &key, &post_key, req)
        .await?;
    Ok((StatusCode::CREATED, Json(created.value)))
}

/// PATCH /boards/{key}/posts/{post_key}
async fn update_post(
    State(state): State<Arc<AppState>>,
    Path((key, post_key)): Path<(String, String)>,
    Acting(actor): Acting,
    JsonBody(patch): JsonBody<PostPatch>,
) -> Result<Json<Post>, ApiError> {
    let updated = state
        .service
        .update_post(&actor, &key, &post_key, patch)
        .await?;
    Ok(Json(updated.value))
}

/// DELETE /boards/{key}/posts/{post_key}
async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path((key, post_key)): Path<(String, String)>,
    Acting(actor): Acting,
) -> Result<Json<Post>, ApiError> {
    let deleted = state.service.delete_post(&actor, &key, &post_key).await?;
    Ok(Json(deleted.value))
}

/// Post routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/boards/{key}/posts", get(list_posts).post(create_post))
        .route(
            "/boards/{key}/posts/{post_key}",
            get(get_post)
                .post(create_reply)
                .patch(update_post)
                .delete(delete_post),
        )
}
