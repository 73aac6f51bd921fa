//! Custom Axum extractors

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use mushbbs_core::models::ActingIdentity;
use mushbbs_core::BbsError;

use super::error::ApiError;
use crate::state::AppState;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Deserialize)]
struct CharacterQuery {
    character_id: Uuid,
}

/// The verified (user, character) pair for this request.
///
/// The user comes from the `x-user-id` header, the character from the
/// `character_id` query parameter; the pair must exist and match.
pub struct Acting(pub ActingIdentity);

impl FromRequestParts<Arc<AppState>> for Acting {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or(ApiError::Unauthorized {
                reason: "missing x-user-id header",
            })?
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .ok_or(ApiError::Unauthorized {
                reason: "x-user-id is not a valid UUID",
            })?;

        let Query(CharacterQuery { character_id }) =
            Query::try_from_uri(&parts.uri).map_err(|_| ApiError::Unauthorized {
                reason: "missing or invalid character_id query parameter",
            })?;

        match state.identities.find_acting(user_id, character_id).await {
            Ok(actor) => Ok(Self(actor)),
            Err(BbsError::NotFound { .. }) => Err(ApiError::Unauthorized {
                reason: "character does not belong to this user",
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// JSON request body whose rejections render as `ApiError`.
///
/// Missing fields, wrong types, bad syntax and a wrong content type all come
/// back as 400 `validation_error` instead of axum's plain-text 4xx.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}
