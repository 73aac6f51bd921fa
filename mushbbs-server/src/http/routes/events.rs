//! Notification stream
//!
//! `GET /events` registers the caller's character with the session hub for
//! as long as the stream is open. Each notification is sent as an SSE event
//! named after its kind (`post_create`, `board_update`, ...).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info};

use crate::http::extractors::Acting;
use crate::state::AppState;

/// Interval between keep-alive comments on an idle stream
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// GET /events
async fn events(
    State(state): State<Arc<AppState>>,
    Acting(actor): Acting,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(character = %actor.character_id(), "event stream opened");
    let rx = state.hub.connect(actor).await;

    let stream = UnboundedReceiverStream::new(rx).map(|notification| {
        match serde_json::to_string(&notification) {
            Ok(json) => Ok(Event::default()
                .event(notification.kind.name())
                .data(json)),
            Err(e) => {
                error!("Failed to serialize notification: {}", e);
                Ok(Event::default().comment("unserializable notification"))
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping"))
}

/// Event stream routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(events))
}
