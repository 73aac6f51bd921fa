//! HTTP routes over the in-memory store, driven with `tower::ServiceExt::oneshot`

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use mushbbs_core::models::ActingIdentity;
use mushbbs_core::testing::{acting, faction, membership};
use mushbbs_core::{AccessConfig, MemoryRepo};
use mushbbs_server::{router, AppState};

struct Harness {
    app: Router,
    repo: Arc<MemoryRepo>,
    state: Arc<AppState>,
}

async fn harness() -> Harness {
    let repo = Arc::new(MemoryRepo::new());
    repo.add_faction(faction(1, "Knights", "K")).await;
    let state = Arc::new(AppState::with_store(repo.clone(), AccessConfig::default()));
    Harness {
        app: router(state.clone(), false),
        repo,
        state,
    }
}

impl Harness {
    async fn user(&self, name: &str, admin_level: i32) -> ActingIdentity {
        let actor = acting(&name.to_lowercase(), name, admin_level);
        self.repo.add_identity(actor.clone()).await;
        actor
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        actor: &ActingIdentity,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request(method, path, actor, body))
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }
}

fn request(method: &str, path: &str, actor: &ActingIdentity, body: Option<Value>) -> Request<Body> {
    let separator = if path.contains('?') { '&' } else { '?' };
    let builder = Request::builder()
        .method(method)
        .uri(format!("{path}{separator}character_id={}", actor.character_id()))
        .header("x-user-id", actor.user.id.to_string());

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Public board 1, open to everyone
async fn open_board(h: &Harness, admin: &ActingIdentity) {
    let (status, _) = h
        .send("POST", "/boards", admin, Some(json!({"board_key": "1", "name": "Public"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = h
        .send(
            "PATCH",
            "/boards/1",
            admin,
            Some(json!({"locks": {"read": "all()", "post": "all()"}})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_needs_no_identity() {
    let h = harness().await;
    let response = h
        .app
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["store"], "memory");
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn identity_is_required_and_verified() {
    let h = harness().await;
    let alice = h.user("Alice", 0).await;

    let response = h
        .app
        .clone()
        .oneshot(Request::get("/boards").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // someone else's character
    let mut impostor = acting("mallory", "Mallory", 0);
    impostor.character = alice.character.clone();
    let (status, body) = h.send("GET", "/boards", &impostor, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = h.send("GET", "/boards", &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn board_creation_is_gated_and_unique() {
    let h = harness().await;
    let alice = h.user("Alice", 0).await;
    let staff = h.user("Staff", 5).await;

    let (status, body) = h
        .send("POST", "/boards", &alice, Some(json!({"board_key": "K1", "name": "Keep"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "you do not have permission to create a board");

    // faction leaders may create boards for their faction
    let knights = faction(1, "Knights", "K");
    h.repo
        .add_membership(membership(&knights, alice.character_id(), 1))
        .await;
    let (status, body) = h
        .send("POST", "/boards", &alice, Some(json!({"board_key": "k1", "name": "Keep"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["board_key"], "K1");
    assert_eq!(body["faction_name"], "Knights");

    let (status, body) = h
        .send("POST", "/boards", &staff, Some(json!({"board_key": "K1", "name": "Again"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = h
        .send("POST", "/boards", &staff, Some(json!({"board_key": "K", "name": "Keyless"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_format");

    let (status, _) = h
        .send("POST", "/boards", &staff, Some(json!({"board_key": "X1", "name": "Nowhere"})))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn posts_replies_and_unread_counts() {
    let h = harness().await;
    let staff = h.user("Staff", 5).await;
    let alice = h.user("Alice", 0).await;
    open_board(&h, &staff).await;

    let (status, post) = h
        .send(
            "POST",
            "/boards/1/posts",
            &staff,
            Some(json!({"title": "Welcome", "body": "Read the rules."})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["post_key"], "1");

    let (_, listing) = h.send("GET", "/boards", &alice, None).await;
    assert_eq!(listing[0]["board_key"], "1");
    assert_eq!(listing[0]["unread"], 1);

    let (status, reply) = h
        .send("POST", "/boards/1/posts/1", &alice, Some(json!({"body": "Thanks!"})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["post_key"], "1.1");
    assert_eq!(reply["title"], "RE: Welcome");

    let (status, _) = h.send("GET", "/boards/1/posts/1", &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, listing) = h.send("GET", "/boards", &alice, None).await;
    assert_eq!(listing[0]["unread"], 0);

    let (_, posts) = h.send("GET", "/boards/1/posts", &alice, None).await;
    let keys: Vec<&str> = posts
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["post_key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, ["1", "1.1"]);

    // editing is staff-only
    let (status, _) = h
        .send("PATCH", "/boards/1/posts/1.1", &alice, Some(json!({"body": "edited"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h
        .send("PATCH", "/boards/1/posts/1", &staff, Some(json!({"title": null})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, _) = h.send("DELETE", "/boards/1/posts/1.1", &staff, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h.send("GET", "/boards/1/posts/1.1", &alice, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_bodies_are_validation_errors() {
    let h = harness().await;
    let staff = h.user("Staff", 5).await;
    open_board(&h, &staff).await;

    let (status, body) = h
        .send("POST", "/boards/1/posts", &staff, Some(json!({"body": "no title"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("title"));

    let (status, body) = h
        .send("POST", "/boards", &staff, Some(json!({"board_key": 7, "name": "Seven"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    // not JSON at all
    let raw = Request::builder()
        .method("POST")
        .uri(format!("/boards/1/posts?character_id={}", staff.character_id()))
        .header("x-user-id", staff.user.id.to_string())
        .header("content-type", "application/json")
        .body(Body::from("{title"))
        .unwrap();
    let response = h.app.clone().oneshot(raw).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = h
        .send(
            "PATCH",
            "/boards/1",
            &staff,
            Some(json!({"locks": {"read": format!("{}all()", "!".repeat(100))}})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn deleted_board_disappears() {
    let h = harness().await;
    let staff = h.user("Staff", 5).await;
    open_board(&h, &staff).await;

    let (status, body) = h.send("DELETE", "/boards/1", &staff, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["deleted_at"].is_null());

    let (status, _) = h.send("GET", "/boards/1", &staff, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn event_stream_receives_new_posts() {
    let h = harness().await;
    let staff = h.user("Staff", 5).await;
    let alice = h.user("Alice", 0).await;
    open_board(&h, &staff).await;

    let response = h
        .app
        .clone()
        .oneshot(request("GET", "/events", &alice, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(h.state.hub.len().await, 1);

    let (status, _) = h
        .send(
            "POST",
            "/boards/1/posts",
            &staff,
            Some(json!({"title": "News", "body": "Market day."})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut frames = response.into_body().into_data_stream();
    let frame = tokio::time::timeout(Duration::from_secs(5), frames.next())
        .await
        .expect("no event within 5s")
        .expect("stream ended")
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.starts_with("event: post_create"), "{text}");
    assert!(text.contains("Market day."), "{text}");
}
