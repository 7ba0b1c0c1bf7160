use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use modhub_api::config::AppConfig;
use modhub_api::mailer::LogMailer;
use modhub_api::models::User;
use modhub_api::store::{MemoryStore, Store};
use modhub_api::throttle::LocalRateLimiter;
use modhub_api::{build_router, AppState};
use modhub_shared::middleware::sign_claims;
use modhub_shared::types::auth::{Claims, UserRole};

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState {
            store: store.clone(),
            config,
            limiter: Arc::new(LocalRateLimiter::new()),
            mailer: Arc::new(LogMailer),
            redis: None,
            metrics: None,
        });
        Self { router: build_router(state), store }
    }

    /// Inserts an account and returns a bearer token for it.
    fn account(&self, username: &str, role: UserRole) -> (Uuid, String) {
        let now = Utc::now();
        let id = Uuid::now_v7();
        self.store
            .insert_user(&User {
                id,
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: String::new(),
                role: role.as_str().to_string(),
                modder_status: "regular".into(),
                bio: String::new(),
                avatar_url: None,
                country: String::new(),
                website: String::new(),
                discord_handle: String::new(),
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        let token = sign_claims(&Claims::new(id, role, 3600)).unwrap();
        (id, token)
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.raw(method, uri, token, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri).header("x-forwarded-for", "198.51.100.20");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn seed_category(&self, staff: &str) {
        let (status, _) = self
            .call(Method::POST, "/categories", Some(staff), Some(json!({ "name": "Trucks", "slug": "trucks" })))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    async fn create_mod(&self, token: &str, body: Value) -> Value {
        let (status, value) = self.call(Method::POST, "/mods", Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::OK, "{value}");
        value["data"].clone()
    }
}

fn mod_body(title: &str) -> Value {
    json!({
        "title": title,
        "description": "Replaces the stock cabin",
        "category": "trucks",
        "version": "1.2",
        "file_url": "https://files.example.com/cabin.zip"
    })
}

#[tokio::test]
async fn health_is_ok_and_request_id_is_echoed() {
    let app = TestApp::new();
    let response = app.raw(Method::GET, "/health", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"][0]["name"], "storage");
}

#[tokio::test]
async fn pending_mods_are_hidden_until_approved() {
    let app = TestApp::new();
    let (_, staff) = app.account("ops", UserRole::Moderator);
    let (_, author) = app.account("cabinmaker", UserRole::User);
    let (_, other) = app.account("bystander", UserRole::User);
    app.seed_category(&staff).await;

    let created = app.create_mod(&author, mod_body("Cabin Pack")).await;
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/mods/{id}");

    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::GET, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::GET, &uri, Some(&author), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listed) = app.call(Method::GET, "/mods", None, None).await;
    assert_eq!(listed["data"]["total"], 0);

    let (status, _) = app.call(Method::POST, &format!("{uri}/approve"), Some(&other), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, approved) = app.call(Method::POST, &format!("{uri}/approve"), Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["data"]["is_approved"], true);

    let (status, detail) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["data"]["author"], "cabinmaker");

    let (_, listed) = app.call(Method::GET, "/mods", None, None).await;
    assert_eq!(listed["data"]["total"], 1);
}

#[tokio::test]
async fn hosted_files_redirect_and_external_links_are_returned() {
    let app = TestApp::new();
    let (_, staff) = app.account("ops", UserRole::Admin);
    let (_, author) = app.account("mapper", UserRole::User);
    app.seed_category(&staff).await;

    let mut hosted = mod_body("Map Extension");
    hosted["file_location"] = json!("https://cdn.example.com/map.zip");
    let hosted = app.create_mod(&author, hosted).await;
    let external = app.create_mod(&author, mod_body("Sound Pack")).await;

    let response = app
        .raw(Method::GET, &format!("/mods/{}/download", hosted["id"].as_str().unwrap()), Some(&author), None)
        .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[header::LOCATION], "https://cdn.example.com/map.zip");

    let (status, body) = app
        .call(Method::GET, &format!("/mods/{}/download", external["id"].as_str().unwrap()), Some(&author), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["url"], "https://files.example.com/cabin.zip");

    // Not yet approved, so strangers are turned away.
    let (status, _) = app
        .call(Method::GET, &format!("/mods/{}/download", external["id"].as_str().unwrap()), None, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn downloads_are_rate_limited_per_subject() {
    let app = TestApp::with_config(AppConfig { download_rate_per_hour: 2, ..AppConfig::default() });
    let (_, staff) = app.account("ops", UserRole::Moderator);
    let (_, author) = app.account("mapper", UserRole::User);
    app.seed_category(&staff).await;
    let created = app.create_mod(&author, mod_body("Road Pack")).await;
    let uri = format!("/mods/{}/download", created["id"].as_str().unwrap());

    for _ in 0..2 {
        let (status, _) = app.call(Method::GET, &uri, Some(&author), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app.call(Method::GET, &uri, Some(&author), None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "E0006");

    // A different subject has its own window.
    let (status, _) = app.call(Method::GET, &uri, Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tracked_downloads_are_all_counted() {
    let app = TestApp::new();
    let (_, staff) = app.account("ops", UserRole::Moderator);
    let (_, author) = app.account("mapper", UserRole::User);
    app.seed_category(&staff).await;
    let created = app.create_mod(&author, mod_body("Trailer Pack")).await;
    let id = created["id"].as_str().unwrap().to_string();
    app.call(Method::POST, &format!("/mods/{id}/approve"), Some(&staff), None).await;

    let mut handles = Vec::new();
    for _ in 0..25 {
        let router = app.router.clone();
        let uri = format!("/mods/{id}/track_download");
        handles.push(tokio::spawn(async move {
            let request = Request::builder().method(Method::POST).uri(uri).body(Body::empty()).unwrap();
            router.oneshot(request).await.unwrap().status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let (_, detail) = app.call(Method::GET, &format!("/mods/{id}"), None, None).await;
    assert_eq!(detail["data"]["download_count"], 25);
}

#[tokio::test]
async fn reviews_drive_the_mod_rating() {
    let app = TestApp::new();
    let (_, staff) = app.account("ops", UserRole::Moderator);
    let (_, author) = app.account("mapper", UserRole::User);
    let (_, fan) = app.account("fan", UserRole::User);
    app.seed_category(&staff).await;
    let created = app.create_mod(&author, mod_body("Skin Pack")).await;
    let id = created["id"].as_str().unwrap().to_string();
    app.call(Method::POST, &format!("/mods/{id}/approve"), Some(&staff), None).await;

    let review = json!({ "mod_id": id, "rating": 4, "content": "Solid" });
    let (status, _) = app.call(Method::POST, "/reviews", Some(&fan), Some(review.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.call(Method::POST, "/reviews", Some(&fan), Some(review)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "E3002");

    let (_, detail) = app.call(Method::GET, &format!("/mods/{id}"), None, None).await;
    assert_eq!(detail["data"]["average_rating"], 4.0);
    assert_eq!(detail["data"]["rating_count"], 1);

    let (_, listed) = app.call(Method::GET, &format!("/reviews?mod_id={id}"), Some(&fan), None).await;
    assert_eq!(listed["data"]["items"][0]["is_owner"], true);
}

#[tokio::test]
async fn replies_notify_the_parent_author_and_likes_toggle() {
    let app = TestApp::new();
    let (_, staff) = app.account("ops", UserRole::Moderator);
    let (_, alice) = app.account("alice", UserRole::User);
    let (_, bob) = app.account("bob", UserRole::User);

    let (_, category) = app
        .call(Method::POST, "/forums/categories", Some(&staff), Some(json!({ "name": "General" })))
        .await;
    let category_id = category["data"]["id"].as_str().unwrap().to_string();

    let (status, thread) = app
        .call(
            Method::POST,
            "/forums/threads",
            Some(&alice),
            Some(json!({ "category_id": category_id, "title": "Best map mods?", "content": "Looking for tips" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let thread_id = thread["data"]["id"].as_str().unwrap().to_string();
    let slug = thread["data"]["slug"].as_str().unwrap().to_string();

    let (_, root) = app
        .call(Method::POST, "/forums/posts", Some(&alice), Some(json!({ "thread_id": thread_id, "content": "Start here" })))
        .await;
    let root_id = root["data"]["id"].as_str().unwrap().to_string();

    let (status, reply) = app
        .call(
            Method::POST,
            "/forums/posts",
            Some(&bob),
            Some(json!({ "thread_id": thread_id, "content": "Try the Iberia pack", "parent_id": root_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["data"]["depth"], 1);

    let (_, unread) = app.call(Method::GET, "/notifications/unread-count", Some(&alice), None).await;
    assert_eq!(unread["data"]["count"], 1);
    let (_, listed) = app.call(Method::GET, "/notifications", Some(&alice), None).await;
    assert_eq!(listed["data"]["items"][0]["message"], "bob replied to your comment");
    assert_eq!(listed["data"]["items"][0]["link"], format!("/forums/thread/{slug}"));

    let like_uri = format!("/forums/posts/{root_id}/like");
    let (_, first) = app.call(Method::POST, &like_uri, Some(&bob), None).await;
    assert_eq!(first["data"], json!({ "liked": true, "like_count": 1 }));
    let (_, second) = app.call(Method::POST, &like_uri, Some(&bob), None).await;
    assert_eq!(second["data"], json!({ "liked": false, "like_count": 0 }));

    let (_, detail) = app.call(Method::GET, &format!("/forums/threads/{slug}"), Some(&bob), None).await;
    assert_eq!(detail["data"]["posts"][0]["replies"][0]["content"], "Try the Iberia pack");
}

#[tokio::test]
async fn password_reset_answer_does_not_reveal_accounts() {
    let app = TestApp::new();
    let (status, registered) = app
        .call(
            Method::POST,
            "/users/register",
            None,
            Some(json!({ "username": "driver_1", "email": "Driver@Example.com", "password": "hauling42" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registered["data"]["email"], "driver@example.com");

    let (_, known) = app
        .call(Method::POST, "/users/password-reset", None, Some(json!({ "email": "driver@example.com" })))
        .await;
    let (_, unknown) = app
        .call(Method::POST, "/users/password-reset", None, Some(json!({ "email": "nobody@example.com" })))
        .await;
    assert_eq!(known["message"], unknown["message"]);
    assert_eq!(known["message"], "If an account with this email exists, a reset link has been sent.");

    let (status, body) = app
        .call(
            Method::POST,
            "/users/password-reset/confirm",
            None,
            Some(json!({ "token": "deadbeef", "password": "newpass99" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "The reset link is invalid");
}

#[tokio::test]
async fn staff_endpoints_require_a_moderator() {
    let app = TestApp::new();
    let (_, user) = app.account("regular", UserRole::User);
    let (_, staff) = app.account("ops", UserRole::Moderator);

    let (status, _) = app.call(Method::GET, "/admin/reports", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call(Method::GET, "/admin/audit-log", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(Method::GET, "/analytics/dashboard", Some(&staff), None).await;
    assert_eq!(status, StatusCode::OK);
}
