//! Integration tests: boots an in-process axum server that mimics the
//! account backend, points a real [`RestAuthClient`] at it, and drives the
//! [`SessionManager`] through restore / login / logout / profile flows.
//!
//! Covers the wire contract end to end:
//! - endpoint paths and methods
//! - `Authorization: Token <credential>` on authenticated calls only
//! - error bodies surfacing as the failure message
//! - credential persistence through a real file store
//! - retry policy: reads retried on 5xx, mutations sent once
//! - overlapping operations leaving header and store in agreement

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use lh_client::{
    Credential, CredentialStore, FailureKind, FileCredentialStore, MemoryCredentialStore,
    PasswordChange, ProfileUpdate, RestAuthClient, SessionManager, SessionStatus,
};
use lh_domain::config::ApiConfig;

// ── Mini backend ────────────────────────────────────────────────────────

const EMAIL: &str = "user@example.com";
const PASSWORD: &str = "correct";

#[derive(Default)]
struct Backend {
    /// Tokens currently accepted.
    tokens: Mutex<Vec<String>>,
    /// (path, Authorization header) for every request received.
    seen: Mutex<Vec<(String, Option<String>)>>,
    bio: Mutex<String>,
    fail_logout: bool,
    fail_login: bool,
    /// Number of upcoming `/me/` calls answered with 503.
    me_unavailable: Mutex<u32>,
    me_delay_ms: u64,
    issued: Mutex<u32>,
}

impl Backend {
    fn with_token(token: &str) -> Self {
        let b = Self::default();
        b.tokens.lock().push(token.into());
        b
    }

    fn record(&self, path: &str, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        self.seen.lock().push((path.into(), auth));
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) else {
            return false;
        };
        let Some(token) = value.strip_prefix("Token ") else {
            return false;
        };
        self.tokens.lock().iter().any(|t| t == token)
    }

    fn hits(&self, path: &str) -> usize {
        self.seen.lock().iter().filter(|(p, _)| p == path).count()
    }

    fn user_json(&self) -> Value {
        json!({
            "id": 1,
            "username": "user",
            "email": EMAIL,
            "first_name": "Test",
            "last_name": "User",
            "full_name": "Test User",
            "bio": *self.bio.lock(),
            "user_type": "student",
            "email_verified": true,
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        })
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Invalid token." })),
    )
        .into_response()
}

async fn me(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    b.record("/api/auth/me/", &headers);
    if b.me_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(b.me_delay_ms)).await;
    }
    {
        let mut unavailable = b.me_unavailable.lock();
        if *unavailable > 0 {
            *unavailable -= 1;
            return (StatusCode::SERVICE_UNAVAILABLE, "try again").into_response();
        }
    }
    if !b.authorized(&headers) {
        return unauthorized();
    }
    Json(b.user_json()).into_response()
}

async fn login(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    b.record("/api/auth/login/", &headers);
    if b.fail_login {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        let token = {
            let mut n = b.issued.lock();
            *n += 1;
            format!("tok-{n}")
        };
        b.tokens.lock().push(token.clone());
        return Json(json!({
            "message": "Login successful",
            "user": b.user_json(),
            "token": token
        }))
        .into_response();
    }
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "non_field_errors": ["Invalid email or password"] })),
    )
        .into_response()
}

async fn register(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    b.record("/api/auth/register/", &headers);
    if body["email"] == EMAIL {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "email": ["user with this email address already exists."] })),
        )
            .into_response();
    }
    b.tokens.lock().push("tok-registered".into());
    (
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully",
            "user": {
                "id": 2,
                "email": body["email"],
                "username": body["username"],
                "user_type": body["user_type"]
            },
            "token": "tok-registered"
        })),
    )
        .into_response()
}

async fn logout(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    b.record("/api/auth/logout/", &headers);
    if b.fail_logout {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    if !b.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({ "message": "Logout successful" })).into_response()
}

async fn update_profile(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    b.record("/api/auth/profile/update/", &headers);
    if !b.authorized(&headers) {
        return unauthorized();
    }
    if let Some(bio) = body["bio"].as_str() {
        *b.bio.lock() = bio.to_owned();
    }
    // The update serializer echoes only the editable fields.
    Json(json!({
        "first_name": "Test",
        "last_name": "User",
        "bio": *b.bio.lock(),
        "avatar": null,
        "date_of_birth": null,
        "phone_number": "",
        "website": "",
        "linkedin": "",
        "github": "",
        "twitter": ""
    }))
    .into_response()
}

async fn change_password(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    b.record("/api/auth/password/change/", &headers);
    if !b.authorized(&headers) {
        return unauthorized();
    }
    if body["old_password"] != PASSWORD {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "old_password": ["Old password is incorrect"] })),
        )
            .into_response();
    }
    Json(json!({ "message": "Password changed successfully" })).into_response()
}

async fn password_reset(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    b.record("/api/auth/password/reset/", &headers);
    Json(json!({ "message": "Password reset email sent" })).into_response()
}

async fn activities(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Response {
    b.record("/api/auth/activities/", &headers);
    if !b.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "count": 1,
        "next": null,
        "previous": null,
        "results": [{
            "id": 10,
            "activity_type": "user_login",
            "description": "User logged in successfully",
            "related_object_id": null,
            "related_object_type": "",
            "timestamp": "2024-05-01T10:00:00Z"
        }]
    }))
    .into_response()
}

/// Boots the backend on an ephemeral port.
async fn start_backend(backend: Arc<Backend>) -> SocketAddr {
    let app = Router::new()
        .route("/api/auth/me/", get(me))
        .route("/api/auth/login/", post(login))
        .route("/api/auth/register/", post(register))
        .route("/api/auth/logout/", post(logout))
        .route("/api/auth/profile/update/", put(update_profile))
        .route("/api/auth/password/change/", post(change_password))
        .route("/api/auth/activities/", get(activities))
        .route("/api/auth/password/reset/", post(password_reset))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> RestAuthClient {
    RestAuthClient::new(&ApiConfig {
        base_url: format!("http://{addr}/"),
        timeout_ms: 2000,
        ..Default::default()
    })
    .unwrap()
}

fn manager(addr: SocketAddr, store: Arc<dyn CredentialStore>) -> SessionManager {
    SessionManager::new(Arc::new(client_for(addr)), store)
}

fn retrying_manager(addr: SocketAddr, retries: u32) -> SessionManager {
    let api = RestAuthClient::new(&ApiConfig {
        base_url: format!("http://{addr}"),
        timeout_ms: 2000,
        max_retries: retries,
        ..Default::default()
    })
    .unwrap();
    SessionManager::new(
        Arc::new(api),
        Arc::new(MemoryCredentialStore::with_credential(Credential::new("tok-saved"))),
    )
}

fn assert_header_matches_store(mgr: &SessionManager, store: &MemoryCredentialStore) {
    let stored = store.peek().map(|c| c.header_value());
    assert_eq!(mgr.auth_header(), stored, "header and stored credential diverged");
    assert_eq!(mgr.current_user().is_some(), mgr.auth_header().is_some());
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn restore_without_credential_makes_no_request() {
    let backend = Arc::new(Backend::default());
    let addr = start_backend(backend.clone()).await;
    let mgr = manager(addr, Arc::new(MemoryCredentialStore::new()));

    assert_eq!(mgr.restore().await, SessionStatus::Anonymous);
    assert!(mgr.auth_header().is_none());
    assert!(backend.seen.lock().is_empty());
}

#[tokio::test]
async fn restore_with_valid_credential_sends_token_header() {
    let backend = Arc::new(Backend::with_token("tok-saved"));
    let addr = start_backend(backend.clone()).await;
    let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new(
        "tok-saved",
    )));
    let mgr = manager(addr, store.clone());

    assert_eq!(mgr.restore().await, SessionStatus::Authenticated);
    let user = mgr.current_user().unwrap();
    assert_eq!(user.email, EMAIL);
    assert_eq!(user.display_name(), "Test User");
    assert_eq!(mgr.auth_header().as_deref(), Some("Token tok-saved"));

    let seen = backend.seen.lock().clone();
    assert_eq!(
        seen,
        vec![("/api/auth/me/".to_string(), Some("Token tok-saved".to_string()))]
    );
}

#[tokio::test]
async fn restore_with_expired_credential_clears_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileCredentialStore::new(dir.path().join("creds.json"), "token"));
    store.save(&Credential::new("tok-expired")).unwrap();

    let backend = Arc::new(Backend::default());
    let addr = start_backend(backend).await;
    let mgr = manager(addr, store.clone());

    assert_eq!(mgr.restore().await, SessionStatus::Anonymous);
    assert!(store.load().unwrap().is_none());
    assert!(mgr.auth_header().is_none());
    assert!(mgr.current_user().is_none());
}

#[tokio::test]
async fn login_persists_token_and_uses_it_afterwards() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("creds.json");
    let backend = Arc::new(Backend::default());
    let addr = start_backend(backend.clone()).await;

    let mgr = manager(addr, Arc::new(FileCredentialStore::new(&path, "token")));
    mgr.restore().await;
    let user = mgr.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(user.id, 1);
    assert_eq!(mgr.status(), SessionStatus::Authenticated);
    assert_eq!(mgr.auth_header().as_deref(), Some("Token tok-1"));

    // Login itself carries no Authorization header.
    assert_eq!(backend.seen.lock()[0], ("/api/auth/login/".to_string(), None));

    // A fresh process restores from the file.
    let second = manager(addr, Arc::new(FileCredentialStore::new(&path, "token")));
    assert_eq!(second.restore().await, SessionStatus::Authenticated);
    assert_eq!(second.auth_header().as_deref(), Some("Token tok-1"));
}

#[tokio::test]
async fn wrong_password_surfaces_server_message() {
    let backend = Arc::new(Backend::default());
    let addr = start_backend(backend).await;
    let store = Arc::new(MemoryCredentialStore::new());
    let mgr = manager(addr, store.clone());
    mgr.restore().await;

    let failure = mgr.login(EMAIL, "wrong").await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Validation);
    assert_eq!(failure.message, "Invalid email or password");
    assert_eq!(mgr.status(), SessionStatus::Anonymous);
    assert!(store.peek().is_none());
    assert!(mgr.auth_header().is_none());
}

#[tokio::test]
async fn duplicate_registration_reports_field_error() {
    let backend = Arc::new(Backend::default());
    let addr = start_backend(backend).await;
    let mgr = manager(addr, Arc::new(MemoryCredentialStore::new()));
    mgr.restore().await;

    let reg = lh_client::Registration {
        username: "user".into(),
        email: EMAIL.into(),
        first_name: "Test".into(),
        last_name: "User".into(),
        password: "pw".into(),
        password_confirm: "pw".into(),
        user_type: lh_domain::UserType::Student,
    };
    let failure = mgr.register(&reg).await.unwrap_err();
    assert_eq!(
        failure.message,
        "email: user with this email address already exists."
    );
    assert_eq!(mgr.status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn registration_logs_in() {
    let backend = Arc::new(Backend::default());
    let addr = start_backend(backend).await;
    let store = Arc::new(MemoryCredentialStore::new());
    let mgr = manager(addr, store.clone());
    mgr.restore().await;

    let reg = lh_client::Registration {
        username: "grace".into(),
        email: "grace@example.com".into(),
        first_name: "Tea".into(),
        last_name: "Cher".into(),
        password: "pw".into(),
        password_confirm: "pw".into(),
        user_type: lh_domain::UserType::Instructor,
    };
    let user = mgr.register(&reg).await.unwrap();
    assert_eq!(user.email, "grace@example.com");
    assert!(mgr.is_instructor());
    assert_eq!(store.peek(), Some(Credential::new("tok-registered")));
}

#[tokio::test]
async fn logout_clears_state_even_when_backend_errors() {
    let backend = Arc::new(Backend {
        fail_logout: true,
        ..Default::default()
    });
    let addr = start_backend(backend.clone()).await;
    let store = Arc::new(MemoryCredentialStore::new());
    let mgr = manager(addr, store.clone());
    mgr.restore().await;
    mgr.login(EMAIL, PASSWORD).await.unwrap();

    mgr.logout().await;

    assert_eq!(mgr.status(), SessionStatus::Anonymous);
    assert!(mgr.auth_header().is_none());
    assert!(store.peek().is_none());
    let seen = backend.seen.lock().clone();
    assert_eq!(
        seen.last().unwrap(),
        &("/api/auth/logout/".to_string(), Some("Token tok-1".to_string()))
    );
}

#[tokio::test]
async fn logout_without_restore_revokes_stored_token_while_me_is_down() {
    let backend = Arc::new(Backend::with_token("tok-saved"));
    *backend.me_unavailable.lock() = 5;
    let addr = start_backend(backend.clone()).await;
    let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new(
        "tok-saved",
    )));
    let mgr = manager(addr, store.clone());

    mgr.logout().await;

    assert_eq!(backend.hits("/api/auth/me/"), 0);
    assert_eq!(
        backend.seen.lock().clone(),
        vec![("/api/auth/logout/".to_string(), Some("Token tok-saved".to_string()))]
    );
    assert!(store.peek().is_none());
    assert_eq!(mgr.status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn password_reset_leaves_stored_token_alone() {
    let backend = Arc::new(Backend::with_token("tok-saved"));
    *backend.me_unavailable.lock() = 5;
    let addr = start_backend(backend.clone()).await;
    let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new(
        "tok-saved",
    )));
    let mgr = manager(addr, store.clone());

    mgr.request_password_reset(EMAIL).await.unwrap();

    assert_eq!(backend.hits("/api/auth/password/reset/"), 1);
    assert_eq!(backend.hits("/api/auth/me/"), 0);
    assert_eq!(store.peek(), Some(Credential::new("tok-saved")));
    assert_eq!(mgr.status(), SessionStatus::Unresolved);
}

#[tokio::test]
async fn logout_with_unreachable_backend_still_clears() {
    // Reserve a port, then close it so nothing listens there.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new(
        "tok-offline",
    )));
    let mgr = manager(addr, store.clone());

    // Restore fails (unreachable) and clears the credential.
    assert_eq!(mgr.restore().await, SessionStatus::Anonymous);
    assert!(store.peek().is_none());

    let failure = mgr.login(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Transport);
    assert_eq!(failure.message, "Login failed");

    mgr.logout().await;
    assert_eq!(mgr.status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn profile_update_and_password_change_roundtrip() {
    let backend = Arc::new(Backend::default());
    let addr = start_backend(backend.clone()).await;
    let mgr = manager(addr, Arc::new(MemoryCredentialStore::new()));
    mgr.restore().await;
    mgr.login(EMAIL, PASSWORD).await.unwrap();

    let updated = mgr
        .update_profile(&ProfileUpdate {
            bio: Some("Rustacean in training".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.bio, "Rustacean in training");
    assert_eq!(updated.id, 1);
    assert_eq!(updated.email, EMAIL);
    assert_eq!(mgr.current_user(), Some(updated));

    let failure = mgr
        .change_password(&PasswordChange::new("nope", "n3w"))
        .await
        .unwrap_err();
    assert_eq!(failure.message, "old_password: Old password is incorrect");

    mgr.change_password(&PasswordChange::new(PASSWORD, "n3w"))
        .await
        .unwrap();
    assert_eq!(mgr.current_user().unwrap().bio, "Rustacean in training");

    let activity = mgr.activities().await.unwrap();
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].activity_type, "user_login");

    // Every call after login carried the issued token.
    let seen = backend.seen.lock().clone();
    for (path, auth) in seen.iter().skip(1) {
        assert_eq!(auth.as_deref(), Some("Token tok-1"), "missing header on {path}");
    }
}

#[tokio::test]
async fn revoked_token_ends_session_on_refresh() {
    let backend = Arc::new(Backend::default());
    let addr = start_backend(backend.clone()).await;
    let store = Arc::new(MemoryCredentialStore::new());
    let mgr = manager(addr, store.clone());
    mgr.restore().await;
    mgr.login(EMAIL, PASSWORD).await.unwrap();

    backend.tokens.lock().clear();

    let failure = mgr.refresh().await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Authentication);
    assert_eq!(failure.message, "Invalid token.");
    assert_eq!(mgr.status(), SessionStatus::Anonymous);
    assert!(store.peek().is_none());
}

#[tokio::test]
async fn reads_are_retried_after_unavailable() {
    let backend = Arc::new(Backend::with_token("tok-saved"));
    *backend.me_unavailable.lock() = 1;
    let addr = start_backend(backend.clone()).await;
    let mgr = retrying_manager(addr, 2);

    assert_eq!(mgr.restore().await, SessionStatus::Authenticated);
    assert_eq!(backend.hits("/api/auth/me/"), 2);
}

#[tokio::test]
async fn reads_give_up_after_max_retries() {
    let backend = Arc::new(Backend::with_token("tok-saved"));
    *backend.me_unavailable.lock() = 10;
    let addr = start_backend(backend.clone()).await;
    let mgr = retrying_manager(addr, 2);

    assert_eq!(mgr.restore().await, SessionStatus::Anonymous);
    assert_eq!(backend.hits("/api/auth/me/"), 3);
}

#[tokio::test]
async fn mutations_are_sent_once() {
    let backend = Arc::new(Backend {
        fail_login: true,
        ..Default::default()
    });
    let addr = start_backend(backend.clone()).await;
    let mgr = retrying_manager(addr, 2);

    let failure = mgr.login(EMAIL, PASSWORD).await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Server);
    assert_eq!(backend.hits("/api/auth/login/"), 1);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let backend = Arc::new(Backend::default());
    let addr = start_backend(backend.clone()).await;
    let mgr = retrying_manager(addr, 2);

    // Stored token is unknown to the backend: 401, no second attempt.
    assert_eq!(mgr.restore().await, SessionStatus::Anonymous);
    assert_eq!(backend.hits("/api/auth/me/"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_logins_leave_header_and_store_in_agreement() {
    let backend = Arc::new(Backend::default());
    let addr = start_backend(backend).await;

    for _ in 0..5 {
        let store = Arc::new(MemoryCredentialStore::new());
        let mgr = Arc::new(manager(addr, store.clone()));
        mgr.restore().await;

        let a = tokio::spawn({
            let mgr = mgr.clone();
            async move { mgr.login(EMAIL, PASSWORD).await }
        });
        let b = tokio::spawn({
            let mgr = mgr.clone();
            async move { mgr.login(EMAIL, PASSWORD).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(mgr.status(), SessionStatus::Authenticated);
        assert_header_matches_store(&mgr, &store);
    }
}

#[tokio::test]
async fn login_during_slow_restore_is_kept() {
    let backend = Arc::new(Backend {
        me_delay_ms: 150,
        ..Backend::with_token("tok-saved")
    });
    let addr = start_backend(backend).await;
    let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new(
        "tok-saved",
    )));
    let mgr = manager(addr, store.clone());

    let (status, login) = tokio::join!(mgr.restore(), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        mgr.login(EMAIL, PASSWORD).await
    });
    login.unwrap();

    assert_eq!(status, SessionStatus::Authenticated);
    assert_eq!(mgr.auth_header().as_deref(), Some("Token tok-1"));
    assert_header_matches_store(&mgr, &store);
}
