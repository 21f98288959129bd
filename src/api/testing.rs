//! Test-only stand-in for the remote building-management API.
//!
//! An axum router bound to an ephemeral port, wired with just enough
//! behavior to exercise the pipeline: a login endpoint, a refresh endpoint
//! that can be held open or forced to fail, and a bearer-checked buildings
//! endpoint that records every Authorization header it sees.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::api::ApiClient;
use crate::config::ApiConfig;
use crate::session::{Navigator, Role, Session, SessionState, SessionStore};

pub(crate) struct MockApi {
    pub base_url: String,
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    /// The bearer token the buildings endpoint currently accepts. Empty
    /// matches nothing. A successful refresh rotates it to "T2" unless
    /// `accept_refreshed` is off.
    pub valid_token: Mutex<String>,
    pub accept_refreshed: AtomicBool,
    pub refresh_fails: AtomicBool,
    /// When set, the refresh handler blocks until `release_refresh`.
    pub hold_refresh: AtomicBool,
    pub refresh_started: Notify,
    pub release_refresh: Notify,
    /// Authorization header of every buildings request, in arrival order;
    /// "<none>" when the header was absent.
    pub bearer_seen: Mutex<Vec<String>>,
}

impl MockApi {
    pub(crate) async fn spawn() -> Arc<MockApi> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let api = Arc::new(MockApi {
            base_url: format!("http://{addr}/api/v1"),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            valid_token: Mutex::new(String::new()),
            accept_refreshed: AtomicBool::new(true),
            refresh_fails: AtomicBool::new(false),
            hold_refresh: AtomicBool::new(false),
            refresh_started: Notify::new(),
            release_refresh: Notify::new(),
            bearer_seen: Mutex::new(Vec::new()),
        });

        let router = Router::new()
            .route("/api/v1/auth/login", post(login))
            .route("/api/v1/auth/refresh-token", post(refresh))
            .route("/api/v1/buildings/:id", get(building))
            .with_state(api.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        api
    }
}

fn error_body(status: u16, message: &str) -> Json<Value> {
    Json(json!({ "success": false, "statusCode": status, "message": message }))
}

async fn login(
    State(api): State<Arc<MockApi>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    api.login_calls.fetch_add(1, Ordering::SeqCst);
    let email = body.get("email").and_then(Value::as_str).unwrap_or("");
    let password = body.get("password").and_then(Value::as_str).unwrap_or("");
    if email != "a@b.com" || password != "secret1" {
        return (StatusCode::UNAUTHORIZED, error_body(401, "bad credentials"));
    }
    api.valid_token.lock().replace_range(.., "T1");
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "statusCode": 200,
            "data": {
                "token": "T1",
                "refreshToken": "R1",
                "type": null,
                "userId": 1,
                "name": "Ana",
                "email": "a@b.com",
                "role": "ADMIN",
                "buildingId": 7,
                "expiresIn": 3600
            }
        })),
    )
}

async fn refresh(State(api): State<Arc<MockApi>>) -> (StatusCode, Json<Value>) {
    api.refresh_calls.fetch_add(1, Ordering::SeqCst);
    api.refresh_started.notify_one();
    if api.hold_refresh.load(Ordering::SeqCst) {
        api.release_refresh.notified().await;
    }
    if api.refresh_fails.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            error_body(401, "refresh token expired"),
        );
    }
    if api.accept_refreshed.load(Ordering::SeqCst) {
        api.valid_token.lock().replace_range(.., "T2");
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "statusCode": 200,
            "data": { "token": "T2", "refreshToken": "R2" }
        })),
    )
}

async fn building(
    State(api): State<Arc<MockApi>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("<none>")
        .to_string();
    api.bearer_seen.lock().push(bearer.clone());

    if bearer != format!("Bearer {}", api.valid_token.lock()) {
        return (StatusCode::UNAUTHORIZED, error_body(401, "invalid token"));
    }
    if id == 999 {
        return (StatusCode::NOT_FOUND, error_body(404, "building not found"));
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "statusCode": 200,
            "data": {
                "id": id,
                "name": "Edificio Central",
                "address": "Av. Libertad 742",
                "description": "Residential tower",
                "totalUnits": 48,
                "adminUserId": 1,
                "adminName": "Ana",
                "createdAt": "2024-01-15T10:00:00Z",
                "updatedAt": "2024-06-01T08:30:00Z"
            }
        })),
    )
}

/// Navigator that records redirects instead of navigating.
pub(crate) struct TestNavigator {
    pub at_login: AtomicBool,
    pub redirects: AtomicUsize,
}

impl Navigator for TestNavigator {
    fn at_login(&self) -> bool {
        self.at_login.load(Ordering::SeqCst)
    }

    fn goto_login(&self) {
        self.redirects.fetch_add(1, Ordering::SeqCst);
        self.at_login.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct TestContext {
    // Holds the scratch data dir alive for the store's lifetime.
    _dir: tempfile::TempDir,
    pub store: Arc<SessionStore>,
    pub session: Arc<SessionState>,
    pub navigator: Arc<TestNavigator>,
    pub client: ApiClient,
}

/// A full client context over a scratch store, pointed at `base_url`.
pub(crate) fn context(base_url: &str) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::open(dir.path()));
    let navigator = Arc::new(TestNavigator {
        at_login: AtomicBool::new(false),
        redirects: AtomicUsize::new(0),
    });
    let session = Arc::new(SessionState::new(store.clone(), navigator.clone()));
    let config = ApiConfig {
        base_url: base_url.to_string(),
        timeout_ms: 2_000,
    };
    let client = ApiClient::new(&config, store.clone(), session.clone()).unwrap();
    TestContext {
        _dir: dir,
        store,
        session,
        navigator,
        client,
    }
}

pub(crate) fn sample_user() -> Session {
    Session {
        user_id: 1,
        name: "Ana".to_string(),
        email: "a@b.com".to_string(),
        role: Role::Admin,
        building_id: Some(7),
    }
}
