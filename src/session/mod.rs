//! Session state: the single source of truth for "is anyone logged in, and who".
//!
//! The in-memory [`Session`] and the persisted tokens in [`SessionStore`]
//! must never diverge, so every mutation here updates both inside the same
//! call. Navigation on logout is injected as a [`Navigator`] so the core
//! stays testable without a UI.

pub mod store;

pub use store::SessionStore;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

/// The authenticated identity, mirrored to the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Absent means the user administers no specific building.
    #[serde(default)]
    pub building_id: Option<i64>,
}

/// Navigation capability injected into the session layer. The redirect on
/// logout is location-aware: no redirect happens when the login view is
/// already active.
pub trait Navigator: Send + Sync {
    /// Whether the login view is the currently active screen.
    fn at_login(&self) -> bool;
    /// Switch the active screen to the login view.
    fn goto_login(&self);
}

pub struct SessionState {
    store: Arc<SessionStore>,
    current: RwLock<Option<Session>>,
    ready: AtomicBool,
    navigator: Arc<dyn Navigator>,
}

impl SessionState {
    pub fn new(store: Arc<SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
            ready: AtomicBool::new(false),
            navigator,
        }
    }

    /// Rehydrate the session from the store. Runs once at startup, before any
    /// guarded surface is shown; callers observe [`is_ready`](Self::is_ready)
    /// until it completes. Never fails: a missing token or an unparseable
    /// user record leaves the state logged out, clearing the store so the
    /// corruption does not come back on the next start.
    pub fn initialize(&self) {
        let token = self.store.access_token();
        let record = self.store.user_record();
        if let (Some(_), Some(record)) = (token, record) {
            match serde_json::from_str::<Session>(&record) {
                Ok(user) => {
                    info!("Restored session for {}", user.email);
                    *self.current.write() = Some(user);
                }
                Err(err) => {
                    warn!("Discarding unreadable session record: {}", err);
                    self.store.clear();
                }
            }
        }
        self.ready.store(true, Ordering::Release);
    }

    /// Whether [`initialize`](Self::initialize) has settled.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Install a freshly authenticated session, replacing any prior one.
    /// User record and tokens are written to the store in the same call so
    /// the two never diverge.
    pub fn login(&self, user: Session, access_token: &str, refresh_token: Option<&str>) {
        self.store.put_session(&user, access_token, refresh_token);
        info!("Logged in as {} ({:?})", user.email, user.role);
        *self.current.write() = Some(user);
    }

    /// Clear the store and the in-memory session, then redirect to the login
    /// view unless it is already active. Idempotent.
    pub fn logout(&self) {
        self.store.clear();
        if self.current.write().take().is_some() {
            info!("Logged out");
        }
        if !self.navigator.at_login() {
            self.navigator.goto_login();
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }
}
