pub mod api;
pub mod cli;
pub mod config;
pub mod session;

pub use api::{ApiClient, ApiError};
pub use session::{Session, SessionState, SessionStore};

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::session::Navigator;

/// Application root: owns the config, the session store, the session state
/// and the API client, and is passed by reference to every consumer. Keeping
/// all mutable session/refresh state behind this one object (instead of
/// module-level globals) is what makes the pipeline testable in isolation.
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SessionStore>,
    pub session: Arc<SessionState>,
    pub api: ApiClient,
}

impl AppContext {
    pub fn new(config: Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let store = Arc::new(SessionStore::open(&config.storage.data_dir));
        let session = Arc::new(SessionState::new(store.clone(), navigator));
        let api = ApiClient::new(&config.api, store.clone(), session.clone())?;
        Ok(Self {
            config,
            store,
            session,
            api,
        })
    }
}
