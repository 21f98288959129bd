//! Persistent session store.
//!
//! A small key/value file (`session.json` under the data directory) holding
//! the access token, the refresh token, and the serialized user record. This
//! is the single owner of the credential pair: the request pipeline reads the
//! access token per request and writes a new pair back only through the
//! refresh flow.
//!
//! Store operations never fail observably. A file that cannot be read or
//! parsed is treated as an empty store; a write that fails is logged at
//! `warn` and the in-memory copy stays authoritative for the process.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::Session;

const STORE_FILE: &str = "session.json";

/// On-disk layout. `user` is the serialized Session record, kept as a string
/// so a corrupt record can be detected and cleared without failing the load.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct StoreData {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(rename = "refreshToken", skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

pub struct SessionStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl SessionStore {
    /// Open the store under `data_dir`, loading any previously persisted
    /// session. Unreadable or unparseable files fall back to an empty store.
    pub fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(STORE_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<StoreData>(&content) {
                Ok(data) => data,
                Err(err) => {
                    warn!("Ignoring corrupt session file {}: {}", path.display(), err);
                    StoreData::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreData::default(),
            Err(err) => {
                warn!("Failed to read session file {}: {}", path.display(), err);
                StoreData::default()
            }
        };
        Self {
            path,
            data: RwLock::new(data),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.data.read().token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.data.read().refresh_token.clone()
    }

    /// The raw serialized user record, if any. Callers own deserialization so
    /// they can decide what a corrupt record means (see
    /// [`SessionState::initialize`](super::SessionState::initialize)).
    pub fn user_record(&self) -> Option<String> {
        self.data.read().user.clone()
    }

    /// Persist a refreshed credential pair. A refresh response that carries
    /// no new refresh token keeps the stored one.
    pub fn set_tokens(&self, access_token: &str, refresh_token: Option<&str>) {
        let mut data = self.data.write();
        data.token = Some(access_token.to_string());
        if let Some(refresh) = refresh_token {
            data.refresh_token = Some(refresh.to_string());
        }
        self.persist(&data);
    }

    /// Replace the whole session wholesale: user record plus credential pair.
    /// A login without a refresh token drops any prior one.
    pub fn put_session(&self, user: &Session, access_token: &str, refresh_token: Option<&str>) {
        let record = match serde_json::to_string(user) {
            Ok(record) => record,
            Err(err) => {
                // Session is plain data; this cannot happen in practice.
                warn!("Failed to serialize user record: {}", err);
                return;
            }
        };
        let mut data = self.data.write();
        data.token = Some(access_token.to_string());
        data.refresh_token = refresh_token.map(|t| t.to_string());
        data.user = Some(record);
        self.persist(&data);
    }

    /// Remove all three keys. This is the sole logout/reset operation.
    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = StoreData::default();
        self.persist(&data);
    }

    fn persist(&self, data: &StoreData) {
        if let Some(parent) = self.path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!("Failed to create data dir {}: {}", parent.display(), err);
                return;
            }
        }
        match serde_json::to_string_pretty(data) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&self.path, json) {
                    warn!("Failed to write session file {}: {}", self.path.display(), err);
                } else {
                    debug!("Persisted session to {}", self.path.display());
                }
            }
            Err(err) => warn!("Failed to serialize session store: {}", err),
        }
    }
}
