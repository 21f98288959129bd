//! Auth endpoint adapter: the thin layer between domain calls and the
//! request pipeline. The refresh exchange itself lives inside the pipeline
//! (`ApiClient`), since it must bypass the 401-triggers-refresh logic.

use serde::Deserialize;
use serde_json::json;

use crate::api::error::ApiError;
use crate::api::ApiClient;
use crate::session::{Role, Session};

/// Payload of a successful `POST auth/login`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub building_id: Option<i64>,
    /// Access-token lifetime in seconds, advisory only; expiry is learned
    /// from the server's 401, not from a local clock.
    pub expires_in: i64,
}

impl LoginResponse {
    /// The session record this login establishes.
    pub fn session(&self) -> Session {
        Session {
            user_id: self.user_id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            building_id: self.building_id,
        }
    }
}

pub async fn login(
    client: &ApiClient,
    email: &str,
    password: &str,
) -> Result<LoginResponse, ApiError> {
    client
        .post_json(
            "auth/login",
            json!({ "email": email, "password": password }),
        )
        .await
}
