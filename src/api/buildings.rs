//! Buildings endpoint adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::ApiError;
use crate::api::ApiClient;

/// A building record as the API returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Building {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub description: String,
    pub total_units: u32,
    pub admin_user_id: i64,
    pub admin_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; unset fields are left untouched by the server.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBuildingRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub async fn get_building(client: &ApiClient, id: i64) -> Result<Building, ApiError> {
    client.get_json(&format!("buildings/{id}")).await
}

pub async fn update_building(
    client: &ApiClient,
    id: i64,
    update: &UpdateBuildingRequest,
) -> Result<Building, ApiError> {
    client
        .put_json(&format!("buildings/{id}"), json!(update))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{context, MockApi};

    #[tokio::test]
    async fn test_get_building_deserializes_record() {
        let api = MockApi::spawn().await;
        let ctx = context(&api.base_url);
        ctx.store.set_tokens("T1", Some("R1"));
        api.valid_token.lock().replace_range(.., "T1");

        let building = get_building(&ctx.client, 7).await.unwrap();
        assert_eq!(building.id, 7);
        assert_eq!(building.name, "Edificio Central");
        assert_eq!(building.total_units, 48);
        assert_eq!(building.admin_name, "Ana");
        assert_eq!(building.created_at.to_rfc3339(), "2024-01-15T10:00:00+00:00");
    }

    #[tokio::test]
    async fn test_missing_building_is_not_found() {
        let api = MockApi::spawn().await;
        let ctx = context(&api.base_url);
        ctx.store.set_tokens("T1", Some("R1"));
        api.valid_token.lock().replace_range(.., "T1");

        let err = get_building(&ctx.client, 999).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound { .. }));
    }

    #[test]
    fn test_update_request_skips_unset_fields() {
        let update = UpdateBuildingRequest {
            name: Some("Torre Norte".to_string()),
            ..Default::default()
        };
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, serde_json::json!({ "name": "Torre Norte" }));
    }
}
