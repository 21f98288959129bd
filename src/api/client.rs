//! Authenticated request pipeline.
//!
//! Every API call goes through [`ApiClient::send`]: the current access token
//! is attached as a bearer credential, failures are normalized into
//! [`ApiError`], and a 401 triggers exactly one token refresh shared by all
//! concurrently failing requests.
//!
//! The refresh coordination is the one piece with real invariants:
//!
//! - at most one refresh call is in flight at any time;
//! - requests that hit a 401 while a refresh is underway park in a FIFO
//!   queue and are released, in enqueue order, only once that refresh
//!   settles;
//! - a request is retried at most once, so a token the server keeps
//!   rejecting surfaces as a final failure instead of looping;
//! - a failed refresh rejects every parked request with the same normalized
//!   error and tears the session down completely.
//!
//! The refresh flag and the queue live behind one mutex that is never held
//! across an await; the decision "am I the refresher or a waiter" is a
//! single check-and-set under that lock.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::api::error::{classify_response, classify_transport, ApiError};
use crate::config::ApiConfig;
use crate::session::{SessionState, SessionStore};

/// Standard response wrapper used by every endpoint:
/// `{success, data, statusCode, message?}`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: T,
    #[serde(rename = "statusCode", default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

/// An outgoing request, self-contained so the pipeline can re-dispatch it
/// after a token refresh.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
            query: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
            query: Vec::new(),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            body: Some(body),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Refresh coordination state: IDLE (`in_flight == false`) or REFRESHING,
/// plus the requests parked behind the in-flight refresh. Each waiter is
/// settled with the new access token or the refresh failure.
#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Result<String, ApiError>>>,
}

/// Response from `POST auth/refresh-token`.
#[derive(Debug, Deserialize)]
struct TokenPair {
    token: String,
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<SessionStore>,
    session: Arc<SessionState>,
    refresh: Mutex<RefreshState>,
}

impl ApiClient {
    pub fn new(
        config: &ApiConfig,
        store: Arc<SessionStore>,
        session: Arc<SessionState>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            store,
            session,
            refresh: Mutex::new(RefreshState::default()),
        })
    }

    /// Execute a request with auth-header injection and refresh coordination.
    /// Success returns the raw response; callers unwrap the data envelope
    /// themselves (or use the typed helpers below).
    pub async fn send(&self, spec: RequestSpec) -> Result<reqwest::Response, ApiError> {
        self.dispatch(spec, false).await
    }

    /// GET a path and unwrap the `data` field of the response envelope.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.unwrap_envelope(self.send(RequestSpec::get(path)).await?)
            .await
    }

    /// POST a JSON body and unwrap the `data` field of the response envelope.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, ApiError> {
        self.unwrap_envelope(self.send(RequestSpec::post(path, body)).await?)
            .await
    }

    /// PUT a JSON body and unwrap the `data` field of the response envelope.
    pub async fn put_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, ApiError> {
        self.unwrap_envelope(self.send(RequestSpec::put(path, body)).await?)
            .await
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let envelope: Envelope<T> = response.json().await.map_err(|err| ApiError::Unknown {
            status,
            message: format!("Failed to decode response body: {err}"),
        })?;
        Ok(envelope.data)
    }

    /// One attempt plus at most one post-refresh retry. The token is read
    /// from the store at each dispatch, so a retry always carries the most
    /// recently persisted token rather than a stale snapshot.
    fn dispatch(
        &self,
        spec: RequestSpec,
        retried: bool,
    ) -> BoxFuture<'_, Result<reqwest::Response, ApiError>> {
        Box::pin(async move {
            let token = self.store.access_token();
            match self.execute(&spec, token.as_deref()).await {
                Ok(response) => Ok(response),
                Err(err) if err.is_unauthorized() && !retried => {
                    debug!(path = %spec.path, "Unauthorized response, coordinating token refresh");
                    self.fresh_token().await?;
                    self.dispatch(spec, true).await
                }
                Err(err) => Err(err),
            }
        })
    }

    /// Single network round trip, no refresh logic. A missing token is not
    /// an error here; the request goes out unauthenticated and the server
    /// rejects it if auth was required.
    async fn execute(
        &self,
        spec: &RequestSpec,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}/{}", self.base_url, spec.path.trim_start_matches('/'));
        let mut request = self.http.request(spec.method.clone(), &url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        debug!(method = %spec.method, %url, "API request");
        let response = request.send().await.map_err(|err| {
            debug!(method = %spec.method, %url, error = %err, "Transport failure");
            classify_transport(&err)
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(method = %spec.method, %url, status = status.as_u16(), "API response");
            return Ok(response);
        }
        let payload = response.json::<Value>().await.ok();
        Err(classify_response(status.as_u16(), payload.as_ref()))
    }

    /// Ensure a fresh access token is persisted, either by running the
    /// refresh flow or by parking behind the one already in flight.
    async fn fresh_token(&self) -> Result<(), ApiError> {
        let waiter = {
            let mut refresh = self.refresh.lock();
            if refresh.in_flight {
                let (tx, rx) = oneshot::channel();
                refresh.waiters.push(tx);
                Some(rx)
            } else {
                refresh.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            return match rx.await {
                Ok(outcome) => outcome.map(|_token| ()),
                // The refresher settles every waiter before dropping its
                // side; surface the impossible case instead of panicking.
                Err(_) => Err(ApiError::Network {
                    message: "Token refresh was abandoned".to_string(),
                }),
            };
        }

        // This task owns the refresh window.
        let result = self.refresh_session().await;

        let waiters = {
            let mut refresh = self.refresh.lock();
            refresh.in_flight = false;
            std::mem::take(&mut refresh.waiters)
        };
        for waiter in waiters {
            // Parked requests observe the same outcome, in enqueue order.
            let _ = waiter.send(result.clone());
        }

        if result.is_err() {
            warn!("Token refresh failed, tearing down session");
            self.session.logout();
        }
        result.map(|_token| ())
    }

    /// Exchange the stored refresh token for a new credential pair. Goes
    /// through [`execute`](Self::execute) directly so a 401 here cannot
    /// re-enter the refresh logic.
    async fn refresh_session(&self) -> Result<String, ApiError> {
        let refresh_token = self.store.refresh_token().ok_or_else(|| ApiError::Unauthorized {
            message: "No refresh token available".to_string(),
        })?;

        let spec = RequestSpec::post("auth/refresh-token", json!({ "refreshToken": refresh_token }));
        let token = self.store.access_token();
        let response = self.execute(&spec, token.as_deref()).await?;
        let status = response.status().as_u16();
        let envelope: Envelope<TokenPair> =
            response.json().await.map_err(|err| ApiError::Unknown {
                status,
                message: format!("Failed to decode refresh response: {err}"),
            })?;

        let pair = envelope.data;
        self.store.set_tokens(&pair.token, pair.refresh_token.as_deref());
        debug!("Access token refreshed");
        Ok(pair.token)
    }

    #[cfg(test)]
    pub(crate) fn pending_waiters(&self) -> usize {
        self.refresh.lock().waiters.len()
    }
}
