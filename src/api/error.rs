//! Normalized API errors.
//!
//! Normalization happens once, at the pipeline boundary: every consumer of
//! [`ApiClient`](super::ApiClient) sees an [`ApiError`], never a raw
//! transport error. The mapping is total over the status-code space, so no
//! response can leave the pipeline unclassified.

use serde_json::Value;
use thiserror::Error;

/// A request outcome, normalized independently of transport details.
///
/// Errors are `Clone` because a failed token refresh is delivered to every
/// request parked behind it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response reached the client (DNS, connect, timeout).
    #[error("{message}")]
    Network { message: String },

    /// 400 or 422, message taken from the server payload when present.
    #[error("{message}")]
    Validation { status: u16, message: String },

    /// 401.
    #[error("{message}")]
    Unauthorized { message: String },

    /// 403.
    #[error("{message}")]
    Forbidden { message: String },

    /// 404.
    #[error("{message}")]
    NotFound { message: String },

    /// 5xx the server admits to: 500, 502, 503, 504. Non-operational.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Anything else.
    #[error("{message}")]
    Unknown { status: u16, message: String },
}

impl ApiError {
    /// The original HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Network { .. } => None,
            ApiError::Validation { status, .. } => Some(*status),
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Forbidden { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Unknown { status, .. } => Some(*status),
        }
    }

    /// False only for SERVER errors, which signal "unexpected/bug/outage"
    /// rather than something the caller can act on.
    pub fn is_operational(&self) -> bool {
        !matches!(self, ApiError::Server { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

fn payload_message(payload: Option<&Value>) -> Option<String> {
    payload
        .and_then(|value| value.get("message"))
        .and_then(|message| message.as_str())
        .map(|message| message.to_string())
}

/// Classify a received response by status code. Deterministic and total:
/// every status maps to exactly one kind.
pub fn classify_response(status: u16, payload: Option<&Value>) -> ApiError {
    match status {
        400 => ApiError::Validation {
            status,
            message: payload_message(payload).unwrap_or_else(|| "Invalid request data".to_string()),
        },
        422 => ApiError::Validation {
            status,
            message: payload_message(payload).unwrap_or_else(|| "Validation failed".to_string()),
        },
        401 => ApiError::Unauthorized {
            message: "Invalid credentials or expired session".to_string(),
        },
        403 => ApiError::Forbidden {
            message: "You do not have permission to perform this action".to_string(),
        },
        404 => ApiError::NotFound {
            message: "Resource not found".to_string(),
        },
        500 => ApiError::Server {
            status,
            message: "Internal server error".to_string(),
        },
        502 | 503 | 504 => ApiError::Server {
            status,
            message: "Service temporarily unavailable".to_string(),
        },
        other => ApiError::Unknown {
            status: other,
            message: payload_message(payload).unwrap_or_else(|| "Unknown error".to_string()),
        },
    }
}

/// Classify a transport failure: the request never produced a response.
pub fn classify_transport(err: &reqwest::Error) -> ApiError {
    let message = if err.is_timeout() {
        "Connection timed out. Check your network connection".to_string()
    } else {
        "Connection error. Check your network connection".to_string()
    };
    ApiError::Network { message }
}
