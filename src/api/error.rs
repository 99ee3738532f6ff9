//! Errors surfaced by the API client and their user-facing messages.
//!
//! The verification service reports failures through a `detail` field. The
//! mapping below turns status + detail into a typed variant so callers never
//! have to match on server strings.

use crate::credentials::CredentialError;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Maximum number of server detail characters kept for display.
const MAX_DETAIL_CHARS: usize = 200;

const DETAIL_FACE_MISMATCH: &str = "Face does not match";
const DETAIL_INVALID_CREDENTIALS: &str = "Invalid credentials";
const DETAIL_LIVENESS_PREFIX: &str = "Liveness failed";
const VALIDATION_PREFIX: &str = "Value error, ";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("face not recognised")]
    FaceNotRecognized,
    #[error("user not found")]
    UserNotFound,
    #[error("liveness check failed: {0}")]
    LivenessFailed(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("name already taken")]
    NameTaken,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("image too large")]
    PayloadTooLarge,
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("request failed ({status}): {detail}")]
    Http { status: u16, detail: String },
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("credential storage failed: {0}")]
    Credentials(#[from] CredentialError),
    #[error("captured frame could not be read: {0}")]
    Frame(#[source] std::io::Error),
}

/// Coarse classification used for retry and display decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Authorization,
    Validation,
    Conflict,
    Decode,
    Storage,
    Other,
}

impl ApiError {
    /// Maps a non-success response to a typed error.
    #[must_use]
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let detail = extract_detail(body);

        match status {
            StatusCode::UNAUTHORIZED => {
                if detail == DETAIL_FACE_MISMATCH {
                    Self::FaceNotRecognized
                } else if detail == DETAIL_INVALID_CREDENTIALS {
                    Self::UserNotFound
                } else if let Some(reason) = liveness_reason(&detail) {
                    Self::LivenessFailed(reason)
                } else {
                    Self::Unauthorized(detail)
                }
            }
            StatusCode::CONFLICT => Self::NameTaken,
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge,
            StatusCode::UNPROCESSABLE_ENTITY => liveness_reason(&detail).map_or_else(
                || {
                    Self::Validation(
                        detail
                            .strip_prefix(VALIDATION_PREFIX)
                            .unwrap_or(&detail)
                            .to_string(),
                    )
                },
                Self::LivenessFailed,
            ),
            _ => Self::Http {
                status: status.as_u16(),
                detail,
            },
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout | Self::Network(_) => ErrorKind::Transport,
            Self::FaceNotRecognized
            | Self::UserNotFound
            | Self::LivenessFailed(_)
            | Self::Unauthorized(_) => ErrorKind::Authorization,
            Self::Validation(_) | Self::PayloadTooLarge => ErrorKind::Validation,
            Self::NameTaken => ErrorKind::Conflict,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Credentials(_) => ErrorKind::Storage,
            Self::Http { .. } | Self::Config(_) | Self::Frame(_) => ErrorKind::Other,
        }
    }

    /// Message rendered inline on the screen that started the request.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::FaceNotRecognized => "Face not recognised. Please try again.".to_string(),
            Self::UserNotFound => "No account found with that name.".to_string(),
            Self::LivenessFailed(reason) if reason.is_empty() => {
                "Liveness check failed. Please try again.".to_string()
            }
            Self::LivenessFailed(reason) => format!("Liveness check failed: {reason}"),
            Self::Unauthorized(_) => "Session expired. Please sign in again.".to_string(),
            Self::NameTaken => "That name is already taken.".to_string(),
            Self::Validation(message) => message.clone(),
            Self::PayloadTooLarge => "Image too large.".to_string(),
            Self::Timeout => "Connection timed out. Check your network and try again.".to_string(),
            Self::Network(_) => "Unable to reach the server. Check the server address.".to_string(),
            Self::Decode(_) => "Unexpected response from server.".to_string(),
            Self::Http { status, detail } => format!("Request failed ({status}): {detail}"),
            Self::Config(message) => format!("Client misconfigured: {message}"),
            Self::Credentials(_) => "Could not access secure storage.".to_string(),
            Self::Frame(_) => "Could not read the captured image.".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::Config(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

fn liveness_reason(detail: &str) -> Option<String> {
    detail.strip_prefix(DETAIL_LIVENESS_PREFIX).map(|rest| {
        rest.trim_start_matches(':').trim().to_string()
    })
}

/// Pulls `detail` out of an error body. FastAPI sends either a string or a list
/// of `{"msg": ...}` objects; anything else falls back to the raw body.
fn extract_detail(body: &[u8]) -> String {
    let detail = match serde_json::from_slice::<Value>(body) {
        Ok(json) => match json.get("detail") {
            Some(Value::String(detail)) => detail.clone(),
            Some(Value::Array(items)) => items
                .first()
                .and_then(|item| item.get("msg"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            _ => String::from_utf8_lossy(body).to_string(),
        },
        Err(_) => String::from_utf8_lossy(body).to_string(),
    };

    let trimmed = detail.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_DETAIL_CHARS).collect()
    }
}
