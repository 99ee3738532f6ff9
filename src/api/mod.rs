//! Client for the face verification service.
//!
//! Every call goes through the [`AuthInterceptor`]: the bearer token is read from
//! the [`CredentialStore`] right before each send, and a `401` triggers one
//! single-flight refresh followed by one retry.

pub mod error;
pub mod interceptor;
pub mod request;
pub mod types;

pub use error::{ApiError, ErrorKind};
pub use interceptor::AuthInterceptor;
pub use request::{ApiRequest, FormPart, RequestBody, Transport};
pub use types::{AuthResponse, UserProfile};

use crate::{
    credentials::{CredentialStore, TokenPair},
    frame::CapturedFrame,
};
use request::{CLEAR_PATH, LOGIN_PATH, PROFILE_PATH, REGISTER_PATH};
use reqwest::Response;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Uploads above this size are rejected before they leave the device.
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;
pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 100;
pub const PHONE_MIN_CHARS: usize = 6;

#[derive(Clone, Debug)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    transport: Transport,
    interceptor: AuthInterceptor,
}

impl ApiClient {
    /// # Errors
    /// Returns `ApiError::Config` if the base URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, credentials: CredentialStore) -> Result<Self, ApiError> {
        let transport = Transport::new(crate::APP_USER_AGENT, base_url)?;

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                interceptor: AuthInterceptor::new(credentials),
            }),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.inner.transport.base_url()
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        self.inner.interceptor.credentials()
    }

    /// Enrolls a new user from a single face image. The frame is consumed and
    /// its file removed once the call returns.
    ///
    /// # Errors
    /// Returns a validation error before any network call for bad input, or the
    /// mapped server error.
    #[instrument(skip(self, phone, image))]
    pub async fn register_face(
        &self,
        name: &str,
        phone: &str,
        image: CapturedFrame,
    ) -> Result<AuthResponse, ApiError> {
        let name = validate_name(name)?;
        let phone = validate_phone(phone)?;
        let image = frame_part("face_image", &image).await?;

        let request = ApiRequest::post(REGISTER_PATH).multipart(vec![
            FormPart::Text {
                name: "name",
                value: name,
            },
            FormPart::Text {
                name: "phone_number",
                value: phone,
            },
            image,
        ]);

        let response: AuthResponse = decode(self.execute(&request).await?).await?;
        info!(user_id = response.user.id, "face registered");

        Ok(response)
    }

    /// Verifies a live face against the enrolled one. All frames are consumed.
    ///
    /// # Errors
    /// Returns a validation error when no frames are given, or the mapped server
    /// error.
    #[instrument(skip(self, frames), fields(frames = frames.len()))]
    pub async fn login_face(
        &self,
        name: &str,
        frames: Vec<CapturedFrame>,
    ) -> Result<AuthResponse, ApiError> {
        let name = validate_name(name)?;
        if frames.is_empty() {
            return Err(ApiError::Validation(
                "At least one frame is required".to_string(),
            ));
        }

        let mut parts = Vec::with_capacity(frames.len() + 1);
        parts.push(FormPart::Text {
            name: "name",
            value: name,
        });
        for frame in &frames {
            parts.push(frame_part("face_frames", frame).await?);
        }

        let request = ApiRequest::post(LOGIN_PATH).multipart(parts);
        let response: AuthResponse = decode(self.execute(&request).await?).await?;
        info!(
            user_id = response.user.id,
            similarity = response.similarity,
            "face login accepted"
        );

        Ok(response)
    }

    /// Exchanges a refresh token for a new pair without touching local storage.
    ///
    /// # Errors
    /// Returns the mapped server error or a decode error.
    pub async fn refresh_tokens(&self, refresh_token: &SecretString) -> Result<TokenPair, ApiError> {
        interceptor::request_refresh(&self.inner.transport, refresh_token).await
    }

    /// # Errors
    /// Returns the mapped server error or a decode error.
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        decode(self.execute(&ApiRequest::get(PROFILE_PATH)).await?).await
    }

    /// Deletes every user on the server. Administrative.
    ///
    /// # Errors
    /// Returns the mapped server error.
    pub async fn clear_database(&self) -> Result<(), ApiError> {
        let response = self.execute(&ApiRequest::delete(CLEAR_PATH)).await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(ApiError::from_response(status, &body));
        }

        debug!(status = status.as_u16(), "database cleared");
        Ok(())
    }

    async fn execute(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        self.inner
            .interceptor
            .execute(&self.inner.transport, request)
            .await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(ApiError::from_response(status, &body));
    }

    serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))
}

async fn frame_part(field: &'static str, frame: &CapturedFrame) -> Result<FormPart, ApiError> {
    if frame.size().map_err(ApiError::Frame)? > MAX_IMAGE_BYTES {
        return Err(ApiError::PayloadTooLarge);
    }

    Ok(FormPart::File {
        name: field,
        file_name: frame.file_name(),
        mime: frame.format().mime(),
        bytes: frame.read().await.map_err(ApiError::Frame)?,
    })
}

/// # Errors
/// Returns `ApiError::Validation` when the trimmed name is not 2–100 characters.
pub fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    let chars = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        return Err(ApiError::Validation(
            "Name must be 2–100 characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

/// # Errors
/// Returns `ApiError::Validation` when the trimmed phone number is too short.
pub fn validate_phone(phone: &str) -> Result<String, ApiError> {
    let phone = phone.trim();
    if phone.chars().count() < PHONE_MIN_CHARS {
        return Err(ApiError::Validation("Invalid phone number".to_string()));
    }
    Ok(phone.to_string())
}
