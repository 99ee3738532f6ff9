//! Bearer attachment and single-flight token refresh.
//!
//! On a `401` for an authenticated request, the first caller to claim the
//! in-flight flag refreshes the pair and retries its request once. Callers that
//! hit a `401` while the flag is held get their response back unchanged; they
//! are not queued. Register, login and refresh carry no bearer and are passed
//! through as is.

use super::{
    error::ApiError,
    request::{ApiRequest, REFRESH_PATH, Transport},
    types::{RefreshRequest, RefreshResponse},
};
use crate::credentials::{CredentialStore, TokenPair};
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, instrument, warn};

#[derive(Debug)]
pub struct AuthInterceptor {
    credentials: CredentialStore,
    refreshing: AtomicBool,
}

/// Clears the in-flight flag on every exit path, including cancellation.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl AuthInterceptor {
    #[must_use]
    pub fn new(credentials: CredentialStore) -> Self {
        Self {
            credentials,
            refreshing: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Sends `request`, refreshing and retrying once on an authorization failure.
    ///
    /// # Errors
    /// Returns an error on transport failures or when the credential store
    /// cannot be read. HTTP failures come back as responses.
    #[instrument(skip_all, fields(path = request.path))]
    pub async fn execute(
        &self,
        transport: &Transport,
        request: &ApiRequest,
    ) -> Result<Response, ApiError> {
        let bearer = self.bearer_for(request).await?;
        let response = transport.send(request, bearer.as_ref()).await?;

        if response.status() != StatusCode::UNAUTHORIZED || request.is_credential_exchange() {
            return Ok(response);
        }

        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            debug!("refresh already in flight, returning 401 unchanged");
            return Ok(response);
        };

        let Some(refresh_token) = self.credentials.refresh_token().await? else {
            debug!("no refresh token stored");
            return Ok(response);
        };

        match request_refresh(transport, &refresh_token).await {
            Ok(pair) => {
                self.credentials
                    .save_tokens(&pair.access_token, &pair.refresh_token)
                    .await?;
                debug!("token pair refreshed, retrying request");
                transport.send(request, Some(&pair.access_token)).await
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, clearing local credentials");
                if let Err(clear_err) = self.credentials.clear_all().await {
                    error!(error = %clear_err, "failed to clear credentials after refresh failure");
                }
                Ok(response)
            }
        }
    }

    async fn bearer_for(&self, request: &ApiRequest) -> Result<Option<SecretString>, ApiError> {
        if request.is_credential_exchange() {
            return Ok(None);
        }
        Ok(self.credentials.access_token().await?)
    }
}

/// Exchanges a refresh token for a new pair. Never carries a bearer.
///
/// # Errors
/// Returns an error on transport failure, a non-success status or an
/// undecodable body.
pub async fn request_refresh(
    transport: &Transport,
    refresh_token: &SecretString,
) -> Result<TokenPair, ApiError> {
    let body = serde_json::to_value(RefreshRequest {
        refresh_token: refresh_token.expose_secret(),
    })
    .map_err(|err| ApiError::Decode(err.to_string()))?;

    let response = transport
        .send(&ApiRequest::post(REFRESH_PATH).json(body), None)
        .await?;

    let status = response.status();
    let bytes = response.bytes().await?;
    if !status.is_success() {
        return Err(ApiError::from_response(status, &bytes));
    }

    let refreshed: RefreshResponse =
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))?;

    Ok(TokenPair::new(refreshed.access_token, refreshed.refresh_token))
}
