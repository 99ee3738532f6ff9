//! Request descriptions and the HTTP transport that sends them.
//!
//! An [`ApiRequest`] is plain data, so the interceptor can send the exact same
//! request a second time after a token refresh.

use super::error::ApiError;
use reqwest::{
    Method, Response,
    header::AUTHORIZATION,
    multipart::{Form, Part},
};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{Instrument, debug, info_span};
use url::Url;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const REGISTER_PATH: &str = "/auth/register-face";
pub const LOGIN_PATH: &str = "/auth/login/face";
pub const REFRESH_PATH: &str = "/auth/token/refresh";
pub const PROFILE_PATH: &str = "/auth/me";
pub const CLEAR_PATH: &str = "/auth/admin/clear";

#[derive(Clone)]
pub enum FormPart {
    Text {
        name: &'static str,
        value: String,
    },
    File {
        name: &'static str,
        file_name: String,
        mime: &'static str,
        bytes: Vec<u8>,
    },
}

impl std::fmt::Debug for FormPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text { name, value } => f
                .debug_struct("Text")
                .field("name", name)
                .field("value", value)
                .finish(),
            Self::File {
                name,
                file_name,
                mime,
                bytes,
            } => f
                .debug_struct("File")
                .field("name", name)
                .field("file_name", file_name)
                .field("mime", mime)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormPart>),
}

#[derive(Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: &'static str,
    pub body: RequestBody,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            body: RequestBody::Empty,
        }
    }

    #[must_use]
    pub fn get(path: &'static str) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: &'static str) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn delete(path: &'static str) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    /// Register, login and refresh trade something other than a bearer for a
    /// token pair. They are sent without a bearer and never refreshed.
    #[must_use]
    pub fn is_credential_exchange(&self) -> bool {
        matches!(self.path, REGISTER_PATH | LOGIN_PATH | REFRESH_PATH)
    }
}

impl std::fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
}

impl Transport {
    /// # Errors
    /// Returns an error if the base URL is not an absolute http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(user_agent: &str, base_url: &str) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(base_url)?;

        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends the request once. Any HTTP status is returned as a response; only
    /// transport failures are errors.
    ///
    /// # Errors
    /// Returns an error if the request cannot be built or sent.
    pub async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&SecretString>,
    ) -> Result<Response, ApiError> {
        let url = self.endpoint_url(request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if let Some(token) = bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };

        let span = info_span!(
            "api.request",
            http.method = %request.method,
            url = %url,
            authorized = bearer.is_some()
        );
        let response = builder.send().instrument(span).await?;

        debug!(status = response.status().as_u16(), path = request.path, "response received");

        Ok(response)
    }
}

fn build_form(parts: &[FormPart]) -> Result<Form, ApiError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(*name, value.clone()),
            FormPart::File {
                name,
                file_name,
                mime,
                bytes,
            } => form.part(
                *name,
                Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime)?,
            ),
        };
    }
    Ok(form)
}

/// Trims whitespace and trailing slashes, then checks the URL is absolute http(s).
///
/// # Errors
/// Returns `ApiError::Config` for empty, relative or non-http URLs.
pub fn normalize_base_url(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ApiError::Config("server URL is empty".to_string()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|err| ApiError::Config(format!("invalid server URL {trimmed}: {err}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        scheme => Err(ApiError::Config(format!(
            "unsupported server URL scheme: {scheme}"
        ))),
    }
}
