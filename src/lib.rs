//! # Facegate (face-only authentication client)
//!
//! `facegate` signs a user in with nothing but their face. The crate is the
//! client-side engine behind that flow:
//!
//! - [`credentials`] keeps the access/refresh token pair and the last
//!   authenticated display name encrypted at rest.
//! - [`api`] talks to the face verification service. Every request goes through
//!   an auth interceptor that attaches the bearer token and, on a `401`, performs
//!   a single-flight token refresh followed by exactly one retry.
//! - [`session`] is the authentication-status state machine
//!   (`Unknown → Authenticated | NeedsReauth | Unauthenticated`) exposed as an
//!   observable snapshot store.
//! - [`capture`] owns the camera for the duration of a flow and drives the timed
//!   enrollment / liveness capture sequence before handing frames to a verifier.
//!
//! ## Flow Overview
//!
//! 1. The CLI builds one [`cli::globals::GlobalArgs`] context at startup and
//!    passes it to every action.
//! 2. `SessionManager::bootstrap` decides the initial status from stored state.
//! 3. A capture flow acquires the camera, takes one frame (enrollment) or `N`
//!    time-spaced frames (liveness) and moves them into the session operation.
//! 4. Frames are deleted from disk as soon as the HTTP call that consumed them
//!    returns, success or failure.
//!
//! Tokens are held as `SecretString` and never reach the logs.

pub mod api;
pub mod capture;
pub mod cli;
pub mod credentials;
pub mod frame;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
