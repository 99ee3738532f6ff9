//! Authentication-status state machine.
//!
//! ```text
//! Unknown ──bootstrap──▶ Authenticated | NeedsReauth | Unauthenticated
//! Unauthenticated | NeedsReauth ──register / login──▶ Authenticated
//! Authenticated | NeedsReauth ──logout──▶ Unauthenticated
//! NeedsReauth ──clear_saved_user──▶ Unauthenticated
//! ```
//!
//! State lives in a `watch` channel. Operations never return errors; a failure
//! is recorded in [`SessionSnapshot::error`] and the operation returns `false`.

pub mod state;

pub use state::{SessionSnapshot, SessionStatus};

use crate::{
    api::{ApiClient, ApiError, AuthResponse},
    credentials::{CredentialError, CredentialStore},
    frame::CapturedFrame,
};
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

const STORAGE_ERROR: &str = "Could not access secure storage.";

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    api: ApiClient,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionManager {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner { api, state }),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.state.borrow().status
    }

    /// Receives every change; dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    fn credentials(&self) -> &CredentialStore {
        self.inner.api.credentials()
    }

    /// Decides the initial status from what is stored. Runs once, from
    /// `Unknown`. Returns `true` when a session was restored.
    ///
    /// Tokens that cannot be validated are discarded so that a later face login
    /// starts from a clean pair; the saved username is kept.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> bool {
        if !self.begin("bootstrap", |status| status == SessionStatus::Unknown) {
            return false;
        }

        match self.credentials().access_token().await {
            Ok(Some(_)) => match self.inner.api.profile().await {
                Ok(profile) => {
                    info!(user_id = profile.id, "session restored");
                    self.finish(|state| state.authenticated(profile));
                    return true;
                }
                Err(err) => {
                    debug!(error = %err, "stored session could not be restored");
                    if let Err(err) = self.credentials().clear_tokens().await {
                        warn!(error = %err, "failed to discard stale tokens");
                    }
                }
            },
            Ok(None) => debug!("no stored session"),
            Err(err) => warn!(error = %err, "failed to read stored tokens"),
        }

        match self.credentials().username().await {
            Ok(Some(name)) => {
                debug!("saved display name found");
                self.finish(|state| {
                    state.status = SessionStatus::NeedsReauth;
                    state.profile = None;
                    state.saved_username = Some(name);
                });
            }
            Ok(None) => self.finish(SessionSnapshot::signed_out),
            Err(err) => {
                warn!(error = %err, "failed to read saved display name");
                self.finish(|state| {
                    state.signed_out();
                    state.error = Some(STORAGE_ERROR.to_string());
                });
            }
        }

        false
    }

    /// Enrolls a new user. The image is consumed whatever the outcome.
    #[instrument(skip(self, phone, image))]
    pub async fn register_with_face(&self, name: &str, phone: &str, image: CapturedFrame) -> bool {
        if !self.begin("register", SessionStatus::can_authenticate) {
            return false;
        }

        let result = self.inner.api.register_face(name, phone, image).await;
        self.complete_auth(result).await
    }

    /// Signs in with a liveness frame sequence. The frames are consumed whatever
    /// the outcome.
    #[instrument(skip(self, frames), fields(frames = frames.len()))]
    pub async fn login_face(&self, name: &str, frames: Vec<CapturedFrame>) -> bool {
        if !self.begin("login", SessionStatus::can_authenticate) {
            return false;
        }

        let result = self.inner.api.login_face(name, frames).await;
        self.complete_auth(result).await
    }

    /// Local logout; always clears every stored credential.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> bool {
        if !self.begin("logout", |status| {
            matches!(
                status,
                SessionStatus::Authenticated | SessionStatus::NeedsReauth
            )
        }) {
            return false;
        }

        let cleared = self.credentials().clear_all().await;
        info!("signed out");
        self.finish(|state| {
            state.signed_out();
            if let Err(err) = &cleared {
                warn!(error = %err, "failed to clear credentials on logout");
                state.error = Some(STORAGE_ERROR.to_string());
            }
        });

        cleared.is_ok()
    }

    /// Forgets the remembered display name, leaving no local identity behind.
    #[instrument(skip(self))]
    pub async fn clear_saved_user(&self) -> bool {
        if !self.begin("clear saved user", |status| {
            status == SessionStatus::NeedsReauth
        }) {
            return false;
        }

        let cleared = self.credentials().clear_all().await;
        self.finish(|state| match &cleared {
            Ok(()) => state.signed_out(),
            Err(err) => {
                warn!(error = %err, "failed to forget saved user");
                state.error = Some(STORAGE_ERROR.to_string());
            }
        });

        cleared.is_ok()
    }

    /// Re-fetches the profile of the signed-in user.
    #[instrument(skip(self))]
    pub async fn refresh_profile(&self) -> bool {
        if !self.begin("refresh profile", |status| {
            status == SessionStatus::Authenticated
        }) {
            return false;
        }

        match self.inner.api.profile().await {
            Ok(profile) => {
                self.finish(|state| state.authenticated(profile));
                true
            }
            Err(err) => {
                let logged_out = self.forced_logout().await;
                if logged_out {
                    warn!("session was revoked, signing out");
                }
                self.finish(|state| {
                    if logged_out {
                        state.signed_out();
                    }
                    state.error = Some(err.user_message());
                });
                false
            }
        }
    }

    pub fn clear_error(&self) {
        self.inner.state.send_if_modified(|state| state.error.take().is_some());
    }

    /// Stores the new session or records the failure. A failed attempt leaves
    /// the status where it was, unless the interceptor wiped the credentials
    /// meanwhile.
    async fn complete_auth(&self, result: Result<AuthResponse, ApiError>) -> bool {
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "authentication failed");
                let username_gone = matches!(self.credentials().username().await, Ok(None));
                self.finish(|state| {
                    if state.status == SessionStatus::NeedsReauth && username_gone {
                        state.signed_out();
                    }
                    state.error = Some(err.user_message());
                });
                return false;
            }
        };

        if let Err(err) = self.persist(&response).await {
            warn!(error = %err, "failed to persist session");
            self.finish(|state| state.error = Some(STORAGE_ERROR.to_string()));
            return false;
        }

        info!(
            user_id = response.user.id,
            similarity = ?response.similarity,
            liveness_passed = ?response.liveness_passed,
            "authenticated"
        );
        self.finish(|state| state.authenticated(response.user));
        true
    }

    async fn persist(&self, response: &AuthResponse) -> Result<(), CredentialError> {
        let credentials = self.credentials();
        credentials
            .save_tokens(
                &SecretString::from(response.access_token.clone()),
                &SecretString::from(response.refresh_token.clone()),
            )
            .await?;
        credentials.save_username(&response.user.name).await
    }

    /// The interceptor escalates an unrecoverable refresh to a full local
    /// logout; seen from here that means the tokens are gone.
    async fn forced_logout(&self) -> bool {
        matches!(self.credentials().access_token().await, Ok(None))
    }

    /// Clears the previous error and claims the busy flag if `allowed` accepts
    /// the current status.
    fn begin(&self, operation: &str, allowed: impl Fn(SessionStatus) -> bool) -> bool {
        let mut accepted = false;
        self.inner.state.send_modify(|state| {
            state.error = None;
            if state.busy {
                state.error = Some("Another request is already in progress.".to_string());
            } else if allowed(state.status) {
                state.busy = true;
                accepted = true;
            } else {
                state.error = Some(rejected_message(operation, state.status));
            }
        });

        if !accepted {
            debug!(operation, "operation rejected");
        }
        accepted
    }

    fn finish(&self, update: impl FnOnce(&mut SessionSnapshot)) {
        self.inner.state.send_modify(|state| {
            update(state);
            state.busy = false;
        });
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

fn rejected_message(operation: &str, status: SessionStatus) -> String {
    if operation == "bootstrap" {
        return "Session is already loaded.".to_string();
    }
    match status {
        SessionStatus::Unknown => "Session is still loading.".to_string(),
        SessionStatus::Authenticated => "Already signed in. Sign out first.".to_string(),
        SessionStatus::Unauthenticated => "Nobody is signed in.".to_string(),
        SessionStatus::NeedsReauth => "Sign in again to continue.".to_string(),
    }
}
