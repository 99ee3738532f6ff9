use crate::api::UserProfile;
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// Before bootstrap has run.
    #[default]
    Unknown,
    Authenticated,
    Unauthenticated,
    /// A display name is remembered but there is no usable session.
    NeedsReauth,
}

impl SessionStatus {
    /// Statuses from which a face login or registration may start.
    #[must_use]
    pub fn can_authenticate(self) -> bool {
        matches!(self, Self::Unauthenticated | Self::NeedsReauth)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Unknown => "unknown",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
            Self::NeedsReauth => "needs re-authentication",
        };
        f.write_str(status)
    }
}

/// Everything an observer needs to render the current session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub profile: Option<UserProfile>,
    pub saved_username: Option<String>,
    pub error: Option<String>,
    pub busy: bool,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub(crate) fn authenticated(&mut self, profile: UserProfile) {
        self.status = SessionStatus::Authenticated;
        self.saved_username = Some(profile.name.clone());
        self.profile = Some(profile);
    }

    pub(crate) fn signed_out(&mut self) {
        self.status = SessionStatus::Unauthenticated;
        self.profile = None;
        self.saved_username = None;
    }
}
