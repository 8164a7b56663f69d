//! Error taxonomy for the shell game.
//!
//! Every error is surfaced to the invoking user as a transient notification
//! and never crosses to other clients. [`ShellError::severity`] picks the
//! notification level; [`ShellError::error_code`] gives a grepable code for
//! logs and wire replies.

/// Notification level for user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("Usage: /shell TOKEN_NAME | /shell setup")]
    Usage,
    #[error("Shell Game: only the GM can {action}.")]
    Forbidden { action: &'static str },
    #[error("Shell Game: need at least two tokens named \"{name}\" in the current scene (found {found}).")]
    NotEnoughTokens { name: String, found: usize },
    #[error("Shell Game: not every player is ready yet.")]
    NotReady,
    #[error("Shell Game: no ready check is open.")]
    NoActiveCheck,
    #[error("Shell Game: only players answer the ready check.")]
    PlayersOnly,
    #[error("Shell Game: a shuffle is already running.")]
    ShuffleInProgress,
    #[error("Shell Game: please select a token first.")]
    NoSelection,
    #[error("Shell Game: token {0} no longer exists.")]
    StaleReference(String),
    #[error("Shell Game: placement was cancelled before a click.")]
    PlacementCancelled,
    #[error("host error: {0}")]
    Host(String),
    #[error("relay error: {0}")]
    Relay(String),
}

impl ShellError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Usage => "E_USAGE",
            Self::Forbidden { .. } => "E_FORBIDDEN",
            Self::NotEnoughTokens { .. }
            | Self::NotReady
            | Self::NoActiveCheck
            | Self::PlayersOnly
            | Self::ShuffleInProgress
            | Self::NoSelection
            | Self::PlacementCancelled => "E_PRECONDITION",
            Self::StaleReference(_) => "E_STALE_REFERENCE",
            Self::Host(_) => "E_HOST",
            Self::Relay(_) => "E_RELAY",
        }
    }

    /// Precondition failures are recoverable warnings; everything else is
    /// reported as an error.
    #[must_use]
    pub fn severity(&self) -> Severity {
        if self.error_code() == "E_PRECONDITION" {
            Severity::Warning
        } else {
            Severity::Error
        }
    }
}

impl From<frames::CodecError> for ShellError {
    fn from(err: frames::CodecError) -> Self {
        Self::Relay(err.to_string())
    }
}
