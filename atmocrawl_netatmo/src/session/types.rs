use std::{fmt, time::Duration};

use atmocrawl_core::Timestamp;

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: Timestamp,
}

impl Session {
    pub fn should_refresh(&self, now: Timestamp, refresh_skew: Duration) -> bool {
        match now.checked_add(refresh_skew) {
            Some(deadline) => self.access_expires_at <= deadline,
            None => true,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_expires_at", &self.access_expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_failed_registrations: u32,
    pub delay: Duration,
}

/// Why a station data request produced no data, as far as session recovery
/// is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// HTTP 401: the session is rebuilt with a fresh login.
    Unauthorized,
    /// HTTP 403: the access token is refreshed.
    Forbidden,
    /// Any other non-200 status.
    Unexpected(u16),
    ConnectionError,
    Timeout,
}

impl FailureKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            other => Self::Unexpected(other),
        }
    }

    pub fn requires_reauthentication(self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::Unexpected(status) => write!(f, "unexpected status {status}"),
            Self::ConnectionError => write!(f, "connection error"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}
