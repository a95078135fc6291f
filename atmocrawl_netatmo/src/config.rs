use std::{fmt, time::Duration};

use crate::{NetatmoError, NetatmoResult, session::RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://api.netatmo.com";
pub const DEFAULT_SCOPE: &str = "read_station";

#[derive(Clone, PartialEq, Eq)]
pub struct NetatmoConfig {
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub base_url: String,
    /// Failed (re)authentications tolerated before giving up.
    pub max_failed_registrations: u32,
    /// Cooldown between two authentication attempts.
    pub delay_registrations: Duration,
    /// Bound applied to every request against the API.
    pub timeout: Duration,
    /// Sessions expiring within this window are refreshed before use.
    pub refresh_skew: Duration,
}

impl NetatmoConfig {
    pub fn validate(&self) -> NetatmoResult<()> {
        if self.username.trim().is_empty() {
            return Err(NetatmoError::InvalidConfig("netatmo username must be set"));
        }
        if self.password.is_empty() {
            return Err(NetatmoError::InvalidConfig("netatmo password must be set"));
        }
        if self.client_id.trim().is_empty() {
            return Err(NetatmoError::InvalidConfig("netatmo client_id must be set"));
        }
        if self.client_secret.is_empty() {
            return Err(NetatmoError::InvalidConfig(
                "netatmo client_secret must be set",
            ));
        }
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(NetatmoError::InvalidConfig(
                "netatmo base_url must be an http(s) URL",
            ));
        }
        if self.timeout.is_zero() {
            return Err(NetatmoError::InvalidConfig(
                "request timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_failed_registrations: self.max_failed_registrations,
            delay: self.delay_registrations,
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

impl fmt::Debug for NetatmoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetatmoConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .field("base_url", &self.base_url)
            .field("max_failed_registrations", &self.max_failed_registrations)
            .field("delay_registrations", &self.delay_registrations)
            .field("timeout", &self.timeout)
            .field("refresh_skew", &self.refresh_skew)
            .finish()
    }
}
