mod service;
mod types;

pub use service::{Clock, SessionManager, SystemClock, TokenAccess};
pub use types::{FailureKind, RetryPolicy, Session};

#[cfg(test)]
pub(crate) use service::tests;
