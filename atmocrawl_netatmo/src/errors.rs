use std::fmt;

use thiserror::Error;

pub type NetatmoResult<T> = Result<T, NetatmoError>;

#[derive(Debug, Error)]
pub enum NetatmoError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("http request failed")]
    Http(#[from] reqwest::Error),
    #[error("token endpoint rejected the request with status {status}: {body}")]
    TokenRejected { status: u16, body: String },
    #[error("token response could not be decoded")]
    TokenDecode(#[from] serde_json::Error),
    #[error("token lifetime of {expires_in_secs}s overflows the clock")]
    TokenExpiryOverflow { expires_in_secs: u64 },
    #[error("authentication failed {attempts} times; retries exhausted")]
    RetriesExhausted { attempts: u32 },
    #[error("unclassified transport failure: {0}")]
    Transport(String),
    #[error("{0}")]
    Message(String),
}

impl NetatmoError {
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }

    pub fn display_chain(&self) -> DisplayChainedError<'_> {
        DisplayChainedError { inner: self }
    }
}

pub struct DisplayChainedError<'a> {
    inner: &'a (dyn std::error::Error + 'static),
}

impl fmt::Debug for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut current: Option<&(dyn std::error::Error + 'static)> = Some(self.inner);

        while let Some(err) = current {
            if first {
                first = false;
            } else {
                write!(f, " -> ")?;
            }

            write!(f, "{err}")?;
            current = err.source();
        }

        Ok(())
    }
}

impl fmt::Display for DisplayChainedError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
