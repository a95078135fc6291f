pub mod client;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod session;
mod wire;

pub use client::{AuthApi, HttpReply, NetatmoHttpClient, StationApi, TokenGrant, TransportFailure};
pub use config::NetatmoConfig;
pub use errors::{NetatmoError, NetatmoResult};
pub use fetcher::{FetchOutcome, NoDataReason, StationDataFetcher};
pub use session::{
    Clock, FailureKind, RetryPolicy, Session, SessionManager, SystemClock, TokenAccess,
};
