use std::sync::Arc;

use atmocrawl_core::{Measurement, StationId};

use crate::{
    NetatmoError, NetatmoResult,
    client::{AuthApi, StationApi, TransportFailure},
    session::{Clock, FailureKind, SessionManager, SystemClock, TokenAccess},
    wire::parse_station_data,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Measurement(Measurement),
    NoData(NoDataReason),
    /// The session was being rebuilt, so no request was made.
    Declined,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoDataReason {
    /// The request failed and session recovery ran.
    Recovered(FailureKind),
    UnparseableBody,
    NoDevices,
}

/// Fetches the current dashboard of one station per call. Recovery of
/// failed requests is left to the shared [`SessionManager`].
pub struct StationDataFetcher<A, C, T = SystemClock>
where
    A: StationApi,
    C: AuthApi,
    T: Clock,
{
    api: A,
    session: Arc<SessionManager<C, T>>,
}

impl<A, C, T> StationDataFetcher<A, C, T>
where
    A: StationApi + Send + Sync,
    C: AuthApi + Send + Sync,
    T: Clock + Send + Sync,
{
    pub fn new(api: A, session: Arc<SessionManager<C, T>>) -> Self {
        Self { api, session }
    }

    /// Errors returned from here are fatal: exhausted authentication or a
    /// transport failure that is neither a connect error nor a timeout.
    pub async fn fetch(&self, station_id: &StationId) -> NetatmoResult<FetchOutcome> {
        log::debug!("fetching current measurement of station {station_id}");

        let access_token = match self.session.access_token().await? {
            TokenAccess::Ready(token) => token,
            TokenAccess::Declined => {
                log::info!(
                    "fetch for station {station_id} declined: session reinitialization in progress"
                );
                return Ok(FetchOutcome::Declined);
            }
        };

        let reply = match self.api.get_station_data(&access_token, station_id).await {
            Ok(reply) => reply,
            Err(TransportFailure::Connection(reason)) => {
                log::warn!("connection error fetching station {station_id}: {reason}");
                return self.recover(FailureKind::ConnectionError).await;
            }
            Err(TransportFailure::Timeout(reason)) => {
                log::warn!("timeout fetching station {station_id}: {reason}");
                return self.recover(FailureKind::Timeout).await;
            }
            Err(TransportFailure::Other(reason)) => {
                return Err(NetatmoError::Transport(reason));
            }
        };

        if !reply.is_ok() {
            log::warn!(
                "station data request for {station_id} returned HTTP {}",
                reply.status
            );
            return self.recover(FailureKind::from_status(reply.status)).await;
        }

        match parse_station_data(&reply.body, station_id) {
            Ok(Some(measurement)) => {
                log::trace!(
                    "station {station_id} reported time_utc {}",
                    measurement.time_utc
                );
                Ok(FetchOutcome::Measurement(measurement))
            }
            Ok(None) => {
                log::warn!("station data for {station_id} listed no devices");
                Ok(FetchOutcome::NoData(NoDataReason::NoDevices))
            }
            Err(err) => {
                log::error!("could not decode station data for {station_id}: {err}");
                Ok(FetchOutcome::NoData(NoDataReason::UnparseableBody))
            }
        }
    }

    async fn recover(&self, failure: FailureKind) -> NetatmoResult<FetchOutcome> {
        self.session.handle_failure(failure).await?;
        Ok(FetchOutcome::NoData(NoDataReason::Recovered(failure)))
    }
}
