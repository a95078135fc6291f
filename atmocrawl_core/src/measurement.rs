use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{StationId, Timestamp};

/// One dashboard reading of a station. Identity is `(station_id, time_utc)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub station_id: StationId,
    /// Seconds since the unix epoch, as reported by the station.
    pub time_utc: i64,
    pub co2: i32,
    pub noise: i32,
    pub temperature: i32,
}

impl Measurement {
    pub fn observed_at(&self) -> Option<Timestamp> {
        Timestamp::from_epoch_secs(self.time_utc)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The latest stored reading for the station has the same timestamp.
    Duplicate,
    /// The write was rolled back; the error has already been logged.
    Failed,
}

/// Destination for fetched measurements.
///
/// Implementations swallow their own persistence errors: a failed write is
/// reported as [`InsertOutcome::Failed`] and never aborts a crawl cycle.
#[async_trait]
pub trait MeasurementSink {
    async fn latest_timestamp(&self, station_id: &StationId) -> Option<i64>;
    async fn insert_if_new(&self, measurement: &Measurement) -> InsertOutcome;
}
