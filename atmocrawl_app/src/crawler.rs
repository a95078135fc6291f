use std::fmt;

use atmocrawl_core::{InsertOutcome, MeasurementSink, StationId};
use atmocrawl_netatmo::{
    AuthApi, Clock, FetchOutcome, StationApi, StationDataFetcher, SystemClock,
};

use crate::AppError;

/// Tally of one pass over the configured stations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub store_failures: usize,
    pub no_data: usize,
    pub declined: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} inserted={} duplicates={} store_failures={} no_data={} declined={}",
            self.fetched,
            self.inserted,
            self.duplicates,
            self.store_failures,
            self.no_data,
            self.declined
        )
    }
}

pub struct Crawler<A, C, S, T = SystemClock>
where
    A: StationApi,
    C: AuthApi,
    T: Clock,
{
    fetcher: StationDataFetcher<A, C, T>,
    sink: S,
    stations: Vec<StationId>,
}

impl<A, C, S, T> Crawler<A, C, S, T>
where
    A: StationApi + Send + Sync,
    C: AuthApi + Send + Sync,
    S: MeasurementSink + Send + Sync,
    T: Clock + Send + Sync,
{
    pub fn new(fetcher: StationDataFetcher<A, C, T>, sink: S, stations: Vec<StationId>) -> Self {
        Self {
            fetcher,
            sink,
            stations,
        }
    }

    pub fn stations(&self) -> &[StationId] {
        &self.stations
    }

    /// Fetches every station once, in configured order, and hands each
    /// measurement to the sink. Only fatal fetch errors abort the cycle.
    pub async fn crawl_once(&self) -> Result<CycleReport, AppError> {
        let mut report = CycleReport::default();

        for station_id in &self.stations {
            match self.fetcher.fetch(station_id).await? {
                FetchOutcome::Measurement(measurement) => {
                    report.fetched += 1;
                    match self.sink.insert_if_new(&measurement).await {
                        InsertOutcome::Inserted => report.inserted += 1,
                        InsertOutcome::Duplicate => report.duplicates += 1,
                        InsertOutcome::Failed => report.store_failures += 1,
                    }
                }
                FetchOutcome::NoData(reason) => {
                    log::debug!("no measurement for station {station_id}: {reason:?}");
                    report.no_data += 1;
                }
                FetchOutcome::Declined => report.declined += 1,
            }
        }

        Ok(report)
    }
}
