use std::time::Duration;

use atmocrawl_core::StationId;

use crate::AppError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Spacing between the starts of two crawl cycles. A cycle that runs
    /// longer delays the next start.
    pub interval: Duration,
    /// Log every cycle start at info level.
    pub echo: bool,
    /// Crawled in this order on every cycle.
    pub stations: Vec<StationId>,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.interval.is_zero() {
            return Err(AppError::InvalidConfig(
                "crawl interval must be greater than zero",
            ));
        }
        if self.stations.is_empty() {
            return Err(AppError::InvalidConfig(
                "at least one station must be configured",
            ));
        }
        Ok(())
    }
}
