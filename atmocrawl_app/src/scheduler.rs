use std::time::Duration;

use atmocrawl_core::MeasurementSink;
use atmocrawl_netatmo::{AuthApi, Clock, StationApi, SystemClock};
use tokio::{
    sync::watch,
    time::{self, MissedTickBehavior},
};

use crate::{AppError, Crawler, CycleReport};

/// Runs one crawl cycle per tick of a fixed interval.
pub struct Scheduler<A, C, S, T = SystemClock>
where
    A: StationApi,
    C: AuthApi,
    T: Clock,
{
    crawler: Crawler<A, C, S, T>,
    interval: Duration,
    echo: bool,
    cycles_completed: u64,
}

impl<A, C, S, T> Scheduler<A, C, S, T>
where
    A: StationApi + Send + Sync,
    C: AuthApi + Send + Sync,
    S: MeasurementSink + Send + Sync,
    T: Clock + Send + Sync,
{
    pub fn new(crawler: Crawler<A, C, S, T>, interval: Duration, echo: bool) -> Self {
        Self {
            crawler,
            interval,
            echo,
            cycles_completed: 0,
        }
    }

    pub fn crawler(&self) -> &Crawler<A, C, S, T> {
        &self.crawler
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, AppError> {
        let cycle = self.cycles_completed + 1;
        if self.echo {
            log::info!(
                "starting crawl cycle {cycle} over {} station(s)",
                self.crawler.stations().len()
            );
        } else {
            log::debug!(
                "starting crawl cycle {cycle} over {} station(s)",
                self.crawler.stations().len()
            );
        }

        let report = self.crawler.crawl_once().await?;
        self.cycles_completed = cycle;
        log::debug!("crawl cycle {cycle} finished: {report}");
        Ok(report)
    }

    /// Crawls on every tick until shutdown is signaled or a fatal error
    /// occurs. Ticks are spaced `interval` apart regardless of cycle length;
    /// a cycle that overruns delays the next tick instead of stacking them.
    /// A cycle that has started always finishes.
    pub async fn run_until_shutdown(
        &mut self,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), AppError> {
        log::debug!(
            "scheduler starting with interval {:?} over {} station(s)",
            self.interval,
            self.crawler.stations().len()
        );
        if self.interval.is_zero() {
            return Err(AppError::InvalidConfig(
                "crawl interval must be greater than zero",
            ));
        }
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown_rx.borrow() {
                log::debug!(
                    "scheduler received shutdown after {} cycle(s)",
                    self.cycles_completed
                );
                return Ok(());
            }

            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if shutdown_signaled(changed, &shutdown_rx) {
                        log::debug!(
                            "scheduler received shutdown after {} cycle(s)",
                            self.cycles_completed
                        );
                        return Ok(());
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if let Err(err) = self.run_cycle().await {
                log::error!(
                    "crawl stopped after {} completed cycle(s): {err}",
                    self.cycles_completed
                );
                return Err(err);
            }
        }
    }
}

fn shutdown_signaled(
    changed: Result<(), watch::error::RecvError>,
    shutdown_rx: &watch::Receiver<bool>,
) -> bool {
    changed.is_err() || *shutdown_rx.borrow()
}
