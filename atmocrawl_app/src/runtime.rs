use std::{path::Path, sync::Arc};

use atmocrawl_netatmo::{NetatmoConfig, NetatmoHttpClient, SessionManager, StationDataFetcher};
use atmocrawl_store::MeasurementStore;

use crate::{AppError, Crawler, Scheduler, SchedulerConfig};

pub type ProductionScheduler = Scheduler<NetatmoHttpClient, NetatmoHttpClient, MeasurementStore>;

/// Opens the store, performs the startup login and wires the scheduler.
/// A failed startup login is returned as an error.
pub async fn connect(
    netatmo: NetatmoConfig,
    scheduler: &SchedulerConfig,
    database_path: impl AsRef<Path>,
) -> Result<ProductionScheduler, AppError> {
    scheduler.validate()?;

    let store = MeasurementStore::connect(database_path).await?;
    let policy = netatmo.retry_policy();
    let refresh_skew = netatmo.refresh_skew;
    let client = NetatmoHttpClient::new(netatmo)?;

    let session = Arc::new(
        SessionManager::new(client.clone(), policy).with_refresh_skew(refresh_skew),
    );
    session.start().await?;
    log::info!("netatmo session established");

    let crawler = Crawler::new(
        StationDataFetcher::new(client, session),
        store,
        scheduler.stations.clone(),
    );
    Ok(Scheduler::new(crawler, scheduler.interval, scheduler.echo))
}
