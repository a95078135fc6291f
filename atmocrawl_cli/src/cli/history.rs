use std::path::{Path, PathBuf};

use anyhow::Context;
use atmocrawl_core::StationId;
use atmocrawl_store::MeasurementStore;
use clap::Args;

use crate::settings::Settings;

#[derive(Debug, Args)]
pub(crate) struct HistoryCommand {
    /// Station MAC address.
    station: String,

    /// Only show the most recent N measurements.
    #[arg(long)]
    limit: Option<u32>,

    /// Overrides the database path from the settings file.
    #[arg(long)]
    db: Option<PathBuf>,
}

impl HistoryCommand {
    pub(crate) async fn run(&self, config_path: &Path) -> anyhow::Result<()> {
        let station_id: StationId = self
            .station
            .parse()
            .with_context(|| format!("invalid station id {:?}", self.station))?;
        let database_path = match &self.db {
            Some(db) => db.clone(),
            None => Settings::load(config_path)?.database_path().to_path_buf(),
        };

        let store = MeasurementStore::connect(&database_path)
            .await
            .with_context(|| format!("failed to open {}", database_path.display()))?;
        let measurements = store
            .measurements_for_station(&station_id, self.limit)
            .await?;

        if measurements.is_empty() {
            println!("No measurements stored for station {station_id}.");
            return Ok(());
        }

        for measurement in measurements {
            let observed_at = measurement
                .observed_at()
                .map(|ts| ts.to_string())
                .unwrap_or_else(|| measurement.time_utc.to_string());
            println!(
                "{observed_at}  co2={}ppm  noise={}dB  temperature={}C",
                measurement.co2, measurement.noise, measurement.temperature
            );
        }
        Ok(())
    }
}
