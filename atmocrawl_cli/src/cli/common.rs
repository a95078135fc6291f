use std::path::{Path, PathBuf};

use anyhow::Context;
use atmocrawl_app::ProductionScheduler;
use atmocrawl_core::Timestamp;

use crate::settings::Settings;

/// Loads settings and connects the scheduler. `db` overrides the database
/// path from the settings file.
pub(crate) async fn connect_scheduler(
    config_path: &Path,
    db: Option<&PathBuf>,
) -> anyhow::Result<ProductionScheduler> {
    let settings = Settings::load(config_path)?;
    let netatmo = settings.netatmo_config()?;
    let scheduler = settings.scheduler_config()?;
    let database_path = db.map_or_else(|| settings.database_path(), PathBuf::as_path);

    println!("Persisting measurements to {}", database_path.display());
    atmocrawl_app::connect(netatmo, &scheduler, database_path)
        .await
        .context("failed to start crawler")
}

pub(crate) fn print_expiry(access_expires_at: Timestamp) {
    let valid_for = access_expires_at
        .signed_duration_since(Timestamp::now())
        .num_seconds();

    println!(
        "Valid until: {access_expires_at} ({})",
        if valid_for >= 0 {
            format!("in {valid_for}s")
        } else {
            format!("expired {}s ago", -valid_for)
        }
    );
}
