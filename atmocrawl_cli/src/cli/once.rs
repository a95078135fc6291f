use std::path::{Path, PathBuf};

use clap::Args;

use crate::cli::common::connect_scheduler;

#[derive(Debug, Args)]
pub(crate) struct OnceCommand {
    /// Overrides the database path from the settings file.
    #[arg(long)]
    db: Option<PathBuf>,
}

impl OnceCommand {
    pub(crate) async fn run(&self, config_path: &Path) -> anyhow::Result<()> {
        let mut scheduler = connect_scheduler(config_path, self.db.as_ref()).await?;
        let report = scheduler.run_cycle().await?;

        println!("Stations: {}", scheduler.crawler().stations().len());
        println!("Fetched: {}", report.fetched);
        println!("Inserted: {}", report.inserted);
        println!("Already stored: {}", report.duplicates);
        println!("Store failures: {}", report.store_failures);
        println!("No data: {}", report.no_data);
        println!("Declined: {}", report.declined);
        Ok(())
    }
}
