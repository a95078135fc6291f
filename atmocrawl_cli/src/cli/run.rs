use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use tokio::sync::watch;

use crate::cli::common::connect_scheduler;

#[derive(Debug, Args)]
pub(crate) struct RunCommand {
    /// Overrides the database path from the settings file.
    #[arg(long)]
    db: Option<PathBuf>,
}

impl RunCommand {
    pub(crate) async fn run(&self, config_path: &Path) -> anyhow::Result<()> {
        let mut scheduler = connect_scheduler(config_path, self.db.as_ref()).await?;
        println!(
            "Crawling {} station(s). Press Ctrl+C to stop.",
            scheduler.crawler().stations().len()
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut crawl_task =
            tokio::spawn(async move { scheduler.run_until_shutdown(shutdown_rx).await });

        tokio::select! {
            outcome = &mut crawl_task => {
                return match outcome {
                    Ok(Ok(())) => {
                        eprintln!("Crawler exited cleanly.");
                        Ok(())
                    }
                    Ok(Err(error)) => Err(error).context("crawler stopped"),
                    Err(error) => Err(error).context("crawler task join failed"),
                };
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping crawler after the current cycle...");
                let _ = shutdown_tx.send(true);
            }
        }

        crawl_task
            .await
            .context("crawler task join failed")?
            .context("crawler stopped")
    }
}
