use std::path::Path;

use anyhow::Context;
use atmocrawl_netatmo::{NetatmoHttpClient, SessionManager};
use clap::{Args, Subcommand};

use crate::{cli::common::print_expiry, settings::Settings};

#[derive(Debug, Args)]
pub(crate) struct AuthCommand {
    #[command(subcommand)]
    subcmd: AuthSubcommand,
}

#[derive(Debug, Subcommand)]
enum AuthSubcommand {
    /// Log in with the configured credentials and report token expiry.
    Check(CheckCommand),
}

impl AuthCommand {
    pub(crate) async fn run(&self, config_path: &Path) -> anyhow::Result<()> {
        match &self.subcmd {
            AuthSubcommand::Check(cmd) => cmd.run(config_path).await,
        }
    }
}

#[derive(Debug, Args)]
struct CheckCommand {}

impl CheckCommand {
    async fn run(&self, config_path: &Path) -> anyhow::Result<()> {
        let config = Settings::load(config_path)?.netatmo_config()?;
        let username = config.username.clone();
        let policy = config.retry_policy();
        let refresh_skew = config.refresh_skew;

        let client = NetatmoHttpClient::new(config).context("failed to create netatmo client")?;
        let session = SessionManager::new(client, policy).with_refresh_skew(refresh_skew);
        session
            .start()
            .await
            .with_context(|| format!("authentication failed for {username}"))?;

        println!("Authenticated as {username}.");
        match session.access_expires_at().await {
            Some(access_expires_at) => print_expiry(access_expires_at),
            None => println!("No session available."),
        }
        Ok(())
    }
}
