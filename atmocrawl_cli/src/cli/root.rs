use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::cli::{
    auth::AuthCommand, history::HistoryCommand, once::OnceCommand, run::RunCommand,
};

pub(crate) fn get_args() -> CliOpts {
    CliOpts::parse()
}

#[derive(Debug, Parser)]
#[command(version = clap::crate_version!(), about = "Netatmo weather station crawler")]
pub(crate) struct CliOpts {
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Settings file.
    #[arg(
        short,
        long,
        global = true,
        env = "ATMOCRAWL_CONFIG",
        default_value = "atmocrawl.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    subcmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crawl on the configured interval until Ctrl+C.
    Run(RunCommand),

    /// Run a single crawl cycle and print its report.
    Once(OnceCommand),

    /// Session operations.
    Auth(AuthCommand),

    /// Print stored measurements of a station.
    History(HistoryCommand),
}

impl CliOpts {
    pub(crate) fn verbose(&self) -> u8 {
        self.verbose
    }

    pub(crate) async fn run(&self) -> anyhow::Result<()> {
        match &self.subcmd {
            Command::Run(cmd) => cmd.run(&self.config).await,
            Command::Once(cmd) => cmd.run(&self.config).await,
            Command::Auth(cmd) => cmd.run(&self.config).await,
            Command::History(cmd) => cmd.run(&self.config).await,
        }
    }
}
