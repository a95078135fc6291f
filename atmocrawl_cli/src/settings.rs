use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use atmocrawl_app::SchedulerConfig;
use atmocrawl_core::StationId;
use atmocrawl_netatmo::{
    NetatmoConfig,
    config::{DEFAULT_BASE_URL, DEFAULT_SCOPE},
};
use serde::Deserialize;

pub(crate) const PASSWORD_ENV: &str = "NETATMO_PASSWORD";
pub(crate) const CLIENT_SECRET_ENV: &str = "NETATMO_CLIENT_SECRET";

/// Contents of the TOML settings file. Every section may be omitted; the
/// typed configs built from it are validated when a command needs them.
#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    netatmo: NetatmoSection,
    crawler: CrawlerSection,
    database: DatabaseSection,
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct NetatmoSection {
    username: String,
    password: String,
    client_id: String,
    client_secret: String,
    scope: String,
    base_url: String,
    max_failed_registrations: u32,
    /// Seconds.
    delay_registrations: u64,
    /// Seconds.
    timeout: u64,
    /// Seconds.
    refresh_skew: u64,
}

impl Default for NetatmoSection {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            scope: DEFAULT_SCOPE.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_failed_registrations: 3,
            delay_registrations: 60,
            timeout: 30,
            refresh_skew: 60,
        }
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CrawlerSection {
    /// Seconds.
    interval: u64,
    echo: bool,
    stations: Vec<String>,
}

impl Default for CrawlerSection {
    fn default() -> Self {
        Self {
            interval: 600,
            echo: false,
            stations: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DatabaseSection {
    path: PathBuf,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("atmocrawl.sqlite"),
        }
    }
}

impl Settings {
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings = Self::parse(&contents)
            .with_context(|| format!("failed to parse settings file {}", path.display()))?;
        settings.apply_env_overrides(|key| env::var(key).ok());
        Ok(settings)
    }

    fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(password) = lookup(PASSWORD_ENV) {
            self.netatmo.password = password;
        }
        if let Some(client_secret) = lookup(CLIENT_SECRET_ENV) {
            self.netatmo.client_secret = client_secret;
        }
    }

    pub(crate) fn netatmo_config(&self) -> anyhow::Result<NetatmoConfig> {
        let section = &self.netatmo;
        let config = NetatmoConfig {
            username: section.username.clone(),
            password: section.password.clone(),
            client_id: section.client_id.clone(),
            client_secret: section.client_secret.clone(),
            scope: section.scope.clone(),
            base_url: section.base_url.clone(),
            max_failed_registrations: section.max_failed_registrations,
            delay_registrations: Duration::from_secs(section.delay_registrations),
            timeout: Duration::from_secs(section.timeout),
            refresh_skew: Duration::from_secs(section.refresh_skew),
        };
        config.validate().context("invalid [netatmo] settings")?;
        Ok(config)
    }

    pub(crate) fn scheduler_config(&self) -> anyhow::Result<SchedulerConfig> {
        let stations = self
            .crawler
            .stations
            .iter()
            .map(|raw| {
                raw.parse::<StationId>()
                    .with_context(|| format!("invalid station id {raw:?} in [crawler] settings"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let config = SchedulerConfig {
            interval: Duration::from_secs(self.crawler.interval),
            echo: self.crawler.echo,
            stations,
        };
        config.validate().context("invalid [crawler] settings")?;
        Ok(config)
    }

    pub(crate) fn database_path(&self) -> &Path {
        &self.database.path
    }
}
