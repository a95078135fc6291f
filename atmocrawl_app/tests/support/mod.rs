use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use atmocrawl_app::{Crawler, Scheduler};
use atmocrawl_core::{Measurement, StationId};
use atmocrawl_netatmo::{
    AuthApi, HttpReply, NetatmoError, NetatmoResult, RetryPolicy, SessionManager, StationApi,
    StationDataFetcher, TokenGrant, TransportFailure,
};
use atmocrawl_store::MeasurementStore;
use tempfile::TempDir;

pub type TestScheduler = Scheduler<ScriptedStationApi, ScriptedAuth, MeasurementStore>;

pub struct TestHarness {
    _temp_dir: TempDir,
    db_path: PathBuf,
    pub api: ScriptedStationApi,
    pub auth: ScriptedAuth,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("tempdir");
        let db_path = temp_dir.path().join("measurements.sqlite");
        Self {
            _temp_dir: temp_dir,
            db_path,
            api: ScriptedStationApi::default(),
            auth: ScriptedAuth::default(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub async fn store(&self) -> MeasurementStore {
        MeasurementStore::connect(self.db_path())
            .await
            .expect("connect store")
    }

    pub async fn scheduler(
        &self,
        stations: &[&str],
        max_failed_registrations: u32,
        interval: Duration,
    ) -> TestScheduler {
        let session = Arc::new(SessionManager::new(
            self.auth.clone(),
            RetryPolicy {
                max_failed_registrations,
                delay: Duration::ZERO,
            },
        ));
        session.start().await.expect("startup login");

        let crawler = Crawler::new(
            StationDataFetcher::new(self.api.clone(), session),
            self.store().await,
            stations.iter().map(|raw| station(raw)).collect(),
        );
        Scheduler::new(crawler, interval, false)
    }

    pub async fn stored(&self, station_mac: &str) -> Vec<Measurement> {
        self.store()
            .await
            .measurements_for_station(&station(station_mac), None)
            .await
            .expect("read measurements")
    }
}

/// Replays scripted replies in order; an exhausted script answers with an
/// empty device list.
#[derive(Clone, Default)]
pub struct ScriptedStationApi {
    replies: Arc<Mutex<VecDeque<Result<HttpReply, TransportFailure>>>>,
    tokens_seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedStationApi {
    pub fn push(&self, reply: Result<HttpReply, TransportFailure>) {
        self.replies
            .lock()
            .expect("replies lock")
            .push_back(reply);
    }

    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().expect("tokens lock").clone()
    }
}

#[async_trait]
impl StationApi for ScriptedStationApi {
    async fn get_station_data(
        &self,
        access_token: &str,
        _station_id: &StationId,
    ) -> Result<HttpReply, TransportFailure> {
        self.tokens_seen
            .lock()
            .expect("tokens lock")
            .push(access_token.to_string());
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or_else(|| Ok(reply(200, r#"{"body":{"devices":[]}}"#)))
    }
}

/// Hands out numbered tokens. Logins fail while `failing_logins` is set.
#[derive(Clone, Default)]
pub struct ScriptedAuth {
    logins: Arc<AtomicU32>,
    refreshes: Arc<AtomicU32>,
    failing_logins: Arc<Mutex<bool>>,
}

impl ScriptedAuth {
    pub fn login_calls(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn fail_logins(&self, failing: bool) {
        *self.failing_logins.lock().expect("auth lock") = failing;
    }
}

#[async_trait]
impl AuthApi for ScriptedAuth {
    async fn request_token(&self) -> NetatmoResult<TokenGrant> {
        let call = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.failing_logins.lock().expect("auth lock") {
            return Err(NetatmoError::TokenRejected {
                status: 400,
                body: r#"{"error":"invalid_grant"}"#.to_string(),
            });
        }
        Ok(grant(&format!("login-{call}")))
    }

    async fn refresh_token(&self, _refresh_token: &str) -> NetatmoResult<TokenGrant> {
        let call = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(grant(&format!("refresh-{call}")))
    }
}

fn grant(access_token: &str) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_string(),
        refresh_token: format!("{access_token}-rt"),
        expires_in: Duration::from_secs(10_800),
    }
}

pub fn reply(status: u16, body: &str) -> HttpReply {
    HttpReply {
        status,
        body: body.to_string(),
    }
}

pub fn dashboard(time_utc: i64, co2: f64, noise: f64, temperature: f64) -> HttpReply {
    reply(
        200,
        &format!(
            r#"{{"status":"ok","body":{{"devices":[{{"_id":"70:ee:50:00:00:01","dashboard_data":{{"time_utc":{time_utc},"CO2":{co2},"Noise":{noise},"Temperature":{temperature}}}}}]}}}}"#
        ),
    )
}

pub fn station(raw: &str) -> StationId {
    StationId::new(raw).expect("valid station id")
}
