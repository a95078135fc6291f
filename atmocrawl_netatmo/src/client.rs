use std::time::Duration;

use async_trait::async_trait;
use atmocrawl_core::StationId;

use crate::{NetatmoError, NetatmoResult, config::NetatmoConfig, wire::TokenResponse};

const TOKEN_PATH: &str = "/oauth2/token";
const STATION_DATA_PATH: &str = "/api/getstationsdata";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: Duration,
}

/// Status and raw body of a station data request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportFailure {
    /// Connecting failed, or the connection broke while sending the request
    /// or reading the body.
    Connection(String),
    Timeout(String),
    /// Builder, redirect and decode errors.
    Other(String),
}

impl From<reqwest::Error> for TransportFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            Self::Connection(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

#[async_trait]
pub trait AuthApi {
    /// Password grant: exchanges the configured credentials for tokens.
    async fn request_token(&self) -> NetatmoResult<TokenGrant>;
    async fn refresh_token(&self, refresh_token: &str) -> NetatmoResult<TokenGrant>;
}

#[async_trait]
pub trait StationApi {
    async fn get_station_data(
        &self,
        access_token: &str,
        station_id: &StationId,
    ) -> Result<HttpReply, TransportFailure>;
}

#[derive(Clone)]
pub struct NetatmoHttpClient {
    http: reqwest::Client,
    config: NetatmoConfig,
}

impl NetatmoHttpClient {
    pub fn new(config: NetatmoConfig) -> NetatmoResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("atmocrawl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> NetatmoResult<TokenGrant> {
        let response = self
            .http
            .post(self.config.endpoint(TOKEN_PATH))
            .form(form)
            .timeout(self.config.timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(NetatmoError::TokenRejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: Duration::from_secs(token.expires_in),
        })
    }
}

#[async_trait]
impl AuthApi for NetatmoHttpClient {
    async fn request_token(&self) -> NetatmoResult<TokenGrant> {
        log::debug!(
            "requesting netatmo token for {} (scope {})",
            self.config.username,
            self.config.scope
        );
        self.token_request(&[
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
            ("scope", self.config.scope.as_str()),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> NetatmoResult<TokenGrant> {
        log::debug!("refreshing netatmo access token");
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ])
        .await
    }
}

#[async_trait]
impl StationApi for NetatmoHttpClient {
    async fn get_station_data(
        &self,
        access_token: &str,
        station_id: &StationId,
    ) -> Result<HttpReply, TransportFailure> {
        let response = self
            .http
            .get(self.config.endpoint(STATION_DATA_PATH))
            .query(&[
                ("device_id", station_id.as_str()),
                ("get_favorites", "false"),
            ])
            .bearer_auth(access_token)
            .timeout(self.config.timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }
}
