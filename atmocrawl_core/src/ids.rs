use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Longest identifier the `measurements.station_mac` column is sized for.
pub const STATION_ID_MAX_LEN: usize = 17;

/// Netatmo device identifier, the MAC address of the base station.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct StationId(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StationIdError {
    #[error("station id must not be empty")]
    Empty,
    #[error("station id '{0}' is longer than {STATION_ID_MAX_LEN} characters")]
    TooLong(String),
}

impl StationId {
    pub fn new(raw: impl Into<String>) -> Result<Self, StationIdError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(StationIdError::Empty);
        }
        if trimmed.len() > STATION_ID_MAX_LEN {
            return Err(StationIdError::TooLong(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StationId {
    type Err = StationIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for StationId {
    type Error = StationIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StationId> for String {
    fn from(value: StationId) -> Self {
        value.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
