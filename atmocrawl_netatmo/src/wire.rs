//! Response bodies of the Netatmo endpoints this crate talks to.

use atmocrawl_core::{Measurement, StationId};
use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct StationsDataEnvelope {
    body: StationsDataBody,
}

#[derive(Debug, Deserialize)]
struct StationsDataBody {
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
struct Device {
    dashboard_data: DashboardData,
}

#[derive(Debug, Deserialize)]
struct DashboardData {
    time_utc: i64,
    #[serde(rename = "CO2", deserialize_with = "whole_number")]
    co2: i32,
    #[serde(rename = "Noise", deserialize_with = "whole_number")]
    noise: i32,
    #[serde(rename = "Temperature", deserialize_with = "whole_number")]
    temperature: i32,
}

/// Builds a measurement from the first device of a `getstationsdata` body.
///
/// `Ok(None)` means the body was well formed but listed no devices.
pub(crate) fn parse_station_data(
    body: &str,
    station_id: &StationId,
) -> Result<Option<Measurement>, serde_json::Error> {
    let envelope: StationsDataEnvelope = serde_json::from_str(body)?;
    let Some(device) = envelope.body.devices.into_iter().next() else {
        return Ok(None);
    };

    let dashboard = device.dashboard_data;
    Ok(Some(Measurement {
        station_id: station_id.clone(),
        time_utc: dashboard.time_utc,
        co2: dashboard.co2,
        noise: dashboard.noise,
        temperature: dashboard.temperature,
    }))
}

// Netatmo reports temperatures with one decimal; the store keeps integers.
fn whole_number<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(serde::de::Error::custom("expected a finite number"));
    }
    Ok(value.round() as i32)
}
