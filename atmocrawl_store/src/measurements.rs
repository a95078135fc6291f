use std::{path::Path, time::Duration};

use async_trait::async_trait;
use atmocrawl_core::{InsertOutcome, Measurement, MeasurementSink, StationId};
use futures_util::TryStreamExt;
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};

use crate::StoreError;

#[derive(Clone)]
pub struct MeasurementStore {
    pool: SqlitePool,
}

impl MeasurementStore {
    pub async fn connect(database_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let connect_options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(connect_options)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn try_latest_timestamp(
        &self,
        station_id: &StationId,
    ) -> Result<Option<i64>, StoreError> {
        let latest = sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT MAX(time_utc)
            FROM measurements
            WHERE station_mac = ?1
            "#,
        )
        .bind(station_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(latest)
    }

    /// Latest stored `time_utc` of the station. Query failures are logged and
    /// reported as "nothing stored".
    pub async fn latest_timestamp(&self, station_id: &StationId) -> Option<i64> {
        match self.try_latest_timestamp(station_id).await {
            Ok(latest) => {
                log::debug!("last sync for station {station_id}: {latest:?}");
                latest
            }
            Err(err) => {
                log::warn!("could not read last sync for station {station_id}: {err}");
                None
            }
        }
    }

    /// Writes the measurement unless the latest stored reading of the station
    /// carries the same timestamp. Errors are logged and swallowed.
    pub async fn insert_if_new(&self, measurement: &Measurement) -> InsertOutcome {
        let station_id = &measurement.station_id;
        if self.latest_timestamp(station_id).await == Some(measurement.time_utc) {
            log::debug!(
                "measurement {} of station {station_id} already stored",
                measurement.time_utc
            );
            return InsertOutcome::Duplicate;
        }

        log::info!(
            "saving measurement {} of station {station_id}",
            measurement.time_utc
        );
        match self.insert(measurement).await {
            Ok(()) => InsertOutcome::Inserted,
            Err(err) => {
                log::warn!(
                    "rolled back measurement {} of station {station_id}: {err}",
                    measurement.time_utc
                );
                InsertOutcome::Failed
            }
        }
    }

    async fn insert(&self, measurement: &Measurement) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO measurements (station_mac, time_utc, co2, noise, temperature)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(measurement.station_id.as_str())
        .bind(measurement.time_utc)
        .bind(measurement.co2)
        .bind(measurement.noise)
        .bind(measurement.temperature)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit().await?;
                Ok(())
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err.into())
            }
        }
    }

    /// Stored measurements of a station, oldest first.
    pub async fn measurements_for_station(
        &self,
        station_id: &StationId,
        limit: Option<u32>,
    ) -> Result<Vec<Measurement>, StoreError> {
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut rows = sqlx::query_as::<_, DbMeasurement>(
            r#"
            SELECT station_mac, time_utc, co2, noise, temperature
            FROM (
                SELECT station_mac, time_utc, co2, noise, temperature
                FROM measurements
                WHERE station_mac = ?1
                ORDER BY time_utc DESC
                LIMIT ?2
            )
            ORDER BY time_utc ASC
            "#,
        )
        .bind(station_id.as_str())
        .bind(limit)
        .fetch(&self.pool);

        let mut measurements = Vec::new();
        while let Some(row) = rows.try_next().await? {
            measurements.push(Measurement::try_from(row)?);
        }

        Ok(measurements)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl MeasurementSink for MeasurementStore {
    async fn latest_timestamp(&self, station_id: &StationId) -> Option<i64> {
        MeasurementStore::latest_timestamp(self, station_id).await
    }

    async fn insert_if_new(&self, measurement: &Measurement) -> InsertOutcome {
        MeasurementStore::insert_if_new(self, measurement).await
    }
}

#[derive(Debug, FromRow)]
struct DbMeasurement {
    station_mac: String,
    time_utc: i64,
    co2: i32,
    noise: i32,
    temperature: i32,
}

impl TryFrom<DbMeasurement> for Measurement {
    type Error = StoreError;

    fn try_from(value: DbMeasurement) -> Result<Self, Self::Error> {
        Ok(Self {
            station_id: StationId::new(value.station_mac)?,
            time_utc: value.time_utc,
            co2: value.co2,
            noise: value.noise,
            temperature: value.temperature,
        })
    }
}
