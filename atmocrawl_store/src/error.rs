use atmocrawl_core::StationIdError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("stored station id is invalid: {0}")]
    InvalidStationId(#[from] StationIdError),
}
