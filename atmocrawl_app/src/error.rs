#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("store error: {0}")]
    Store(#[from] atmocrawl_store::StoreError),

    #[error("netatmo error: {0}")]
    Netatmo(#[from] atmocrawl_netatmo::NetatmoError),

    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}
