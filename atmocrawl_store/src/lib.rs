mod error;
mod measurements;

pub use error::StoreError;
pub use measurements::MeasurementStore;
