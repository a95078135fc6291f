pub mod ids;
pub mod measurement;
pub mod time;

pub use ids::{StationId, StationIdError};
pub use measurement::{InsertOutcome, Measurement, MeasurementSink};
pub use time::Timestamp;
