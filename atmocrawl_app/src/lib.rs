mod config;
mod crawler;
mod error;
mod runtime;
mod scheduler;

pub use config::SchedulerConfig;
pub use crawler::{Crawler, CycleReport};
pub use error::AppError;
pub use runtime::{ProductionScheduler, connect};
pub use scheduler::Scheduler;
