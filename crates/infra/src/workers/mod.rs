//! Background workers (projection runners, schedulers).

pub mod projection_worker;

pub use projection_worker::{ProjectionWorker, WorkerHandle};
