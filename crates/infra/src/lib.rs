//! Infrastructure layer: event store, command dispatch, read models.
//!
//! Everything here is in-process and in-memory, the stand-in for the
//! externally-hosted persistence/sync layer the application talks to. The
//! domain crates stay pure; this crate wires them together.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod workers;


pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, PublishingEventStore, StoredEvent,
    UncommittedEvent,
};
pub use projections::{TripBalancesError, TripBalancesProjection};
pub use read_model::{InMemoryTripStore, TripStore};
pub use workers::{ProjectionWorker, WorkerHandle};
