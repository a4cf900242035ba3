//! Disposable read models (projected state, rebuildable from events).

pub mod trip_store;

pub use trip_store::{InMemoryTripStore, TripStore};
