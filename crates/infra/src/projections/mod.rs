//! Projection implementations (read model builders).
//!
//! Projections consume domain events and build query-optimized read models.
//! All projections are:
//! - **Rebuildable**: Can be reconstructed from the event stream
//! - **Trip-isolated**: Data is partitioned by trip
//! - **Idempotent**: Safe for at-least-once delivery

pub mod trip_balances;

pub use trip_balances::{TripBalancesError, TripBalancesProjection};
