use tripsplit_core::TripId;

use crate::EventEnvelope;

/// Helper trait for trip-scoped messages.
///
/// Marks types carrying a trip id so infrastructure (workers, subscription
/// loops) can filter and validate by trip without knowing the payload type.
/// `EventEnvelope` implements it; a worker pinned to one trip uses it to
/// ignore everyone else's events.
pub trait TripScoped {
    fn trip_id(&self) -> TripId;
}

impl<E> TripScoped for EventEnvelope<E> {
    fn trip_id(&self) -> TripId {
        self.trip_id()
    }
}
