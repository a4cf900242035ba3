use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Projections are the read side: they turn recorded facts into queryable
/// state. Read models are **disposable**; events are the source of truth,
/// and any projection can be deleted and rebuilt by replaying its streams.
///
/// ## Idempotency
///
/// Delivery is at-least-once, so applying the same event twice must produce
/// the same result. `ProjectionRunner` helps by tracking sequence numbers
/// and rejecting regressions, but projections should stay idempotent at the
/// domain level too.
///
/// ## Trip isolation
///
/// The envelope carries a `trip_id`; projections must scope all read-model
/// updates to that trip.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    ///
    /// Does not return errors: an irrelevant event is ignored, a bad one is
    /// logged and skipped. For structured error handling use
    /// `ProjectionRunner::apply`, which returns `ProjectionError`.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
