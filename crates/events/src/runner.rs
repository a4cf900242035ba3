//! Projection runner utilities (read model builders).
//!
//! Read models are **disposable**; events are the source of truth. This
//! module provides deterministic replay and cursor tracking without making
//! storage assumptions.

use tripsplit_core::TripId;

use crate::{EventEnvelope, Projection};

/// Tracks projection progress for a single trip.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProjectionCursor {
    trip_id: TripId,
    last_sequence_number: u64,
}

impl ProjectionCursor {
    pub fn trip_id(&self) -> TripId {
        self.trip_id
    }

    pub fn last_sequence_number(&self) -> u64 {
        self.last_sequence_number
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    TripMismatch { expected: TripId, found: TripId },
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Runs envelopes through a projection and tracks progress.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursor: Option<ProjectionCursor>,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursor: None,
        }
    }

    /// Create a runner pinned to a specific trip.
    ///
    /// This prevents accidentally starting a projection with an event from
    /// the wrong trip.
    pub fn new_for_trip(trip_id: TripId, projection: P) -> Self {
        Self {
            projection,
            cursor: Some(ProjectionCursor {
                trip_id,
                last_sequence_number: 0,
            }),
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn projection_mut(&mut self) -> &mut P {
        &mut self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    /// Current cursor for this projection (if any envelopes were applied).
    pub fn cursor(&self) -> Option<ProjectionCursor> {
        self.cursor
    }

    /// Apply a single envelope, enforcing trip consistency and monotonic
    /// sequencing.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) -> Result<(), ProjectionError> {
        let found_trip = envelope.trip_id();
        let found_seq = envelope.sequence_number();

        match self.cursor {
            None => {
                self.projection.apply(envelope);
                self.cursor = Some(ProjectionCursor {
                    trip_id: found_trip,
                    last_sequence_number: found_seq,
                });
                Ok(())
            }
            Some(mut c) => {
                if c.trip_id != found_trip {
                    return Err(ProjectionError::TripMismatch {
                        expected: c.trip_id,
                        found: found_trip,
                    });
                }
                if found_seq <= c.last_sequence_number {
                    return Err(ProjectionError::NonMonotonicSequence {
                        last: c.last_sequence_number,
                        found: found_seq,
                    });
                }

                self.projection.apply(envelope);
                c.last_sequence_number = found_seq;
                self.cursor = Some(c);
                Ok(())
            }
        }
    }

    /// Apply many envelopes in order.
    pub fn run<'a>(
        &mut self,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<(), ProjectionError>
    where
        P::Ev: 'a,
    {
        for env in envelopes {
            self.apply(env)?;
        }
        Ok(())
    }

    /// Rebuild a projection from scratch by replaying the full event history.
    ///
    /// The factory is used to create a fresh projection instance.
    pub fn rebuild_from_scratch<'a>(
        factory: impl FnOnce() -> P,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<(P, Option<ProjectionCursor>), ProjectionError>
    where
        P::Ev: 'a,
    {
        let mut runner = ProjectionRunner::new(factory());
        runner.run(envelopes)?;
        Ok((runner.projection, runner.cursor))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use tripsplit_core::AggregateId;

    use crate::Event;

    use super::*;

    #[derive(Debug, Clone)]
    struct Ticked {
        occurred_at: DateTime<Utc>,
    }

    impl Event for Ticked {
        fn event_type(&self) -> &'static str {
            "test.clock.ticked"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.occurred_at
        }
    }

    #[derive(Debug, Default)]
    struct TickCount {
        ticks: u64,
    }

    impl Projection for TickCount {
        type Ev = Ticked;

        fn apply(&mut self, _envelope: &EventEnvelope<Self::Ev>) {
            self.ticks += 1;
        }
    }

    fn envelope(trip_id: TripId, seq: u64) -> EventEnvelope<Ticked> {
        EventEnvelope::new(
            Uuid::now_v7(),
            trip_id,
            AggregateId::new(),
            "test.clock",
            seq,
            Ticked {
                occurred_at: Utc::now(),
            },
        )
    }

    #[test]
    fn runner_applies_in_order_and_tracks_cursor() {
        let trip_id = TripId::new();
        let mut runner = ProjectionRunner::new(TickCount::default());

        runner
            .run([&envelope(trip_id, 1), &envelope(trip_id, 2)])
            .unwrap();

        assert_eq!(runner.projection().ticks, 2);
        let cursor = runner.cursor().unwrap();
        assert_eq!(cursor.trip_id(), trip_id);
        assert_eq!(cursor.last_sequence_number(), 2);
    }

    #[test]
    fn runner_rejects_sequence_regressions() {
        let trip_id = TripId::new();
        let mut runner = ProjectionRunner::new(TickCount::default());

        runner.apply(&envelope(trip_id, 2)).unwrap();
        let err = runner.apply(&envelope(trip_id, 2)).unwrap_err();

        match err {
            ProjectionError::NonMonotonicSequence { last: 2, found: 2 } => {}
            other => panic!("expected NonMonotonicSequence, got {other:?}"),
        }
        assert_eq!(runner.projection().ticks, 1);
    }

    #[test]
    fn pinned_runner_rejects_foreign_trips() {
        let trip_id = TripId::new();
        let mut runner = ProjectionRunner::new_for_trip(trip_id, TickCount::default());

        let err = runner.apply(&envelope(TripId::new(), 1)).unwrap_err();
        match err {
            ProjectionError::TripMismatch { expected, .. } => assert_eq!(expected, trip_id),
            other => panic!("expected TripMismatch, got {other:?}"),
        }
        assert_eq!(runner.projection().ticks, 0);
    }

    #[test]
    fn rebuild_from_scratch_replays_into_a_fresh_projection() {
        let trip_id = TripId::new();
        let history = [
            envelope(trip_id, 1),
            envelope(trip_id, 2),
            envelope(trip_id, 3),
        ];

        let (projection, cursor) =
            ProjectionRunner::rebuild_from_scratch(TickCount::default, history.iter()).unwrap();

        assert_eq!(projection.ticks, 3);
        assert_eq!(cursor.unwrap().last_sequence_number(), 3);
    }
}
