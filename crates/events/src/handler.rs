use crate::{Command, Event};

/// Handles a command and emits events (command handler abstraction).
///
/// A standalone command → events interface, independent of the aggregate
/// lifecycle. Useful for workers and tests that don't need rehydration or
/// version tracking; errors stay domain-specific via the associated type.
pub trait CommandHandler {
    type Cmd: Command;
    type Ev: Event;
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn handle(&self, command: Self::Cmd) -> Result<Vec<Self::Ev>, Self::Error>;
}

/// Execute an aggregate command deterministically (no IO, no async).
///
/// The canonical event-sourced lifecycle in one step:
///
/// 1. **Decide**: `aggregate.handle(command)` produces events (pure).
/// 2. **Evolve**: each event is applied via `aggregate.apply(event)`.
///
/// This mutates the aggregate in place and is meant for tests and inline
/// processing. For the full pipeline with persistence and publication use
/// `CommandDispatcher::dispatch` in the infra crate.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: tripsplit_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use tripsplit_core::{Aggregate, AggregateId, AggregateRoot, DomainError};

    use super::*;

    #[derive(Debug, Clone)]
    struct Bump {
        aggregate_id: AggregateId,
        by: i64,
        occurred_at: DateTime<Utc>,
    }

    impl Command for Bump {
        fn target_aggregate_id(&self) -> AggregateId {
            self.aggregate_id
        }
    }

    #[derive(Debug, Clone)]
    struct Bumped {
        by: i64,
        occurred_at: DateTime<Utc>,
    }

    impl Event for Bumped {
        fn event_type(&self) -> &'static str {
            "test.counter.bumped"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.occurred_at
        }
    }

    #[derive(Debug)]
    struct Counter {
        id: AggregateId,
        value: i64,
        version: u64,
    }

    impl AggregateRoot for Counter {
        type Id = AggregateId;

        fn id(&self) -> &Self::Id {
            &self.id
        }

        fn version(&self) -> u64 {
            self.version
        }
    }

    impl Aggregate for Counter {
        type Command = Bump;
        type Event = Bumped;
        type Error = DomainError;

        fn apply(&mut self, event: &Self::Event) {
            self.value += event.by;
            self.version += 1;
        }

        fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
            if command.by == 0 {
                return Err(DomainError::validation("bump must be non-zero"));
            }
            Ok(vec![Bumped {
                by: command.by,
                occurred_at: command.occurred_at,
            }])
        }
    }

    #[test]
    fn execute_decides_then_evolves() {
        let mut counter = Counter {
            id: AggregateId::new(),
            value: 0,
            version: 0,
        };

        let cmd = Bump {
            aggregate_id: counter.id,
            by: 3,
            occurred_at: Utc::now(),
        };
        let events = execute(&mut counter, &cmd).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "test.counter.bumped");
        assert_eq!(counter.value, 3);
        assert_eq!(counter.version(), 1);
    }

    struct StatelessBumper;

    impl CommandHandler for StatelessBumper {
        type Cmd = Bump;
        type Ev = Bumped;
        type Error = DomainError;

        fn handle(&self, command: Self::Cmd) -> Result<Vec<Self::Ev>, Self::Error> {
            Ok(vec![Bumped {
                by: command.by,
                occurred_at: command.occurred_at,
            }])
        }
    }

    #[test]
    fn command_handler_emits_events_without_aggregate_state() {
        let handler = StatelessBumper;
        let aggregate_id = AggregateId::new();

        let cmd = Bump {
            aggregate_id,
            by: 5,
            occurred_at: Utc::now(),
        };
        assert_eq!(cmd.target_aggregate_id(), aggregate_id);

        let events = handler.handle(cmd).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].by, 5);
    }

    #[test]
    fn execute_leaves_state_untouched_on_rejection() {
        let mut counter = Counter {
            id: AggregateId::new(),
            value: 7,
            version: 2,
        };

        let cmd = Bump {
            aggregate_id: counter.id,
            by: 0,
            occurred_at: Utc::now(),
        };
        let err = execute(&mut counter, &cmd).unwrap_err();

        match err {
            DomainError::Validation(_) => {}
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(counter.value, 7);
        assert_eq!(counter.version(), 2);
    }
}
