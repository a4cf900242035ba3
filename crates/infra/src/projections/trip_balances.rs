//! Trip Balances Projection.
//!
//! Maintains per-member balances for every trip, derived from trip roster
//! events and expense events. Whenever an event lands, the projection
//! updates its trip snapshot (roster, budget, live expenses) and recomputes
//! the full settlement, so reads always reflect the latest recorded state.

use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use thiserror::Error;

use tripsplit_core::{AggregateId, TripId, UserId};
use tripsplit_events::EventEnvelope;
use tripsplit_expenses::{ExpenseAmended, ExpenseEvent, ExpenseRecorded};
use tripsplit_settlement::{
    Balance, ExpenseRecord, SettledStatus, SettlementSummary, over_budget, settle,
};
use tripsplit_trips::{Member, TripEvent};

use crate::read_model::TripStore;

const TRIP_AGGREGATE: &str = "trips.trip";
const EXPENSE_AGGREGATE: &str = "expenses.expense";

/// Trip+aggregate cursor for idempotent projection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    trip_id: TripId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum TripBalancesError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("trip isolation violation: {0}")]
    TripIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Everything needed to recompute a trip's settlement from scratch.
#[derive(Debug, Clone, Default)]
struct TripSnapshot {
    members: Vec<Member>,
    budget: Option<Decimal>,
    expenses: Vec<ExpenseRecord>,
    settled: SettledStatus,
}

/// Trip balances projection: equal-split balances per member.
///
/// Rebuildable from trip + expense events. Trip-isolated. The settled flags
/// are caller-owned state (set via [`mark_settled`], not derived from
/// events), so a rebuild preserves them.
///
/// [`mark_settled`]: TripBalancesProjection::mark_settled
#[derive(Debug)]
pub struct TripBalancesProjection<S>
where
    S: TripStore<UserId, Balance>,
{
    store: S,
    snapshots: RwLock<HashMap<TripId, TripSnapshot>>,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> TripBalancesProjection<S>
where
    S: TripStore<UserId, Balance>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            snapshots: RwLock::new(HashMap::new()),
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn get_cursor(&self, trip_id: TripId, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors
                .get(&CursorKey {
                    trip_id,
                    aggregate_id,
                })
                .unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, trip_id: TripId, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                CursorKey {
                    trip_id,
                    aggregate_id,
                },
                sequence_number,
            );
        }
    }

    fn clear_cursors(&self, trip_id: TripId) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|k, _| k.trip_id != trip_id);
        }
    }

    /// Get the balance for one member.
    pub fn get(&self, trip_id: TripId, user_id: &UserId) -> Option<Balance> {
        self.store.get(trip_id, user_id)
    }

    /// Full settlement summary for a trip (roster order, diagnostics
    /// included). Empty if the trip has no members or no live expenses.
    pub fn summary(&self, trip_id: TripId) -> SettlementSummary {
        let snapshots = match self.snapshots.read() {
            Ok(s) => s,
            Err(_) => return SettlementSummary::empty(),
        };

        match snapshots.get(&trip_id) {
            Some(snap) => settle(&snap.expenses, &snap.members, &snap.settled),
            None => SettlementSummary::empty(),
        }
    }

    /// Whether the trip's total recorded spend exceeds its budget.
    ///
    /// Always `false` when no budget is set.
    pub fn is_over_budget(&self, trip_id: TripId) -> bool {
        let snapshots = match self.snapshots.read() {
            Ok(s) => s,
            Err(_) => return false,
        };

        match snapshots.get(&trip_id) {
            Some(snap) => {
                let summary = settle(&snap.expenses, &snap.members, &snap.settled);
                over_budget(summary.total_group_expense, snap.budget)
            }
            None => false,
        }
    }

    /// Mark a member as settled and refresh the read model.
    ///
    /// One-way: there is no unmark. The flag annotates the balance display
    /// and never changes any computed amount.
    pub fn mark_settled(&self, trip_id: TripId, user_id: UserId) {
        if let Ok(mut snapshots) = self.snapshots.write() {
            let snap = snapshots.entry(trip_id).or_default();
            snap.settled.mark_settled(user_id);
            let snap = snap.clone();
            drop(snapshots);
            self.recompute(trip_id, &snap);
        }
    }

    /// Apply an envelope into the trip balances read model.
    ///
    /// Non-trip, non-expense aggregates are skipped. Already-seen sequence
    /// numbers are skipped (idempotency); gaps are rejected so a lossy bus
    /// cannot silently corrupt the read model.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), TripBalancesError> {
        let aggregate_type = envelope.aggregate_type();
        if aggregate_type != TRIP_AGGREGATE && aggregate_type != EXPENSE_AGGREGATE {
            return Ok(());
        }

        let trip_id = envelope.trip_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.get_cursor(trip_id, aggregate_id);

        if seq == 0 {
            return Err(TripBalancesError::NonMonotonicSequence { last, found: seq });
        }

        if seq <= last {
            return Ok(());
        }

        if seq != last + 1 && last != 0 {
            return Err(TripBalancesError::NonMonotonicSequence { last, found: seq });
        }

        let snapshot = {
            let mut snapshots = self
                .snapshots
                .write()
                .map_err(|_| TripBalancesError::Deserialize("lock poisoned".to_string()))?;
            let snap = snapshots.entry(trip_id).or_default();

            if aggregate_type == TRIP_AGGREGATE {
                let ev: TripEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| TripBalancesError::Deserialize(e.to_string()))?;
                check_trip(trip_event_trip_id(&ev), trip_id)?;
                apply_trip_event(snap, ev);
            } else {
                let ev: ExpenseEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| TripBalancesError::Deserialize(e.to_string()))?;
                check_trip(expense_event_trip_id(&ev), trip_id)?;
                apply_expense_event(snap, ev);
            }

            snap.clone()
        };

        self.recompute(trip_id, &snapshot);
        self.update_cursor(trip_id, aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch.
    ///
    /// Clears store state and cursors for every trip seen in the input, then
    /// replays. Settled flags survive the rebuild: they are caller-owned,
    /// not event-sourced, so dropping them would lose real state.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), TripBalancesError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| e.sequence_number());

        let mut trips = envs.iter().map(|e| e.trip_id()).collect::<Vec<_>>();
        trips.sort_by_key(|t| *t.as_uuid().as_bytes());
        trips.dedup();

        for t in trips {
            self.store.clear_trip(t);
            self.clear_cursors(t);

            if let Ok(mut snapshots) = self.snapshots.write() {
                let settled = snapshots
                    .remove(&t)
                    .map(|snap| snap.settled)
                    .unwrap_or_default();
                snapshots.insert(
                    t,
                    TripSnapshot {
                        settled,
                        ..TripSnapshot::default()
                    },
                );
            }
        }

        for env in envs {
            self.apply_envelope(&env)?;
        }

        Ok(())
    }

    /// Recompute the full settlement for a trip and replace its stored
    /// balances.
    fn recompute(&self, trip_id: TripId, snap: &TripSnapshot) {
        let summary = settle(&snap.expenses, &snap.members, &snap.settled);

        if over_budget(summary.total_group_expense, snap.budget) {
            tracing::warn!(
                trip_id = %trip_id,
                total = %summary.total_group_expense,
                budget = ?snap.budget,
                "trip spend exceeds budget"
            );
        }

        self.store.clear_trip(trip_id);
        for balance in summary.balances {
            self.store.upsert(trip_id, balance.user_id, balance);
        }
    }
}

fn check_trip(payload_trip: TripId, envelope_trip: TripId) -> Result<(), TripBalancesError> {
    if payload_trip != envelope_trip {
        return Err(TripBalancesError::TripIsolation(
            "event trip_id does not match envelope trip_id".to_string(),
        ));
    }
    Ok(())
}

fn trip_event_trip_id(ev: &TripEvent) -> TripId {
    match ev {
        TripEvent::TripCreated(e) => e.trip_id,
        TripEvent::TripRenamed(e) => e.trip_id,
        TripEvent::MemberJoined(e) => e.trip_id,
        TripEvent::MemberLeft(e) => e.trip_id,
        TripEvent::BudgetSet(e) => e.trip_id,
    }
}

fn expense_event_trip_id(ev: &ExpenseEvent) -> TripId {
    match ev {
        ExpenseEvent::ExpenseRecorded(e) => e.trip_id,
        ExpenseEvent::ExpenseAmended(e) => e.trip_id,
        ExpenseEvent::ExpenseVoided(e) => e.trip_id,
    }
}

fn apply_trip_event(snap: &mut TripSnapshot, ev: TripEvent) {
    match ev {
        // Name changes do not affect balances.
        TripEvent::TripCreated(_) | TripEvent::TripRenamed(_) => {}
        TripEvent::MemberJoined(e) => {
            if !snap.members.iter().any(|m| m.user_id == e.user_id) {
                snap.members.push(Member {
                    user_id: e.user_id,
                    name: e.name,
                });
            }
        }
        TripEvent::MemberLeft(e) => {
            // Expenses referencing the departed member go stale on purpose;
            // settle() degrades them into diagnostics.
            snap.members.retain(|m| m.user_id != e.user_id);
        }
        TripEvent::BudgetSet(e) => {
            snap.budget = e.budget;
        }
    }
}

fn apply_expense_event(snap: &mut TripSnapshot, ev: ExpenseEvent) {
    match ev {
        ExpenseEvent::ExpenseRecorded(ExpenseRecorded {
            trip_id,
            expense_id,
            details,
            ..
        })
        | ExpenseEvent::ExpenseAmended(ExpenseAmended {
            trip_id,
            expense_id,
            details,
            ..
        }) => {
            let record = ExpenseRecord {
                expense_id,
                trip_id,
                description: details.description,
                amount: details.amount,
                currency: details.currency,
                category: details.category,
                paid_by: details.paid_by,
                date: details.date,
                participants: details.participants,
            };
            match snap
                .expenses
                .iter_mut()
                .find(|r| r.expense_id == record.expense_id)
            {
                Some(existing) => *existing = record,
                None => snap.expenses.push(record),
            }
        }
        ExpenseEvent::ExpenseVoided(e) => {
            snap.expenses.retain(|r| r.expense_id != e.expense_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use tripsplit_expenses::{ExpenseCategory, ExpenseDetails, ExpenseId, ExpenseRecorded};
    use tripsplit_trips::{BudgetSet, MemberJoined, MemberLeft};

    use crate::read_model::InMemoryTripStore;

    use super::*;

    fn envelope<E: serde::Serialize>(
        trip_id: TripId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        seq: u64,
        payload: &E,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            trip_id,
            aggregate_id,
            aggregate_type,
            seq,
            serde_json::to_value(payload).unwrap(),
        )
    }

    fn member_joined(trip_id: TripId, user_id: UserId, name: &str) -> TripEvent {
        TripEvent::MemberJoined(MemberJoined {
            trip_id,
            user_id,
            name: name.to_string(),
            occurred_at: Utc::now(),
        })
    }

    fn recorded(
        trip_id: TripId,
        paid_by: UserId,
        amount: Decimal,
        participants: Vec<UserId>,
    ) -> ExpenseEvent {
        ExpenseEvent::ExpenseRecorded(ExpenseRecorded {
            trip_id,
            expense_id: ExpenseId::new(AggregateId::new()),
            details: ExpenseDetails {
                description: "groceries".to_string(),
                amount,
                currency: "EUR".to_string(),
                category: ExpenseCategory::Food,
                paid_by,
                date: NaiveDate::from_ymd_opt(2026, 8, 14).unwrap(),
                participants,
            },
            occurred_at: Utc::now(),
        })
    }

    fn projection() -> TripBalancesProjection<InMemoryTripStore<UserId, Balance>> {
        TripBalancesProjection::new(InMemoryTripStore::new())
    }

    #[test]
    fn balances_follow_roster_and_expense_events() {
        let projection = projection();
        let trip_id = TripId::new();
        let trip_agg = AggregateId::new();
        let expense_agg = AggregateId::new();

        let alice = UserId::new();
        let bob = UserId::new();

        projection
            .apply_envelope(&envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                1,
                &member_joined(trip_id, alice, "Alice"),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                2,
                &member_joined(trip_id, bob, "Bob"),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                trip_id,
                expense_agg,
                EXPENSE_AGGREGATE,
                1,
                &recorded(trip_id, alice, Decimal::from(50), vec![alice, bob]),
            ))
            .unwrap();

        let summary = projection.summary(trip_id);
        assert_eq!(summary.total_group_expense, Decimal::from(50));

        let alice_balance = projection.get(trip_id, &alice).unwrap();
        assert_eq!(alice_balance.net_balance, Decimal::from(25));
        let bob_balance = projection.get(trip_id, &bob).unwrap();
        assert_eq!(bob_balance.net_balance, Decimal::from(-25));
    }

    #[test]
    fn duplicate_sequence_numbers_are_skipped() {
        let projection = projection();
        let trip_id = TripId::new();
        let trip_agg = AggregateId::new();
        let alice = UserId::new();

        let env = envelope(
            trip_id,
            trip_agg,
            TRIP_AGGREGATE,
            1,
            &member_joined(trip_id, alice, "Alice"),
        );

        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();

        let snapshot_members = projection.summary(trip_id);
        // Redelivery must not duplicate the member.
        assert!(snapshot_members.balances.is_empty());

        let expense_agg = AggregateId::new();
        projection
            .apply_envelope(&envelope(
                trip_id,
                expense_agg,
                EXPENSE_AGGREGATE,
                1,
                &recorded(trip_id, alice, Decimal::from(10), vec![alice]),
            ))
            .unwrap();

        assert_eq!(projection.summary(trip_id).balances.len(), 1);
    }

    #[test]
    fn sequence_gap_is_rejected() {
        let projection = projection();
        let trip_id = TripId::new();
        let trip_agg = AggregateId::new();
        let alice = UserId::new();

        projection
            .apply_envelope(&envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                1,
                &member_joined(trip_id, alice, "Alice"),
            ))
            .unwrap();

        let err = projection
            .apply_envelope(&envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                3,
                &member_joined(trip_id, UserId::new(), "Bob"),
            ))
            .unwrap_err();

        match err {
            TripBalancesError::NonMonotonicSequence { last: 1, found: 3 } => {}
            other => panic!("expected NonMonotonicSequence, got {other:?}"),
        }
    }

    #[test]
    fn payload_trip_mismatch_is_rejected() {
        let projection = projection();
        let trip_id = TripId::new();
        let other_trip = TripId::new();
        let trip_agg = AggregateId::new();

        let err = projection
            .apply_envelope(&envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                1,
                &member_joined(other_trip, UserId::new(), "Mallory"),
            ))
            .unwrap_err();

        match err {
            TripBalancesError::TripIsolation(_) => {}
            other => panic!("expected TripIsolation, got {other:?}"),
        }
    }

    #[test]
    fn voiding_an_expense_removes_it_from_balances() {
        let projection = projection();
        let trip_id = TripId::new();
        let trip_agg = AggregateId::new();
        let expense_agg = AggregateId::new();
        let alice = UserId::new();

        projection
            .apply_envelope(&envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                1,
                &member_joined(trip_id, alice, "Alice"),
            ))
            .unwrap();

        let ev = recorded(trip_id, alice, Decimal::from(30), vec![alice]);
        let expense_id = match &ev {
            ExpenseEvent::ExpenseRecorded(e) => e.expense_id,
            _ => unreachable!(),
        };
        projection
            .apply_envelope(&envelope(trip_id, expense_agg, EXPENSE_AGGREGATE, 1, &ev))
            .unwrap();
        assert_eq!(
            projection.summary(trip_id).total_group_expense,
            Decimal::from(30)
        );

        projection
            .apply_envelope(&envelope(
                trip_id,
                expense_agg,
                EXPENSE_AGGREGATE,
                2,
                &ExpenseEvent::ExpenseVoided(tripsplit_expenses::ExpenseVoided {
                    trip_id,
                    expense_id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert!(projection.summary(trip_id).balances.is_empty());
    }

    #[test]
    fn departed_member_leaves_stale_expense_diagnostics() {
        let projection = projection();
        let trip_id = TripId::new();
        let trip_agg = AggregateId::new();
        let expense_agg = AggregateId::new();
        let alice = UserId::new();
        let bob = UserId::new();

        projection
            .apply_envelope(&envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                1,
                &member_joined(trip_id, alice, "Alice"),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                2,
                &member_joined(trip_id, bob, "Bob"),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                trip_id,
                expense_agg,
                EXPENSE_AGGREGATE,
                1,
                &recorded(trip_id, alice, Decimal::from(40), vec![alice, bob]),
            ))
            .unwrap();

        projection
            .apply_envelope(&envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                3,
                &TripEvent::MemberLeft(MemberLeft {
                    trip_id,
                    user_id: alice,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let summary = projection.summary(trip_id);
        // Alice paid but is gone: her payment is unattributed, Bob carries
        // his half of the share.
        assert_eq!(summary.unattributed_paid, Decimal::from(40));
        assert_eq!(summary.balances.len(), 1);
        assert_eq!(summary.balances[0].total_share, Decimal::from(20));
    }

    #[test]
    fn over_budget_is_flagged_and_logged() {
        let projection = projection();
        let trip_id = TripId::new();
        let trip_agg = AggregateId::new();
        let expense_agg = AggregateId::new();
        let alice = UserId::new();

        projection
            .apply_envelope(&envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                1,
                &member_joined(trip_id, alice, "Alice"),
            ))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                2,
                &TripEvent::BudgetSet(BudgetSet {
                    trip_id,
                    budget: Some(Decimal::from(100)),
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        projection
            .apply_envelope(&envelope(
                trip_id,
                expense_agg,
                EXPENSE_AGGREGATE,
                1,
                &recorded(trip_id, alice, Decimal::from(100), vec![alice]),
            ))
            .unwrap();
        assert!(!projection.is_over_budget(trip_id));

        projection
            .apply_envelope(&envelope(
                trip_id,
                AggregateId::new(),
                EXPENSE_AGGREGATE,
                1,
                &recorded(trip_id, alice, Decimal::new(1, 2), vec![alice]),
            ))
            .unwrap();
        assert!(projection.is_over_budget(trip_id));
    }

    #[test]
    fn settled_flags_survive_rebuild() {
        let projection = projection();
        let trip_id = TripId::new();
        let trip_agg = AggregateId::new();
        let expense_agg = AggregateId::new();
        let alice = UserId::new();
        let bob = UserId::new();

        let envs = vec![
            envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                1,
                &member_joined(trip_id, alice, "Alice"),
            ),
            envelope(
                trip_id,
                trip_agg,
                TRIP_AGGREGATE,
                2,
                &member_joined(trip_id, bob, "Bob"),
            ),
            envelope(
                trip_id,
                expense_agg,
                EXPENSE_AGGREGATE,
                1,
                &recorded(trip_id, alice, Decimal::from(20), vec![alice, bob]),
            ),
        ];

        for env in &envs {
            projection.apply_envelope(env).unwrap();
        }
        projection.mark_settled(trip_id, bob);
        assert!(projection.get(trip_id, &bob).unwrap().is_settled);

        projection.rebuild_from_scratch(envs).unwrap();

        let rebuilt = projection.get(trip_id, &bob).unwrap();
        assert!(rebuilt.is_settled);
        assert_eq!(rebuilt.net_balance, Decimal::from(-10));
    }
}
