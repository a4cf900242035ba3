use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use tripsplit_core::{TripId, UserId, ValueObject};
use tripsplit_expenses::{ExpenseCategory, ExpenseId};
use tripsplit_trips::Member;

/// Calculator input: one live (non-void) shared cost.
///
/// This is a flat snapshot supplied by the caller (in practice the
/// `TripBalances` read model), not the expense aggregate itself. `paid_by`
/// and `participants` may reference users who have since left the roster;
/// the calculator tolerates stale ids by exclusion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub expense_id: ExpenseId,
    pub trip_id: TripId,
    pub description: String,
    /// Non-negative amount, full precision.
    pub amount: Decimal,
    /// Currency code as entered; the group total sums amounts regardless of
    /// currency.
    pub currency: String,
    pub category: ExpenseCategory,
    pub paid_by: UserId,
    pub date: NaiveDate,
    /// Ordered set of users sharing the cost equally.
    pub participants: Vec<UserId>,
}

impl ValueObject for ExpenseRecord {}

/// Derived balance for one roster member. Never persisted.
///
/// `net_balance = total_paid - total_share`; positive means the group owes
/// this member, negative means this member owes the group. `is_settled` is
/// copied from the caller-owned settled-status map, never derived from the
/// balance sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: UserId,
    pub user_name: String,
    pub total_paid: Decimal,
    pub total_share: Decimal,
    pub net_balance: Decimal,
    pub is_settled: bool,
}

impl ValueObject for Balance {}

/// Output of one settlement pass.
///
/// `unattributed_paid` and `unshared_amount` surface the amounts the
/// permissive contract silently drops from individual balances: payments
/// fronted by someone no longer on the roster, and expenses whose listed
/// participants have all left. Both still count toward the group total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub total_group_expense: Decimal,
    /// One balance per roster member, in roster (join) order.
    pub balances: Vec<Balance>,
    pub unattributed_paid: Decimal,
    pub unshared_amount: Decimal,
}

impl SettlementSummary {
    pub fn empty() -> Self {
        Self {
            total_group_expense: Decimal::ZERO,
            balances: Vec::new(),
            unattributed_paid: Decimal::ZERO,
            unshared_amount: Decimal::ZERO,
        }
    }

    pub fn balance_for(&self, user_id: UserId) -> Option<&Balance> {
        self.balances.iter().find(|b| b.user_id == user_id)
    }

    /// Pure comparison against an optional configured budget, re-evaluated
    /// on every recomputation; no state is kept between calls.
    pub fn is_over_budget(&self, budget: Option<Decimal>) -> bool {
        over_budget(self.total_group_expense, budget)
    }
}

/// Caller-owned map of manually settled members.
///
/// Settling is an external action ("paid me back in cash"): the only
/// mutation is flipping a member's flag to `true`. There is no un-settle,
/// and the calculator treats the flags as opaque input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledStatus {
    flags: HashMap<UserId, bool>,
}

impl SettledStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a member's debt as cleared outside the system.
    pub fn mark_settled(&mut self, user_id: UserId) {
        self.flags.insert(user_id, true);
    }

    /// Unknown members default to not settled.
    pub fn is_settled(&self, user_id: UserId) -> bool {
        self.flags.get(&user_id).copied().unwrap_or(false)
    }
}

/// Compute the group total and one balance per roster member.
///
/// The calculation is a pure function of its three inputs and never fails:
/// absent or empty inputs yield the empty summary, and ill-formed
/// references (stale payer, no eligible participant) degrade by exclusion
/// while being surfaced in the summary's diagnostic fields.
///
/// Expense order does not affect the result; all accumulation is
/// commutative addition. Division keeps full `Decimal` precision; display
/// truncation is left to [`truncate_for_display`] and is never fed back in.
pub fn settle(
    expenses: &[ExpenseRecord],
    members: &[Member],
    settled: &SettledStatus,
) -> SettlementSummary {
    // Empty state, not an error: a trip with nobody in it (or nothing spent
    // yet) has no balances to show.
    if members.is_empty() || expenses.is_empty() {
        return SettlementSummary::empty();
    }

    let mut paid: HashMap<UserId, Decimal> = HashMap::with_capacity(members.len());
    let mut share: HashMap<UserId, Decimal> = HashMap::with_capacity(members.len());
    for m in members {
        paid.insert(m.user_id, Decimal::ZERO);
        share.insert(m.user_id, Decimal::ZERO);
    }

    let mut total = Decimal::ZERO;
    let mut unattributed_paid = Decimal::ZERO;
    let mut unshared_amount = Decimal::ZERO;

    for expense in expenses {
        total += expense.amount;

        match paid.get_mut(&expense.paid_by) {
            Some(p) => *p += expense.amount,
            // Stale payer: the amount counts toward the total but credits
            // nobody.
            None => unattributed_paid += expense.amount,
        }

        // Eligible participants: listed, still on the roster, counted once.
        let mut eligible: Vec<UserId> = Vec::with_capacity(expense.participants.len());
        for participant in &expense.participants {
            if share.contains_key(participant) && !eligible.contains(participant) {
                eligible.push(*participant);
            }
        }

        if eligible.is_empty() {
            // Everyone listed has left the trip: nothing to split.
            unshared_amount += expense.amount;
            continue;
        }

        let share_per_head = expense.amount / Decimal::from(eligible.len());
        for participant in eligible {
            if let Some(s) = share.get_mut(&participant) {
                *s += share_per_head;
            }
        }
    }

    let balances = members
        .iter()
        .map(|m| {
            let total_paid = paid.get(&m.user_id).copied().unwrap_or(Decimal::ZERO);
            let total_share = share.get(&m.user_id).copied().unwrap_or(Decimal::ZERO);
            Balance {
                user_id: m.user_id,
                user_name: m.name.clone(),
                total_paid,
                total_share,
                net_balance: total_paid - total_share,
                is_settled: settled.is_settled(m.user_id),
            }
        })
        .collect();

    SettlementSummary {
        total_group_expense: total,
        balances,
        unattributed_paid,
        unshared_amount,
    }
}

/// `true` when a budget is configured and the running total exceeds it.
pub fn over_budget(total: Decimal, budget: Option<Decimal>) -> bool {
    budget.is_some_and(|b| total > b)
}

/// Truncate an amount to two decimal places for display.
///
/// Presentation only: the ledger keeps full precision between
/// recomputations, so displayed shares may not sum back to the displayed
/// amount. That discrepancy is cosmetic and is deliberately not distributed
/// back into anyone's balance.
pub fn truncate_for_display(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::ToZero)
}
