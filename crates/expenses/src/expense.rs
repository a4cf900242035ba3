use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tripsplit_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TripId, UserId};
use tripsplit_events::Event;

/// Expense identifier (trip-scoped via `trip_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(pub AggregateId);

impl ExpenseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Expense category (mirrors the categories offered by the entry form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Food,
    Transport,
    Accommodation,
    Activities,
    Shopping,
    Other,
}

/// Expense status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    Recorded,
    Void,
}

/// The mutable facts of one shared cost, as entered through the form.
///
/// `participants` is an ordered set: who shares the cost equally.
/// `paid_by` fronted the money and need not be a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDetails {
    pub description: String,
    /// Non-negative amount, full precision.
    pub amount: Decimal,
    /// Currency code as entered; amounts are never converted.
    pub currency: String,
    pub category: ExpenseCategory,
    pub paid_by: UserId,
    pub date: NaiveDate,
    pub participants: Vec<UserId>,
}

impl ExpenseDetails {
    /// Validate and normalize: trims nothing away except duplicate
    /// participants (first occurrence wins, order preserved).
    fn validated(&self) -> Result<ExpenseDetails, DomainError> {
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("description cannot be empty"));
        }
        if self.amount.is_sign_negative() {
            return Err(DomainError::validation("amount cannot be negative"));
        }
        if self.currency.trim().is_empty() {
            return Err(DomainError::validation("currency cannot be empty"));
        }

        let mut participants: Vec<UserId> = Vec::with_capacity(self.participants.len());
        for id in &self.participants {
            if !participants.contains(id) {
                participants.push(*id);
            }
        }
        if participants.is_empty() {
            return Err(DomainError::validation(
                "an expense needs at least one participant",
            ));
        }

        Ok(ExpenseDetails {
            participants,
            ..self.clone()
        })
    }
}

/// Aggregate root: Expense (one shared cost).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    id: ExpenseId,
    trip_id: Option<TripId>,
    details: Option<ExpenseDetails>,
    status: ExpenseStatus,
    version: u64,
    created: bool,
}

impl Expense {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ExpenseId) -> Self {
        Self {
            id,
            trip_id: None,
            details: None,
            status: ExpenseStatus::Recorded,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ExpenseId {
        self.id
    }

    pub fn trip_id(&self) -> Option<TripId> {
        self.trip_id
    }

    pub fn status(&self) -> ExpenseStatus {
        self.status
    }

    pub fn details(&self) -> Option<&ExpenseDetails> {
        self.details.as_ref()
    }

    /// Invariant: a voided expense is frozen.
    pub fn can_amend(&self) -> bool {
        self.created && self.status == ExpenseStatus::Recorded
    }
}

impl AggregateRoot for Expense {
    type Id = ExpenseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordExpense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordExpense {
    pub trip_id: TripId,
    pub expense_id: ExpenseId,
    pub details: ExpenseDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AmendExpense (full replacement of the entered facts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendExpense {
    pub trip_id: TripId,
    pub expense_id: ExpenseId,
    pub details: ExpenseDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VoidExpense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidExpense {
    pub trip_id: TripId,
    pub expense_id: ExpenseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCommand {
    RecordExpense(RecordExpense),
    AmendExpense(AmendExpense),
    VoidExpense(VoidExpense),
}

/// Event: ExpenseRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecorded {
    pub trip_id: TripId,
    pub expense_id: ExpenseId,
    pub details: ExpenseDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpenseAmended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseAmended {
    pub trip_id: TripId,
    pub expense_id: ExpenseId,
    pub details: ExpenseDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpenseVoided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseVoided {
    pub trip_id: TripId,
    pub expense_id: ExpenseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseEvent {
    ExpenseRecorded(ExpenseRecorded),
    ExpenseAmended(ExpenseAmended),
    ExpenseVoided(ExpenseVoided),
}

impl Event for ExpenseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExpenseEvent::ExpenseRecorded(_) => "expenses.expense.recorded",
            ExpenseEvent::ExpenseAmended(_) => "expenses.expense.amended",
            ExpenseEvent::ExpenseVoided(_) => "expenses.expense.voided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExpenseEvent::ExpenseRecorded(e) => e.occurred_at,
            ExpenseEvent::ExpenseAmended(e) => e.occurred_at,
            ExpenseEvent::ExpenseVoided(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Expense {
    type Command = ExpenseCommand;
    type Event = ExpenseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ExpenseEvent::ExpenseRecorded(e) => {
                self.id = e.expense_id;
                self.trip_id = Some(e.trip_id);
                self.details = Some(e.details.clone());
                self.status = ExpenseStatus::Recorded;
                self.created = true;
            }
            ExpenseEvent::ExpenseAmended(e) => {
                self.details = Some(e.details.clone());
            }
            ExpenseEvent::ExpenseVoided(_) => {
                self.status = ExpenseStatus::Void;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ExpenseCommand::RecordExpense(cmd) => self.handle_record(cmd),
            ExpenseCommand::AmendExpense(cmd) => self.handle_amend(cmd),
            ExpenseCommand::VoidExpense(cmd) => self.handle_void(cmd),
        }
    }
}

impl Expense {
    fn ensure_trip(&self, trip_id: TripId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.trip_id != Some(trip_id) {
            return Err(DomainError::invariant("trip_id mismatch"));
        }
        Ok(())
    }

    fn ensure_expense_id(&self, expense_id: ExpenseId) -> Result<(), DomainError> {
        if self.id != expense_id {
            return Err(DomainError::invariant("expense_id mismatch"));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("expense already exists"));
        }

        let details = cmd.details.validated()?;

        Ok(vec![ExpenseEvent::ExpenseRecorded(ExpenseRecorded {
            trip_id: cmd.trip_id,
            expense_id: cmd.expense_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_amend(&self, cmd: &AmendExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_trip(cmd.trip_id)?;
        self.ensure_expense_id(cmd.expense_id)?;

        if !self.can_amend() {
            return Err(DomainError::conflict("cannot amend a voided expense"));
        }

        let details = cmd.details.validated()?;

        Ok(vec![ExpenseEvent::ExpenseAmended(ExpenseAmended {
            trip_id: cmd.trip_id,
            expense_id: cmd.expense_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_trip(cmd.trip_id)?;
        self.ensure_expense_id(cmd.expense_id)?;

        if self.status == ExpenseStatus::Void {
            return Err(DomainError::conflict("expense is already void"));
        }

        Ok(vec![ExpenseEvent::ExpenseVoided(ExpenseVoided {
            trip_id: cmd.trip_id,
            expense_id: cmd.expense_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
