use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tripsplit_core::{Aggregate, AggregateRoot, DomainError, TripId, UserId, ValueObject};
use tripsplit_events::Event;

/// A roster entry: one user active in a trip.
///
/// Members are value objects; identity lookups happen via `user_id`, which
/// joins this roster against externally-supplied expense records. Roster
/// order is join order and is the iteration order of derived balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    pub name: String,
}

impl ValueObject for Member {}

/// Aggregate root: Trip (roster + budget).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    id: TripId,
    name: String,
    members: Vec<Member>,
    budget: Option<Decimal>,
    version: u64,
    created: bool,
}

impl Trip {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TripId) -> Self {
        Self {
            id,
            name: String::new(),
            members: Vec::new(),
            budget: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TripId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active members in join order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Roster lookup by join key; "not found" is an explicit `None`, never a
    /// broken reference.
    pub fn member(&self, user_id: UserId) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.member(user_id).is_some()
    }

    /// Configured group budget, if any.
    pub fn budget(&self) -> Option<Decimal> {
        self.budget
    }
}

impl AggregateRoot for Trip {
    type Id = TripId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateTrip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTrip {
    pub trip_id: TripId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RenameTrip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameTrip {
    pub trip_id: TripId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddMember.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMember {
    pub trip_id: TripId,
    pub user_id: UserId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveMember.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMember {
    pub trip_id: TripId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetBudget.
///
/// `budget: None` clears a previously configured budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBudget {
    pub trip_id: TripId,
    pub budget: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripCommand {
    CreateTrip(CreateTrip),
    RenameTrip(RenameTrip),
    AddMember(AddMember),
    RemoveMember(RemoveMember),
    SetBudget(SetBudget),
}

/// Event: TripCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripCreated {
    pub trip_id: TripId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TripRenamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripRenamed {
    pub trip_id: TripId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MemberJoined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberJoined {
    pub trip_id: TripId,
    pub user_id: UserId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MemberLeft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberLeft {
    pub trip_id: TripId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BudgetSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSet {
    pub trip_id: TripId,
    pub budget: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripEvent {
    TripCreated(TripCreated),
    TripRenamed(TripRenamed),
    MemberJoined(MemberJoined),
    MemberLeft(MemberLeft),
    BudgetSet(BudgetSet),
}

impl Event for TripEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TripEvent::TripCreated(_) => "trips.trip.created",
            TripEvent::TripRenamed(_) => "trips.trip.renamed",
            TripEvent::MemberJoined(_) => "trips.trip.member_joined",
            TripEvent::MemberLeft(_) => "trips.trip.member_left",
            TripEvent::BudgetSet(_) => "trips.trip.budget_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TripEvent::TripCreated(e) => e.occurred_at,
            TripEvent::TripRenamed(e) => e.occurred_at,
            TripEvent::MemberJoined(e) => e.occurred_at,
            TripEvent::MemberLeft(e) => e.occurred_at,
            TripEvent::BudgetSet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Trip {
    type Command = TripCommand;
    type Event = TripEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TripEvent::TripCreated(e) => {
                self.id = e.trip_id;
                self.name = e.name.clone();
                self.created = true;
            }
            TripEvent::TripRenamed(e) => {
                self.name = e.name.clone();
            }
            TripEvent::MemberJoined(e) => {
                // Join order is preserved; duplicates are rejected in handle.
                self.members.push(Member {
                    user_id: e.user_id,
                    name: e.name.clone(),
                });
            }
            TripEvent::MemberLeft(e) => {
                self.members.retain(|m| m.user_id != e.user_id);
            }
            TripEvent::BudgetSet(e) => {
                self.budget = e.budget;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TripCommand::CreateTrip(cmd) => self.handle_create(cmd),
            TripCommand::RenameTrip(cmd) => self.handle_rename(cmd),
            TripCommand::AddMember(cmd) => self.handle_add_member(cmd),
            TripCommand::RemoveMember(cmd) => self.handle_remove_member(cmd),
            TripCommand::SetBudget(cmd) => self.handle_set_budget(cmd),
        }
    }
}

impl Trip {
    fn ensure_trip_id(&self, trip_id: TripId) -> Result<(), DomainError> {
        if self.id != trip_id {
            return Err(DomainError::invariant("trip_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateTrip) -> Result<Vec<TripEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("trip already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("trip name cannot be empty"));
        }

        Ok(vec![TripEvent::TripCreated(TripCreated {
            trip_id: cmd.trip_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_rename(&self, cmd: &RenameTrip) -> Result<Vec<TripEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_trip_id(cmd.trip_id)?;

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("trip name cannot be empty"));
        }

        Ok(vec![TripEvent::TripRenamed(TripRenamed {
            trip_id: cmd.trip_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_member(&self, cmd: &AddMember) -> Result<Vec<TripEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_trip_id(cmd.trip_id)?;

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("member name cannot be empty"));
        }

        if self.is_member(cmd.user_id) {
            return Err(DomainError::conflict("user is already a trip member"));
        }

        Ok(vec![TripEvent::MemberJoined(MemberJoined {
            trip_id: cmd.trip_id,
            user_id: cmd.user_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_member(&self, cmd: &RemoveMember) -> Result<Vec<TripEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_trip_id(cmd.trip_id)?;

        if !self.is_member(cmd.user_id) {
            return Err(DomainError::conflict("user is not a trip member"));
        }

        Ok(vec![TripEvent::MemberLeft(MemberLeft {
            trip_id: cmd.trip_id,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_budget(&self, cmd: &SetBudget) -> Result<Vec<TripEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_trip_id(cmd.trip_id)?;

        // Invalid budgets are rejected here, before any balance computation
        // ever sees them.
        if let Some(budget) = cmd.budget {
            if budget.is_sign_negative() {
                return Err(DomainError::validation("budget cannot be negative"));
            }
        }

        Ok(vec![TripEvent::BudgetSet(BudgetSet {
            trip_id: cmd.trip_id,
            budget: cmd.budget,
            occurred_at: cmd.occurred_at,
        })])
    }
}
