//! Trips domain module (trip lifecycle, roster and budget, event-sourced).
//!
//! This crate contains business rules for trips: who is on the roster, in
//! which order they joined, and what the optional group budget is. Purely
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod trip;

pub use trip::{
    AddMember, BudgetSet, CreateTrip, Member, MemberJoined, MemberLeft, RemoveMember, RenameTrip,
    SetBudget, Trip, TripCommand, TripCreated, TripEvent, TripRenamed,
};
