//! Expenses domain module (shared costs, event-sourced).
//!
//! This crate contains business rules for recording, amending and voiding
//! shared trip expenses, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod expense;

pub use expense::{
    AmendExpense, Expense, ExpenseAmended, ExpenseCategory, ExpenseCommand, ExpenseDetails,
    ExpenseEvent, ExpenseId, ExpenseRecorded, ExpenseStatus, ExpenseVoided, RecordExpense,
    VoidExpense,
};
