//! Settlement module (group balance calculator).
//!
//! Pure computation over in-memory collections: no IO, no storage, no
//! hidden state. Given a trip's live expense records, its roster and the
//! externally-owned settled-status map, `settle` derives one balance per
//! roster member. Results are thrown away and recomputed on every input
//! change; nothing here is ever mutated incrementally.

pub mod settle;

pub use settle::{
    over_budget, settle, truncate_for_display, Balance, ExpenseRecord, SettledStatus,
    SettlementSummary,
};
