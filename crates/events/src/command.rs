use tripsplit_core::AggregateId;

/// A command targets a specific aggregate (command abstraction).
///
/// Commands represent **intent**: a request to change something. They are
/// transient (never persisted) and are turned into events, which are.
///
/// - **Command**: "record this expense"
/// - **Event**: `ExpenseRecorded { ... }`
///
/// Commands are rejected when invalid; events represent accepted changes.
/// Each command operates on exactly one aggregate, which is the transaction
/// boundary. Trip isolation is enforced at the envelope level, not here, so
/// commands stay focused on business intent.
///
/// The `Clone + Send + Sync + 'static` bounds let commands be retried,
/// logged and moved across worker threads.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}
