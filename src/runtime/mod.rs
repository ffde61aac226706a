//! Single-writer async store runtime, transactions and event stream.

/// Event stream types emitted by the runtime.
pub mod events;
/// Handle and command loop implementation.
pub mod handle;
mod journal;
/// Optimistic read-then-commit transactions.
pub mod transaction;
