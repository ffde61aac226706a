//! In-memory authoritative store, indices and query evaluation.

/// Ancestor index helpers.
pub mod indices;
/// Property filters, ordering and query execution.
pub mod query;
/// Authoritative entity store with optimistic commits.
pub mod store;
