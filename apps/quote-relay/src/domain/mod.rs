//! Domain Layer - Core relay types and state.
//!
//! The owning components for all mutable relay state: the configured
//! instrument universe, the last-known-price table, and the downstream
//! client registry. No ambient shared state; every mutation goes through
//! an explicit, concurrency-safe operation on one of these types.

/// Instrument identifiers and the configured instrument universe.
pub mod instrument;

/// Last-known-price table (one quote per instrument, last-write-wins).
pub mod cache;

/// Downstream client session tracking.
pub mod registry;
