//! Authoritative in-memory pairing state.

/// Pairing engine: selection, reconstruction, and journal queue.
pub mod engine;
/// Played-match memory.
pub mod memory;
/// Circle-method schedule generation and roster checks.
pub mod schedule;
