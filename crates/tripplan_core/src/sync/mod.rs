//! Snapshot delivery between the store and its listeners.
//!
//! # Responsibility
//! - Push full-sequence snapshots to every listener of a day.
//!
//! # Invariants
//! - Listeners are detached by dropping their subscription.

pub mod feed;
