//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the store contract the reorder engine depends on.
//! - Isolate SQLite query details from service and engine orchestration.
//!
//! # Invariants
//! - Repository writes validate items before persistence.
//! - Repository APIs return semantic errors (`DayNotFound`, `ItemNotFound`)
//!   in addition to DB transport errors.

pub mod item_repo;
