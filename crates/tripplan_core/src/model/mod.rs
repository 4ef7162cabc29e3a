//! Itinerary domain model.
//!
//! # Responsibility
//! - Define the trip and day containers and their orderable items.
//! - Keep ordering helpers free of storage and UI concerns.
//!
//! # Invariants
//! - Items are identified by stable string ids.
//! - A day's items carry dense `order` values when no gesture is pending.

pub mod day;
pub mod item;
pub mod trip;
