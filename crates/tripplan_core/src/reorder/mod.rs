//! Client-side reordering of a day's itinerary.
//!
//! # Responsibility
//! - Apply drag gestures to local state immediately.
//! - Defer persistence to one atomic commit per gesture.
//!
//! # Invariants
//! - Local gesture state wins over remote snapshots until the gesture ends.

pub mod engine;
pub mod input;
