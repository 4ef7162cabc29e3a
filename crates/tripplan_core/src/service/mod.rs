//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own the per-view planner state passed to UI callbacks.

pub mod itinerary_service;
pub mod planner_session;
