//! Core domain logic for the trip planner.
//! This crate is the single source of truth for itinerary ordering invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod reorder;
pub mod repo;
pub mod service;
pub mod sync;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::day::Day;
pub use model::item::{
    check_dense_order, order_changes, sort_by_date, sort_sequence, validate_date, ContainerId,
    Item, ItemDraft, ItemId, ItemValidationError, OrderChange, OrderGap,
};
pub use model::trip::{Trip, TripId};
pub use reorder::engine::{
    AbortedGesture, CommitReport, DragStep, GestureState, ReorderEngine, ReorderError,
    SnapshotDisposition,
};
pub use reorder::input::{
    dispatch, GestureAdapter, GestureEvent, GestureKind, GestureOutcome, MouseAdapter,
    MouseInput, TouchAdapter, TouchInput,
};
pub use repo::item_repo::{
    ItemRepository, SequenceStore, SqliteItemRepository, StoreError, StoreResult,
};
pub use service::itinerary_service::{ItineraryService, ServiceError};
pub use service::planner_session::PlannerSession;
pub use sync::feed::{SnapshotFeed, Subscription};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
