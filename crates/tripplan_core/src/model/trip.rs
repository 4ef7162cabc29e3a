//! Trip container model.

use serde::{Deserialize, Serialize};

/// Opaque trip identifier.
pub type TripId = String;

/// A trip owns the days of one journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub title: String,
}
