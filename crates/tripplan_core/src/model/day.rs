//! Day container model.

use crate::model::item::ContainerId;
use crate::model::trip::TripId;
use serde::{Deserialize, Serialize};

/// A day groups the itinerary items that are reordered together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    pub id: ContainerId,
    /// Owning trip. `None` only for days stored before trips existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<TripId>,
    pub title: String,
}
