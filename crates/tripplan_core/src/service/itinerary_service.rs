//! Itinerary use-case service.
//!
//! # Responsibility
//! - Validate user input above the repository layer.
//! - Provide trip/day/item create, edit, delete and list operations.
//! - Arrange a day by item date as one order commit.
//!
//! # Invariants
//! - Titles are trimmed and must not be blank.
//! - Blank notes and blank dates are stored as `None`.
//! - New items are appended at the end of their day.

use crate::model::day::Day;
use crate::model::item::{
    order_changes, sort_by_date, validate_date, ContainerId, Item, ItemDraft, ItemId, OrderChange,
};
use crate::model::trip::{Trip, TripId};
use crate::repo::item_repo::{ItemRepository, SequenceStore, StoreError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from itinerary service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Title is blank after trim.
    InvalidTitle,
    /// Date is not an existing `YYYY-MM-DD` day.
    InvalidDate(String),
    TripNotFound(TripId),
    DayNotFound(ContainerId),
    ItemNotFound(ItemId),
    /// Repository-level failure.
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTitle => write!(f, "title must not be blank"),
            Self::InvalidDate(date) => write!(f, "date must be YYYY-MM-DD, got `{date}`"),
            Self::TripNotFound(id) => write!(f, "trip not found: {id}"),
            Self::DayNotFound(id) => write!(f, "day not found: {id}"),
            Self::ItemNotFound(id) => write!(f, "itinerary item not found: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::TripNotFound(id) => Self::TripNotFound(id),
            StoreError::DayNotFound(id) => Self::DayNotFound(id),
            StoreError::ItemNotFound(id) => Self::ItemNotFound(id),
            other => Self::Store(other),
        }
    }
}

/// Itinerary service facade.
pub struct ItineraryService<R: ItemRepository> {
    repo: R,
}

impl<R: ItemRepository> ItineraryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Borrows the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn create_trip(&self, title: impl Into<String>) -> Result<Trip, ServiceError> {
        let title = normalize_title(title.into())?;
        self.repo.create_trip(&title).map_err(Into::into)
    }

    /// Deletes a trip with all of its days and items.
    pub fn delete_trip(&self, trip_id: &str) -> Result<(), ServiceError> {
        self.repo.delete_trip(trip_id).map_err(Into::into)
    }

    pub fn create_day(&self, trip_id: &str, title: impl Into<String>) -> Result<Day, ServiceError> {
        let title = normalize_title(title.into())?;
        self.repo.create_day(trip_id, &title).map_err(Into::into)
    }

    pub fn list_days(&self, trip_id: &str) -> Result<Vec<Day>, ServiceError> {
        self.repo.list_days(trip_id).map_err(Into::into)
    }

    /// Appends one item to a day with `order = current item count`.
    pub fn add_item(&self, day_id: &str, draft: ItemDraft) -> Result<Item, ServiceError> {
        let draft = normalize_draft(draft)?;
        self.repo.append_item(day_id, &draft).map_err(Into::into)
    }

    /// Replaces the title, note and date of one item.
    pub fn edit_item(&self, item_id: &str, draft: ItemDraft) -> Result<(), ServiceError> {
        let draft = normalize_draft(draft)?;
        self.repo
            .update_item_payload(item_id, &draft)
            .map_err(Into::into)
    }

    pub fn delete_item(&self, item_id: &str) -> Result<(), ServiceError> {
        self.repo.delete_item(item_id).map_err(Into::into)
    }

    pub fn list_items(&self, day_id: &str) -> Result<Vec<Item>, ServiceError> {
        self.repo.list_items(day_id).map_err(Into::into)
    }
}

impl<R: ItemRepository + SequenceStore> ItineraryService<R> {
    /// Reorders a day by item date, earliest first and undated last.
    ///
    /// Items on the same date keep their relative order. The new order is
    /// persisted with one `commit_order`; returns the committed changes.
    pub fn arrange_by_date(&self, day_id: &str) -> Result<Vec<OrderChange>, ServiceError> {
        let mut items = self.repo.list_items(day_id)?;
        sort_by_date(&mut items);
        let changes = order_changes(&items);
        self.repo.commit_order(day_id, &changes)?;
        info!(
            "event=arrange_by_date module=service status=ok container_id={} change_count={}",
            day_id,
            changes.len()
        );
        Ok(changes)
    }
}

fn normalize_draft(draft: ItemDraft) -> Result<ItemDraft, ServiceError> {
    let title = normalize_title(draft.title)?;
    let note = normalize_optional(draft.note);
    let date = normalize_optional(draft.date);
    if let Some(date) = &date {
        validate_date(date).map_err(|_| ServiceError::InvalidDate(date.clone()))?;
    }
    Ok(ItemDraft { title, note, date })
}

fn normalize_title(value: String) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidTitle);
    }
    Ok(trimmed.to_string())
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
