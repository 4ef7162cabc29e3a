//! Itinerary item domain model.
//!
//! # Responsibility
//! - Define the orderable record shown as one stop inside a day.
//! - Provide the pure sequence helpers shared by the engine and storage.
//!
//! # Invariants
//! - `id` is unique within its container and never reused.
//! - At rest, the `order` values of one container are exactly `0..len`.
//! - Payload fields (`title`, `note`, `date`) never influence the stored
//!   order; arranging by date is an explicit reorder.
//! - `date`, when present, is a calendar date written `YYYY-MM-DD`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid date regex"));

/// Opaque item identifier.
pub type ItemId = String;

/// Identifier of the container (a day) an item belongs to.
pub type ContainerId = String;

/// One itinerary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Owning day.
    pub container_id: ContainerId,
    /// Persisted sort key. Stale while a drag gesture is in progress.
    pub order: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Scheduled calendar date; `None` while undecided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Item {
    /// Creates an item with a generated id and `order = 0`.
    ///
    /// Callers appending to an existing sequence overwrite `order` with the
    /// current sequence length.
    pub fn new(container_id: impl Into<ContainerId>, title: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), container_id, title)
    }

    /// Creates an item with a caller-provided id.
    pub fn with_id(
        id: impl Into<ItemId>,
        container_id: impl Into<ContainerId>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            container_id: container_id.into(),
            order: 0,
            title: title.into(),
            note: None,
            date: None,
        }
    }

    /// Builder-style setter for `order`.
    pub fn at(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    /// Builder-style setter for `note`.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Builder-style setter for `date`.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Checks the fields persistence relies on.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.id.trim().is_empty() {
            return Err(ItemValidationError::BlankId);
        }
        if self.title.trim().is_empty() {
            return Err(ItemValidationError::BlankTitle);
        }
        if self.order < 0 {
            return Err(ItemValidationError::NegativeOrder(self.order));
        }
        if let Some(date) = &self.date {
            validate_date(date)?;
        }
        Ok(())
    }
}

/// User-editable payload of an item: everything except identity and order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    pub title: String,
    pub note: Option<String>,
    pub date: Option<String>,
}

impl ItemDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

/// Field-level validation failures for [`Item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    BlankId,
    BlankTitle,
    NegativeOrder(i64),
    /// Date is not an existing `YYYY-MM-DD` calendar day.
    InvalidDate(String),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankId => write!(f, "item id must not be blank"),
            Self::BlankTitle => write!(f, "item title must not be blank"),
            Self::NegativeOrder(order) => write!(f, "item order must be >= 0, got {order}"),
            Self::InvalidDate(date) => write!(f, "item date must be YYYY-MM-DD, got `{date}`"),
        }
    }
}

impl Error for ItemValidationError {}

/// Checks that `value` names a real calendar day in `YYYY-MM-DD` form.
pub fn validate_date(value: &str) -> Result<(), ItemValidationError> {
    let invalid = || ItemValidationError::InvalidDate(value.to_string());
    let captures = DATE_RE.captures(value).ok_or_else(invalid)?;
    let field = |index: usize| -> Result<u32, ItemValidationError> {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(invalid)
    };
    let (year, month, day) = (field(1)?, field(2)?, field(3)?);

    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let days_in_month = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => return Err(invalid()),
    };
    if day == 0 || day > days_in_month {
        return Err(invalid());
    }
    Ok(())
}

/// One entry of an order commit: item `item_id` moves to `order`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderChange {
    pub item_id: ItemId,
    pub order: i64,
}

/// Sorts a sequence into its at-rest order.
///
/// Ties on `order` fall back to `id` so concurrent writers that produced
/// duplicate keys still render deterministically.
pub fn sort_sequence(items: &mut [Item]) {
    items.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
}

/// Stable-sorts a sequence by date, earliest first, undated items last.
///
/// Items sharing a date (or both undated) keep their current relative
/// position, so the input should already be in sequence order.
pub fn sort_by_date(items: &mut [Item]) {
    items.sort_by(|a, b| {
        (a.date.is_none(), a.date.as_deref()).cmp(&(b.date.is_none(), b.date.as_deref()))
    });
}

/// Returns `order = position` entries for every item whose stored order
/// disagrees with its array position.
pub fn order_changes(items: &[Item]) -> Vec<OrderChange> {
    items
        .iter()
        .enumerate()
        .filter(|(position, item)| item.order != *position as i64)
        .map(|(position, item)| OrderChange {
            item_id: item.id.clone(),
            order: position as i64,
        })
        .collect()
}

/// First violation of the dense `0..len` ordering invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderGap {
    /// Position in the sorted sequence where the violation was found.
    pub position: usize,
    /// `order` stored at that position.
    pub found: i64,
}

impl Display for OrderGap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "expected order {} at position {}, found {}",
            self.position, self.position, self.found
        )
    }
}

impl Error for OrderGap {}

/// Verifies that a sequence sorted by [`sort_sequence`] holds exactly the
/// orders `0..len`.
pub fn check_dense_order(items: &[Item]) -> Result<(), OrderGap> {
    match items
        .iter()
        .enumerate()
        .find(|(position, item)| item.order != *position as i64)
    {
        Some((position, item)) => Err(OrderGap {
            position,
            found: item.order,
        }),
        None => Ok(()),
    }
}
