//! Itinerary item repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the two store operations the reorder engine consumes
//!   (`subscribe`, `commit_order`).
//! - Provide trip/day/item CRUD that keeps per-day ordering dense.
//! - Publish a fresh day snapshot after every successful write.
//!
//! # Invariants
//! - Item listing is deterministic: `sort_order ASC, item_id ASC`.
//! - `commit_order` is all-or-nothing and leaves the day at `0..N-1`, even
//!   when another writer reordered the day since the caller's snapshot.
//! - Append assigns `sort_order = count(items in day)`; delete renumbers the
//!   remaining items of the day in the same transaction.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::day::Day;
use crate::model::item::{
    validate_date, ContainerId, Item, ItemDraft, ItemId, ItemValidationError, OrderChange,
};
use crate::model::trip::{Trip, TripId};
use crate::sync::feed::{SnapshotFeed, Subscription};
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ITEM_SELECT_SQL: &str = "SELECT
    item_id,
    day_id,
    title,
    note,
    item_date,
    sort_order
FROM itinerary_items";

const DAY_SELECT_SQL: &str = "SELECT day_id, trip_id, title FROM days";

/// Result type used by store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Trip does not exist.
    TripNotFound(TripId),
    /// Day does not exist.
    DayNotFound(ContainerId),
    /// Item does not exist.
    ItemNotFound(ItemId),
    /// Commit referenced an item that is not part of the day.
    UnknownItem {
        container_id: ContainerId,
        item_id: ItemId,
    },
    /// Input failed item validation.
    Validation(ItemValidationError),
    /// Persisted data cannot be converted into a valid read model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Backend could not be reached; the write may be retried.
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the same write may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _))) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TripNotFound(id) => write!(f, "trip not found: {id}"),
            Self::DayNotFound(id) => write!(f, "day not found: {id}"),
            Self::ItemNotFound(id) => write!(f, "itinerary item not found: {id}"),
            Self::UnknownItem {
                container_id,
                item_id,
            } => write!(f, "item {item_id} is not part of day {container_id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid itinerary data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "itinerary repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "itinerary repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "itinerary repository requires column `{column}` in table `{table}`"
            ),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ItemValidationError> for StoreError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

/// The persistence contract consumed by the reorder engine.
pub trait SequenceStore {
    /// Starts a push subscription for one day.
    ///
    /// The current sequence is delivered as the first snapshot.
    fn subscribe(&self, container_id: &str) -> StoreResult<Subscription>;
    /// Persists new `order` values for a set of items in one atomic write.
    fn commit_order(&self, container_id: &str, changes: &[OrderChange]) -> StoreResult<()>;
}

/// Trip, day and item CRUD operations.
pub trait ItemRepository {
    /// Creates one trip.
    fn create_trip(&self, title: &str) -> StoreResult<Trip>;
    /// Loads one trip by id.
    fn get_trip(&self, trip_id: &str) -> StoreResult<Option<Trip>>;
    /// Removes a trip together with its days and their items.
    fn delete_trip(&self, trip_id: &str) -> StoreResult<()>;
    /// Creates one day container inside a trip.
    fn create_day(&self, trip_id: &str, title: &str) -> StoreResult<Day>;
    /// Loads one day by id.
    fn get_day(&self, day_id: &str) -> StoreResult<Option<Day>>;
    /// Lists the days of a trip in creation order.
    fn list_days(&self, trip_id: &str) -> StoreResult<Vec<Day>>;
    /// Lists the items of a day in persisted order.
    fn list_items(&self, day_id: &str) -> StoreResult<Vec<Item>>;
    /// Appends one item at the end of a day.
    fn append_item(&self, day_id: &str, draft: &ItemDraft) -> StoreResult<Item>;
    /// Replaces the payload fields of one item. Ordering is untouched.
    fn update_item_payload(&self, item_id: &str, draft: &ItemDraft) -> StoreResult<()>;
    /// Removes one item and closes the gap it leaves in its day.
    fn delete_item(&self, item_id: &str) -> StoreResult<()>;
}

/// SQLite-backed itinerary repository.
pub struct SqliteItemRepository<'conn> {
    conn: &'conn Connection,
    feed: SnapshotFeed,
}

impl<'conn> SqliteItemRepository<'conn> {
    /// Creates repository from migrated connection with its own feed.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        Self::with_feed(conn, SnapshotFeed::new())
    }

    /// Creates repository that publishes into an existing feed.
    ///
    /// Repositories sharing a feed see each other's writes as snapshots.
    pub fn with_feed(conn: &'conn Connection, feed: SnapshotFeed) -> StoreResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn, feed })
    }

    /// Handle to the feed this repository publishes into.
    pub fn feed(&self) -> SnapshotFeed {
        self.feed.clone()
    }

    fn publish(&self, day_id: &str) {
        match load_items(self.conn, day_id) {
            Ok(items) => {
                self.feed.publish(day_id, &items);
            }
            Err(err) => warn!(
                "event=snapshot_publish module=repo status=error container_id={} error={}",
                day_id, err
            ),
        }
    }
}

impl SequenceStore for SqliteItemRepository<'_> {
    fn subscribe(&self, container_id: &str) -> StoreResult<Subscription> {
        ensure_day_exists(self.conn, container_id)?;
        let items = load_items(self.conn, container_id)?;
        Ok(self.feed.subscribe(container_id, items))
    }

    fn commit_order(&self, container_id: &str, changes: &[OrderChange]) -> StoreResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        if let Some(change) = changes.iter().find(|change| change.order < 0) {
            return Err(ItemValidationError::NegativeOrder(change.order).into());
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_day_exists(&tx, container_id)?;
        for change in changes {
            let changed = tx.execute(
                "UPDATE itinerary_items
                 SET sort_order = ?3,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE item_id = ?1
                   AND day_id = ?2;",
                params![change.item_id, container_id, change.order],
            )?;
            if changed == 0 {
                return Err(StoreError::UnknownItem {
                    container_id: container_id.to_string(),
                    item_id: change.item_id.clone(),
                });
            }
        }
        // Another writer may have reordered the day since the caller's
        // snapshot; committed items win ties against untouched ones.
        let committed: HashSet<&str> = changes
            .iter()
            .map(|change| change.item_id.as_str())
            .collect();
        let renumbered = renumber_day(&tx, container_id, &committed)?;
        tx.commit()?;

        info!(
            "event=order_persist module=repo status=ok container_id={} change_count={} renumbered={}",
            container_id,
            changes.len(),
            renumbered
        );
        self.publish(container_id);
        Ok(())
    }
}

impl ItemRepository for SqliteItemRepository<'_> {
    fn create_trip(&self, title: &str) -> StoreResult<Trip> {
        let trip = Trip {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
        };
        self.conn.execute(
            "INSERT INTO trips (trip_id, title) VALUES (?1, ?2);",
            params![trip.id, trip.title],
        )?;
        Ok(trip)
    }

    fn get_trip(&self, trip_id: &str) -> StoreResult<Option<Trip>> {
        let trip = self
            .conn
            .query_row(
                "SELECT trip_id, title FROM trips WHERE trip_id = ?1;",
                [trip_id],
                |row| {
                    Ok(Trip {
                        id: row.get(0)?,
                        title: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(trip)
    }

    fn delete_trip(&self, trip_id: &str) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let day_ids = load_days(&tx, trip_id)?
            .into_iter()
            .map(|day| day.id)
            .collect::<Vec<_>>();
        let changed = tx.execute("DELETE FROM trips WHERE trip_id = ?1;", [trip_id])?;
        if changed == 0 {
            return Err(StoreError::TripNotFound(trip_id.to_string()));
        }
        tx.commit()?;

        info!(
            "event=trip_delete module=repo status=ok trip_id={} day_count={}",
            trip_id,
            day_ids.len()
        );
        // Subscribers of the removed days see them empty out.
        for day_id in &day_ids {
            self.publish(day_id);
        }
        Ok(())
    }

    fn create_day(&self, trip_id: &str, title: &str) -> StoreResult<Day> {
        ensure_trip_exists(self.conn, trip_id)?;
        let day = Day {
            id: Uuid::new_v4().to_string(),
            trip_id: Some(trip_id.to_string()),
            title: title.to_string(),
        };
        self.conn.execute(
            "INSERT INTO days (day_id, trip_id, title) VALUES (?1, ?2, ?3);",
            params![day.id, day.trip_id, day.title],
        )?;
        Ok(day)
    }

    fn get_day(&self, day_id: &str) -> StoreResult<Option<Day>> {
        let day = self
            .conn
            .query_row(
                &format!("{DAY_SELECT_SQL} WHERE day_id = ?1;"),
                [day_id],
                parse_day_row,
            )
            .optional()?;
        Ok(day)
    }

    fn list_days(&self, trip_id: &str) -> StoreResult<Vec<Day>> {
        ensure_trip_exists(self.conn, trip_id)?;
        load_days(self.conn, trip_id)
    }

    fn list_items(&self, day_id: &str) -> StoreResult<Vec<Item>> {
        ensure_day_exists(self.conn, day_id)?;
        load_items(self.conn, day_id)
    }

    fn append_item(&self, day_id: &str, draft: &ItemDraft) -> StoreResult<Item> {
        let mut item = Item::new(day_id, draft.title.as_str());
        item.note = draft.note.clone();
        item.date = draft.date.clone();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_day_exists(&tx, day_id)?;
        item.order = tx.query_row(
            "SELECT COUNT(*) FROM itinerary_items WHERE day_id = ?1;",
            [day_id],
            |row| row.get(0),
        )?;
        item.validate()?;
        tx.execute(
            "INSERT INTO itinerary_items (item_id, day_id, title, note, item_date, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                item.id,
                item.container_id,
                item.title,
                item.note,
                item.date,
                item.order
            ],
        )?;
        tx.commit()?;

        self.publish(day_id);
        Ok(item)
    }

    fn update_item_payload(&self, item_id: &str, draft: &ItemDraft) -> StoreResult<()> {
        validate_draft(draft)?;
        let day_id = day_of_item(self.conn, item_id)?;
        let changed = self.conn.execute(
            "UPDATE itinerary_items
             SET title = ?2,
                 note = ?3,
                 item_date = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE item_id = ?1;",
            params![item_id, draft.title, draft.note, draft.date],
        )?;
        if changed == 0 {
            return Err(StoreError::ItemNotFound(item_id.to_string()));
        }

        self.publish(&day_id);
        Ok(())
    }

    fn delete_item(&self, item_id: &str) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let day_id = day_of_item(&tx, item_id)?;
        tx.execute("DELETE FROM itinerary_items WHERE item_id = ?1;", [item_id])?;
        renumber_day(&tx, &day_id, &HashSet::new())?;
        tx.commit()?;

        self.publish(&day_id);
        Ok(())
    }
}

/// Rewrites the day's `sort_order` values to `0..N-1`.
///
/// Items are ranked by stored order; on equal order, ids in `preferred`
/// come first, then the lower id. Returns how many rows were rewritten.
fn renumber_day(conn: &Connection, day_id: &str, preferred: &HashSet<&str>) -> StoreResult<usize> {
    let mut items = load_items(conn, day_id)?;
    items.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| {
                let a_rank = !preferred.contains(a.id.as_str());
                let b_rank = !preferred.contains(b.id.as_str());
                a_rank.cmp(&b_rank)
            })
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut rewritten = 0;
    for (position, item) in items.iter().enumerate() {
        if item.order == position as i64 {
            continue;
        }
        conn.execute(
            "UPDATE itinerary_items
             SET sort_order = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE item_id = ?1;",
            params![item.id, position as i64],
        )?;
        rewritten += 1;
    }
    Ok(rewritten)
}

fn validate_draft(draft: &ItemDraft) -> Result<(), ItemValidationError> {
    if draft.title.trim().is_empty() {
        return Err(ItemValidationError::BlankTitle);
    }
    if let Some(date) = &draft.date {
        validate_date(date)?;
    }
    Ok(())
}

fn load_days(conn: &Connection, trip_id: &str) -> StoreResult<Vec<Day>> {
    let mut stmt = conn.prepare(&format!(
        "{DAY_SELECT_SQL}
         WHERE trip_id = ?1
         ORDER BY created_at ASC, rowid ASC;"
    ))?;
    let days = stmt
        .query_map([trip_id], parse_day_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(days)
}

fn parse_day_row(row: &Row<'_>) -> rusqlite::Result<Day> {
    Ok(Day {
        id: row.get("day_id")?,
        trip_id: row.get("trip_id")?,
        title: row.get("title")?,
    })
}

fn ensure_trip_exists(conn: &Connection, trip_id: &str) -> StoreResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM trips WHERE trip_id = ?1);",
        [trip_id],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(StoreError::TripNotFound(trip_id.to_string()))
    }
}

fn load_items(conn: &Connection, day_id: &str) -> StoreResult<Vec<Item>> {
    let mut stmt = conn.prepare(&format!(
        "{ITEM_SELECT_SQL}
         WHERE day_id = ?1
         ORDER BY sort_order ASC, item_id ASC;"
    ))?;
    let mut rows = stmt.query([day_id])?;

    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_item_row(row)?);
    }
    Ok(items)
}

fn day_of_item(conn: &Connection, item_id: &str) -> StoreResult<ContainerId> {
    conn.query_row(
        "SELECT day_id FROM itinerary_items WHERE item_id = ?1;",
        [item_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| StoreError::ItemNotFound(item_id.to_string()))
}

fn ensure_day_exists(conn: &Connection, day_id: &str) -> StoreResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM days WHERE day_id = ?1);",
        [day_id],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(StoreError::DayNotFound(day_id.to_string()))
    }
}

fn parse_item_row(row: &Row<'_>) -> StoreResult<Item> {
    let item = Item {
        id: row.get("item_id")?,
        container_id: row.get("day_id")?,
        title: row.get("title")?,
        note: row.get("note")?,
        date: row.get("item_date")?,
        order: row.get("sort_order")?,
    };
    item.validate().map_err(|err| {
        StoreError::InvalidData(format!("itinerary_items row `{}`: {err}", item.id))
    })?;
    Ok(item)
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for (table, columns) in [
        ("trips", &["trip_id", "title"][..]),
        ("days", &["day_id", "trip_id", "title"][..]),
        (
            "itinerary_items",
            &[
                "item_id",
                "day_id",
                "title",
                "note",
                "item_date",
                "sort_order",
            ][..],
        ),
    ] {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(StoreError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
