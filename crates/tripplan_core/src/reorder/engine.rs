//! Drag-and-drop reorder engine for one day's itinerary.
//!
//! # Responsibility
//! - Turn one drag gesture into local splice-moves on the in-memory sequence.
//! - Persist the final order exactly once, after the gesture ends.
//! - Gate remote snapshots while a gesture is in progress.
//!
//! # Invariants
//! - States are `Idle` and `Dragging`; `Idle` is initial and terminal.
//! - No store write happens between `begin_drag` and `end_drag`.
//! - Every `end_drag` on an active gesture issues exactly one commit, even
//!   when the gesture was cancelled.
//! - Editing and dragging are mutually exclusive.
//! - A failed commit never reverts the local array by itself.

use crate::model::item::{order_changes, sort_sequence, ContainerId, Item, ItemId, OrderChange};
use crate::repo::item_repo::{SequenceStore, StoreError};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Gesture state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    /// `source` is the current array position of the dragged item.
    Dragging { source: usize },
}

/// Effect of one `drag_over` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragStep {
    /// The dragged item was spliced from `from` to `to`.
    Moved { from: usize, to: usize },
    /// Target equals the current source position.
    Unchanged,
    /// No gesture is active; the event was ignored.
    NotDragging,
}

/// What happened to an incoming remote snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotDisposition {
    /// Snapshot replaced the local sequence.
    Applied,
    /// A gesture is active; the snapshot is held until it ends.
    Deferred,
    /// Snapshot belongs to another day and was discarded.
    StaleContainer,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub container_id: ContainerId,
    /// Items whose `order` changed. Empty when the gesture ended where it
    /// started.
    pub changes: Vec<OrderChange>,
    /// Whether a snapshot deferred during the gesture was discarded because
    /// the post-commit snapshot supersedes it.
    pub deferred_snapshot_dropped: bool,
    /// Whether a snapshot deferred during the gesture was applied because
    /// the commit was empty and the store publishes nothing for it.
    pub deferred_snapshot_applied: bool,
}

/// Gesture discarded by a day switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortedGesture {
    pub container_id: ContainerId,
    pub source: usize,
}

/// Errors from engine operations.
#[derive(Debug)]
pub enum ReorderError {
    /// An item is being edited; dragging is not allowed.
    EditInProgress(ItemId),
    /// A gesture is active; the operation needs `Idle`.
    GestureActive,
    /// Index does not address an item.
    IndexOutOfRange { index: usize, len: usize },
    /// Item id is not part of the current sequence.
    UnknownItem(ItemId),
    /// Operation addressed a day that is no longer selected.
    StaleContainer {
        expected: ContainerId,
        actual: ContainerId,
    },
    /// The order commit failed. Local order is kept.
    Commit(StoreError),
}

impl ReorderError {
    /// Whether the failed operation may be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Commit(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl Display for ReorderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EditInProgress(id) => write!(f, "item {id} is being edited"),
            Self::GestureActive => write!(f, "a drag gesture is already active"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for {len} items")
            }
            Self::UnknownItem(id) => write!(f, "item {id} is not in the current day"),
            Self::StaleContainer { expected, actual } => write!(
                f,
                "gesture addressed day {actual} but day {expected} is selected"
            ),
            Self::Commit(err) => write!(f, "order commit failed: {err}"),
        }
    }
}

impl Error for ReorderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Commit(err) => Some(err),
            _ => None,
        }
    }
}

/// Optimistic reorder state machine for one selected day.
#[derive(Debug, Clone)]
pub struct ReorderEngine {
    container_id: ContainerId,
    items: Vec<Item>,
    state: GestureState,
    editing: Option<ItemId>,
    deferred: Option<Vec<Item>>,
}

impl ReorderEngine {
    /// Creates an idle engine over the given day's items.
    pub fn new(container_id: impl Into<ContainerId>, mut items: Vec<Item>) -> Self {
        sort_sequence(&mut items);
        Self {
            container_id: container_id.into(),
            items,
            state: GestureState::Idle,
            editing: None,
            deferred: None,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Items in render order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging { .. })
    }

    /// Item currently in edit mode.
    pub fn editing(&self) -> Option<&str> {
        self.editing.as_deref()
    }

    pub fn has_deferred_snapshot(&self) -> bool {
        self.deferred.is_some()
    }

    /// Minimal change set that would bring persisted order in line with
    /// the current array.
    pub fn pending_changes(&self) -> Vec<OrderChange> {
        order_changes(&self.items)
    }

    /// Puts one item into edit mode.
    pub fn begin_edit(&mut self, item_id: &str) -> Result<(), ReorderError> {
        if self.is_dragging() {
            return Err(ReorderError::GestureActive);
        }
        if !self.items.iter().any(|item| item.id == item_id) {
            return Err(ReorderError::UnknownItem(item_id.to_string()));
        }
        self.editing = Some(item_id.to_string());
        Ok(())
    }

    /// Leaves edit mode, returning the item that was being edited.
    pub fn end_edit(&mut self) -> Option<ItemId> {
        self.editing.take()
    }

    /// Picks up the item at `index`.
    pub fn begin_drag(&mut self, index: usize) -> Result<(), ReorderError> {
        if self.is_dragging() {
            return Err(ReorderError::GestureActive);
        }
        if let Some(item_id) = &self.editing {
            return Err(ReorderError::EditInProgress(item_id.clone()));
        }
        self.ensure_index(index)?;

        self.state = GestureState::Dragging { source: index };
        debug!(
            "event=drag_begin module=reorder status=ok container_id={} index={}",
            self.container_id, index
        );
        Ok(())
    }

    /// Moves the dragged item to `target`, shifting the items in between.
    pub fn drag_over(&mut self, target: usize) -> Result<DragStep, ReorderError> {
        let GestureState::Dragging { source } = self.state else {
            return Ok(DragStep::NotDragging);
        };
        self.ensure_index(target)?;
        if target == source {
            return Ok(DragStep::Unchanged);
        }

        let item = self.items.remove(source);
        self.items.insert(target, item);
        self.state = GestureState::Dragging { source: target };
        debug!(
            "event=drag_over module=reorder status=ok container_id={} from={} to={}",
            self.container_id, source, target
        );
        Ok(DragStep::Moved {
            from: source,
            to: target,
        })
    }

    /// Ends the active gesture and commits the resulting order.
    ///
    /// Returns `Ok(None)` without touching the store when no gesture is
    /// active. The engine is `Idle` again before the commit is issued, so a
    /// commit failure leaves it ready for the next gesture.
    pub fn end_drag<S>(&mut self, store: &S) -> Result<Option<CommitReport>, ReorderError>
    where
        S: SequenceStore + ?Sized,
    {
        let GestureState::Dragging { source } = self.state else {
            return Ok(None);
        };
        self.state = GestureState::Idle;
        debug!(
            "event=drag_end module=reorder status=ok container_id={} final_index={}",
            self.container_id, source
        );

        let changes = self.pending_changes();
        match store.commit_order(&self.container_id, &changes) {
            Ok(()) => {
                self.mark_committed();
                let mut deferred_snapshot_dropped = false;
                let mut deferred_snapshot_applied = false;
                if let Some(snapshot) = self.deferred.take() {
                    // An empty commit publishes nothing, so the held snapshot
                    // is the only copy of the remote write.
                    if changes.is_empty() {
                        self.replace_items(snapshot);
                        deferred_snapshot_applied = true;
                    } else {
                        deferred_snapshot_dropped = true;
                    }
                }
                info!(
                    "event=order_commit module=reorder status=ok container_id={} change_count={} deferred_dropped={} deferred_applied={}",
                    self.container_id,
                    changes.len(),
                    deferred_snapshot_dropped,
                    deferred_snapshot_applied
                );
                Ok(Some(CommitReport {
                    container_id: self.container_id.clone(),
                    changes,
                    deferred_snapshot_dropped,
                    deferred_snapshot_applied,
                }))
            }
            Err(err) => {
                warn!(
                    "event=order_commit module=reorder status=error container_id={} change_count={} retryable={} error={}",
                    self.container_id,
                    changes.len(),
                    err.is_retryable(),
                    err
                );
                // A snapshot held back during the gesture is the last state
                // anyone persisted, which is what a failed commit reconciles to.
                if let Some(snapshot) = self.deferred.take() {
                    self.replace_items(snapshot);
                }
                Err(ReorderError::Commit(err))
            }
        }
    }

    /// Re-issues the commit for the current array while idle.
    ///
    /// Used to retry after a failed `end_drag`; an already consistent
    /// sequence produces an empty change set.
    pub fn commit_pending<S>(&mut self, store: &S) -> Result<Vec<OrderChange>, ReorderError>
    where
        S: SequenceStore + ?Sized,
    {
        if self.is_dragging() {
            return Err(ReorderError::GestureActive);
        }
        let changes = self.pending_changes();
        if changes.is_empty() {
            return Ok(changes);
        }
        store
            .commit_order(&self.container_id, &changes)
            .map_err(ReorderError::Commit)?;
        self.mark_committed();
        info!(
            "event=order_commit module=reorder status=ok container_id={} change_count={} retry=true",
            self.container_id,
            changes.len()
        );
        Ok(changes)
    }

    /// Offers a remote snapshot to the engine.
    ///
    /// While idle the snapshot is authoritative. While dragging only the
    /// newest snapshot is kept and handled when the gesture ends.
    pub fn apply_snapshot(&mut self, container_id: &str, items: Vec<Item>) -> SnapshotDisposition {
        if container_id != self.container_id {
            debug!(
                "event=snapshot_apply module=reorder status=stale container_id={} snapshot_container_id={}",
                self.container_id, container_id
            );
            return SnapshotDisposition::StaleContainer;
        }
        if self.is_dragging() {
            debug!(
                "event=snapshot_deferred module=reorder status=ok container_id={} item_count={}",
                self.container_id,
                items.len()
            );
            self.deferred = Some(items);
            return SnapshotDisposition::Deferred;
        }

        self.replace_items(items);
        SnapshotDisposition::Applied
    }

    /// Selects another day.
    ///
    /// An active gesture is abandoned without a commit; edit mode and any
    /// deferred snapshot belong to the old day and are discarded.
    pub fn switch_container(
        &mut self,
        container_id: impl Into<ContainerId>,
        items: Vec<Item>,
    ) -> Option<AbortedGesture> {
        let aborted = match self.state {
            GestureState::Dragging { source } => {
                info!(
                    "event=gesture_aborted module=reorder status=ok container_id={} source={} reason=container_switch",
                    self.container_id, source
                );
                Some(AbortedGesture {
                    container_id: self.container_id.clone(),
                    source,
                })
            }
            GestureState::Idle => None,
        };

        self.container_id = container_id.into();
        self.state = GestureState::Idle;
        self.editing = None;
        self.deferred = None;
        self.replace_items(items);
        aborted
    }

    /// Fails with `StaleContainer` unless `container_id` is the selected day.
    pub fn ensure_container(&self, container_id: &str) -> Result<(), ReorderError> {
        if container_id == self.container_id {
            Ok(())
        } else {
            Err(ReorderError::StaleContainer {
                expected: self.container_id.clone(),
                actual: container_id.to_string(),
            })
        }
    }

    fn replace_items(&mut self, mut items: Vec<Item>) {
        sort_sequence(&mut items);
        if let Some(item_id) = &self.editing {
            if !items.iter().any(|item| &item.id == item_id) {
                self.editing = None;
            }
        }
        self.items = items;
    }

    fn mark_committed(&mut self) {
        for (position, item) in self.items.iter_mut().enumerate() {
            item.order = position as i64;
        }
    }

    fn ensure_index(&self, index: usize) -> Result<(), ReorderError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(ReorderError::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }
}
