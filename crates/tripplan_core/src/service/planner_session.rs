//! Planner session: the selected day, its subscription and its engine.
//!
//! # Responsibility
//! - Keep exactly one live subscription, for the selected day.
//! - Feed remote snapshots through the engine's gesture gate.
//! - Route mouse and touch input into the engine.
//!
//! # Invariants
//! - Switching days drops the old subscription before the engine moves on.
//! - Snapshots are only consumed when the owner calls `pump_snapshots`.

use crate::model::item::Item;
use crate::reorder::engine::{AbortedGesture, ReorderEngine, ReorderError, SnapshotDisposition};
use crate::reorder::input::{
    dispatch, GestureAdapter, GestureEvent, GestureOutcome, MouseAdapter, MouseInput,
    TouchAdapter, TouchInput,
};
use crate::repo::item_repo::{SequenceStore, StoreResult};
use crate::sync::feed::Subscription;

/// UI-facing planner state for one selected day.
pub struct PlannerSession<'s, S: SequenceStore + ?Sized> {
    store: &'s S,
    subscription: Subscription,
    engine: ReorderEngine,
    mouse: MouseAdapter,
    touch: TouchAdapter,
}

impl<'s, S: SequenceStore + ?Sized> PlannerSession<'s, S> {
    /// Subscribes to `day_id` and seeds the engine with its current items.
    pub fn open(store: &'s S, day_id: &str) -> StoreResult<Self> {
        let subscription = store.subscribe(day_id)?;
        let items = subscription.drain_latest().unwrap_or_default();
        Ok(Self {
            store,
            subscription,
            engine: ReorderEngine::new(day_id, items),
            mouse: MouseAdapter,
            touch: TouchAdapter::default(),
        })
    }

    pub fn day_id(&self) -> &str {
        self.engine.container_id()
    }

    pub fn items(&self) -> &[Item] {
        self.engine.items()
    }

    pub fn engine(&self) -> &ReorderEngine {
        &self.engine
    }

    /// Switches to another day.
    ///
    /// On subscribe failure the current day stays selected.
    pub fn select_day(&mut self, day_id: &str) -> StoreResult<Option<AbortedGesture>> {
        let subscription = self.store.subscribe(day_id)?;
        let items = subscription.drain_latest().unwrap_or_default();
        self.subscription = subscription;
        self.touch = TouchAdapter::default();
        Ok(self.engine.switch_container(day_id, items))
    }

    /// Hands the newest queued snapshot to the engine.
    ///
    /// Returns `None` when nothing was queued.
    pub fn pump_snapshots(&mut self) -> Option<SnapshotDisposition> {
        let items = self.subscription.drain_latest()?;
        let container_id = self.subscription.container_id().to_string();
        Some(self.engine.apply_snapshot(&container_id, items))
    }

    pub fn handle_mouse(
        &mut self,
        day_id: &str,
        input: MouseInput,
    ) -> Result<GestureOutcome, ReorderError> {
        match self.mouse.translate(input) {
            Some(kind) => self.handle_event(&GestureEvent::new(day_id, kind)),
            None => Ok(GestureOutcome::Ignored),
        }
    }

    pub fn handle_touch(
        &mut self,
        day_id: &str,
        input: TouchInput,
    ) -> Result<GestureOutcome, ReorderError> {
        match self.touch.translate(input) {
            Some(kind) => self.handle_event(&GestureEvent::new(day_id, kind)),
            None => Ok(GestureOutcome::Ignored),
        }
    }

    pub fn handle_event(&mut self, event: &GestureEvent) -> Result<GestureOutcome, ReorderError> {
        dispatch(&mut self.engine, self.store, event)
    }

    pub fn begin_edit(&mut self, item_id: &str) -> Result<(), ReorderError> {
        self.engine.begin_edit(item_id)
    }

    pub fn end_edit(&mut self) -> Option<String> {
        self.engine.end_edit()
    }

    /// Retries persisting the current local order after a failed commit.
    pub fn retry_commit(&mut self) -> Result<usize, ReorderError> {
        self.engine
            .commit_pending(self.store)
            .map(|changes| changes.len())
    }
}
