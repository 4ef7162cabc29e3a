//! Mouse and touch adapters feeding the reorder engine.
//!
//! # Responsibility
//! - Translate raw mouse-drag and touch-drag input into one gesture surface.
//! - Route gesture events to the engine of the day they were raised for.
//!
//! # Invariants
//! - Both adapters end a gesture on release and on cancel; cancel commits
//!   the last-known order like a normal release.
//! - Events addressed to a day that is no longer selected are no-ops.

use crate::model::item::ContainerId;
use crate::reorder::engine::{CommitReport, DragStep, ReorderEngine, ReorderError};
use crate::repo::item_repo::SequenceStore;
use log::info;

/// Device-independent gesture input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// Pick up the item at this index.
    Start(usize),
    /// Pointer is over the item at this index.
    Over(usize),
    /// Item released.
    Finish,
    /// Gesture interrupted (pointer left the viewport, touch cancelled).
    Cancel,
}

/// Gesture input tagged with the day whose list raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureEvent {
    pub container_id: ContainerId,
    pub kind: GestureKind,
}

impl GestureEvent {
    pub fn new(container_id: impl Into<ContainerId>, kind: GestureKind) -> Self {
        Self {
            container_id: container_id.into(),
            kind,
        }
    }
}

/// Outcome of dispatching one gesture event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureOutcome {
    Started,
    Step(DragStep),
    /// Gesture ended. `None` when no gesture was active.
    Ended(Option<CommitReport>),
    /// Event addressed a stale day and was dropped.
    Aborted,
    /// Adapter produced no gesture input.
    Ignored,
}

/// Raw mouse drag-and-drop input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseInput {
    DragStart(usize),
    DragEnter(usize),
    Drop,
    DragEnd,
    LeaveWindow,
}

/// Raw touch input. `hit` is the index of the item under the finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchInput {
    Start(usize),
    Move { hit: Option<usize> },
    End,
    Cancel,
}

/// Translates one device's raw input into gesture input.
pub trait GestureAdapter {
    type Input;

    fn translate(&mut self, input: Self::Input) -> Option<GestureKind>;
}

/// Mouse adapter. Mouse input maps one-to-one.
#[derive(Debug, Default)]
pub struct MouseAdapter;

impl GestureAdapter for MouseAdapter {
    type Input = MouseInput;

    fn translate(&mut self, input: MouseInput) -> Option<GestureKind> {
        Some(match input {
            MouseInput::DragStart(index) => GestureKind::Start(index),
            MouseInput::DragEnter(index) => GestureKind::Over(index),
            MouseInput::Drop | MouseInput::DragEnd => GestureKind::Finish,
            MouseInput::LeaveWindow => GestureKind::Cancel,
        })
    }
}

/// Touch adapter.
///
/// Touch moves fire far more often than the hit target changes, so repeats
/// of the last hit are dropped here; moves over empty space are ignored.
#[derive(Debug, Default)]
pub struct TouchAdapter {
    last_hit: Option<usize>,
}

impl GestureAdapter for TouchAdapter {
    type Input = TouchInput;

    fn translate(&mut self, input: TouchInput) -> Option<GestureKind> {
        match input {
            TouchInput::Start(index) => {
                self.last_hit = Some(index);
                Some(GestureKind::Start(index))
            }
            TouchInput::Move { hit: None } => None,
            TouchInput::Move { hit: Some(index) } => {
                if self.last_hit == Some(index) {
                    return None;
                }
                self.last_hit = Some(index);
                Some(GestureKind::Over(index))
            }
            TouchInput::End => {
                self.last_hit = None;
                Some(GestureKind::Finish)
            }
            TouchInput::Cancel => {
                self.last_hit = None;
                Some(GestureKind::Cancel)
            }
        }
    }
}

/// Routes one gesture event into the engine.
pub fn dispatch<S>(
    engine: &mut ReorderEngine,
    store: &S,
    event: &GestureEvent,
) -> Result<GestureOutcome, ReorderError>
where
    S: SequenceStore + ?Sized,
{
    if let Err(err) = engine.ensure_container(&event.container_id) {
        info!(
            "event=gesture_aborted module=reorder status=ok reason=stale_container detail=\"{}\"",
            err
        );
        return Ok(GestureOutcome::Aborted);
    }

    match event.kind {
        GestureKind::Start(index) => {
            engine.begin_drag(index)?;
            Ok(GestureOutcome::Started)
        }
        GestureKind::Over(index) => engine.drag_over(index).map(GestureOutcome::Step),
        GestureKind::Finish | GestureKind::Cancel => {
            engine.end_drag(store).map(GestureOutcome::Ended)
        }
    }
}
