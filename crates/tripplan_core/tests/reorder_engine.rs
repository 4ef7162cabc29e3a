use std::cell::{Cell, RefCell};
use tripplan_core::{
    DragStep, GestureState, Item, OrderChange, ReorderEngine, ReorderError, SequenceStore,
    SnapshotDisposition, SnapshotFeed, StoreError, StoreResult, Subscription,
};

const DAY: &str = "day-1";

#[derive(Default)]
struct RecordingStore {
    commits: RefCell<Vec<(String, Vec<OrderChange>)>>,
    offline: Cell<bool>,
    feed: SnapshotFeed,
}

impl RecordingStore {
    fn commit_count(&self) -> usize {
        self.commits.borrow().len()
    }

    fn last_commit(&self) -> Vec<OrderChange> {
        self.commits.borrow().last().unwrap().1.clone()
    }
}

impl SequenceStore for RecordingStore {
    fn subscribe(&self, container_id: &str) -> StoreResult<Subscription> {
        Ok(self.feed.subscribe(container_id, Vec::new()))
    }

    fn commit_order(&self, container_id: &str, changes: &[OrderChange]) -> StoreResult<()> {
        self.commits
            .borrow_mut()
            .push((container_id.to_string(), changes.to_vec()));
        if self.offline.get() {
            return Err(StoreError::Unavailable("network unreachable".to_string()));
        }
        Ok(())
    }
}

fn item(id: &str, order: i64) -> Item {
    Item::with_id(id, DAY, id.to_uppercase()).at(order)
}

fn abc() -> Vec<Item> {
    vec![item("a", 0), item("b", 1), item("c", 2)]
}

fn ids(engine: &ReorderEngine) -> Vec<&str> {
    engine.items().iter().map(|item| item.id.as_str()).collect()
}

fn change(id: &str, order: i64) -> OrderChange {
    OrderChange {
        item_id: id.to_string(),
        order,
    }
}

#[test]
fn dragging_first_item_to_end_commits_new_positions() {
    let store = RecordingStore::default();
    let mut engine = ReorderEngine::new(DAY, abc());

    engine.begin_drag(0).unwrap();
    assert_eq!(
        engine.drag_over(2).unwrap(),
        DragStep::Moved { from: 0, to: 2 }
    );
    assert_eq!(ids(&engine), ["b", "c", "a"]);

    let report = engine.end_drag(&store).unwrap().unwrap();
    assert_eq!(
        report.changes,
        [change("b", 0), change("c", 1), change("a", 2)]
    );
    assert_eq!(store.commit_count(), 1);
    assert_eq!(store.commits.borrow()[0].0, DAY);
    assert_eq!(engine.state(), GestureState::Idle);
}

#[test]
fn items_are_sorted_by_order_on_creation() {
    let engine = ReorderEngine::new(DAY, vec![item("c", 2), item("a", 0), item("b", 1)]);
    assert_eq!(ids(&engine), ["a", "b", "c"]);
}

#[test]
fn drag_over_current_position_is_a_no_op() {
    let mut engine = ReorderEngine::new(DAY, abc());

    engine.begin_drag(1).unwrap();
    assert_eq!(engine.drag_over(1).unwrap(), DragStep::Unchanged);
    assert_eq!(ids(&engine), ["a", "b", "c"]);

    engine.drag_over(2).unwrap();
    assert_eq!(engine.drag_over(2).unwrap(), DragStep::Unchanged);
    assert_eq!(engine.drag_over(2).unwrap(), DragStep::Unchanged);
    assert_eq!(ids(&engine), ["a", "c", "b"]);
}

#[test]
fn subsequent_moves_are_relative_to_the_new_position() {
    let mut engine = ReorderEngine::new(
        DAY,
        vec![item("a", 0), item("b", 1), item("c", 2), item("d", 3)],
    );

    engine.begin_drag(3).unwrap();
    engine.drag_over(1).unwrap();
    assert_eq!(engine.state(), GestureState::Dragging { source: 1 });
    engine.drag_over(0).unwrap();
    engine.drag_over(2).unwrap();

    assert_eq!(ids(&engine), ["a", "b", "d", "c"]);
}

#[test]
fn random_gestures_never_lose_or_duplicate_items() {
    let store = RecordingStore::default();
    let initial: Vec<Item> = (0..8).map(|n| item(&format!("i{n}"), n)).collect();
    let mut seed: u64 = 0x5eed;
    let mut next = move |bound: usize| {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((seed >> 33) as usize) % bound
    };

    for _ in 0..50 {
        let mut engine = ReorderEngine::new(DAY, initial.clone());
        let mut model: Vec<String> = initial.iter().map(|item| item.id.clone()).collect();

        let mut source = next(model.len());
        engine.begin_drag(source).unwrap();
        for _ in 0..next(10) {
            let target = next(model.len());
            engine.drag_over(target).unwrap();
            if target != source {
                let moved = model.remove(source);
                model.insert(target, moved);
                source = target;
            }
        }

        let commits_before = store.commit_count();
        let report = engine.end_drag(&store).unwrap().unwrap();
        assert_eq!(store.commit_count(), commits_before + 1);

        let current: Vec<String> = engine.items().iter().map(|item| item.id.clone()).collect();
        assert_eq!(current, model);

        let mut persisted: Vec<(i64, String)> = initial
            .iter()
            .map(|original| {
                let order = report
                    .changes
                    .iter()
                    .find(|change| change.item_id == original.id)
                    .map_or(original.order, |change| change.order);
                (order, original.id.clone())
            })
            .collect();
        persisted.sort();
        let persisted_ids: Vec<String> = persisted.into_iter().map(|(_, id)| id).collect();
        assert_eq!(persisted_ids, model);
    }
}

#[test]
fn no_commit_happens_before_the_gesture_ends() {
    let store = RecordingStore::default();
    let mut engine = ReorderEngine::new(DAY, abc());

    engine.begin_drag(0).unwrap();
    engine.drag_over(1).unwrap();
    engine.drag_over(2).unwrap();
    engine.drag_over(0).unwrap();
    assert_eq!(store.commit_count(), 0);

    engine.end_drag(&store).unwrap();
    assert_eq!(store.commit_count(), 1);
}

#[test]
fn gesture_ending_in_place_still_commits_once_with_no_changes() {
    let store = RecordingStore::default();
    let mut engine = ReorderEngine::new(DAY, abc());

    engine.begin_drag(1).unwrap();
    engine.drag_over(2).unwrap();
    engine.drag_over(1).unwrap();
    let report = engine.end_drag(&store).unwrap().unwrap();

    assert!(report.changes.is_empty());
    assert_eq!(store.commit_count(), 1);
}

#[test]
fn end_drag_without_begin_is_a_no_op() {
    let store = RecordingStore::default();
    let mut engine = ReorderEngine::new(DAY, abc());

    assert!(engine.end_drag(&store).unwrap().is_none());
    assert_eq!(store.commit_count(), 0);

    assert_eq!(engine.drag_over(2).unwrap(), DragStep::NotDragging);
    assert_eq!(ids(&engine), ["a", "b", "c"]);
}

#[test]
fn second_end_drag_does_not_commit_again() {
    let store = RecordingStore::default();
    let mut engine = ReorderEngine::new(DAY, abc());

    engine.begin_drag(0).unwrap();
    engine.drag_over(1).unwrap();
    engine.end_drag(&store).unwrap();
    assert!(engine.end_drag(&store).unwrap().is_none());

    assert_eq!(store.commit_count(), 1);
}

#[test]
fn begin_drag_validates_index_and_state() {
    let mut engine = ReorderEngine::new(DAY, abc());

    let err = engine.begin_drag(3).unwrap_err();
    assert!(matches!(err, ReorderError::IndexOutOfRange { index: 3, len: 3 }));

    engine.begin_drag(0).unwrap();
    let err = engine.begin_drag(1).unwrap_err();
    assert!(matches!(err, ReorderError::GestureActive));

    let err = engine.drag_over(5).unwrap_err();
    assert!(matches!(err, ReorderError::IndexOutOfRange { index: 5, len: 3 }));
    assert_eq!(engine.state(), GestureState::Dragging { source: 0 });
}

#[test]
fn editing_and_dragging_are_mutually_exclusive() {
    let mut engine = ReorderEngine::new(DAY, abc());

    engine.begin_edit("b").unwrap();
    let err = engine.begin_drag(0).unwrap_err();
    assert!(matches!(err, ReorderError::EditInProgress(id) if id == "b"));
    assert_eq!(engine.end_edit().as_deref(), Some("b"));

    engine.begin_drag(0).unwrap();
    let err = engine.begin_edit("c").unwrap_err();
    assert!(matches!(err, ReorderError::GestureActive));

    let mut idle = ReorderEngine::new(DAY, abc());
    let err = idle.begin_edit("zzz").unwrap_err();
    assert!(matches!(err, ReorderError::UnknownItem(id) if id == "zzz"));
}

#[test]
fn snapshot_is_applied_while_idle() {
    let mut engine = ReorderEngine::new(DAY, abc());

    let remote = vec![item("c", 0), item("a", 1), item("b", 2), item("d", 3)];
    assert_eq!(
        engine.apply_snapshot(DAY, remote),
        SnapshotDisposition::Applied
    );
    assert_eq!(ids(&engine), ["c", "a", "b", "d"]);
}

#[test]
fn snapshot_during_gesture_does_not_overwrite_local_items() {
    let store = RecordingStore::default();
    let mut engine = ReorderEngine::new(DAY, abc());

    engine.begin_drag(0).unwrap();
    engine.drag_over(2).unwrap();
    let remote = vec![item("a", 0), item("b", 1), item("c", 2), item("d", 3)];
    assert_eq!(
        engine.apply_snapshot(DAY, remote),
        SnapshotDisposition::Deferred
    );
    assert_eq!(ids(&engine), ["b", "c", "a"]);
    assert!(engine.has_deferred_snapshot());

    engine.drag_over(1).unwrap();
    assert_eq!(ids(&engine), ["b", "a", "c"]);

    let report = engine.end_drag(&store).unwrap().unwrap();
    assert!(report.deferred_snapshot_dropped);
    assert!(!report.deferred_snapshot_applied);
    assert!(!engine.has_deferred_snapshot());
    assert_eq!(ids(&engine), ["b", "a", "c"]);

    let post_commit = vec![item("b", 0), item("a", 1), item("c", 2), item("d", 3)];
    assert_eq!(
        engine.apply_snapshot(DAY, post_commit),
        SnapshotDisposition::Applied
    );
    assert_eq!(ids(&engine), ["b", "a", "c", "d"]);
}

#[test]
fn gesture_back_to_start_applies_deferred_snapshot() {
    let store = RecordingStore::default();
    let mut engine = ReorderEngine::new(DAY, abc());

    engine.begin_drag(0).unwrap();
    engine.drag_over(1).unwrap();
    let remote = vec![item("a", 0), item("b", 1), item("c", 2), item("d", 3)];
    assert_eq!(
        engine.apply_snapshot(DAY, remote),
        SnapshotDisposition::Deferred
    );
    engine.drag_over(0).unwrap();

    let report = engine.end_drag(&store).unwrap().unwrap();
    assert!(report.changes.is_empty());
    assert!(report.deferred_snapshot_applied);
    assert!(!report.deferred_snapshot_dropped);
    assert!(!engine.has_deferred_snapshot());
    assert_eq!(ids(&engine), ["a", "b", "c", "d"]);
    assert_eq!(store.commit_count(), 1);
}

#[test]
fn snapshot_for_other_day_is_discarded() {
    let mut engine = ReorderEngine::new(DAY, abc());

    let disposition = engine.apply_snapshot("day-2", vec![item("x", 0)]);
    assert_eq!(disposition, SnapshotDisposition::StaleContainer);
    assert_eq!(ids(&engine), ["a", "b", "c"]);
}

#[test]
fn failed_commit_keeps_local_order_and_can_be_retried() {
    let store = RecordingStore::default();
    store.offline.set(true);
    let mut engine = ReorderEngine::new(DAY, abc());

    engine.begin_drag(0).unwrap();
    engine.drag_over(2).unwrap();
    let err = engine.end_drag(&store).unwrap_err();

    assert!(matches!(err, ReorderError::Commit(StoreError::Unavailable(_))));
    assert!(err.is_retryable());
    assert_eq!(engine.state(), GestureState::Idle);
    assert_eq!(ids(&engine), ["b", "c", "a"]);
    assert_eq!(engine.pending_changes().len(), 3);

    store.offline.set(false);
    let retried = engine.commit_pending(&store).unwrap();
    assert_eq!(retried, [change("b", 0), change("c", 1), change("a", 2)]);
    assert_eq!(store.last_commit(), retried);
    assert!(engine.pending_changes().is_empty());
    assert!(engine.commit_pending(&store).unwrap().is_empty());
    assert_eq!(store.commit_count(), 2);
}

#[test]
fn failed_commit_reconciles_to_deferred_snapshot() {
    let store = RecordingStore::default();
    store.offline.set(true);
    let mut engine = ReorderEngine::new(DAY, abc());

    engine.begin_drag(2).unwrap();
    engine.drag_over(0).unwrap();
    engine.apply_snapshot(DAY, vec![item("a", 0), item("b", 1)]);

    engine.end_drag(&store).unwrap_err();

    assert_eq!(ids(&engine), ["a", "b"]);
    assert!(!engine.has_deferred_snapshot());
}

#[test]
fn switching_day_mid_gesture_aborts_without_commit() {
    let store = RecordingStore::default();
    let mut engine = ReorderEngine::new(DAY, abc());

    engine.begin_drag(0).unwrap();
    engine.drag_over(1).unwrap();
    engine.apply_snapshot(DAY, abc());

    let other = vec![Item::with_id("x", "day-2", "X").at(0)];
    let aborted = engine.switch_container("day-2", other).unwrap();

    assert_eq!(aborted.container_id, DAY);
    assert_eq!(aborted.source, 1);
    assert_eq!(engine.container_id(), "day-2");
    assert_eq!(engine.state(), GestureState::Idle);
    assert!(!engine.has_deferred_snapshot());
    assert_eq!(ids(&engine), ["x"]);

    assert!(engine.end_drag(&store).unwrap().is_none());
    assert_eq!(store.commit_count(), 0);
}

#[test]
fn snapshot_removing_edited_item_clears_edit_mode() {
    let mut engine = ReorderEngine::new(DAY, abc());
    engine.begin_edit("c").unwrap();

    engine.apply_snapshot(DAY, vec![item("a", 0), item("b", 1)]);

    assert_eq!(engine.editing(), None);
    engine.begin_drag(0).unwrap();
}
