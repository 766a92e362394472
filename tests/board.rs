//! Board moves against a real store

mod support;

use cadence::board::Board;
use cadence::error::Error;
use cadence::query::TaskQuery;
use cadence::store::TaskStore;
use cadence::task::{TaskDraft, TaskRecord, TaskStatus, TaskTemplate};
use support::TestRoot;

fn seed(store: &TaskStore, titles: &[&str]) -> Vec<TaskRecord> {
    titles
        .iter()
        .map(|title| {
            store
                .create_task(TaskDraft::standalone(TaskTemplate::new(*title), None), Some("ana"))
                .expect("create task")
        })
        .collect()
}

fn load_board(store: &TaskStore) -> Board {
    Board::from_tasks(store.list_tasks(&TaskQuery::default()).expect("list").tasks)
}

fn titles(board: &Board, status: TaskStatus) -> Vec<String> {
    board
        .column(status)
        .iter()
        .map(|task| task.title.clone())
        .collect()
}

#[test]
fn successful_move_matches_store() {
    let root = TestRoot::new();
    let store = root.store();
    let tasks = seed(&store, &["Label samples", "Book microscope", "Order reagents"]);
    let mut board = load_board(&store);

    let moved = board
        .move_task(&store, &tasks[1].id, TaskStatus::InProgress, None, Some("ben"))
        .unwrap();
    assert_eq!(moved.status, TaskStatus::InProgress);
    assert_eq!(moved.position, 0);
    assert_eq!(moved.updated_by.as_deref(), Some("ben"));
    assert!(!board.is_in_flight(&tasks[1].id));
    assert!(board.take_notices().is_empty());

    assert_eq!(titles(&board, TaskStatus::Pending), ["Label samples", "Order reagents"]);
    assert_eq!(titles(&board, TaskStatus::InProgress), ["Book microscope"]);

    // A fresh board from the store agrees with the local one.
    let reloaded = load_board(&store);
    assert_eq!(titles(&reloaded, TaskStatus::Pending), titles(&board, TaskStatus::Pending));
    assert_eq!(
        store.get_task(&tasks[2].id).unwrap().position,
        1,
        "pending column renumbered in the store"
    );
}

#[test]
fn reorder_within_column_persists_index() {
    let root = TestRoot::new();
    let store = root.store();
    let tasks = seed(&store, &["a", "b", "c"]);
    let mut board = load_board(&store);

    board
        .move_task(&store, &tasks[2].id, TaskStatus::Pending, Some(0), None)
        .unwrap();

    assert_eq!(titles(&board, TaskStatus::Pending), ["c", "a", "b"]);
    let reloaded = load_board(&store);
    assert_eq!(titles(&reloaded, TaskStatus::Pending), ["c", "a", "b"]);
}

#[test]
fn failed_persist_rolls_back_and_queues_notice() {
    let root = TestRoot::new();
    let store = root.store();
    let tasks = seed(&store, &["Label samples", "Book microscope", "Order reagents"]);
    let mut board = load_board(&store);

    // Someone else deleted the task after the board was loaded.
    store.delete_task(&tasks[1].id).unwrap();

    let err = board
        .move_task(&store, &tasks[1].id, TaskStatus::Completed, None, None)
        .expect_err("store rejects the move");
    assert!(matches!(err, Error::TaskNotFound(_)));

    assert_eq!(
        titles(&board, TaskStatus::Pending),
        ["Label samples", "Book microscope", "Order reagents"]
    );
    assert!(board.column(TaskStatus::Completed).is_empty());
    assert!(!board.is_in_flight(&tasks[1].id));

    let notices = board.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].task_id, tasks[1].id);
    assert_eq!(notices[0].restored_status, TaskStatus::Pending);
    assert_eq!(notices[0].restored_index, 1);
    assert!(notices[0].message.contains("not found"));
    assert!(board.take_notices().is_empty());
}

#[test]
fn denied_move_leaves_board_untouched() {
    let root = TestRoot::new();
    let writer = root.store();
    let tasks = seed(&writer, &["Label samples"]);

    let reader = root.store_with_grants(&["tasks.view"]);
    let mut board = load_board(&reader);

    let err = board
        .move_task(&reader, &tasks[0].id, TaskStatus::Review, None, None)
        .expect_err("no update permission");
    assert!(matches!(err, Error::PermissionDenied(_)));
    assert_eq!(err.exit_code(), 3);

    assert_eq!(titles(&board, TaskStatus::Pending), ["Label samples"]);
    assert!(board.take_notices().is_empty());
    assert_eq!(writer.get_task(&tasks[0].id).unwrap().status, TaskStatus::Pending);
}

#[test]
fn second_move_while_in_flight_is_rejected() {
    let root = TestRoot::new();
    let store = root.store();
    let tasks = seed(&store, &["Label samples"]);
    let mut board = load_board(&store);

    let pending = board
        .begin_move(&tasks[0].id, TaskStatus::InProgress, None, store.permissions())
        .unwrap();
    let err = board
        .begin_move(&tasks[0].id, TaskStatus::Review, None, store.permissions())
        .expect_err("already in flight");
    assert!(matches!(err, Error::MoveInFlight(_)));

    board.confirm(&pending).unwrap();
    assert!(!board.is_in_flight(&tasks[0].id));
    assert_eq!(board.locate(&tasks[0].id), Some((TaskStatus::InProgress, 0)));
}
