use chrono::{Duration, Local, TimeZone};
use std::sync::{Arc, Mutex};
use tasklane_core::{
    start_of_week, BlobStore, BoardState, Clock, FixedClock, ListType, MemoryBlobStore,
    StorageError, StorageResult, StoreEvent, StoreOptions, TaskMetadata, TaskPatch, TaskStore,
    DEFAULT_STORAGE_KEY, DEFAULT_TASK_TITLE, POSITION_GAP,
};

fn clock_at(y: i32, m: u32, d: u32) -> FixedClock {
    FixedClock::at(Local.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
}

fn sequential_ids() -> impl FnMut() -> String + Send {
    let mut counter = 0;
    move || {
        counter += 1;
        format!("task-{counter}")
    }
}

fn open_store(blobs: MemoryBlobStore, clock: &FixedClock) -> TaskStore<MemoryBlobStore> {
    TaskStore::open_with(
        blobs,
        StoreOptions::default()
            .clock(clock.clone())
            .id_source(sequential_ids()),
    )
}

fn persisted(blobs: &MemoryBlobStore) -> BoardState {
    let raw = blobs.get(DEFAULT_STORAGE_KEY).unwrap().expect("state blob");
    let decoded = BoardState::decode(&raw, 0);
    assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
    decoded.state
}

#[test]
fn open_without_blob_starts_empty() {
    let clock = clock_at(2026, 10, 19);
    let store = open_store(MemoryBlobStore::new(), &clock);

    assert!(store.todos().is_empty());
    assert_eq!(store.last_weekly_reset(), clock.now_ms());
    assert!(!store.is_dirty());
}

#[test]
fn open_with_corrupt_blob_falls_back_to_defaults() {
    let clock = clock_at(2026, 10, 19);
    let blobs = MemoryBlobStore::with_blob(DEFAULT_STORAGE_KEY, "{ definitely not json");

    let store = open_store(blobs, &clock);

    assert!(store.todos().is_empty());
    assert_eq!(store.last_weekly_reset(), clock.now_ms());
}

#[test]
fn open_keeps_tasks_with_malformed_fields_across_writes() {
    let clock = clock_at(2026, 10, 19);
    let raw = serde_json::json!({
        "todos": [
            {
                "id": "keep", "title": "good", "completed": false, "listType": "general",
                "position": 1000, "createdAt": 1, "updatedAt": 1
            },
            {
                "id": "important", "title": "call mom", "completed": false, "listType": "weekly",
                "position": 2000, "weekday": -1, "createdAt": 1, "updatedAt": 1
            },
            {
                "id": "quoted", "title": "pay rent", "completed": false, "listType": "general",
                "position": "3000", "createdAt": 1, "updatedAt": 1
            }
        ],
        "lastWeeklyReset": clock.now_ms()
    })
    .to_string();
    let blobs = MemoryBlobStore::with_blob(DEFAULT_STORAGE_KEY, &raw);

    let mut store = open_store(blobs.clone(), &clock);
    store
        .add_todo("new", ListType::General, None, &TaskMetadata::none())
        .unwrap();

    let saved = persisted(&blobs);
    let ids = saved.todos.iter().map(|task| task.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["keep", "important", "quoted", "task-1"]);
    assert_eq!(saved.todos[1].title, "call mom");
    assert_eq!(saved.todos[1].weekday, None);
    assert_eq!(saved.todos[2].position, POSITION_GAP);
}

#[test]
fn add_todo_stores_non_blank_titles_verbatim() {
    let clock = clock_at(2026, 10, 19);
    let mut store = open_store(MemoryBlobStore::new(), &clock);

    let task = store
        .add_todo("  indented title ", ListType::General, None, &TaskMetadata::none())
        .unwrap();

    assert_eq!(task.title, "  indented title ");
}

#[test]
fn add_todo_appends_defaults_and_persists() {
    let clock = clock_at(2026, 10, 19);
    let blobs = MemoryBlobStore::new();
    let mut store = open_store(blobs.clone(), &clock);

    let task = store
        .add_todo("   ", ListType::Weekly, None, &TaskMetadata::weekday(3))
        .unwrap();

    assert_eq!(task.id, "task-1");
    assert_eq!(task.title, DEFAULT_TASK_TITLE);
    assert_eq!(task.position, POSITION_GAP);
    assert_eq!(task.weekday, Some(3));
    assert_eq!(task.date, None);
    assert!(!task.completed);
    assert_eq!(task.created_at, clock.now_ms());
    assert_eq!(task.updated_at, clock.now_ms());

    assert_eq!(persisted(&blobs).todos, vec![task]);
}

#[test]
fn add_todo_drops_invalid_position_and_weekday() {
    let clock = clock_at(2026, 10, 19);
    let mut store = open_store(MemoryBlobStore::new(), &clock);

    let task = store
        .add_todo(
            "bad input",
            ListType::Weekly,
            Some(f64::INFINITY),
            &TaskMetadata::weekday(11),
        )
        .unwrap();

    assert_eq!(task.position, POSITION_GAP);
    assert_eq!(task.weekday, None);
}

#[test]
fn add_todo_never_reuses_an_existing_id() {
    let clock = clock_at(2026, 10, 19);
    let mut store = TaskStore::open_with(
        MemoryBlobStore::new(),
        StoreOptions::default()
            .clock(clock)
            .id_source(|| "same".to_string()),
    );

    let first = store
        .add_todo("a", ListType::General, None, &TaskMetadata::none())
        .unwrap();
    let second = store
        .add_todo("b", ListType::General, None, &TaskMetadata::none())
        .unwrap();

    assert_eq!(first.id, "same");
    assert_ne!(second.id, first.id);
    assert!(!second.id.is_empty());
}

#[test]
fn update_todo_merges_only_present_fields() {
    let clock = clock_at(2026, 10, 19);
    let blobs = MemoryBlobStore::new();
    let mut store = open_store(blobs.clone(), &clock);
    let task = store
        .add_todo("keep me", ListType::General, Some(10.0), &TaskMetadata::none())
        .unwrap();

    clock.advance(Duration::minutes(5));
    let patch = TaskPatch {
        title: None,
        completed: Some(true),
        ..TaskPatch::default()
    };
    assert!(store.update_todo(&task.id, patch).unwrap());

    let updated = store.get_todo(&task.id).unwrap();
    assert_eq!(updated.title, "keep me");
    assert!(updated.completed);
    assert_eq!(updated.position, 10.0);
    assert_eq!(updated.created_at, task.created_at);
    assert_eq!(updated.updated_at, clock.now_ms());
    assert_eq!(&persisted(&blobs).todos[0], updated);
}

#[test]
fn update_and_delete_unknown_ids_are_silent_noops() {
    let clock = clock_at(2026, 10, 19);
    let blobs = MemoryBlobStore::new();
    let mut store = open_store(blobs.clone(), &clock);
    store
        .add_todo("only", ListType::General, None, &TaskMetadata::none())
        .unwrap();
    let before = blobs.get(DEFAULT_STORAGE_KEY).unwrap();

    assert!(!store
        .update_todo("missing", TaskPatch::new().completed(true))
        .unwrap());
    assert!(!store.delete_todo("missing").unwrap());

    assert_eq!(store.todos().len(), 1);
    assert_eq!(blobs.get(DEFAULT_STORAGE_KEY).unwrap(), before);
}

#[test]
fn delete_todo_removes_task() {
    let clock = clock_at(2026, 10, 19);
    let blobs = MemoryBlobStore::new();
    let mut store = open_store(blobs.clone(), &clock);
    let first = store
        .add_todo("a", ListType::General, None, &TaskMetadata::none())
        .unwrap();
    let second = store
        .add_todo("b", ListType::General, None, &TaskMetadata::none())
        .unwrap();

    assert!(store.delete_todo(&first.id).unwrap());

    assert_eq!(store.todos().len(), 1);
    assert_eq!(store.todos()[0].id, second.id);
    assert_eq!(persisted(&blobs).todos.len(), 1);
}

#[test]
fn clear_completed_sweeps_target_list_and_stash() {
    let clock = clock_at(2026, 10, 19);
    let mut store = open_store(MemoryBlobStore::new(), &clock);
    let none = TaskMetadata::none();
    let general_done = store.add_todo("g1", ListType::General, None, &none).unwrap();
    let general_open = store.add_todo("g2", ListType::General, None, &none).unwrap();
    let stash_done = store.add_todo("s1", ListType::Stash, None, &none).unwrap();
    let weekly_done = store
        .add_todo("w1", ListType::Weekly, None, &TaskMetadata::weekday(1))
        .unwrap();
    for id in [&general_done.id, &stash_done.id, &weekly_done.id] {
        store
            .update_todo(id, TaskPatch::new().completed(true))
            .unwrap();
    }

    let removed = store.clear_completed(ListType::General).unwrap();

    assert_eq!(removed, 2);
    let remaining: Vec<_> = store.todos().iter().map(|task| task.id.clone()).collect();
    assert_eq!(remaining, vec![general_open.id, weekly_done.id]);
}

#[test]
fn weekly_reset_runs_once_per_week() {
    let clock = clock_at(2026, 10, 21);
    let blobs = MemoryBlobStore::new();
    let mut store = open_store(blobs.clone(), &clock);
    let weekly = store
        .add_todo("stretch", ListType::Weekly, None, &TaskMetadata::weekday(3))
        .unwrap();
    let general = store
        .add_todo("taxes", ListType::General, None, &TaskMetadata::none())
        .unwrap();
    store
        .update_todo(&weekly.id, TaskPatch::new().completed(true))
        .unwrap();
    store
        .update_todo(&general.id, TaskPatch::new().completed(true))
        .unwrap();

    // Same week: nothing happens.
    assert!(!store.check_weekly_reset().unwrap());
    assert!(store.get_todo(&weekly.id).unwrap().completed);

    clock.advance(Duration::days(6));
    assert!(store.check_weekly_reset().unwrap());
    assert!(!store.get_todo(&weekly.id).unwrap().completed);
    assert!(store.get_todo(&general.id).unwrap().completed);
    assert_eq!(store.last_weekly_reset(), clock.now_ms());
    assert_eq!(persisted(&blobs).last_weekly_reset, clock.now_ms());

    store
        .update_todo(&weekly.id, TaskPatch::new().completed(true))
        .unwrap();
    assert!(!store.check_weekly_reset().unwrap());
    assert!(store.get_todo(&weekly.id).unwrap().completed);
}

#[test]
fn open_applies_weekly_reset_for_stale_marker() {
    let clock = clock_at(2026, 10, 21);
    let week_start = start_of_week(&clock.now());
    let blob = serde_json::json!({
        "todos": [{
            "id": "w1",
            "title": "run",
            "completed": true,
            "listType": "weekly",
            "position": 1000,
            "weekday": 2,
            "date": null,
            "createdAt": 1,
            "updatedAt": 1
        }],
        "lastWeeklyReset": week_start - 1
    });
    let blobs = MemoryBlobStore::with_blob(DEFAULT_STORAGE_KEY, blob.to_string());

    let store = open_store(blobs.clone(), &clock);

    assert!(!store.get_todo("w1").unwrap().completed);
    assert_eq!(store.last_weekly_reset(), clock.now_ms());
    assert!(!persisted(&blobs).todos[0].completed);
}

#[test]
fn prune_keeps_adjacent_months_and_drops_distant_ones() {
    let clock = clock_at(2026, 1, 15);
    let mut store = open_store(MemoryBlobStore::new(), &clock);
    let mut add_monthly = |date: &str| {
        store
            .add_todo(date, ListType::Monthly, None, &TaskMetadata::date(date))
            .unwrap()
            .id
    };
    let two_before = add_monthly("2025-11-30");
    let one_before = add_monthly("2025-12-01");
    let current = add_monthly("2026-01-15");
    let one_after = add_monthly("2026-02-28");
    let two_after = add_monthly("2026-03-01");
    let garbage = add_monthly("someday");
    let undated = store
        .add_todo("undated", ListType::Monthly, None, &TaskMetadata::none())
        .unwrap()
        .id;
    let general = store
        .add_todo("old", ListType::General, None, &TaskMetadata::date("2020-01-01"))
        .unwrap()
        .id;

    let removed = store.prune_monthly_todos().unwrap();

    assert_eq!(removed, 3);
    let remaining: Vec<_> = store.todos().iter().map(|task| task.id.clone()).collect();
    assert_eq!(remaining, vec![one_before, current, one_after, undated, general]);
    assert!(store.get_todo(&two_before).is_none());
    assert!(store.get_todo(&two_after).is_none());
    assert!(store.get_todo(&garbage).is_none());
}

#[test]
fn observers_receive_committed_mutations() {
    let clock = clock_at(2026, 10, 19);
    let mut store = open_store(MemoryBlobStore::new(), &clock);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    store.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

    let task = store
        .add_todo("watch", ListType::General, None, &TaskMetadata::none())
        .unwrap();
    store
        .update_todo(&task.id, TaskPatch::new().title("watched"))
        .unwrap();
    store.update_todo("missing", TaskPatch::new()).unwrap();
    store.delete_todo(&task.id).unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            StoreEvent::Added(task.id.clone()),
            StoreEvent::Updated(task.id.clone()),
            StoreEvent::Deleted(task.id),
        ]
    );
}

#[derive(Clone, Default)]
struct FlakyBlobStore {
    inner: MemoryBlobStore,
    failing: Arc<Mutex<bool>>,
}

impl BlobStore for FlakyBlobStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if *self.failing.lock().unwrap() {
            return Err(StorageError::Unavailable("quota exceeded".to_string()));
        }
        self.inner.set(key, value)
    }
}

#[test]
fn failed_writes_keep_state_and_are_retried() {
    let clock = clock_at(2026, 10, 19);
    let blobs = FlakyBlobStore::default();
    let mut store = TaskStore::open_with(
        blobs.clone(),
        StoreOptions::default()
            .clock(clock)
            .id_source(sequential_ids()),
    );

    *blobs.failing.lock().unwrap() = true;
    let err = store.add_todo("offline", ListType::General, None, &TaskMetadata::none());
    assert!(err.is_err());
    assert!(store.is_dirty());
    assert_eq!(store.todos().len(), 1);
    assert_eq!(blobs.inner.get(DEFAULT_STORAGE_KEY).unwrap(), None);

    *blobs.failing.lock().unwrap() = false;
    store.flush().unwrap();
    assert!(!store.is_dirty());
    assert_eq!(persisted(&blobs.inner).todos.len(), 1);
    store.close().unwrap();
}

#[test]
fn custom_storage_key_is_used_for_load_and_save() {
    let clock = clock_at(2026, 10, 19);
    let blobs = MemoryBlobStore::new();
    let mut store = TaskStore::open_with(
        blobs.clone(),
        StoreOptions::default()
            .storage_key("profile-2")
            .clock(clock.clone()),
    );
    store
        .add_todo("x", ListType::Stash, None, &TaskMetadata::none())
        .unwrap();

    assert_eq!(store.storage_key(), "profile-2");
    assert!(blobs.get("profile-2").unwrap().is_some());
    assert!(blobs.get(DEFAULT_STORAGE_KEY).unwrap().is_none());

    let reopened = TaskStore::open_with(
        blobs,
        StoreOptions::default().storage_key("profile-2").clock(clock),
    );
    assert_eq!(reopened.todos().len(), 1);
}
