//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose board and calendar use cases to Dart via FRB.
//! - Own the process-wide `TaskStore` behind a mutex.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - All board calls go through one store instance, so writes are serialized.
//! - A failed store open is not cached; the next call retries.
//! - A poisoned lock is recovered; mutations finish in memory before persisting.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tasklane_core::{
    calendar_days_of_month, core_version as core_version_inner,
    init_logging as init_logging_inner, ping as ping_inner, CalendarDay, Clock, DragEvent,
    ListReorderCoordinator, ListType, SqliteBlobStore, SystemClock, Task, TaskMetadata, TaskPatch,
    TaskStore,
};

const BOARD_DB_FILE_NAME: &str = "tasklane.sqlite3";
const BOARD_DB_PATH_ENV: &str = "TASKLANE_DB_PATH";

static BOARD_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static BOARD: Mutex<Option<TaskStore<SqliteBlobStore>>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Task projection for Dart.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskItem {
    pub id: String,
    pub title: String,
    pub completed: bool,
    /// `general|weekly|monthly|stash`.
    pub list_type: String,
    pub position: f64,
    pub weekday: Option<u8>,
    pub date: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl From<Task> for TaskItem {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            completed: task.completed,
            list_type: task.list_type.as_str().to_string(),
            position: task.position,
            weekday: task.weekday,
            date: task.date,
            created_at_ms: task.created_at,
            updated_at_ms: task.updated_at,
        }
    }
}

/// Sorted sublist response.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardListResponse {
    pub ok: bool,
    /// Tasks in render order (ascending position).
    pub items: Vec<TaskItem>,
    pub message: String,
}

/// Generic board mutation response.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardActionResponse {
    pub ok: bool,
    /// Affected task, when the operation targets one.
    pub task_id: Option<String>,
    /// Committed position for add/drag operations.
    pub position: Option<f64>,
    /// Number of tasks affected by bulk operations.
    pub affected: u32,
    pub message: String,
}

impl BoardActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            task_id: None,
            position: None,
            affected: 0,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            ..Self::success(message)
        }
    }

    fn with_task(mut self, task_id: impl Into<String>, position: Option<f64>) -> Self {
        self.task_id = Some(task_id.into());
        self.position = position;
        self
    }

    fn with_affected(mut self, affected: usize) -> Self {
        self.affected = u32::try_from(affected).unwrap_or(u32::MAX);
        self
    }
}

/// Calendar cell projection for Dart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDayItem {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub day_number: u32,
    /// `0 = Sunday`.
    pub weekday: u8,
    pub is_today: bool,
}

impl From<CalendarDay> for CalendarDayItem {
    fn from(day: CalendarDay) -> Self {
        Self {
            date: day.date,
            day_number: day.day_number,
            weekday: day.weekday,
            is_today: day.is_today,
        }
    }
}

/// Returns one sublist in render order.
///
/// # FFI contract
/// - Sync call, reads in-memory state.
/// - `weekday`/`date` select the weekly column or monthly day.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn board_list(list_type: String, weekday: Option<u8>, date: Option<String>) -> BoardListResponse {
    let result = parse_list_type(&list_type).and_then(|list_type| {
        let metadata = metadata_from(weekday, date);
        with_board(|store| Ok(store.sorted_list(list_type, &metadata)))
    });

    match result {
        Ok(tasks) => BoardListResponse {
            ok: true,
            message: format!("{} task(s).", tasks.len()),
            items: tasks.into_iter().map(TaskItem::from).collect(),
        },
        Err(err) => BoardListResponse {
            ok: false,
            items: Vec::new(),
            message: format!("board_list failed: {err}"),
        },
    }
}

/// Creates a task.
///
/// # FFI contract
/// - Sync call, writes through to SQLite.
/// - Blank titles become the default title; missing position uses the
///   default gap.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn board_add(
    title: String,
    list_type: String,
    position: Option<f64>,
    weekday: Option<u8>,
    date: Option<String>,
) -> BoardActionResponse {
    let result = parse_list_type(&list_type).and_then(|list_type| {
        let metadata = metadata_from(weekday, date);
        with_board(|store| {
            store
                .add_todo(&title, list_type, position, &metadata)
                .map_err(|err| err.to_string())
        })
    });

    match result {
        Ok(task) => BoardActionResponse::success("Task added.")
            .with_task(task.id, Some(task.position))
            .with_affected(1),
        Err(err) => BoardActionResponse::failure(format!("board_add failed: {err}")),
    }
}

/// Applies a partial update to one task.
///
/// # FFI contract
/// - Absent arguments keep current values.
/// - Unknown ids succeed with `affected = 0`.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn board_update(
    id: String,
    title: Option<String>,
    completed: Option<bool>,
    position: Option<f64>,
) -> BoardActionResponse {
    let patch = TaskPatch {
        title,
        completed,
        position,
        ..TaskPatch::default()
    };
    match with_board(|store| store.update_todo(&id, patch).map_err(|err| err.to_string())) {
        Ok(true) => BoardActionResponse::success("Task updated.")
            .with_task(id, None)
            .with_affected(1),
        Ok(false) => BoardActionResponse::success("Task not found.").with_task(id, None),
        Err(err) => BoardActionResponse::failure(format!("board_update failed: {err}")),
    }
}

/// Deletes one task.
///
/// # FFI contract
/// - Unknown ids succeed with `affected = 0`.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn board_delete(id: String) -> BoardActionResponse {
    match with_board(|store| store.delete_todo(&id).map_err(|err| err.to_string())) {
        Ok(true) => BoardActionResponse::success("Task deleted.")
            .with_task(id, None)
            .with_affected(1),
        Ok(false) => BoardActionResponse::success("Task not found.").with_task(id, None),
        Err(err) => BoardActionResponse::failure(format!("board_delete failed: {err}")),
    }
}

/// Removes completed tasks of `list_type` and of the stash.
///
/// # FFI contract
/// - `affected` reports the number of removed tasks.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn board_clear_completed(list_type: String) -> BoardActionResponse {
    let result = parse_list_type(&list_type).and_then(|list_type| {
        with_board(|store| {
            store
                .clear_completed(list_type)
                .map_err(|err| err.to_string())
        })
    });
    match result {
        Ok(removed) => {
            BoardActionResponse::success(format!("Removed {removed} task(s).")).with_affected(removed)
        }
        Err(err) => BoardActionResponse::failure(format!("board_clear_completed failed: {err}")),
    }
}

/// Commits one drag-and-drop change.
///
/// Input semantics:
/// - `event_json`: `{"added"|"moved": {"element": {"id": ..}, "newIndex": n}}`.
/// - `list_type` + `weekday`/`date`: the target sublist.
///
/// # FFI contract
/// - Unknown dragged ids succeed with `affected = 0`.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn board_drag_change(
    event_json: String,
    list_type: String,
    weekday: Option<u8>,
    date: Option<String>,
) -> BoardActionResponse {
    let event = match DragEvent::from_json(&event_json) {
        Ok(event) => event,
        Err(err) => {
            log::warn!("event=drag_change module=ffi status=skipped error={err}");
            return BoardActionResponse::failure(format!("board_drag_change failed: {err}"));
        }
    };
    let result = parse_list_type(&list_type).and_then(|list_type| {
        let metadata = metadata_from(weekday, date);
        with_board(|store| {
            ListReorderCoordinator::new(store)
                .on_drag_change(&event, list_type, &metadata)
                .map_err(|err| err.to_string())
        })
    });

    let task_id = event.element_id().to_string();
    match result {
        Ok(Some(position)) => BoardActionResponse::success("Task moved.")
            .with_task(task_id, Some(position))
            .with_affected(1),
        Ok(None) => BoardActionResponse::success("Task not found.").with_task(task_id, None),
        Err(err) => BoardActionResponse::failure(format!("board_drag_change failed: {err}")),
    }
}

/// Runs the weekly reset and monthly pruning rules against the current time.
///
/// # FFI contract
/// - Intended for app resume / periodic timers.
/// - `affected` reports reset plus pruned task count.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn board_run_lifecycle() -> BoardActionResponse {
    let result = with_board(|store| {
        let before = store.todos().iter().filter(|task| task.completed).count();
        let reset = store.check_weekly_reset().map_err(|err| err.to_string())?;
        let after = store.todos().iter().filter(|task| task.completed).count();
        let pruned = store
            .prune_monthly_todos()
            .map_err(|err| err.to_string())?;
        Ok((reset, before.saturating_sub(after), pruned))
    });

    match result {
        Ok((reset, uncompleted, pruned)) => BoardActionResponse::success(format!(
            "weekly_reset={reset} pruned={pruned}"
        ))
        .with_affected(uncompleted + pruned),
        Err(err) => BoardActionResponse::failure(format!("board_run_lifecycle failed: {err}")),
    }
}

/// Retries the last failed write, if any.
///
/// # FFI contract
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn board_flush() -> String {
    match with_board(|store| store.flush().map_err(|err| err.to_string())) {
        Ok(()) => String::new(),
        Err(err) => format!("board_flush failed: {err}"),
    }
}

/// Enumerates the days of a month for the calendar grid.
///
/// # FFI contract
/// - Missing `year`/`month` default to the current local month.
/// - Invalid months (outside `1..=12`) return an empty list.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn calendar_days(year: Option<i32>, month: Option<u32>) -> Vec<CalendarDayItem> {
    calendar_days_of_month(year, month, &SystemClock.now())
        .into_iter()
        .map(CalendarDayItem::from)
        .collect()
}

fn parse_list_type(raw: &str) -> Result<ListType, String> {
    ListType::parse(raw).ok_or_else(|| {
        format!("unsupported list_type `{}`; expected general|weekly|monthly|stash", raw.trim())
    })
}

fn metadata_from(weekday: Option<u8>, date: Option<String>) -> TaskMetadata {
    TaskMetadata { weekday, date }.sanitized()
}

fn resolve_board_db_path() -> PathBuf {
    BOARD_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(BOARD_DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(BOARD_DB_FILE_NAME)
        })
        .clone()
}

fn lock_board() -> MutexGuard<'static, Option<TaskStore<SqliteBlobStore>>> {
    BOARD
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn with_board<T>(
    f: impl FnOnce(&mut TaskStore<SqliteBlobStore>) -> Result<T, String>,
) -> Result<T, String> {
    let mut guard = lock_board();
    if guard.is_none() {
        let db_path = resolve_board_db_path();
        let blobs = SqliteBlobStore::open(&db_path)
            .map_err(|err| format!("board DB open failed: {err}"))?;
        log::info!(
            "event=board_open module=ffi status=ok db_path={}",
            db_path.display()
        );
        *guard = Some(TaskStore::open(blobs));
    }

    match guard.as_mut() {
        Some(store) => f(store),
        None => Err("board store unavailable".to_string()),
    }
}
