//! Canonical task collection with write-through persistence.
//!
//! # Responsibility
//! - Own the board state for the process lifetime.
//! - Provide create/update/delete/clear mutations and the weekly reset and
//!   monthly pruning lifecycle rules.
//! - Persist the full state after every committed mutation and notify
//!   subscribed observers.
//!
//! # Invariants
//! - Task ids are non-empty and unique within the collection.
//! - Loading never fails: missing or corrupt blobs fall back to defaults.
//! - A failed write keeps the in-memory change and marks the store dirty;
//!   the next mutation or `flush` writes the final state again.
//! - `&mut self` on every mutation serializes writers.

use crate::calendar::{is_new_week, month_key, month_window};
use crate::clock::{Clock, SystemClock};
use crate::model::board::BoardState;
use crate::model::id::{IdSource, UuidIdSource};
use crate::model::task::{ListType, Task, TaskId, TaskMetadata, TaskPatch, DEFAULT_TASK_TITLE};
use crate::position::{spread_positions, POSITION_GAP};
use crate::storage::{BlobStore, StorageError};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Blob key the board is persisted under unless configured otherwise.
pub const DEFAULT_STORAGE_KEY: &str = "tasklane_todo_state";

const MAX_ID_ATTEMPTS: usize = 8;

static YEAR_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{4})-(\d{1,2})").expect("valid year-month regex"));

pub type StoreResult<T> = Result<T, StoreError>;

/// Task store error. Only raised for persistence problems; data issues
/// degrade to defaults or no-ops instead.
#[derive(Debug)]
pub enum StoreError {
    /// Writing the state blob failed; in-memory state is kept.
    Persist(StorageError),
    /// Serializing the state failed.
    Encode(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persist(err) => write!(f, "failed to persist task state: {err}"),
            Self::Encode(message) => write!(f, "failed to encode task state: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persist(err) => Some(err),
            Self::Encode(_) => None,
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Persist(value)
    }
}

/// Notification emitted after each committed mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Added(TaskId),
    Updated(TaskId),
    Deleted(TaskId),
    ClearedCompleted {
        list_type: ListType,
        removed: Vec<TaskId>,
    },
    WeeklyReset {
        reset: usize,
    },
    MonthlyPruned {
        removed: Vec<TaskId>,
    },
    Renormalized {
        ids: Vec<TaskId>,
    },
}

type Observer = Box<dyn FnMut(&StoreEvent) + Send>;

/// Construction options for `TaskStore`.
pub struct StoreOptions {
    pub storage_key: String,
    pub clock: Box<dyn Clock>,
    pub id_source: Box<dyn IdSource + Send>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            clock: Box::new(SystemClock),
            id_source: Box::new(UuidIdSource),
        }
    }
}

impl StoreOptions {
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn id_source(mut self, id_source: impl IdSource + Send + 'static) -> Self {
        self.id_source = Box::new(id_source);
        self
    }
}

/// Owner of the canonical task collection.
pub struct TaskStore<S: BlobStore> {
    blob_store: S,
    storage_key: String,
    clock: Box<dyn Clock>,
    id_source: Box<dyn IdSource + Send>,
    state: BoardState,
    dirty: bool,
    observers: Vec<Observer>,
}

impl<S: BlobStore> TaskStore<S> {
    /// Opens the store with default options.
    pub fn open(blob_store: S) -> Self {
        Self::open_with(blob_store, StoreOptions::default())
    }

    /// Loads persisted state, then runs the weekly reset and monthly pruning
    /// rules once.
    ///
    /// Never fails: load problems are logged and replaced by defaults, and
    /// write failures during the startup rules leave the store dirty.
    pub fn open_with(blob_store: S, options: StoreOptions) -> Self {
        let now_ms = options.clock.now_ms();
        let state = load_state(&blob_store, &options.storage_key, now_ms);
        info!(
            "event=store_open module=store status=ok key={} todos={}",
            options.storage_key,
            state.todos.len()
        );

        let mut store = Self {
            blob_store,
            storage_key: options.storage_key,
            clock: options.clock,
            id_source: options.id_source,
            state,
            dirty: false,
            observers: Vec::new(),
        };

        if let Err(err) = store.check_weekly_reset() {
            warn!("event=store_open module=store status=degraded step=weekly_reset error={err}");
        }
        if let Err(err) = store.prune_monthly_todos() {
            warn!("event=store_open module=store status=degraded step=monthly_prune error={err}");
        }

        store
    }

    /// Registers an observer called after every committed mutation.
    pub fn subscribe(&mut self, observer: impl FnMut(&StoreEvent) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// All tasks in insertion order.
    pub fn todos(&self) -> &[Task] {
        &self.state.todos
    }

    pub fn get_todo(&self, id: &str) -> Option<&Task> {
        self.state.todos.iter().find(|task| task.id == id)
    }

    /// Epoch-ms timestamp of the last weekly reset.
    pub fn last_weekly_reset(&self) -> i64 {
        self.state.last_weekly_reset
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn blob_store(&self) -> &S {
        &self.blob_store
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Whether the last write failed and the persisted blob is stale.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the sublist for `list_type` + `metadata`, sorted ascending by
    /// position. Ties keep insertion order.
    pub fn sorted_list(&self, list_type: ListType, metadata: &TaskMetadata) -> Vec<Task> {
        let mut list = self
            .state
            .todos
            .iter()
            .filter(|task| task.belongs_to(list_type, metadata))
            .cloned()
            .collect::<Vec<_>>();
        list.sort_by(|left, right| left.position.total_cmp(&right.position));
        list
    }

    /// Appends a new task.
    ///
    /// Blank titles become `DEFAULT_TASK_TITLE`, a missing or non-finite
    /// position becomes `POSITION_GAP`, and out-of-range weekdays are dropped.
    pub fn add_todo(
        &mut self,
        title: &str,
        list_type: ListType,
        position: Option<f64>,
        metadata: &TaskMetadata,
    ) -> StoreResult<Task> {
        let title = if title.trim().is_empty() {
            DEFAULT_TASK_TITLE
        } else {
            title
        };
        let sanitized = metadata.sanitized();
        if sanitized.weekday != metadata.weekday {
            warn!(
                "event=todo_add module=store status=fallback field=weekday value={:?}",
                metadata.weekday
            );
        }

        let now_ms = self.clock.now_ms();
        let task = Task {
            id: self.next_id(),
            title: title.to_string(),
            completed: false,
            list_type,
            position: position
                .filter(|value| value.is_finite())
                .unwrap_or(POSITION_GAP),
            weekday: sanitized.weekday,
            date: sanitized.date,
            created_at: now_ms,
            updated_at: now_ms,
        };
        self.state.todos.push(task.clone());
        debug!(
            "event=todo_add module=store status=ok id={} list_type={} position={}",
            task.id, task.list_type, task.position
        );

        self.commit(StoreEvent::Added(task.id.clone()))?;
        Ok(task)
    }

    /// Merges every present field of `patch` into the task with `id` and
    /// refreshes `updated_at`.
    ///
    /// Returns `Ok(false)` without writing when `id` is unknown.
    pub fn update_todo(&mut self, id: &str, patch: TaskPatch) -> StoreResult<bool> {
        let patch = patch.sanitized();
        let now_ms = self.clock.now_ms();
        let Some(task) = self.state.todos.iter_mut().find(|task| task.id == id) else {
            debug!("event=todo_update module=store status=skipped reason=not_found id={id}");
            return Ok(false);
        };

        task.apply(&patch);
        task.updated_at = now_ms;
        self.commit(StoreEvent::Updated(id.to_string()))?;
        Ok(true)
    }

    /// Removes the first task with `id`.
    ///
    /// Returns `Ok(false)` without writing when `id` is unknown.
    pub fn delete_todo(&mut self, id: &str) -> StoreResult<bool> {
        let Some(index) = self.state.todos.iter().position(|task| task.id == id) else {
            debug!("event=todo_delete module=store status=skipped reason=not_found id={id}");
            return Ok(false);
        };

        self.state.todos.remove(index);
        self.commit(StoreEvent::Deleted(id.to_string()))?;
        Ok(true)
    }

    /// Removes completed tasks of `list_type`, together with completed
    /// stash tasks. Returns how many tasks were removed.
    pub fn clear_completed(&mut self, list_type: ListType) -> StoreResult<usize> {
        let removed = self.remove_where(|task| {
            task.completed && (task.list_type == list_type || task.list_type == ListType::Stash)
        });
        if removed.is_empty() {
            return Ok(0);
        }

        let count = removed.len();
        info!(
            "event=clear_completed module=store status=ok list_type={list_type} removed={count}"
        );
        self.commit(StoreEvent::ClearedCompleted { list_type, removed })?;
        Ok(count)
    }

    /// Uncompletes every weekly task once per week.
    ///
    /// Returns `Ok(true)` when a week boundary was crossed since the last
    /// reset; calling it again within the same week is a no-op.
    pub fn check_weekly_reset(&mut self) -> StoreResult<bool> {
        let now = self.clock.now();
        if !is_new_week(Some(self.state.last_weekly_reset), &now) {
            return Ok(false);
        }

        let mut reset = 0;
        for task in self
            .state
            .todos
            .iter_mut()
            .filter(|task| task.list_type == ListType::Weekly)
        {
            if task.completed {
                reset += 1;
            }
            task.completed = false;
        }
        self.state.last_weekly_reset = now.timestamp_millis();
        info!("event=weekly_reset module=store status=ok reset={reset}");

        self.commit(StoreEvent::WeeklyReset { reset })?;
        Ok(true)
    }

    /// Removes monthly tasks dated outside the previous/current/next month.
    ///
    /// Tasks without a date and non-monthly tasks are never pruned.
    /// Returns how many tasks were removed.
    pub fn prune_monthly_todos(&mut self) -> StoreResult<usize> {
        let window = month_window(&self.clock.now());
        let removed = self.remove_where(|task| {
            if task.list_type != ListType::Monthly {
                return false;
            }
            match task.date.as_deref().map(str::trim) {
                None | Some("") => false,
                Some(date) => !year_month_of(date).is_some_and(|key| window.contains(&key)),
            }
        });
        if removed.is_empty() {
            return Ok(0);
        }

        let count = removed.len();
        info!(
            "event=monthly_prune module=store status=ok removed={} window={}..{}",
            count, window[0], window[2]
        );
        self.commit(StoreEvent::MonthlyPruned { removed })?;
        Ok(count)
    }

    /// Reassigns evenly spaced positions (`GAP, 2 * GAP, ...`) to `ordered_ids`
    /// in the given order. Unknown ids are skipped.
    ///
    /// Used when midpoint insertion has exhausted floating-point precision.
    pub fn renormalize(&mut self, ordered_ids: &[TaskId]) -> StoreResult<usize> {
        let now_ms = self.clock.now_ms();
        let mut touched = Vec::with_capacity(ordered_ids.len());
        let known = ordered_ids
            .iter()
            .filter(|id| self.get_todo(id).is_some())
            .cloned()
            .collect::<Vec<_>>();

        for (id, position) in known.iter().zip(spread_positions(known.len())) {
            if let Some(task) = self.state.todos.iter_mut().find(|task| &task.id == id) {
                task.position = position;
                task.updated_at = now_ms;
                touched.push(id.clone());
            }
        }
        if touched.is_empty() {
            return Ok(0);
        }

        let count = touched.len();
        info!("event=renormalize module=store status=ok count={count}");
        self.commit(StoreEvent::Renormalized { ids: touched })?;
        Ok(count)
    }

    /// Writes the state again if the last write failed.
    pub fn flush(&mut self) -> StoreResult<()> {
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }

    /// Flushes pending state and releases the store.
    pub fn close(mut self) -> StoreResult<()> {
        self.flush()?;
        info!(
            "event=store_close module=store status=ok key={}",
            self.storage_key
        );
        Ok(())
    }

    fn remove_where(&mut self, mut predicate: impl FnMut(&Task) -> bool) -> Vec<TaskId> {
        let mut removed = Vec::new();
        self.state.todos.retain(|task| {
            if predicate(task) {
                removed.push(task.id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    fn next_id(&mut self) -> TaskId {
        let mut candidate = String::new();
        for _ in 0..MAX_ID_ATTEMPTS {
            candidate = self.id_source.generate();
            if !candidate.is_empty() && self.get_todo(&candidate).is_none() {
                return candidate;
            }
        }

        warn!("event=todo_add module=store status=fallback field=id reason=collision");
        let base = if candidate.is_empty() {
            "task".to_string()
        } else {
            candidate
        };
        let mut suffix = self.state.todos.len();
        loop {
            let id = format!("{base}-{suffix}");
            if self.get_todo(&id).is_none() {
                return id;
            }
            suffix += 1;
        }
    }

    fn commit(&mut self, event: StoreEvent) -> StoreResult<()> {
        let result = self.persist();
        for observer in &mut self.observers {
            observer(&event);
        }
        result
    }

    fn persist(&mut self) -> StoreResult<()> {
        let result = self
            .state
            .encode()
            .map_err(|err| StoreError::Encode(err.to_string()))
            .and_then(|blob| {
                self.blob_store
                    .set(&self.storage_key, &blob)
                    .map_err(StoreError::from)
            });

        match result {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                self.dirty = true;
                error!(
                    "event=store_persist module=store status=error key={} error={}",
                    self.storage_key, err
                );
                Err(err)
            }
        }
    }
}

fn load_state<S: BlobStore>(blob_store: &S, key: &str, now_ms: i64) -> BoardState {
    match blob_store.get(key) {
        Ok(Some(raw)) => {
            let decoded = BoardState::decode(&raw, now_ms);
            for warning in &decoded.warnings {
                warn!("event=store_load module=store status=fallback key={key} detail={warning}");
            }
            decoded.state
        }
        Ok(None) => {
            info!("event=store_load module=store status=empty key={key}");
            BoardState::empty(now_ms)
        }
        Err(err) => {
            error!("event=store_load module=store status=error key={key} error={err}");
            BoardState::empty(now_ms)
        }
    }
}

/// Extracts the normalized `YYYY-MM` key of a date string, tolerating
/// unpadded months.
fn year_month_of(date: &str) -> Option<String> {
    let captures = YEAR_MONTH_RE.captures(date)?;
    let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
    let month = captures.get(2)?.as_str().parse::<u32>().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some(month_key(year, month))
}
