//! Core domain logic for Tasklane.
//! This crate is the single source of truth for list ordering and task lifecycle rules.

pub mod calendar;
pub mod clock;
pub mod db;
pub mod logging;
pub mod model;
pub mod position;
pub mod service;
pub mod storage;

pub use calendar::{
    calendar_days_of_month, format_date, format_epoch_ms, is_new_week, month_window,
    start_of_week, CalendarDay,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::board::{BoardDecode, BoardState};
pub use model::id::{IdSource, UuidIdSource};
pub use model::task::{ListType, Task, TaskId, TaskMetadata, TaskPatch, DEFAULT_TASK_TITLE};
pub use position::{calculate_position, has_room, spread_positions, POSITION_GAP};
pub use service::reorder::{DragElement, DragEvent, DragEventError, ListReorderCoordinator};
pub use service::task_store::{
    StoreError, StoreEvent, StoreOptions, StoreResult, TaskStore, DEFAULT_STORAGE_KEY,
};
pub use storage::{BlobStore, MemoryBlobStore, SqliteBlobStore, StorageError, StorageResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
