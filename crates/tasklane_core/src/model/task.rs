//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by every list view.
//! - Define grouping coordinates (`TaskMetadata`) and partial updates (`TaskPatch`).
//!
//! # Invariants
//! - `id` is assigned at creation and never changes.
//! - `weekday` is meaningful only for `ListType::Weekly`, `date` only for
//!   `ListType::Monthly`; both are ignored (not cleared) for other types.
//! - `weekday`, when set, is in `0..=6` with `0 = Sunday`.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Stable identifier for every task.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type TaskId = String;

/// Title used when a task is created without one.
pub const DEFAULT_TASK_TITLE: &str = "New Task";

/// Highest valid `weekday` value (Saturday).
pub const MAX_WEEKDAY: u8 = 6;

/// List category that decides which view a task belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListType {
    /// Plain backlog list.
    #[default]
    General,
    /// Recurring list split into weekday columns.
    Weekly,
    /// Calendar list split into dated cells.
    Monthly,
    /// Holding area swept alongside whichever view is cleared.
    Stash,
}

impl ListType {
    pub const ALL: [ListType; 4] = [Self::General, Self::Weekly, Self::Monthly, Self::Stash];

    /// Returns the stable wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Stash => "stash",
        }
    }

    /// Parses a wire label, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "general" => Some(Self::General),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "stash" => Some(Self::Stash),
            _ => None,
        }
    }
}

impl Display for ListType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical task record.
///
/// Serialized with camelCase field names to match the persisted blob schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub completed: bool,
    pub list_type: ListType,
    /// Ordering key, compared only against tasks of the same sublist.
    pub position: f64,
    #[serde(default)]
    pub weekday: Option<u8>,
    /// `YYYY-MM-DD` calendar day.
    #[serde(default)]
    pub date: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds, refreshed on every mutation.
    pub updated_at: i64,
}

impl Task {
    /// Returns whether this task is shown in the sublist described by
    /// `list_type` + `metadata`.
    pub fn belongs_to(&self, list_type: ListType, metadata: &TaskMetadata) -> bool {
        if self.list_type != list_type {
            return false;
        }
        match list_type {
            ListType::Weekly => self.weekday == metadata.weekday,
            ListType::Monthly => self.date == metadata.date,
            ListType::General | ListType::Stash => true,
        }
    }

    /// Applies every present field of `patch`.
    ///
    /// Absent fields are skipped and never overwrite existing state.
    /// `updated_at` is left to the caller.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = patch.title.as_ref() {
            self.title = title.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(list_type) = patch.list_type {
            self.list_type = list_type;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(weekday) = patch.weekday {
            self.weekday = weekday;
        }
        if let Some(date) = patch.date.as_ref() {
            self.date = date.clone();
        }
    }
}

/// Grouping coordinates of a sublist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Day column for weekly lists (`0 = Sunday`).
    #[serde(default)]
    pub weekday: Option<u8>,
    /// Calendar day for monthly lists (`YYYY-MM-DD`).
    #[serde(default)]
    pub date: Option<String>,
}

impl TaskMetadata {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn weekday(weekday: u8) -> Self {
        Self {
            weekday: Some(weekday),
            date: None,
        }
    }

    pub fn date(date: impl Into<String>) -> Self {
        Self {
            weekday: None,
            date: Some(date.into()),
        }
    }

    /// Returns a copy with out-of-range weekdays and blank dates dropped.
    pub fn sanitized(&self) -> Self {
        Self {
            weekday: self.weekday.filter(|day| *day <= MAX_WEEKDAY),
            date: self
                .date
                .as_deref()
                .map(str::trim)
                .filter(|date| !date.is_empty())
                .map(str::to_string),
        }
    }

    /// Converts present coordinates into patch fields; absent ones stay absent.
    pub fn to_patch(&self) -> TaskPatch {
        TaskPatch {
            weekday: self.weekday.map(Some),
            date: self.date.clone().map(Some),
            ..TaskPatch::default()
        }
    }
}

/// Partial task update.
///
/// `None` means "absent, keep current value". For the nullable grouping
/// fields, `Some(None)` explicitly clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
    pub list_type: Option<ListType>,
    pub position: Option<f64>,
    pub weekday: Option<Option<u8>>,
    pub date: Option<Option<String>>,
}

impl TaskPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn list_type(mut self, list_type: ListType) -> Self {
        self.list_type = Some(list_type);
        self
    }

    pub fn position(mut self, position: f64) -> Self {
        self.position = Some(position);
        self
    }

    pub fn weekday(mut self, weekday: Option<u8>) -> Self {
        self.weekday = Some(weekday);
        self
    }

    pub fn date(mut self, date: Option<String>) -> Self {
        self.date = Some(date);
        self
    }

    /// Overlays present fields of `other` onto `self`.
    pub fn merge(mut self, other: TaskPatch) -> Self {
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.completed.is_some() {
            self.completed = other.completed;
        }
        if other.list_type.is_some() {
            self.list_type = other.list_type;
        }
        if other.position.is_some() {
            self.position = other.position;
        }
        if other.weekday.is_some() {
            self.weekday = other.weekday;
        }
        if other.date.is_some() {
            self.date = other.date;
        }
        self
    }

    /// Drops present values that would break task invariants: non-finite
    /// positions and weekdays outside `0..=6`.
    pub fn sanitized(mut self) -> Self {
        self.position = self.position.filter(|position| position.is_finite());
        self.weekday = self
            .weekday
            .filter(|weekday| weekday.map_or(true, |day| day <= MAX_WEEKDAY));
        self
    }
}
