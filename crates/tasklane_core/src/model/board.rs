//! Persisted board snapshot and its defensive codec.
//!
//! # Responsibility
//! - Define the application state persisted as one JSON blob.
//! - Decode untrusted blobs field by field, never failing the caller.
//!
//! # Invariants
//! - `encode` followed by `decode` reproduces an equal state.
//! - Decoding never panics and never returns an error; broken fields fall
//!   back to defaults and are reported in `BoardDecode::warnings`.

use crate::model::task::{ListType, Task, DEFAULT_TASK_TITLE, MAX_WEEKDAY};
use crate::position::POSITION_GAP;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Application state: insertion-ordered tasks plus the weekly reset marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    pub todos: Vec<Task>,
    /// Unix epoch milliseconds of the last weekly reset.
    pub last_weekly_reset: i64,
}

/// Result of decoding an untrusted blob.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardDecode {
    pub state: BoardState,
    /// Human-readable notes about every field that fell back to a default.
    pub warnings: Vec<String>,
}

impl BoardState {
    /// Creates an empty board whose weekly reset marker is `now_ms`.
    pub fn empty(now_ms: i64) -> Self {
        Self {
            todos: Vec::new(),
            last_weekly_reset: now_ms,
        }
    }

    /// Serializes the full state into its blob form.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decodes a persisted blob with per-field fallbacks.
    ///
    /// - Malformed JSON or a non-object root yields an empty board.
    /// - A non-array `todos` yields an empty task list.
    /// - Each task field falls back on its own: malformed `weekday`/`date`
    ///   become `None`, `position` becomes `POSITION_GAP`, `listType`
    ///   becomes `General`, timestamps become `now_ms`.
    /// - Only entries without a usable string id, or repeating an earlier
    ///   id, are dropped.
    /// - A non-numeric `lastWeeklyReset` falls back to `now_ms`.
    pub fn decode(raw: &str, now_ms: i64) -> BoardDecode {
        let mut warnings = Vec::new();

        let root = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warnings.push("state blob is not a JSON object".to_string());
                return BoardDecode {
                    state: Self::empty(now_ms),
                    warnings,
                };
            }
            Err(err) => {
                warnings.push(format!("state blob is not valid JSON: {err}"));
                return BoardDecode {
                    state: Self::empty(now_ms),
                    warnings,
                };
            }
        };

        let todos = match root.get("todos") {
            Some(Value::Array(entries)) => decode_tasks(entries, now_ms, &mut warnings),
            Some(_) => {
                warnings.push("`todos` is not an array".to_string());
                Vec::new()
            }
            None => {
                warnings.push("`todos` is missing".to_string());
                Vec::new()
            }
        };

        let last_weekly_reset = match root.get("lastWeeklyReset").and_then(epoch_ms_from_value) {
            Some(value) => value,
            None => {
                warnings.push("`lastWeeklyReset` is not a number".to_string());
                now_ms
            }
        };

        BoardDecode {
            state: Self {
                todos,
                last_weekly_reset,
            },
            warnings,
        }
    }
}

fn decode_tasks(entries: &[Value], now_ms: i64, warnings: &mut Vec<String>) -> Vec<Task> {
    let mut seen = HashSet::new();
    let mut todos = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let Some(fields) = entry.as_object() else {
            warnings.push(format!("todos[{index}] is not an object"));
            continue;
        };
        let id = match fields.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                warnings.push(format!("todos[{index}] has no usable id"));
                continue;
            }
        };
        if !seen.insert(id.clone()) {
            warnings.push(format!("todos[{index}] repeats id `{id}`"));
            continue;
        }

        let mut field = TaskFields {
            index,
            fields,
            warnings: &mut *warnings,
        };
        let title = field
            .required("title", |value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_TASK_TITLE.to_string());
        let completed = field.required("completed", Value::as_bool).unwrap_or(false);
        let list_type = field
            .required("listType", |value| value.as_str().and_then(ListType::parse))
            .unwrap_or_default();
        let position = field
            .required("position", |value| value.as_f64().filter(|value| value.is_finite()))
            .unwrap_or(POSITION_GAP);
        let weekday = field.optional("weekday", |value| {
            value
                .as_u64()
                .filter(|day| *day <= u64::from(MAX_WEEKDAY))
                .and_then(|day| u8::try_from(day).ok())
        });
        let date = field.optional("date", |value| {
            value
                .as_str()
                .filter(|date| !date.trim().is_empty())
                .map(str::to_string)
        });
        let created_at = field.required("createdAt", epoch_ms_from_value).unwrap_or(now_ms);
        let updated_at = field.required("updatedAt", epoch_ms_from_value).unwrap_or(now_ms);

        todos.push(Task {
            id,
            title,
            completed,
            list_type,
            position,
            weekday,
            date,
            created_at,
            updated_at,
        });
    }

    todos
}

/// Field reader for one task entry that records every fallback.
struct TaskFields<'a> {
    index: usize,
    fields: &'a Map<String, Value>,
    warnings: &'a mut Vec<String>,
}

impl TaskFields<'_> {
    /// Missing or malformed values are reported and yield `None`.
    fn required<T>(&mut self, name: &str, parse: impl FnOnce(&Value) -> Option<T>) -> Option<T> {
        let parsed = self.fields.get(name).and_then(parse);
        if parsed.is_none() {
            self.warnings.push(format!(
                "todos[{}].{name} is missing or malformed; using default",
                self.index
            ));
        }
        parsed
    }

    /// Absent or `null` values are silently `None`; malformed ones are reported.
    fn optional<T>(&mut self, name: &str, parse: impl FnOnce(&Value) -> Option<T>) -> Option<T> {
        match self.fields.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => {
                let parsed = parse(value);
                if parsed.is_none() {
                    self.warnings.push(format!(
                        "todos[{}].{name} is malformed; clearing it",
                        self.index
                    ));
                }
                parsed
            }
        }
    }
}

fn epoch_ms_from_value(value: &Value) -> Option<i64> {
    if let Some(value) = value.as_i64() {
        return Some(value);
    }
    value
        .as_f64()
        .filter(|value| value.is_finite())
        .map(|value| value.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::BoardState;
    use crate::model::task::{ListType, Task, DEFAULT_TASK_TITLE};
    use crate::position::POSITION_GAP;

    const NOW: i64 = 1_760_000_000_000;

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            title: "demo".to_string(),
            completed: false,
            list_type: ListType::Monthly,
            position: 1500.5,
            weekday: None,
            date: Some("2026-10-19".to_string()),
            created_at: NOW,
            updated_at: NOW + 5,
        }
    }

    #[test]
    fn encode_uses_camel_case_wire_fields() {
        let state = BoardState {
            todos: vec![task("task-1")],
            last_weekly_reset: NOW,
        };

        let json: serde_json::Value = serde_json::from_str(&state.encode().unwrap()).unwrap();
        assert_eq!(json["lastWeeklyReset"], NOW);
        assert_eq!(json["todos"][0]["listType"], "monthly");
        assert_eq!(json["todos"][0]["createdAt"], NOW);
        assert_eq!(json["todos"][0]["updatedAt"], NOW + 5);
        assert_eq!(json["todos"][0]["weekday"], serde_json::Value::Null);
    }

    #[test]
    fn decode_round_trips_encoded_state() {
        let state = BoardState {
            todos: vec![task("task-1"), task("task-2")],
            last_weekly_reset: NOW - 42,
        };

        let decoded = BoardState::decode(&state.encode().unwrap(), NOW);
        assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
        assert_eq!(decoded.state, state);
    }

    #[test]
    fn decode_malformed_json_falls_back_to_empty() {
        let decoded = BoardState::decode("{ not json", NOW);

        assert_eq!(decoded.state, BoardState::empty(NOW));
        assert_eq!(decoded.warnings.len(), 1);
    }

    #[test]
    fn decode_falls_back_per_field() {
        let raw = serde_json::json!({
            "todos": "oops",
            "lastWeeklyReset": "yesterday"
        })
        .to_string();

        let decoded = BoardState::decode(&raw, NOW);
        assert!(decoded.state.todos.is_empty());
        assert_eq!(decoded.state.last_weekly_reset, NOW);
        assert_eq!(decoded.warnings.len(), 2);
    }

    #[test]
    fn decode_drops_only_entries_without_usable_or_unique_ids() {
        let raw = serde_json::json!({
            "todos": [
                serde_json::to_value(task("task-1")).unwrap(),
                { "title": "no id" },
                { "id": "", "title": "empty id" },
                42,
                serde_json::to_value(task("task-1")).unwrap(),
            ],
            "lastWeeklyReset": 1_700_000_000_000.0
        })
        .to_string();

        let decoded = BoardState::decode(&raw, NOW);
        assert_eq!(decoded.state.todos, vec![task("task-1")]);
        assert_eq!(decoded.state.last_weekly_reset, 1_700_000_000_000);
        assert_eq!(decoded.warnings.len(), 4);
    }

    #[test]
    fn decode_replaces_malformed_fields_with_defaults() {
        let raw = serde_json::json!({
            "todos": [
                {
                    "id": "weekday",
                    "title": "gym",
                    "completed": true,
                    "listType": "weekly",
                    "position": 2500,
                    "weekday": -1,
                    "createdAt": 10,
                    "updatedAt": 20
                },
                {
                    "id": "mixed",
                    "title": 7,
                    "completed": "yes",
                    "listType": "daily",
                    "position": "3000",
                    "date": 20261019,
                    "createdAt": "then"
                }
            ],
            "lastWeeklyReset": NOW
        })
        .to_string();

        let decoded = BoardState::decode(&raw, NOW);
        let todos = &decoded.state.todos;
        assert_eq!(todos.len(), 2);

        assert_eq!(todos[0].weekday, None);
        assert_eq!(todos[0].title, "gym");
        assert!(todos[0].completed);
        assert_eq!(todos[0].list_type, ListType::Weekly);
        assert_eq!(todos[0].position, 2500.0);
        assert_eq!((todos[0].created_at, todos[0].updated_at), (10, 20));

        assert_eq!(todos[1].title, DEFAULT_TASK_TITLE);
        assert!(!todos[1].completed);
        assert_eq!(todos[1].list_type, ListType::General);
        assert_eq!(todos[1].position, POSITION_GAP);
        assert_eq!(todos[1].date, None);
        assert_eq!((todos[1].created_at, todos[1].updated_at), (NOW, NOW));

        // weekday; then title, completed, listType, position, date, createdAt, updatedAt.
        assert_eq!(decoded.warnings.len(), 8, "{:?}", decoded.warnings);
    }

    #[test]
    fn decode_accepts_missing_optional_task_fields() {
        let raw = serde_json::json!({
            "todos": [{
                "id": "task-1",
                "title": "legacy",
                "completed": true,
                "listType": "stash",
                "position": 1000,
                "createdAt": NOW,
                "updatedAt": NOW
            }],
            "lastWeeklyReset": NOW
        })
        .to_string();

        let decoded = BoardState::decode(&raw, NOW);
        assert!(decoded.warnings.is_empty(), "{:?}", decoded.warnings);
        assert_eq!(decoded.state.todos[0].weekday, None);
        assert_eq!(decoded.state.todos[0].date, None);
        assert_eq!(decoded.state.todos[0].position, 1000.0);
    }
}
