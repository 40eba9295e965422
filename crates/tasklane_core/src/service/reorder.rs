//! Drag-and-drop reorder coordination.
//!
//! # Responsibility
//! - Parse the drag engine's `added` / `moved` events.
//! - Derive neighbor positions from the same sorted view the UI renders.
//! - Commit new position and group membership through `TaskStore`.
//!
//! # Invariants
//! - Neighbors are always read from `sorted_list` with the dragged task
//!   excluded, so a task is never positioned relative to itself.
//! - `moved` never reassigns `list_type`; `added` always does.
//! - When two neighbors no longer admit a distinct midpoint, the sublist is
//!   renormalized before the new position is derived.

use crate::model::task::{ListType, Task, TaskId, TaskMetadata, TaskPatch};
use crate::position::{calculate_position, has_room};
use crate::service::task_store::{StoreResult, TaskStore};
use crate::storage::BlobStore;
use log::debug;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Dragged item as reported by the drag engine. Only the id is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragElement {
    pub id: TaskId,
}

/// One drag-and-drop change notification.
///
/// Wire shape: `{"added": {"element": {"id": ..}, "newIndex": n}}` or the
/// same under `"moved"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragEvent {
    /// Task dropped into this list from elsewhere, or created in place.
    Added {
        element: DragElement,
        #[serde(rename = "newIndex")]
        new_index: usize,
    },
    /// Task reordered within this list.
    Moved {
        element: DragElement,
        #[serde(rename = "newIndex")]
        new_index: usize,
    },
}

/// Drag payload that is neither an `added` nor a `moved` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEventError(pub String);

impl Display for DragEventError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unsupported drag event: {}", self.0)
    }
}

impl Error for DragEventError {}

impl DragEvent {
    pub fn added(id: impl Into<TaskId>, new_index: usize) -> Self {
        Self::Added {
            element: DragElement { id: id.into() },
            new_index,
        }
    }

    pub fn moved(id: impl Into<TaskId>, new_index: usize) -> Self {
        Self::Moved {
            element: DragElement { id: id.into() },
            new_index,
        }
    }

    /// Parses a drag engine payload.
    pub fn from_json(raw: &str) -> Result<Self, DragEventError> {
        serde_json::from_str(raw).map_err(|err| DragEventError(err.to_string()))
    }

    pub fn element_id(&self) -> &str {
        match self {
            Self::Added { element, .. } | Self::Moved { element, .. } => &element.id,
        }
    }

    pub fn new_index(&self) -> usize {
        match self {
            Self::Added { new_index, .. } | Self::Moved { new_index, .. } => *new_index,
        }
    }
}

/// Applies drag-and-drop events to a task store.
pub struct ListReorderCoordinator<'s, S: BlobStore> {
    store: &'s mut TaskStore<S>,
}

impl<'s, S: BlobStore> ListReorderCoordinator<'s, S> {
    pub fn new(store: &'s mut TaskStore<S>) -> Self {
        Self { store }
    }

    /// The authoritative view both the UI and reorder logic agree on.
    pub fn sorted_list(&self, list_type: ListType, metadata: &TaskMetadata) -> Vec<Task> {
        self.store.sorted_list(list_type, metadata)
    }

    /// Commits one drag change into the list `list_type` + `metadata`.
    ///
    /// Returns the committed position, or `None` when the dragged task is
    /// unknown (no-op).
    pub fn on_drag_change(
        &mut self,
        event: &DragEvent,
        list_type: ListType,
        metadata: &TaskMetadata,
    ) -> StoreResult<Option<f64>> {
        let element_id = event.element_id();
        if self.store.get_todo(element_id).is_none() {
            debug!("event=drag_change module=reorder status=skipped reason=not_found id={element_id}");
            return Ok(None);
        }

        let metadata = metadata.sanitized();
        let position = self.position_at(element_id, event.new_index(), list_type, &metadata)?;

        let patch = match event {
            DragEvent::Added { .. } => TaskPatch::new().list_type(list_type).position(position),
            DragEvent::Moved { .. } => TaskPatch::new().position(position),
        }
        .merge(metadata.to_patch());

        self.store.update_todo(element_id, patch)?;
        debug!(
            "event=drag_change module=reorder status=ok id={} list_type={} index={} position={}",
            element_id,
            list_type,
            event.new_index(),
            position
        );
        Ok(Some(position))
    }

    fn position_at(
        &mut self,
        element_id: &str,
        new_index: usize,
        list_type: ListType,
        metadata: &TaskMetadata,
    ) -> StoreResult<f64> {
        let (prev, next) = self.neighbors(element_id, new_index, list_type, metadata);
        if has_room(prev, next) {
            return Ok(calculate_position(prev, next));
        }

        let ordered = self
            .others(element_id, list_type, metadata)
            .into_iter()
            .map(|task| task.id)
            .collect::<Vec<_>>();
        self.store.renormalize(&ordered)?;

        let (prev, next) = self.neighbors(element_id, new_index, list_type, metadata);
        Ok(calculate_position(prev, next))
    }

    fn neighbors(
        &self,
        element_id: &str,
        new_index: usize,
        list_type: ListType,
        metadata: &TaskMetadata,
    ) -> (Option<f64>, Option<f64>) {
        let others = self.others(element_id, list_type, metadata);
        let prev = new_index
            .checked_sub(1)
            .and_then(|index| others.get(index))
            .map(|task| task.position);
        let next = others.get(new_index).map(|task| task.position);
        (prev, next)
    }

    fn others(&self, element_id: &str, list_type: ListType, metadata: &TaskMetadata) -> Vec<Task> {
        let mut list = self.store.sorted_list(list_type, metadata);
        list.retain(|task| task.id != element_id);
        list
    }
}
