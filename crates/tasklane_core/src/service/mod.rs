//! Core use-case services.
//!
//! # Responsibility
//! - Own the canonical task collection and its persistence lifecycle.
//! - Translate drag-and-drop events into ordered list mutations.
//! - Keep UI/FFI layers decoupled from storage details.

pub mod reorder;
pub mod task_store;
