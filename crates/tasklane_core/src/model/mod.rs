//! Domain model for list-organized tasks.
//!
//! # Responsibility
//! - Define the canonical task record and its grouping coordinates.
//! - Define the persisted board snapshot and its defensive codec.
//!
//! # Invariants
//! - Every task is identified by a stable, non-empty `TaskId`.
//! - Position ordering is only meaningful inside one sublist.

pub mod board;
pub mod id;
pub mod task;
