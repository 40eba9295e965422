//! Task identifier generation.

use uuid::Uuid;

/// Source of opaque, practically collision-free task identifiers.
///
/// No ordering guarantee is required from implementations.
pub trait IdSource {
    fn generate(&mut self) -> String;
}

/// Default ID source backed by random UUID v4 values.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdSource;

impl IdSource for UuidIdSource {
    fn generate(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

impl<F> IdSource for F
where
    F: FnMut() -> String,
{
    fn generate(&mut self) -> String {
        self()
    }
}
