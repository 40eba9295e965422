//! Flutter bridge surface for `tasklane_core`.

pub mod api;
