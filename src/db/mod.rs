//! Local durable store: entity patches and the SQL repository.
//!
//! - `model`: write-side helper types (partial task updates).
//! - `repo`: SQL-only functions mapping rows into `crate::model` entities.
//!
//! External modules should import from `cropscan::db` — the repository API
//! is re-exported here.

pub mod model;
pub mod repo;

pub use model::TaskPatch;
pub use repo::*;
