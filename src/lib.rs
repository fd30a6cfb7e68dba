//! Offline-first sync core for a crop-disease scanning app: a durable local
//! scan queue (SQLite) drained sequentially through an external classifier
//! and archived to a remote history log, with bounded retry and a
//! single-flight guard per process.

pub mod classifier;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod history;
pub mod model;
pub mod sync;
