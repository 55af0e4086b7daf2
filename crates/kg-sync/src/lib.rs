//! # kg-sync
//!
//! Derives the knowledge graph from business records.
//!
//! - [`SyncEngine::rebuild`] clears the graph and re-derives it from every
//!   active record in a fixed order, skipping (and reporting) records that fail.
//! - [`SyncEngine::on_record_saved`] / [`SyncEngine::on_record_deleted`] apply a
//!   single record change.
//!
//! Records are read through the [`RecordSource`] trait; [`MemoryRecordSource`]
//! is an in-process implementation that loads JSONL exports.

pub mod cancel;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod source;

pub use cancel::CancelToken;
pub use engine::SyncEngine;
pub use error::SyncError;
pub use source::{MemoryRecordSource, RecordLink, RecordSource, SourceRecord};
