//! Staged warehouse loading for stageload.
//!
//! [`LoadOrchestrator`] stages fetched records in an object store and applies
//! a table's [`LoadStrategy`](stageload_types::LoadStrategy) against a
//! [`Warehouse`]. Collaborators are traits; [`recording`] provides in-memory
//! ones for dry runs and tests.

#![warn(clippy::pedantic)]

pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod recording;
pub mod result;
pub mod staging;
pub mod warehouse;
pub mod window;

pub use errors::{LoadError, LoadStep};
pub use orchestrator::{LoadOrchestrator, LoadOrchestratorBuilder};
pub use result::LoadReport;
pub use warehouse::{
    CopyOptions, DataSource, MergeKeys, ObjectHandle, ObjectStore, TableRef, Warehouse,
};
pub use window::DeleteWindowResolver;
