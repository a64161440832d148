//! Batch orchestration for cfshift.
//!
//! This crate ties the schema layer to the outside world: it loads the
//! `Config` file, normalizes every application of a manifest in isolation
//! (optionally on parallel workers), and collects the outcome into a
//! `BatchReport` that can be rendered as JSON or written atomically to disk.

pub mod batch;
pub mod config;
pub mod output;

pub use batch::{normalize_batch, normalize_file, BatchEntry, BatchReport, BatchSummary, Outcome};
pub use config::Config;
pub use output::write_atomic;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] cfshift_schema::ManifestError),
    #[error("config error: {0}")]
    Config(String),
    #[error("normalization worker panicked")]
    WorkerPanicked,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
