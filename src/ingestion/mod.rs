//! Resumable, idempotent document ingestion.
//!
//! * [`progress`] — durable log of completed units per source.
//! * [`pipeline`] — the sequential segment → chunk → embed → store loop.

pub mod pipeline;
pub mod progress;

pub use pipeline::{IngestReport, IngestionPipeline};
pub use progress::ProgressLog;
