//! Transfer plumbing shared by the fetch and upload engines.
//!
//! - [`ProgressSink`] / [`ProgressTracker`]: byte-level progress aggregation
//!   with ETA and throughput math.
//! - [`RetryPolicy`]: bounded exponential backoff applied explicitly at call
//!   sites.
//! - [`ChunkReader`]: fixed-size sequential reads for chunked uploads.
//! - File name sanitization and remote entry name validation.

mod chunked;
mod progress;
mod retry;
mod types;
mod validation;

pub use chunked::ChunkReader;
pub use progress::{
    ProgressCallback, ProgressEvent, ProgressSink, ProgressSnapshot, ProgressTracker,
};
pub use retry::{RetryError, RetryPolicy, Sleeper, TokioSleeper};
pub use types::{Chunk, ContentRange, PathOrigin, TaskId, TransferTask};
pub use validation::{sanitize_file_name, validate_entry_name};

/// Default chunk size: 4 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid entry name: {0}")]
    InvalidName(String),
}
