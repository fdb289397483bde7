//! Progress-callback trait for per-chunk generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events as the driver works through the chunks. The CLI uses it to drive
//! its progress bar; a service could forward the same events to a channel
//! or a job record.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2mcq::{GenerationConfig, GenerationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl GenerationProgressCallback for Counter {
//!     fn on_chunk_complete(&self, _chunk: usize, produced: usize, target: usize, _added: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{produced}/{target} questions");
//!     }
//! }
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// Which scheduling pass a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Pass {
    /// Adaptive yield, base temperature.
    First,
    /// Top-up pass: one question per chunk at a higher temperature.
    Second,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::First => f.write_str("first pass"),
            Pass::Second => f.write_str("second pass"),
        }
    }
}

/// Called by the driver as it processes each chunk.
///
/// All methods have default no-op implementations. With `concurrency > 1`,
/// `on_chunk_start` may fire for several chunks before their completions.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once, after chunking and keyword extraction.
    fn on_generation_start(&self, target: usize, total_chunks: usize) {
        let _ = (target, total_chunks);
    }

    /// Called before the first LLM attempt for a chunk.
    ///
    /// `chunk` is the 1-based position within the current pass.
    fn on_chunk_start(&self, chunk: usize, total_chunks: usize, pass: Pass) {
        let _ = (chunk, total_chunks, pass);
    }

    /// Called when a chunk produced at least one question.
    ///
    /// `produced` is the running total after this chunk; `added` is how many
    /// of this chunk's questions were kept (the last chunk may be truncated
    /// to the target).
    fn on_chunk_complete(&self, chunk: usize, produced: usize, target: usize, added: usize) {
        let _ = (chunk, produced, target, added);
    }

    /// Called when a chunk was abandoned after its retry budget ran out.
    fn on_chunk_error(&self, chunk: usize, total_chunks: usize, error: &str) {
        let _ = (chunk, total_chunks, error);
    }

    /// Called when the first pass ended short and the second pass begins.
    fn on_second_pass(&self, remaining: usize) {
        let _ = remaining;
    }

    /// Called once at the end of the run.
    fn on_generation_complete(&self, produced: usize, target: usize) {
        let _ = (produced, target);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
