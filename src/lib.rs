//! # edgequake-pdf2mcq
//!
//! Generate multiple-choice questions (MCQs) from PDF documents with LLMs.
//!
//! The document is split into overlapping text chunks, reference material is
//! filtered out, and each chunk is sent to an LLM with a strict JSON
//! template. Responses are repaired, validated against the MCQ schema, and
//! accumulated until the requested count is reached. Calls that fail are
//! retried with backoff; chunks that keep failing are skipped, and a second
//! top-up pass revisits the document when the first one falls short.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file, URL or uploaded bytes
//!  ├─ 2. Extract   page texts via pdfium (spawn_blocking)
//!  ├─ 3. Chunk     400/50 windows, reference filter, fallbacks when thin
//!  ├─ 4. Keywords  one LLM call over the first 4000 characters
//!  ├─ 5. Generate  per-chunk calls: repair → validate → retry with backoff
//!  └─ 6. Output    questions + keywords + stats, optional JSON files
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2mcq::{generate, GenerationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = GenerationConfig::default();
//!     let output = generate("lecture.pdf", 25, &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.mcqs)?);
//!     eprintln!("{}/{} questions, {} failed attempts",
//!         output.stats.produced,
//!         output.stats.target,
//!         output.stats.failed_attempts);
//!     Ok(())
//! }
//! ```
//!
//! ## Custom backends
//!
//! Anything implementing [`CompletionBackend`] can drive the pipeline. Set it
//! with [`GenerationConfigBuilder::backend`]; it takes precedence over every
//! provider setting.
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `pdf2mcq` binary (clap + indicatif + anyhow + tracing-subscriber) |
//! | `server` | off     | Enables the `pdf2mcq-server` binary and [`server`] module (axum + tower-http) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod generate;
pub mod mcq;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retry;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendError, CompletionBackend, CompletionRequest, LlmBackend, SharedBackend};
pub use config::{GenerationConfig, GenerationConfigBuilder};
pub use error::{AttemptError, McqGenError};
pub use generate::{
    generate, generate_from_bytes, generate_from_pages, generate_sync, generate_to_files, inspect,
    DocumentInfo,
};
pub use mcq::{AnswerLabel, Difficulty, McqItem, Source, ValidationError};
pub use output::{GenerationOutput, GenerationStats, WrittenFiles};
pub use pipeline::keywords::KeywordSet;
pub use progress::{GenerationProgressCallback, NoopProgressCallback, Pass, ProgressCallback};
pub use retry::RetryPolicy;
