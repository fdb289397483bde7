//! Generation entry points and the two-pass scheduling loop.
//!
//! ```text
//! resolve input ─▶ extract pages ─▶ chunk ─▶ keywords ─▶ shuffle
//!                                                         │
//!        ┌────────────────────────────────────────────────┘
//!        ▼
//!   first pass   adaptive yield (2, tuned every 10 chunks), base temperature,
//!                1 s between chunks, stop at target
//!        │ short?
//!        ▼
//!   second pass  reshuffled copy, 1 question per chunk, temperature 0.9,
//!                1.5 s between chunks, stop at target
//! ```
//!
//! Under-delivery is not an error: the output carries whatever was produced
//! and [`GenerationStats`] reports the shortfall. A document whose pages are
//! all reference material still yields its keywords and zero questions.

use crate::backend::{resolve_backend, SharedBackend};
use crate::config::GenerationConfig;
use crate::error::McqGenError;
use crate::mcq::McqItem;
use crate::output::{write_outputs, GenerationOutput, GenerationStats, WrittenFiles};
use crate::pipeline::generator::{AdaptiveState, ChunkOutcome, QuestionGenerator};
use crate::pipeline::{chunker, extract, input, keywords};
use crate::progress::Pass;
use futures::stream::{self, StreamExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Generate `target` questions from a PDF file or URL.
///
/// # Errors
/// Returns `Err(McqGenError)` only for fatal errors: unreadable or invalid
/// input, pdfium failures, no usable text, or no configured provider.
/// Producing fewer questions than requested is reported through
/// `output.stats`, see [`GenerationOutput::into_result`].
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2mcq::{generate, GenerationConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GenerationConfig::default();
/// let output = generate("lecture.pdf", 20, &config).await?;
/// for q in &output.mcqs {
///     println!("{} ({})", q.question(), q.correct_answer().as_str());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn generate(
    input_str: impl AsRef<str>,
    target: usize,
    config: &GenerationConfig,
) -> Result<GenerationOutput, McqGenError> {
    let start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting generation: {} ({} MCQs)", input_str, target);
    config.validate()?;

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let backend = resolve_backend(config)?;
    let pages = extract::extract_pages(resolved.path(), config.password.as_deref()).await?;

    run(&input::source_name(input_str), &pages, target, config, backend, start).await
}

/// Generate questions from PDF bytes held in memory.
///
/// The bytes are written to a managed temp file that is removed on return.
pub async fn generate_from_bytes(
    bytes: &[u8],
    target: usize,
    config: &GenerationConfig,
) -> Result<GenerationOutput, McqGenError> {
    let start = Instant::now();
    config.validate()?;

    let resolved = input::resolve_bytes(bytes)?;
    let backend = resolve_backend(config)?;
    let pages = extract::extract_pages(resolved.path(), config.password.as_deref()).await?;

    run("<upload>", &pages, target, config, backend, start).await
}

/// Generate questions from already-extracted page texts.
///
/// Skips input resolution and pdfium entirely.
pub async fn generate_from_pages<S: AsRef<str>>(
    pages: &[S],
    target: usize,
    config: &GenerationConfig,
) -> Result<GenerationOutput, McqGenError> {
    let start = Instant::now();
    config.validate()?;
    let backend = resolve_backend(config)?;
    let pages: Vec<&str> = pages.iter().map(AsRef::as_ref).collect();
    run("<text>", &pages, target, config, backend, start).await
}

/// Generate questions and write both JSON files.
///
/// Empty lists are not written; [`WrittenFiles`] says which files exist.
pub async fn generate_to_files(
    input_str: impl AsRef<str>,
    target: usize,
    mcq_path: impl AsRef<Path>,
    keywords_path: impl AsRef<Path>,
    config: &GenerationConfig,
) -> Result<(GenerationStats, WrittenFiles), McqGenError> {
    let output = generate(input_str, target, config).await?;
    let written = write_outputs(&output, mcq_path.as_ref(), keywords_path.as_ref()).await?;
    Ok((output.stats, written))
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    input_str: impl AsRef<str>,
    target: usize,
    config: &GenerationConfig,
) -> Result<GenerationOutput, McqGenError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| McqGenError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(input_str, target, config))
}

/// What a document offers before any LLM call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Characters of extracted text across all pages.
    pub char_count: usize,
    /// Chunks that would be fed to the generator.
    pub chunk_count: usize,
}

/// Extract and chunk a PDF without calling an LLM.
///
/// Does not require a provider or API key. Only `password` and
/// `download_timeout_secs` are read from `config`.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &GenerationConfig,
) -> Result<DocumentInfo, McqGenError> {
    let resolved = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    let pages = extract::extract_pages(resolved.path(), config.password.as_deref()).await?;
    Ok(DocumentInfo {
        page_count: pages.len(),
        char_count: pages.iter().map(|p| p.chars().count()).sum(),
        chunk_count: chunker::split(&pages).len(),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run<S: AsRef<str>>(
    source_name: &str,
    pages: &[S],
    target: usize,
    config: &GenerationConfig,
    backend: SharedBackend,
    start: Instant,
) -> Result<GenerationOutput, McqGenError> {
    if pages.iter().all(|p| p.as_ref().trim().is_empty()) {
        return Err(McqGenError::NoUsableChunks {
            source_name: source_name.to_string(),
            pages: pages.len(),
        });
    }
    let chunk_set = chunker::split(pages);
    if chunk_set.is_empty() {
        warn!(
            "No usable chunks in '{}': every page was filtered as reference material",
            source_name
        );
    }
    let extract_duration_ms = start.elapsed().as_millis() as u64;

    let llm_start = Instant::now();
    let full_text = pages
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(" ");
    let keywords = keywords::extract(backend.as_ref(), &full_text, config).await;

    let generator = QuestionGenerator::new(backend, &keywords, config);
    let mut session = Session::new(config, generator, target);
    let chunks = chunk_set.chunks;

    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(target, chunks.len());
    }

    // ── First pass ───────────────────────────────────────────────────────
    let mut order: Vec<&str> = chunks.iter().map(String::as_str).collect();
    order.shuffle(&mut session.rng);
    session.run_pass(&order, Pass::First).await;
    let final_per_chunk_target = session.state.per_chunk_target;

    // ── Second pass ──────────────────────────────────────────────────────
    let second_pass_ran = !session.is_done() && !chunks.is_empty();
    if second_pass_ran {
        let remaining = target - session.mcqs.len();
        info!(
            "First pass produced {}/{}; starting second pass for {} more",
            session.mcqs.len(),
            target,
            remaining
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_second_pass(remaining);
        }
        session.state.enter_second_pass(config.second_pass_temperature);
        order.shuffle(&mut session.rng);
        session.run_pass(&order, Pass::Second).await;
    }

    let Session {
        mcqs,
        state,
        chunks_attempted,
        ..
    } = session;

    if mcqs.len() < target {
        warn!("Generated {}/{} MCQs: chunks exhausted", mcqs.len(), target);
    } else {
        info!("Generated {}/{} MCQs", mcqs.len(), target);
    }
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_complete(mcqs.len(), target);
    }

    let stats = GenerationStats {
        target,
        produced: mcqs.len(),
        total_pages: pages.len(),
        chunks_available: chunks.len(),
        chunks_attempted,
        successful_chunks: state.successful_chunks,
        failed_chunks: state.failed_chunks,
        failed_attempts: state.failed_attempts,
        second_pass_ran,
        final_per_chunk_target,
        keyword_count: keywords.len(),
        extract_duration_ms,
        llm_duration_ms: llm_start.elapsed().as_millis() as u64,
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    Ok(GenerationOutput {
        mcqs,
        keywords,
        stats,
    })
}

/// Mutable state of one run. Never shared across runs.
struct Session<'a> {
    config: &'a GenerationConfig,
    generator: QuestionGenerator,
    state: AdaptiveState,
    rng: StdRng,
    mcqs: Vec<McqItem>,
    target: usize,
    chunks_attempted: usize,
}

impl<'a> Session<'a> {
    fn new(config: &'a GenerationConfig, generator: QuestionGenerator, target: usize) -> Self {
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            generator,
            state: AdaptiveState::new(config),
            rng,
            mcqs: Vec::with_capacity(target),
            target,
            chunks_attempted: 0,
        }
    }

    fn is_done(&self) -> bool {
        self.mcqs.len() >= self.target
    }

    /// Work through `order` in batches of `concurrency`, stopping at the target.
    ///
    /// Every call in a batch sees the same adaptive snapshot; outcomes are
    /// folded back one at a time in chunk order.
    async fn run_pass(&mut self, order: &[&str], pass: Pass) {
        let pause = match pass {
            Pass::First => self.config.chunk_pause,
            Pass::Second => self.config.second_pass_pause,
        };
        let batch_size = self.config.concurrency.max(1);
        let total = order.len();

        for (batch_idx, batch) in order.chunks(batch_size).enumerate() {
            if self.is_done() {
                break;
            }
            if batch_idx > 0 && pause > Duration::ZERO {
                tokio::time::sleep(pause).await;
            }

            let first = batch_idx * batch_size + 1;
            let request = self.state.request(self.config.difficulty);
            let seeds: Vec<u64> = batch.iter().map(|_| self.rng.gen()).collect();

            if let Some(ref cb) = self.config.progress_callback {
                for i in 0..batch.len() {
                    cb.on_chunk_start(first + i, total, pass);
                }
            }

            let generator = &self.generator;
            let calls: Vec<_> = batch
                .iter()
                .zip(seeds)
                .map(|(chunk, seed)| async move {
                    let mut rng = StdRng::seed_from_u64(seed);
                    generator.generate(chunk, request, &mut rng).await
                })
                .collect();
            let outcomes: Vec<ChunkOutcome> = stream::iter(calls).buffered(batch_size).collect().await;

            for (i, outcome) in outcomes.into_iter().enumerate() {
                self.absorb(first + i, total, pass, outcome);
            }
        }
    }

    fn absorb(&mut self, chunk: usize, total: usize, pass: Pass, outcome: ChunkOutcome) {
        self.chunks_attempted += 1;
        self.state.record(&outcome);

        if outcome.is_success() {
            let room = self.target.saturating_sub(self.mcqs.len());
            let added = outcome.items.len().min(room);
            self.mcqs.extend(outcome.items.into_iter().take(room));
            info!(
                "Chunk {}/{} ({}): +{} MCQs, {}/{} total",
                chunk,
                total,
                pass,
                added,
                self.mcqs.len(),
                self.target
            );
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_chunk_complete(chunk, self.mcqs.len(), self.target, added);
            }
        } else {
            let error = outcome
                .last_error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string());
            warn!(
                "Chunk {}/{} ({}) abandoned after {} attempts: {}",
                chunk, total, pass, outcome.attempts, error
            );
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_chunk_error(chunk, total, &error);
            }
        }

        if pass == Pass::First && self.state.processed % self.config.tuning_interval == 0 {
            if let Some(new_target) = self.state.retune() {
                info!(
                    "Success rate {:.2}: now requesting {} MCQs per chunk",
                    self.state.success_rate().unwrap_or_default(),
                    new_target
                );
            } else {
                debug!(
                    "Success rate {:.2}: keeping {} MCQs per chunk",
                    self.state.success_rate().unwrap_or_default(),
                    self.state.per_chunk_target
                );
            }
        }
    }
}
