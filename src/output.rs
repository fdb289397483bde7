//! Run results and their JSON persistence.

use crate::error::McqGenError;
use crate::mcq::McqItem;
use crate::pipeline::keywords::KeywordSet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Default file name for the question list.
pub const DEFAULT_MCQ_FILE: &str = "pdf_mcqs.json";

/// Default file name for the keyword list.
pub const DEFAULT_KEYWORDS_FILE: &str = "pdf_keywords.json";

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutput {
    /// Accepted questions in generation order, never more than the target.
    pub mcqs: Vec<McqItem>,
    /// Document keywords used to bias the prompts.
    pub keywords: KeywordSet,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// Turn a short run into [`McqGenError::UnderDelivered`].
    ///
    /// The `generate*` functions succeed with whatever was produced; call this
    /// when fewer questions than requested should be treated as failure.
    pub fn into_result(self) -> Result<Self, McqGenError> {
        if self.stats.is_under_delivered() {
            return Err(McqGenError::UnderDelivered {
                produced: self.stats.produced,
                target: self.stats.target,
            });
        }
        Ok(self)
    }
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Requested number of questions.
    pub target: usize,
    /// Questions actually returned.
    pub produced: usize,
    /// Pages of extracted text (0 when text was supplied directly).
    pub total_pages: usize,
    /// Chunks left after filtering and deduplication.
    pub chunks_available: usize,
    /// Chunk generations started, across both passes.
    pub chunks_attempted: usize,
    /// Chunks that yielded at least one valid question.
    pub successful_chunks: usize,
    /// Chunks abandoned after exhausting their retries.
    pub failed_chunks: usize,
    /// Individual failed LLM attempts, including ones later retried successfully.
    pub failed_attempts: usize,
    /// Whether the second (top-up) pass ran.
    pub second_pass_ran: bool,
    /// Per-chunk yield at the end of the first pass.
    pub final_per_chunk_target: usize,
    /// Number of keywords extracted.
    pub keyword_count: usize,
    /// Time spent resolving, extracting and chunking the document.
    pub extract_duration_ms: u64,
    /// Time spent in keyword extraction and question generation.
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl GenerationStats {
    pub fn is_under_delivered(&self) -> bool {
        self.produced < self.target
    }

    /// Questions missing from the target.
    pub fn shortfall(&self) -> usize {
        self.target.saturating_sub(self.produced)
    }
}

/// Paths written by [`write_outputs`]. `None` means the list was empty and
/// the file was skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenFiles {
    pub mcqs: Option<PathBuf>,
    pub keywords: Option<PathBuf>,
}

/// Serialize `value` as JSON indented with four spaces.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write the question list to `path`. Skipped (returns `Ok(false)`) when empty.
pub async fn write_mcqs(path: &Path, mcqs: &[McqItem]) -> Result<bool, McqGenError> {
    if mcqs.is_empty() {
        info!("No MCQs to save, skipping {}", path.display());
        return Ok(false);
    }
    write_json(path, mcqs).await?;
    info!("Saved {} MCQs to {}", mcqs.len(), path.display());
    Ok(true)
}

/// Write the keyword list to `path`. Skipped (returns `Ok(false)`) when empty.
pub async fn write_keywords(path: &Path, keywords: &KeywordSet) -> Result<bool, McqGenError> {
    if keywords.is_empty() {
        info!("No keywords to save, skipping {}", path.display());
        return Ok(false);
    }
    write_json(path, keywords).await?;
    info!("Saved {} keywords to {}", keywords.len(), path.display());
    Ok(true)
}

/// Write both lists of `output`.
pub async fn write_outputs(
    output: &GenerationOutput,
    mcq_path: &Path,
    keywords_path: &Path,
) -> Result<WrittenFiles, McqGenError> {
    let mcqs = write_mcqs(mcq_path, &output.mcqs)
        .await?
        .then(|| mcq_path.to_path_buf());
    let keywords = write_keywords(keywords_path, &output.keywords)
        .await?
        .then(|| keywords_path.to_path_buf());
    Ok(WrittenFiles { mcqs, keywords })
}

/// Atomic write: temp file next to the target, then rename.
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), McqGenError> {
    let json = to_pretty_json(value)
        .map_err(|e| McqGenError::Internal(format!("JSON serialisation failed: {e}")))?;
    let write_err = |e| McqGenError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}
