//! Error types for the edgequake-pdf2mcq library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`McqGenError`] — **Fatal**: the run cannot proceed at all (bad input
//!   file, corrupt PDF, provider not configured, nothing left after
//!   filtering). Returned as `Err(McqGenError)` from the `generate*` entry
//!   points.
//!
//! * [`AttemptError`] — **Non-fatal**: a single LLM attempt for one chunk
//!   failed (transport error, timeout, empty body, unparseable output, or a
//!   batch with no valid question). The core loop retries it and, once the
//!   retry budget is spent, abandons the chunk. It never unwinds past the
//!   generator.
//!
//! Per-record validation failures are a third, even narrower kind and live
//! next to the schema in [`crate::mcq::ValidationError`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2mcq library.
#[derive(Debug, Error)]
pub enum McqGenError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Text extraction failed for a specific page.
    #[error("Text extraction failed for page {page}: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// Every extracted page was blank.
    #[error("No usable text chunks in '{source_name}' ({pages} pages extracted)")]
    NoUsableChunks { source_name: String, pages: usize },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The run finished with fewer questions than requested.
    ///
    /// Only returned by [`crate::output::GenerationOutput::into_result`];
    /// the `generate*` functions report under-delivery through stats.
    #[error("Generated {produced}/{target} questions")]
    UnderDelivered { produced: usize, target: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
binary, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single generation attempt on one chunk.
///
/// Every variant is retried identically by the core loop.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AttemptError {
    /// The backend call itself failed (network, HTTP status, provider error).
    #[error("provider error: {0}")]
    Provider(String),

    /// The backend call exceeded the per-call timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The backend answered with an empty body.
    #[error("empty completion")]
    EmptyResponse,

    /// The completion could not be repaired into JSON records.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The completion parsed, but every record failed validation.
    #[error("no valid question among {candidates} candidate(s)")]
    NoValidItems { candidates: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_delivered_display() {
        let e = McqGenError::UnderDelivered {
            produced: 7,
            target: 10,
        };
        assert!(e.to_string().contains("7/10"), "got: {e}");
    }

    #[test]
    fn no_usable_chunks_display() {
        let e = McqGenError::NoUsableChunks {
            source_name: "paper.pdf".into(),
            pages: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("paper.pdf"));
        assert!(msg.contains("3 pages"));
    }

    #[test]
    fn attempt_timeout_display() {
        let e = AttemptError::Timeout { secs: 60 };
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn attempt_no_valid_items_display() {
        let e = AttemptError::NoValidItems { candidates: 2 };
        assert!(e.to_string().contains("2 candidate"));
    }

    #[test]
    fn provider_not_configured_display() {
        let e = McqGenError::ProviderNotConfigured {
            provider: "anthropic".into(),
            hint: "ANTHROPIC_API_KEY is not set".into(),
        };
        assert!(e.to_string().contains("anthropic"));
        assert!(e.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
