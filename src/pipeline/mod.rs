//! Pipeline stages for PDF-to-MCQ generation.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunker ──▶ keywords ──▶ generator ──▶ repair ──▶ mcq
//! (URL/path) (pdfium)   (+filter)   (1 call)     (per chunk)   (JSON)    (validate)
//! ```
//!
//! 1. [`input`]     — canonicalise a path, URL or byte buffer to a local PDF
//! 2. [`extract`]   — page texts via pdfium, in `spawn_blocking`
//! 3. [`filter`]    — drop reference lists and citation-dense text
//! 4. [`chunker`]   — overlapping windows with fallback strategies
//! 5. [`keywords`]  — document keywords that bias every prompt
//! 6. [`generator`] — per-chunk LLM calls with retry and adaptive state
//! 7. [`repair`]    — recover JSON records from raw model output

pub mod chunker;
pub mod extract;
pub mod filter;
pub mod generator;
pub mod input;
pub mod keywords;
pub mod repair;
