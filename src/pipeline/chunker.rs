//! Chunker: split page texts into overlapping, size-bounded windows.
//!
//! ## Splitting
//!
//! Windows come from a recursive character splitter. The text is cut on the
//! coarsest separator present (blank line, then newline, then space, then
//! single characters); pieces that are still too long are cut again with the
//! next separator. Short pieces are then merged back together up to
//! `chunk_size` characters, and each new window starts with a tail of the
//! previous one no longer than `chunk_overlap` characters. Sizes are counted
//! in `char`s, never bytes, so multi-byte text never splits mid-codepoint.
//!
//! ## Fallback strategies
//!
//! Short documents produce few windows at 400/50. When fewer than
//! [`MIN_PRIMARY_CHUNKS`] survive the filter, the same pages are re-split with
//! [`FALLBACK_STRATEGIES`] and every window not already present is appended.
//! Output order is primary windows first, then each fallback in turn, so the
//! result is deterministic for identical input.

use crate::pipeline::filter::should_exclude;
use std::collections::HashSet;
use tracing::{debug, info};

/// Window size and overlap, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl SplitterConfig {
    pub const fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }
}

/// Primary window configuration.
pub const PRIMARY_STRATEGY: SplitterConfig = SplitterConfig::new(400, 50);

/// Extra configurations tried when the primary pass is too thin.
pub const FALLBACK_STRATEGIES: [SplitterConfig; 3] = [
    SplitterConfig::new(300, 20),
    SplitterConfig::new(200, 10),
    SplitterConfig::new(500, 100),
];

/// Below this many primary chunks the fallback strategies run.
pub const MIN_PRIMARY_CHUNKS: usize = 100;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Result of chunking a document.
#[derive(Debug, Clone, Default)]
pub struct ChunkSet {
    /// Deduplicated chunks in insertion order.
    pub chunks: Vec<String>,
    /// Chunks that survived the primary pass (before dedup).
    pub primary_count: usize,
    /// Fallback strategies that were applied, in order.
    pub fallbacks_applied: Vec<SplitterConfig>,
}

impl ChunkSet {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Split `pages` into filtered, deduplicated chunks.
pub fn split<S: AsRef<str>>(pages: &[S]) -> ChunkSet {
    let kept_pages: Vec<&str> = pages
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| {
            let excluded = should_exclude(p);
            if excluded {
                debug!("Skipping page of {} chars: reference material", p.chars().count());
            }
            !excluded
        })
        .collect();

    let primary = split_with(&kept_pages, PRIMARY_STRATEGY);
    let mut set = ChunkSet {
        primary_count: primary.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    push_unique(&mut set.chunks, &mut seen, primary);
    info!("Document split into {} chunks (after filtering)", set.primary_count);

    if set.primary_count < MIN_PRIMARY_CHUNKS {
        for strategy in FALLBACK_STRATEGIES {
            let extra = split_with(&kept_pages, strategy);
            push_unique(&mut set.chunks, &mut seen, extra);
            set.fallbacks_applied.push(strategy);
        }
        info!(
            "Fallback strategies raised chunk count to {}",
            set.chunks.len()
        );
    }

    set
}

fn split_with(pages: &[&str], config: SplitterConfig) -> Vec<String> {
    pages
        .iter()
        .flat_map(|page| split_text(page, config))
        .filter(|chunk| !should_exclude(chunk))
        .collect()
}

fn push_unique(out: &mut Vec<String>, seen: &mut HashSet<String>, chunks: Vec<String>) {
    for chunk in chunks {
        if seen.insert(chunk.clone()) {
            out.push(chunk);
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split one text into windows of at most `chunk_size` characters.
///
/// A single word longer than the window is cut at character boundaries.
pub fn split_text(text: &str, config: SplitterConfig) -> Vec<String> {
    recursive_split(text, &SEPARATORS, config)
}

fn recursive_split(text: &str, separators: &[&str], config: SplitterConfig) -> Vec<String> {
    // Coarsest separator present in the text; "" always matches.
    let (idx, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
        .map(|(i, sep)| (i, *sep))
        .unwrap_or((separators.len().saturating_sub(1), ""));
    let finer = &separators[(idx + 1).min(separators.len())..];

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    };

    let mut out = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    for piece in pieces {
        if char_len(&piece) < config.chunk_size {
            pending.push(piece);
            continue;
        }
        if !pending.is_empty() {
            out.extend(merge_pieces(&pending, separator, config));
            pending.clear();
        }
        if finer.is_empty() {
            out.push(piece);
        } else {
            out.extend(recursive_split(&piece, finer, config));
        }
    }
    if !pending.is_empty() {
        out.extend(merge_pieces(&pending, separator, config));
    }
    out
}

/// Greedily merge pieces into windows, carrying an overlap tail forward.
fn merge_pieces(pieces: &[String], separator: &str, config: SplitterConfig) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut windows = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut total = 0usize;

    for piece in pieces.iter().map(String::as_str) {
        let len = char_len(piece);
        let joined_len = |current: &[&str], total: usize| {
            total + len + if current.is_empty() { 0 } else { sep_len }
        };

        if joined_len(&current, total) > config.chunk_size && !current.is_empty() {
            push_window(&mut windows, &current, separator);
            // Drop leading pieces until the tail fits the overlap budget and
            // leaves room for the incoming piece.
            while total > config.chunk_overlap
                || (total > 0 && joined_len(&current, total) > config.chunk_size)
            {
                let first = char_len(current[0]);
                total -= first + if current.len() > 1 { sep_len } else { 0 };
                current.remove(0);
            }
        }

        total += len + if current.is_empty() { 0 } else { sep_len };
        current.push(piece);
    }

    push_window(&mut windows, &current, separator);
    windows
}

fn push_window(windows: &mut Vec<String>, current: &[&str], separator: &str) {
    let window = current.join(separator);
    let window = window.trim();
    if !window.is_empty() {
        windows.push(window.to_string());
    }
}
