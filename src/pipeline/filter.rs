//! Chunk filter: drop reference lists, acknowledgements and citation-dense text.
//!
//! Questions generated from a bibliography are always about authors and
//! years, which the validator rejects anyway. Filtering those spans before
//! they reach the LLM saves whole retry budgets.
//!
//! Two independent heuristics, both plain regex matches over the text:
//!
//! 1. **Structural markers** — section headers and bibliography-entry shapes.
//! 2. **Citation density** — more than [`MIN_CITATIONS`] inline citation
//!    markers *and* `matches × 10 / chars` above [`MAX_CITATION_DENSITY`].

use once_cell::sync::Lazy;
use regex::Regex;

/// Citation matches required before the density check applies.
pub const MIN_CITATIONS: usize = 3;

/// Density threshold (`matches × 10 / char_length`).
pub const MAX_CITATION_DENSITY: f64 = 0.2;

static RE_STRUCTURAL: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"References(?:\s|$)",
        r"Bibliography(?:\s|$)",
        r"Acknowledgements(?:\s|$)",
        r"et al\.\s+\(\d{4}\)",
        r"\[\d+\]\s+[A-Z][a-z]+,",
        r"(?m)^\s*\d+\.\s+[A-Z][a-z]+\s+[A-Z][a-z]+\s+et\s+al\.",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static RE_CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\d+\]|\(\w+ et al\.,? \d{4}\)|\([A-Za-z]+, \d{4}\)").unwrap());

/// Returns `true` when `text` looks like administrative or reference matter.
pub fn should_exclude(text: &str) -> bool {
    if RE_STRUCTURAL.iter().any(|re| re.is_match(text)) {
        return true;
    }
    citation_density_exceeded(text)
}

/// Number of inline citation markers in `text`.
pub fn citation_count(text: &str) -> usize {
    RE_CITATION.find_iter(text).count()
}

fn citation_density_exceeded(text: &str) -> bool {
    let count = citation_count(text);
    if count <= MIN_CITATIONS {
        return false;
    }
    let len = text.chars().count();
    len > 0 && (count as f64 * 10.0 / len as f64) > MAX_CITATION_DENSITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_heading_is_excluded() {
        assert!(should_exclude("References\n[1] Something"));
        assert!(should_exclude("Some closing words.\n\nReferences\nSmith J."));
        assert!(should_exclude("trailing heading References"));
    }

    #[test]
    fn other_section_headers_are_excluded() {
        assert!(should_exclude("Bibliography\nKnuth, D."));
        assert!(should_exclude("Acknowledgements We thank the reviewers."));
    }

    #[test]
    fn bibliography_entries_are_excluded() {
        assert!(should_exclude("[12] Lamport, L. Time, clocks, and the ordering of events."));
        assert!(should_exclude("as shown by Vaswani et al. (2017) attention suffices"));
        assert!(should_exclude("intro\n3. John Smith et al. Deep nets."));
    }

    #[test]
    fn dense_citations_are_excluded() {
        // 4 markers in ~60 chars: density = 40/60 ≈ 0.67
        let text = "Prior work [1] [2] [3] [4] covered this area quite well.";
        assert!(citation_count(text) == 4);
        assert!(should_exclude(text));
    }

    #[test]
    fn sparse_citations_are_kept() {
        // 4 markers spread across a long paragraph: density < 0.2
        let filler = "The scheduler assigns tasks to workers in round robin order. ".repeat(5);
        let text = format!("{filler}[1] {filler}[2] {filler}[3] {filler}[4]");
        assert_eq!(citation_count(&text), 4);
        assert!(!should_exclude(&text));
    }

    #[test]
    fn three_citations_never_trigger_density() {
        assert!(!should_exclude("[1][2][3]"));
    }

    #[test]
    fn author_year_markers_count() {
        let text = "(Smith, 2019) (Lee et al., 2020) (Wu et al. 2021) (Kim, 2018)";
        assert_eq!(citation_count(text), 4);
        assert!(should_exclude(text));
    }

    #[test]
    fn ordinary_content_is_kept() {
        let text = "A B-tree keeps keys sorted and allows searches, sequential access, \
                    insertions, and deletions in logarithmic time.";
        assert!(!should_exclude(text));
        assert!(!should_exclude(""));
    }
}
