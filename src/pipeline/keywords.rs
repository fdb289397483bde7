//! Keyword extraction: one LLM call that names the document's core concepts.
//!
//! The keywords bias every question prompt towards the document's subject
//! matter. Extraction is best-effort: any failure is logged and yields an
//! empty set, and generation proceeds without topic hints.

use crate::backend::{CompletionBackend, CompletionRequest};
use crate::config::GenerationConfig;
use crate::prompts::{keyword_prompt, KEYWORD_SYSTEM_PROMPT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

static RE_CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\d+(?:[,–-]\s*\d+)*\]|\(\w+ et al\.,? \d{4}\)|\([A-Za-z]+, \d{4}\)").unwrap());

/// Deduplicated keywords in the order the model listed them.
///
/// Serializes as a plain JSON array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `keyword` unless it is blank or already present. Returns whether it was added.
    pub fn insert(&mut self, keyword: impl Into<String>) -> bool {
        let keyword = keyword.into();
        let keyword = keyword.trim();
        if keyword.is_empty() || self.contains(keyword) {
            return false;
        }
        self.0.push(keyword.to_string());
        true
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.0.iter().any(|k| k == keyword)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The first `n` keywords.
    pub fn top(&self, n: usize) -> Vec<&str> {
        self.iter().take(n).collect()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<S: Into<String>> FromIterator<S> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = KeywordSet::new();
        for kw in iter {
            set.insert(kw);
        }
        set
    }
}

/// Remove inline citation markers (`[3]`, `[1, 4]`, `(Lee et al., 2020)`, `(Kim, 2018)`).
pub fn strip_citations(text: &str) -> String {
    RE_CITATION.replace_all(text, "").into_owned()
}

/// Split a comma-separated model reply into keywords.
pub fn parse_keywords(reply: &str) -> KeywordSet {
    reply.trim().split(',').collect()
}

/// Extract keywords from the full document text.
///
/// Never fails: errors and timeouts produce an empty set.
pub async fn extract(
    backend: &dyn CompletionBackend,
    full_text: &str,
    config: &GenerationConfig,
) -> KeywordSet {
    info!("Extracting important keywords from document");
    let cleaned = strip_citations(full_text);
    let excerpt: String = cleaned.chars().take(config.keyword_char_limit).collect();

    let request = CompletionRequest {
        system: KEYWORD_SYSTEM_PROMPT.to_string(),
        prompt: keyword_prompt(&excerpt),
        temperature: config.keyword_temperature,
        max_tokens: Some(config.keyword_max_tokens),
    };

    let reply = match tokio::time::timeout(config.api_timeout(), backend.complete(&request)).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => {
            warn!("Keyword extraction failed: {}", e);
            return KeywordSet::new();
        }
        Err(_) => {
            warn!(
                "Keyword extraction timed out after {}s",
                config.api_timeout_secs
            );
            return KeywordSet::new();
        }
    };

    let keywords = parse_keywords(&reply);
    if keywords.is_empty() {
        warn!("Keyword extraction returned no keywords");
    } else {
        info!(
            "Extracted {} keywords: {}",
            keywords.len(),
            keywords.top(5).join(", ")
        );
    }
    keywords
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<String, BackendError>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(reply: Result<&str, BackendError>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for Scripted {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    #[test]
    fn parse_trims_and_dedups() {
        let set = parse_keywords(" paging, TLB ,, page table, TLB,\n");
        assert_eq!(set.into_vec(), vec!["paging", "TLB", "page table"]);
    }

    #[test]
    fn top_keeps_model_order() {
        let set: KeywordSet = (0..15).map(|i| format!("k{i}")).collect();
        assert_eq!(set.top(3), vec!["k0", "k1", "k2"]);
        assert_eq!(set.top(10).len(), 10);
    }

    #[test]
    fn citations_are_stripped() {
        let text = "Caches [3] reduce latency [1, 4] (Lee et al., 2020) and (Kim, 2018) too.";
        let cleaned = strip_citations(text);
        assert!(!cleaned.contains('['));
        assert!(!cleaned.contains("2020"));
        assert!(!cleaned.contains("Kim"));
        assert!(cleaned.contains("Caches"));
    }

    #[test]
    fn serializes_as_array() {
        let set: KeywordSet = ["a", "b"].into_iter().collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["a","b"]"#);
    }

    #[tokio::test]
    async fn extract_sends_truncated_text_at_low_temperature() {
        let backend = Scripted::new(Ok("virtual memory, paging, TLB"));
        let config = GenerationConfig::default();
        let text = "x".repeat(10_000);

        let set = extract(&backend, &text, &config).await;
        assert_eq!(set.len(), 3);

        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].temperature, 0.3);
        assert_eq!(seen[0].max_tokens, Some(200));
        assert_eq!(seen[0].system, KEYWORD_SYSTEM_PROMPT);
        assert!(seen[0].prompt.contains(&"x".repeat(4000)));
        assert!(!seen[0].prompt.contains(&"x".repeat(4001)));
    }

    #[tokio::test]
    async fn extract_failure_degrades_to_empty() {
        let backend = Scripted::new(Err(BackendError::Request("HTTP 500".into())));
        let set = extract(&backend, "some text", &GenerationConfig::default()).await;
        assert!(set.is_empty());
    }
}
