//! Question generation for one chunk: prompt, call, repair, validate, retry.
//!
//! ## Attempt lifecycle
//!
//! ```text
//! ATTEMPT ──▶ SUCCESS    ≥1 valid item: return immediately
//!    │
//!    ├──▶ RETRY      transport error, timeout, empty body, unparseable
//!    │               output or zero valid items; back off and try again
//!    │
//!    └──▶ EXHAUSTED  retry budget spent: empty outcome, chunk failed
//! ```
//!
//! Invalid siblings in a successful batch are dropped silently (logged at
//! `debug`). The generator itself holds no mutable state; the counters that
//! drive adaptive tuning live in [`AdaptiveState`], which the driver owns
//! and folds each [`ChunkOutcome`] into.

use crate::backend::{CompletionRequest, SharedBackend};
use crate::config::GenerationConfig;
use crate::error::AttemptError;
use crate::mcq::{Difficulty, McqItem};
use crate::pipeline::keywords::KeywordSet;
use crate::pipeline::repair::parse_records;
use crate::prompts::{mcq_prompt, DEFAULT_SYSTEM_PROMPT};
use crate::retry::RetryPolicy;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Success rate below which the per-chunk yield drops.
pub const LOW_SUCCESS_RATE: f64 = 0.5;

/// Success rate above which the per-chunk yield grows.
pub const HIGH_SUCCESS_RATE: f64 = 0.8;

/// Per-call parameters, snapshotted from [`AdaptiveState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkRequest {
    pub count: usize,
    pub difficulty: Difficulty,
    pub temperature: f32,
}

/// What one chunk produced.
#[derive(Debug, Clone, Default)]
pub struct ChunkOutcome {
    /// Valid items; empty when the chunk was abandoned.
    pub items: Vec<McqItem>,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Attempts that failed.
    pub failed_attempts: u32,
    /// Error of the last failed attempt, if any.
    pub last_error: Option<AttemptError>,
}

impl ChunkOutcome {
    pub fn is_success(&self) -> bool {
        !self.items.is_empty()
    }
}

/// Counters and knobs of one generation session.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveState {
    /// Questions requested per call.
    pub per_chunk_target: usize,
    /// Upper bound for `per_chunk_target` during tuning.
    pub max_per_chunk: usize,
    /// Current sampling temperature.
    pub temperature: f32,
    pub successful_chunks: usize,
    pub failed_chunks: usize,
    pub failed_attempts: usize,
    /// Chunks folded in so far.
    pub processed: usize,
}

impl AdaptiveState {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            per_chunk_target: config.initial_per_chunk,
            max_per_chunk: config.max_per_chunk,
            temperature: config.temperature,
            successful_chunks: 0,
            failed_chunks: 0,
            failed_attempts: 0,
            processed: 0,
        }
    }

    /// Snapshot the parameters for the next call.
    pub fn request(&self, difficulty: Difficulty) -> ChunkRequest {
        ChunkRequest {
            count: self.per_chunk_target,
            difficulty,
            temperature: self.temperature,
        }
    }

    /// Fold one outcome into the counters.
    pub fn record(&mut self, outcome: &ChunkOutcome) {
        self.processed += 1;
        self.failed_attempts += outcome.failed_attempts as usize;
        if outcome.is_success() {
            self.successful_chunks += 1;
        } else {
            self.failed_chunks += 1;
        }
    }

    /// `successful / (successful + failed)`, or `None` before any chunk.
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.successful_chunks + self.failed_chunks;
        (total > 0).then(|| self.successful_chunks as f64 / total as f64)
    }

    /// Adjust the per-chunk yield from the success rate. Returns the new
    /// yield when it changed.
    pub fn retune(&mut self) -> Option<usize> {
        let rate = self.success_rate()?;
        let before = self.per_chunk_target;
        if rate < LOW_SUCCESS_RATE {
            self.per_chunk_target = self.per_chunk_target.saturating_sub(1).max(1);
        } else if rate > HIGH_SUCCESS_RATE && self.per_chunk_target < self.max_per_chunk {
            self.per_chunk_target += 1;
        }
        (self.per_chunk_target != before).then_some(self.per_chunk_target)
    }

    /// Switch to top-up mode: one question per call at `temperature`.
    pub fn enter_second_pass(&mut self, temperature: f32) {
        self.per_chunk_target = 1;
        self.temperature = temperature;
    }
}

/// Generates questions for single chunks against one backend.
pub struct QuestionGenerator {
    backend: SharedBackend,
    system_prompt: String,
    keywords: Vec<String>,
    retry: RetryPolicy,
    api_timeout: Duration,
    max_tokens: Option<usize>,
}

impl QuestionGenerator {
    pub fn new(backend: SharedBackend, keywords: &KeywordSet, config: &GenerationConfig) -> Self {
        Self {
            backend,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            keywords: keywords
                .top(config.prompt_keyword_limit)
                .into_iter()
                .map(str::to_string)
                .collect(),
            retry: config.retry.clone(),
            api_timeout: config.api_timeout(),
            max_tokens: config.max_tokens,
        }
    }

    /// Generate questions for `chunk`, retrying until one attempt yields a
    /// valid item or the attempt budget is spent.
    pub async fn generate<R: Rng + ?Sized>(
        &self,
        chunk: &str,
        request: ChunkRequest,
        rng: &mut R,
    ) -> ChunkOutcome {
        let keywords: Vec<&str> = self.keywords.iter().map(String::as_str).collect();
        let completion = CompletionRequest {
            system: self.system_prompt.clone(),
            prompt: mcq_prompt(chunk, request.count, request.difficulty, &keywords),
            temperature: request.temperature,
            max_tokens: self.max_tokens,
        };
        let completion = &completion;
        let difficulty = request.difficulty;

        let outcome = self
            .retry
            .run(rng, move |_| self.attempt(completion, difficulty))
            .await;

        ChunkOutcome {
            failed_attempts: outcome.errors.len() as u32,
            last_error: outcome.errors.last().cloned(),
            attempts: outcome.attempts,
            items: outcome.value.unwrap_or_default(),
        }
    }

    async fn attempt(
        &self,
        completion: &CompletionRequest,
        difficulty: Difficulty,
    ) -> Result<Vec<McqItem>, AttemptError> {
        let raw = match tokio::time::timeout(self.api_timeout, self.backend.complete(completion)).await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(AttemptError::Provider(e.to_string())),
            Err(_) => {
                return Err(AttemptError::Timeout {
                    secs: self.api_timeout.as_secs(),
                })
            }
        };

        if raw.trim().is_empty() {
            return Err(AttemptError::EmptyResponse);
        }

        let records = parse_records(&raw)?;
        let candidates = records.len();
        let items: Vec<McqItem> = records
            .iter()
            .filter_map(|record| match McqItem::from_record(record, difficulty) {
                Ok(item) => Some(item),
                Err(e) => {
                    debug!("Dropping candidate: {}", e);
                    None
                }
            })
            .collect();

        if items.is_empty() {
            return Err(AttemptError::NoValidItems { candidates });
        }
        debug!("{} of {} candidates valid", items.len(), candidates);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, CompletionBackend};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn record(question: &str) -> String {
        format!(
            r#"{{"question": "{question}", "options": {{"A": "a", "B": "b", "C": "c", "D": "d"}},
               "correct_answer": "A", "explanation": "because"}}"#
        )
    }

    /// Replies from a script, repeating the last entry once it runs out.
    struct Scripted {
        replies: Mutex<VecDeque<Result<String, BackendError>>>,
        last: Result<String, BackendError>,
        calls: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, BackendError>>) -> Arc<Self> {
            let last = replies.last().cloned().unwrap_or(Ok(String::new()));
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                last,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<CompletionRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for Scripted {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
            self.calls.lock().unwrap().push(request.clone());
            let next = self.replies.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.last.clone())
        }
    }

    struct Slow;

    #[async_trait]
    impl CompletionBackend for Slow {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, BackendError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }
    }

    fn config() -> GenerationConfig {
        GenerationConfig::builder().without_delays().build().unwrap()
    }

    fn generator(backend: SharedBackend, keywords: &KeywordSet) -> QuestionGenerator {
        QuestionGenerator::new(backend, keywords, &config())
    }

    fn hard(count: usize) -> ChunkRequest {
        ChunkRequest {
            count,
            difficulty: Difficulty::Hard,
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let backend = Scripted::new(vec![Ok(format!(
            "[{}, {}]",
            record("What is paging?"),
            record("What is a TLB?")
        ))]);
        let gen = generator(backend.clone(), &KeywordSet::new());
        let mut rng = StdRng::seed_from_u64(0);

        let out = gen.generate("chunk text", hard(2), &mut rng).await;
        assert_eq!(out.items.len(), 2);
        assert_eq!(out.attempts, 1);
        assert_eq!(out.failed_attempts, 0);
        assert_eq!(out.items[0].difficulty(), Difficulty::Hard);

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].system, DEFAULT_SYSTEM_PROMPT);
        assert!(calls[0].prompt.contains("Create exactly 2 hard MCQs"));
    }

    #[tokio::test]
    async fn every_failure_kind_is_retried() {
        let backend = Scripted::new(vec![
            Err(BackendError::Request("HTTP 429".into())),
            Ok("   ".into()),
            Ok("not json at all".into()),
            Ok(r#"[{"question": "Who wrote this paper?"}]"#.into()),
            Ok(format!("```json\n[{},]\n```", record("What does an MMU do?"))),
        ]);
        let gen = generator(backend.clone(), &KeywordSet::new());
        let mut rng = StdRng::seed_from_u64(0);

        let out = gen.generate("chunk", hard(2), &mut rng).await;
        assert!(out.is_success());
        assert_eq!(out.attempts, 5);
        assert_eq!(out.failed_attempts, 4);
        assert_eq!(backend.calls().len(), 5);
    }

    #[tokio::test]
    async fn exhaustion_returns_empty_outcome() {
        let backend = Scripted::new(vec![Ok(String::new())]);
        let gen = generator(backend.clone(), &KeywordSet::new());
        let mut rng = StdRng::seed_from_u64(0);

        let out = gen.generate("chunk", hard(2), &mut rng).await;
        assert!(!out.is_success());
        assert_eq!(out.attempts, 5);
        assert_eq!(out.failed_attempts, 5);
        assert_eq!(out.last_error, Some(AttemptError::EmptyResponse));
        assert_eq!(backend.calls().len(), 5);
    }

    #[tokio::test]
    async fn invalid_siblings_are_dropped() {
        let missing_d = r#"{"question": "Q?", "options": {"A": "a", "B": "b", "C": "c"},
                            "correct_answer": "A", "explanation": "e"}"#;
        let backend = Scripted::new(vec![Ok(format!(
            "[{missing_d}, {}]",
            record("What is demand paging?")
        ))]);
        let gen = generator(backend, &KeywordSet::new());
        let mut rng = StdRng::seed_from_u64(0);

        let out = gen.generate("chunk", hard(2), &mut rng).await;
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].question(), "What is demand paging?");
    }

    #[tokio::test]
    async fn prompt_mentions_first_ten_keywords() {
        let keywords: KeywordSet = (1..=12).map(|i| format!("kw{i}")).collect();
        let backend = Scripted::new(vec![Ok(record("What is kw1?"))]);
        let gen = generator(backend.clone(), &keywords);
        let mut rng = StdRng::seed_from_u64(0);

        gen.generate("chunk", hard(1), &mut rng).await;
        let prompt = &backend.calls()[0].prompt;
        assert!(prompt.contains("kw1, kw2"));
        assert!(prompt.contains("kw10"));
        assert!(!prompt.contains("kw11"));
    }

    #[tokio::test]
    async fn timeout_counts_as_failed_attempt() {
        let config = GenerationConfig::builder()
            .without_delays()
            .max_attempts(2)
            .api_timeout_secs(1)
            .build()
            .unwrap();
        let gen = QuestionGenerator::new(Arc::new(Slow), &KeywordSet::new(), &config);
        let mut rng = StdRng::seed_from_u64(0);

        let out = gen.generate("chunk", hard(1), &mut rng).await;
        assert_eq!(out.failed_attempts, 2);
        assert_eq!(out.last_error, Some(AttemptError::Timeout { secs: 1 }));
    }

    // ── AdaptiveState ────────────────────────────────────────────────────

    fn outcome(success: bool, failed_attempts: u32) -> ChunkOutcome {
        let items = if success {
            vec![McqItem::from_record(
                &serde_json::from_str(&record("What is swapping?")).unwrap(),
                Difficulty::Hard,
            )
            .unwrap()]
        } else {
            vec![]
        };
        ChunkOutcome {
            items,
            attempts: failed_attempts + u32::from(success),
            failed_attempts,
            last_error: None,
        }
    }

    #[test]
    fn record_folds_counters() {
        let mut state = AdaptiveState::new(&GenerationConfig::default());
        state.record(&outcome(true, 4));
        state.record(&outcome(false, 5));
        assert_eq!(state.successful_chunks, 1);
        assert_eq!(state.failed_chunks, 1);
        assert_eq!(state.failed_attempts, 9);
        assert_eq!(state.processed, 2);
        assert_eq!(state.success_rate(), Some(0.5));
    }

    #[test]
    fn retune_thresholds() {
        let mut state = AdaptiveState::new(&GenerationConfig::default());
        assert_eq!(state.retune(), None);

        for _ in 0..9 {
            state.record(&outcome(true, 0));
        }
        state.record(&outcome(false, 5));
        // 0.9 > 0.8: grow to the cap, then stop.
        assert_eq!(state.retune(), Some(3));
        assert_eq!(state.retune(), None);

        for _ in 0..20 {
            state.record(&outcome(false, 5));
        }
        // 9/30 < 0.5: shrink, never below 1.
        assert_eq!(state.retune(), Some(2));
        assert_eq!(state.retune(), Some(1));
        assert_eq!(state.retune(), None);
        assert_eq!(state.per_chunk_target, 1);
    }

    #[test]
    fn middle_rate_keeps_yield() {
        let mut state = AdaptiveState::new(&GenerationConfig::default());
        for i in 0..10 {
            state.record(&outcome(i < 7, 0));
        }
        assert_eq!(state.retune(), None);
        assert_eq!(state.per_chunk_target, 2);
    }

    #[test]
    fn second_pass_forces_single_question() {
        let mut state = AdaptiveState::new(&GenerationConfig::default());
        state.enter_second_pass(0.9);
        let req = state.request(Difficulty::Hard);
        assert_eq!(req.count, 1);
        assert_eq!(req.temperature, 0.9);
    }
}
