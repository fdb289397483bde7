//! Configuration for MCQ generation.
//!
//! All run behaviour is controlled through [`GenerationConfig`], built via
//! [`GenerationConfigBuilder`]. Defaults reproduce the reference pipeline:
//! two questions per chunk to start, temperature 0.7, five attempts per
//! chunk with 1.5× backoff, a 1 s pause between chunks and a 1.5 s pause in
//! the top-up pass.

use crate::backend::SharedBackend;
use crate::error::McqGenError;
use crate::mcq::Difficulty;
use crate::progress::ProgressCallback;
use crate::retry::RetryPolicy;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one generation run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2mcq::{Difficulty, GenerationConfig};
///
/// let config = GenerationConfig::builder()
///     .model("gpt-4.1-mini")
///     .difficulty(Difficulty::Moderate)
///     .shuffle_seed(42)
///     .build()
///     .unwrap();
/// assert_eq!(config.initial_per_chunk, 2);
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// LLM model identifier. If None, uses `gpt-4.1-nano` for named providers.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider` and `backend`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed `edgequake-llm` provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed completion backend. Takes precedence over everything else.
    pub backend: Option<SharedBackend>,

    /// Sampling temperature for the first pass. Default: 0.7.
    pub temperature: f32,

    /// Sampling temperature for the second pass. Default: 0.9.
    ///
    /// The second pass revisits chunks that already produced questions, so a
    /// higher temperature pushes the model towards different ones.
    pub second_pass_temperature: f32,

    /// Sampling temperature for keyword extraction. Default: 0.3.
    pub keyword_temperature: f32,

    /// Token cap for question generation. Default: None (provider default).
    pub max_tokens: Option<usize>,

    /// Token cap for keyword extraction. Default: 200.
    pub keyword_max_tokens: usize,

    /// Difficulty requested in every prompt. Default: Hard.
    pub difficulty: Difficulty,

    /// Questions requested per chunk at the start of the first pass. Default: 2.
    pub initial_per_chunk: usize,

    /// Upper bound for adaptive tuning of the per-chunk yield. Default: 3.
    pub max_per_chunk: usize,

    /// Adaptive tuning runs every this many first-pass chunks. Default: 10.
    pub tuning_interval: usize,

    /// Attempts and backoff per chunk. Default: 5 attempts, 2 s × 1.5, 60 s cap, 2 s jitter.
    pub retry: RetryPolicy,

    /// Pause between first-pass chunks. Default: 1 s.
    pub chunk_pause: Duration,

    /// Pause between second-pass chunks. Default: 1.5 s.
    pub second_pass_pause: Duration,

    /// Characters of citation-stripped text sent for keyword extraction. Default: 4000.
    pub keyword_char_limit: usize,

    /// Keywords mentioned in each question prompt. Default: 10.
    pub prompt_keyword_limit: usize,

    /// Per-LLM-call timeout in seconds. A timeout counts as a failed attempt. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Seed for chunk shuffling and retry jitter. If None, seeded from entropy.
    pub shuffle_seed: Option<u64>,

    /// Chunks in flight at once. Default: 1 (strictly sequential).
    ///
    /// Values above 1 process chunks in ordered batches; adaptive state is
    /// still folded one outcome at a time.
    pub concurrency: usize,

    /// Custom system prompt for question generation. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// Progress events receiver.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            backend: None,
            temperature: 0.7,
            second_pass_temperature: 0.9,
            keyword_temperature: 0.3,
            max_tokens: None,
            keyword_max_tokens: 200,
            difficulty: Difficulty::Hard,
            initial_per_chunk: 2,
            max_per_chunk: 3,
            tuning_interval: 10,
            retry: RetryPolicy::default(),
            chunk_pause: Duration::from_secs(1),
            second_pass_pause: Duration::from_millis(1500),
            keyword_char_limit: 4000,
            prompt_keyword_limit: 10,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            password: None,
            shuffle_seed: None,
            concurrency: 1,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("backend", &self.backend.as_ref().map(|_| "<dyn CompletionBackend>"))
            .field("temperature", &self.temperature)
            .field("second_pass_temperature", &self.second_pass_temperature)
            .field("difficulty", &self.difficulty)
            .field("initial_per_chunk", &self.initial_per_chunk)
            .field("max_per_chunk", &self.max_per_chunk)
            .field("retry", &self.retry)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("shuffle_seed", &self.shuffle_seed)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    pub(crate) fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn backend(mut self, backend: SharedBackend) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn second_pass_temperature(mut self, t: f32) -> Self {
        self.config.second_pass_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn keyword_temperature(mut self, t: f32) -> Self {
        self.config.keyword_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn keyword_max_tokens(mut self, n: usize) -> Self {
        self.config.keyword_max_tokens = n;
        self
    }

    pub fn difficulty(mut self, d: Difficulty) -> Self {
        self.config.difficulty = d;
        self
    }

    pub fn initial_per_chunk(mut self, n: usize) -> Self {
        self.config.initial_per_chunk = n;
        self
    }

    pub fn max_per_chunk(mut self, n: usize) -> Self {
        self.config.max_per_chunk = n;
        self
    }

    pub fn tuning_interval(mut self, n: usize) -> Self {
        self.config.tuning_interval = n;
        self
    }

    /// Total LLM attempts per chunk, including the first.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn chunk_pause(mut self, pause: Duration) -> Self {
        self.config.chunk_pause = pause;
        self
    }

    pub fn second_pass_pause(mut self, pause: Duration) -> Self {
        self.config.second_pass_pause = pause;
        self
    }

    /// Zero every pause and backoff while keeping the attempt budget.
    pub fn without_delays(mut self) -> Self {
        let attempts = self.config.retry.max_attempts;
        self.config.retry = RetryPolicy::immediate(attempts);
        self.config.chunk_pause = Duration::ZERO;
        self.config.second_pass_pause = Duration::ZERO;
        self
    }

    pub fn keyword_char_limit(mut self, n: usize) -> Self {
        self.config.keyword_char_limit = n;
        self
    }

    pub fn prompt_keyword_limit(mut self, n: usize) -> Self {
        self.config.prompt_keyword_limit = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.config.shuffle_seed = Some(seed);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, McqGenError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl GenerationConfig {
    /// Check the invariants the builder enforces. Also run by the driver, since
    /// fields are public.
    pub fn validate(&self) -> Result<(), McqGenError> {
        if self.initial_per_chunk == 0 || self.max_per_chunk == 0 {
            return Err(McqGenError::InvalidConfig(
                "Questions per chunk must be ≥ 1".into(),
            ));
        }
        if self.initial_per_chunk > self.max_per_chunk {
            return Err(McqGenError::InvalidConfig(format!(
                "initial_per_chunk ({}) exceeds max_per_chunk ({})",
                self.initial_per_chunk, self.max_per_chunk
            )));
        }
        if self.tuning_interval == 0 {
            return Err(McqGenError::InvalidConfig(
                "Tuning interval must be ≥ 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(McqGenError::InvalidConfig(
                "At least one attempt per chunk is required".into(),
            ));
        }
        if self.api_timeout_secs == 0 {
            return Err(McqGenError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(McqGenError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        for t in [
            self.temperature,
            self.second_pass_temperature,
            self.keyword_temperature,
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(McqGenError::InvalidConfig(format!(
                    "Temperature must be 0.0–2.0, got {t}"
                )));
            }
        }
        Ok(())
    }
}
