//! Completion backends: the one seam between the pipeline and an LLM.
//!
//! The generator and keyword extractor only ever need "system + prompt +
//! temperature + token cap in, text out". [`CompletionBackend`] captures
//! exactly that, so the whole pipeline runs unchanged against a hosted
//! provider (through [`LlmBackend`], which wraps any `edgequake-llm`
//! provider) or against an in-process stub in tests.
//!
//! [`resolve_backend`] picks the backend for a run from the configuration and
//! the environment.

use crate::config::GenerationConfig;
use crate::error::McqGenError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
}

/// Failure reported by a backend. Always retryable from the pipeline's view.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// The provider rejected or failed the request.
    #[error("{0}")]
    Request(String),
}

/// Anything that can turn a [`CompletionRequest`] into text.
///
/// Implementations must be `Send + Sync`; the driver may issue calls from
/// several tasks when `concurrency > 1`.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;
}

/// Shared handle stored in [`GenerationConfig`].
pub type SharedBackend = Arc<dyn CompletionBackend>;

/// [`CompletionBackend`] over an `edgequake-llm` provider.
pub struct LlmBackend {
    provider: Arc<dyn LLMProvider>,
}

impl LlmBackend {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }

    /// Instantiate a named provider (`"openai"`, `"anthropic"`, …) with `model`.
    ///
    /// The factory reads the provider's API key from the environment.
    pub fn from_provider_name(provider_name: &str, model: &str) -> Result<Self, McqGenError> {
        ProviderFactory::create_llm_provider(provider_name, model)
            .map(Self::new)
            .map_err(|e| McqGenError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint: format!("{e}"),
            })
    }
}

#[async_trait]
impl CompletionBackend for LlmBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let messages = vec![
            ChatMessage::system(request.system.as_str()),
            ChatMessage::user(request.prompt.as_str()),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: request.max_tokens,
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| BackendError::Request(format!("{e}")))?;

        debug!(
            "Completion: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Resolve the backend for a run, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`), used as-is. Tests inject
///    stubs here.
/// 2. **Pre-built provider** (`config.provider`), wrapped in [`LlmBackend`].
/// 3. **Named provider + model** (`config.provider_name`, model defaulting
///    to [`DEFAULT_MODEL`]).
/// 4. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when
///    both are set and non-empty.
/// 5. **OpenAI** when `OPENAI_API_KEY` is set, so users holding several keys
///    get a predictable default.
/// 6. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_backend(config: &GenerationConfig) -> Result<SharedBackend, McqGenError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(LlmBackend::new(Arc::clone(provider))));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return Ok(Arc::new(LlmBackend::from_provider_name(name, model)?));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return Ok(Arc::new(LlmBackend::from_provider_name(&prov, &env_model)?));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return Ok(Arc::new(LlmBackend::from_provider_name("openai", model)?));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| McqGenError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(LlmBackend::new(llm_provider)))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl CompletionBackend for Echo {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
            Ok(format!("{}|{}|{}", request.system, request.prompt, request.temperature))
        }
    }

    #[tokio::test]
    async fn explicit_backend_wins() {
        let config = GenerationConfig::builder()
            .backend(Arc::new(Echo))
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        let backend = resolve_backend(&config).unwrap();
        let out = backend
            .complete(&CompletionRequest {
                system: "sys".into(),
                prompt: "hi".into(),
                temperature: 0.5,
                max_tokens: None,
            })
            .await
            .unwrap();
        assert_eq!(out, "sys|hi|0.5");
    }

    #[test]
    fn backend_error_display() {
        assert_eq!(BackendError::Request("HTTP 429".into()).to_string(), "HTTP 429");
    }
}
