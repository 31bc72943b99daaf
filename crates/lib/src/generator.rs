//! Answer generator: one question (+ context, + optional screen capture) in, one answer string out.
//!
//! The completion backend is built once at startup and injected. When it could not be built
//! (no API key, client construction failure) the generator stays usable and every call fails
//! with a typed error instead of touching the network.

use crate::config::GeneratorConfig;
use crate::llm::{CompletionBackend, GroqClient, LlmError};
use crate::prompt::{build_messages, GenerationRequest, ModelSet};
use std::sync::Arc;
use std::time::Duration;

/// Why no answer was produced. `Display` is the text sent to the client in place of an answer.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("Error: GROQ_API_KEY not set.")]
    MissingCredential,
    #[error("Error generating answer: {0}")]
    Unavailable(String),
    #[error("Error generating answer: {0}")]
    Upstream(#[from] LlmError),
}

enum Backend {
    Ready(Arc<dyn CompletionBackend>),
    MissingCredential,
    Unavailable(String),
}

pub struct AnswerGenerator {
    backend: Backend,
    models: ModelSet,
}

impl AnswerGenerator {
    /// Wrap the outcome of backend construction. `Err(LlmError::MissingApiKey)` leaves the generator unconfigured.
    pub fn new(backend: Result<Arc<dyn CompletionBackend>, LlmError>, models: ModelSet) -> Self {
        let backend = match backend {
            Ok(b) => Backend::Ready(b),
            Err(LlmError::MissingApiKey) => {
                log::warn!("{} not set; answers will report the missing key", crate::config::API_KEY_ENV);
                Backend::MissingCredential
            }
            Err(e) => {
                log::error!("completion client unavailable: {}", e);
                Backend::Unavailable(e.to_string())
            }
        };
        Self { backend, models }
    }

    /// Build the Groq backend from config and an already-resolved API key.
    pub fn from_config(config: &GeneratorConfig, api_key: Option<String>) -> Self {
        let backend = api_key
            .ok_or(LlmError::MissingApiKey)
            .and_then(|key| {
                GroqClient::new(
                    Some(config.base_url.clone()),
                    key,
                    config.request_timeout_secs.map(Duration::from_secs),
                )
            })
            .map(|c| Arc::new(c) as Arc<dyn CompletionBackend>);
        Self::new(backend, ModelSet::from_config(config))
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.backend, Backend::Ready(_))
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    /// Stream a completion for `req` and return the concatenation of every non-empty fragment.
    pub async fn generate(&self, req: &GenerationRequest<'_>) -> Result<String, GenerateError> {
        let backend = match &self.backend {
            Backend::Ready(b) => b,
            Backend::MissingCredential => return Err(GenerateError::MissingCredential),
            Backend::Unavailable(msg) => return Err(GenerateError::Unavailable(msg.clone())),
        };
        let model = self.models.select(req.model_kind());
        let messages = build_messages(req);
        log::debug!(
            "generator: model {} (image: {})",
            model,
            if req.image().is_some() { "yes" } else { "no" }
        );

        let mut answer = String::new();
        let mut on_chunk = |s: &str| {
            if !s.is_empty() {
                answer.push_str(s);
            }
        };
        backend.chat_stream(model, messages, &mut on_chunk).await?;
        Ok(answer)
    }
}
