use std::time::Duration;

use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use tessera_core::{ai_configured, AiSettings};

use crate::SuggestError;

/// Anything that can turn a system prompt and a user message into free text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user_msg: &str) -> Result<String, SuggestError>;
}

fn map_backend(provider: &str) -> Result<LLMBackend, SuggestError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(SuggestError::UnknownProvider(other.to_string())),
    }
}

/// Remote model access through the `llm` crate's provider backends.
#[derive(Debug, Clone)]
pub struct LlmEngine {
    settings: AiSettings,
}

impl LlmEngine {
    pub fn new(settings: AiSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }

    async fn generate(&self, system: &str, user_msg: &str) -> Result<String, SuggestError> {
        let backend = map_backend(&self.settings.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.settings.model)
            .system(system);

        if !self.settings.api_key.is_empty() {
            builder = builder.api_key(&self.settings.api_key);
        }

        let llm = builder.build().map_err(|e| SuggestError::Build(e.to_string()))?;

        let messages = vec![ChatMessage::user().content(user_msg).build()];

        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| SuggestError::Chat(e.to_string()))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(SuggestError::EmptyResponse),
        }
    }
}

#[async_trait]
impl LlmClient for LlmEngine {
    async fn complete(&self, system: &str, user_msg: &str) -> Result<String, SuggestError> {
        if !ai_configured(&self.settings) {
            return Err(SuggestError::NotConfigured);
        }

        log::info!(
            provider = self.settings.provider.as_str(),
            model = self.settings.model.as_str();
            "sending diagram to model"
        );

        let limit = Duration::from_secs(self.settings.timeout_secs);
        match tokio::time::timeout(limit, self.generate(system, user_msg)).await {
            Ok(result) => result,
            Err(_) => Err(SuggestError::Timeout(self.settings.timeout_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_map_to_backends() {
        for provider in ["openai", "anthropic", "google", "ollama", "groq", "mistral", "deepseek"] {
            assert!(map_backend(provider).is_ok(), "{provider}");
        }
        assert!(matches!(
            map_backend("watson"),
            Err(SuggestError::UnknownProvider(p)) if p == "watson"
        ));
    }

    #[tokio::test]
    async fn unconfigured_engine_refuses_before_any_request() {
        let engine = LlmEngine::new(AiSettings::default());
        let err = engine.complete("system", "user").await.unwrap_err();
        assert!(matches!(err, SuggestError::NotConfigured));
    }
}
