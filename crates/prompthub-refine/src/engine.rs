use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use prompthub_core::AiSettings;

use crate::RefineError;

const TEMPERATURE: f32 = 0.7;

fn map_backend(provider: &str) -> Result<LLMBackend, RefineError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(RefineError::UnknownProvider(other.to_string())),
    }
}

/// One chat round trip. Returns the raw model text.
pub async fn generate(
    settings: &AiSettings,
    system: &str,
    user_msg: &str,
) -> Result<String, RefineError> {
    let backend = map_backend(&settings.provider)?;

    let mut builder = LLMBuilder::new()
        .backend(backend)
        .model(&settings.model)
        .system(system)
        .temperature(TEMPERATURE);

    if !settings.api_key.is_empty() {
        builder = builder.api_key(&settings.api_key);
    }

    let llm = builder
        .build()
        .map_err(|e| RefineError::Backend(format!("build LLM: {e}")))?;

    let messages = vec![ChatMessage::user().content(user_msg).build()];

    let response = llm
        .chat(&messages)
        .await
        .map_err(|e| RefineError::Backend(format!("chat: {e}")))?;

    response.text().ok_or(RefineError::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_providers_map() {
        for p in ["openai", "anthropic", "google", "ollama", "groq", "mistral", "deepseek"] {
            assert!(map_backend(p).is_ok(), "{p}");
        }
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert!(matches!(
            map_backend("acme"),
            Err(RefineError::UnknownProvider(p)) if p == "acme"
        ));
    }
}
