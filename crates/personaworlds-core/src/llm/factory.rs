//! Provider selection from configuration.

use std::sync::Arc;

use super::mock::MockProvider;
use super::openai_compat::OpenAiCompatProvider;
use super::LlmProvider;
use crate::config::{LlmConfig, LlmProviderKind};

/// Build the configured LLM provider.
pub fn create_provider(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    match config.provider {
        LlmProviderKind::Mock => {
            tracing::info!("Using mock LLM provider");
            Arc::new(MockProvider::new())
        }
        LlmProviderKind::OpenAi => {
            tracing::info!(
                base_url = %config.openai_base_url,
                model = %config.openai_model,
                "Using OpenAI-compatible LLM provider"
            );
            Arc::new(OpenAiCompatProvider::new(
                config.openai_base_url.clone(),
                config.openai_api_key.clone(),
                config.openai_model.clone(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_selected_by_default() {
        let config = LlmConfig {
            provider: LlmProviderKind::Mock,
            openai_base_url: String::new(),
            openai_api_key: String::new(),
            openai_model: String::new(),
        };
        assert_eq!(create_provider(&config).name(), "mock");
    }

    #[test]
    fn openai_selected_when_configured() {
        let config = LlmConfig {
            provider: LlmProviderKind::OpenAi,
            openai_base_url: "http://localhost:11434/v1".to_string(),
            openai_api_key: "key".to_string(),
            openai_model: "m".to_string(),
        };
        assert_eq!(create_provider(&config).name(), "openai");
    }
}
