//! OpenAI-compatible LLM provider.
//!
//! Works with OpenAI and any endpoint speaking the chat completions
//! format. Each capability builds its prompt in [`super::prompts`] and
//! funnels through a single `complete` call.

use serde::{Deserialize, Serialize};

use super::prompts;
use super::{ActivitySnapshot, LlmProvider, PersonaVoice, RoomContext, ThreadMessage};
use crate::error::LlmError;

/// Per-call timeout; the provider adapter owns retries, not the core.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// An LLM provider using the OpenAI chat completions API format.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    async fn complete(
        &self,
        system: &str,
        user_message: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        tracing::debug!(model = %self.model, max_tokens, "LLM request");

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            max_tokens,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(LlmError::RateLimited {
                    retry_after_secs: retry_after,
                });
            }

            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status,
                message: body,
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("failed to parse response: {e}")))?;

        let text = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        tracing::debug!(chars = text.len(), "LLM response");
        Ok(text.trim().to_string())
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_post_draft(
        &self,
        persona: &PersonaVoice,
        room: &RoomContext,
        variant: u8,
    ) -> Result<String, LlmError> {
        let system = prompts::persona_system(persona);
        let user = prompts::draft_request(room, variant, 500);
        self.complete(&system, &user, 400).await
    }

    async fn generate_reply(
        &self,
        persona: &PersonaVoice,
        post_content: &str,
        thread: &[ThreadMessage],
    ) -> Result<String, LlmError> {
        let system = prompts::persona_system(persona);
        let user = prompts::reply_request(post_content, thread, 280);
        self.complete(&system, &user, 300).await
    }

    async fn summarize_thread(
        &self,
        post_content: &str,
        replies: &[String],
    ) -> Result<String, LlmError> {
        let system = prompts::summarizer_system();
        let user = prompts::thread_summary_request(post_content, replies);
        self.complete(&system, &user, 300).await
    }

    async fn summarize_persona_activity(
        &self,
        persona: &PersonaVoice,
        activity: &ActivitySnapshot,
    ) -> Result<String, LlmError> {
        let system = prompts::summarizer_system();
        let user = prompts::activity_summary_request(persona, activity);
        self.complete(&system, &user, 300).await
    }
}

// --- Internal Serde types ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn voice() -> PersonaVoice {
        PersonaVoice {
            name: "Ayşe".to_string(),
            bio: "critic".to_string(),
            tone: "dry".to_string(),
            writing_samples: vec!["a".into(), "b".into(), "c".into()],
            do_not_say: vec![],
            catchphrases: vec![],
            preferred_language: "en".to_string(),
            formality: 2,
        }
    }

    #[tokio::test]
    async fn draft_parses_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  A sharp take.  "}}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(server.uri(), "key".into(), "test-model".into());
        let room = RoomContext {
            name: "tech".to_string(),
            description: "tech talk".to_string(),
        };
        let draft = provider.generate_post_draft(&voice(), &room, 1).await.unwrap();
        assert_eq!(draft, "A sharp take.");
    }

    #[tokio::test]
    async fn rate_limit_maps_to_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(server.uri(), "key".into(), "test-model".into());
        let err = provider
            .summarize_thread("post", &[])
            .await
            .expect_err("should rate limit");
        assert!(matches!(err, LlmError::RateLimited { retry_after_secs: 7 }));
    }

    #[tokio::test]
    async fn api_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(server.uri(), "key".into(), "test-model".into());
        let err = provider
            .summarize_thread("post", &[])
            .await
            .expect_err("should fail");
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
