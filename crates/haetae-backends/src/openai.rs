//! OpenAI chat-completions backend (general-purpose hosted LLM)

use crate::backend::Backend;
use crate::hosted::{
    build_prompt, classify_conservative, parse_verdict, BackendFailure, CallPolicy,
    VerdictRequest, MAX_VERDICT_TOKENS, SYSTEM_PROMPT,
};
use async_trait::async_trait;
use haetae_core::{Error, Label, Result, Verdict};
use serde::{Deserialize, Serialize};

/// Environment variable holding the API credential
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Default model used for verdicts
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Hosted backend against the OpenAI chat-completions API
#[derive(Debug)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    policy: CallPolicy,
    name: String,
}

impl OpenAiBackend {
    /// Build from the `OPENAI_API_KEY` environment variable.
    ///
    /// A missing credential is fatal for this backend only; the rest of the
    /// system keeps working without it.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .map_err(|_| Error::config(format!("{API_KEY_VAR} is not set")))?;
        Ok(Self::new(api_key, DEFAULT_MODEL))
    }

    /// Build with an explicit credential and model
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let name = format!("openai:{model}");
        Self {
            client: reqwest::Client::new(),
            api_url: API_URL.to_string(),
            api_key: api_key.into(),
            model,
            policy: CallPolicy::default(),
            name,
        }
    }

    /// Point the backend at a different endpoint (tests, proxies)
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl VerdictRequest for OpenAiBackend {
    async fn request_verdict(&self, text: &str) -> std::result::Result<Label, BackendFailure> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(text),
                },
            ],
            // Deterministic decoding, one-character output budget
            temperature: 0.0,
            max_tokens: MAX_VERDICT_TOKENS,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendFailure::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendFailure::Transport(e.to_string()))?;
        let content = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or_default();

        parse_verdict(content)
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn classify(&self, text: &str) -> Result<Verdict> {
        Ok(classify_conservative(self, &self.name, text, &self.policy).await)
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Verdict>> {
        let mut verdicts = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            if index > 0 {
                // Cooperative throttle between requests
                tokio::time::sleep(self.policy.request_gap).await;
            }
            verdicts.push(self.classify(text).await?);
        }
        Ok(verdicts)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "id": "chatcmpl-123",
            "choices": [
                { "index": 0, "message": { "role": "assistant", "content": "1" } }
            ]
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        let content = response.choices[0].message.content.as_deref().unwrap();
        assert_eq!(parse_verdict(content).unwrap(), Label::Hate);
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: DEFAULT_MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt("문장"),
            }],
            temperature: 0.0,
            max_tokens: MAX_VERDICT_TOKENS,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4.1-mini");
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["max_tokens"], 2);
    }

    #[test]
    fn test_missing_credential_is_config_error() {
        // Serialize access to the environment variable within this test
        std::env::remove_var(API_KEY_VAR);
        let err = OpenAiBackend::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
