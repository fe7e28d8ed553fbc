//! Naver CLOVA Studio backend (Korean-domain hosted LLM)

use crate::backend::Backend;
use crate::hosted::{
    build_prompt, classify_conservative, parse_verdict, BackendFailure, CallPolicy,
    VerdictRequest, MAX_VERDICT_TOKENS,
};
use async_trait::async_trait;
use haetae_core::{Error, Label, Result, Verdict};
use serde::{Deserialize, Serialize};

/// Environment variable holding the API credential
pub const API_KEY_VAR: &str = "CLOVA_API_KEY";
/// Default CLOVA Studio chat model
pub const DEFAULT_MODEL: &str = "HCX-DASH-002";

const API_URL: &str = "https://clovastudio.stream.ntruss.com/v3/chat-completions";

/// Hosted backend against the CLOVA Studio chat-completions API
pub struct ClovaBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    policy: CallPolicy,
    name: String,
}

impl ClovaBackend {
    /// Build from the `CLOVA_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .map_err(|_| Error::config(format!("{API_KEY_VAR} is not set")))?;
        Ok(Self::new(api_key, DEFAULT_MODEL))
    }

    /// Build with an explicit credential and model
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        let name = format!("clova:{model}");
        Self {
            client: reqwest::Client::new(),
            api_url: format!("{API_URL}/{model}"),
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
struct ClovaRequest<'a> {
    model: &'a str,
    messages: Vec<ClovaMessage<'a>>,
    temperature: f32,
    #[serde(rename = "maxTokens")]
    max_tokens: u32,
}

#[derive(Serialize)]
struct ClovaMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ClovaResponse {
    result: Option<ClovaResult>,
}

#[derive(Deserialize)]
struct ClovaResult {
    message: Option<ClovaResponseMessage>,
}

#[derive(Deserialize)]
struct ClovaResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl VerdictRequest for ClovaBackend {
    async fn request_verdict(&self, text: &str) -> std::result::Result<Label, BackendFailure> {
        let request = ClovaRequest {
            model: &self.model,
            messages: vec![ClovaMessage {
                role: "user",
                content: build_prompt(text),
            }],
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

        let body: ClovaResponse = response
            .json()
            .await
            .map_err(|e| BackendFailure::Transport(e.to_string()))?;
        let content = body
            .result
            .and_then(|r| r.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        parse_verdict(&content)
    }
}

#[async_trait]
impl Backend for ClovaBackend {
    async fn classify(&self, text: &str) -> Result<Verdict> {
        Ok(classify_conservative(self, &self.name, text, &self.policy).await)
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Verdict>> {
        let mut verdicts = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            if index > 0 {
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
            "status": { "code": "20000" },
            "result": { "message": { "role": "assistant", "content": "0" } }
        }"#;
        let response: ClovaResponse = serde_json::from_str(json).unwrap();
        let content = response
            .result
            .and_then(|r| r.message)
            .and_then(|m| m.content)
            .unwrap();
        assert_eq!(parse_verdict(&content).unwrap(), Label::Clean);
    }

    #[test]
    fn test_missing_result_is_unparseable() {
        let json = r#"{ "status": { "code": "40000" } }"#;
        let response: ClovaResponse = serde_json::from_str(json).unwrap();
        let content = response
            .result
            .and_then(|r| r.message)
            .and_then(|m| m.content)
            .unwrap_or_default();
        assert!(matches!(
            parse_verdict(&content),
            Err(BackendFailure::Unparseable(_))
        ));
    }

    #[test]
    fn test_endpoint_includes_model() {
        let backend = ClovaBackend::new("key", DEFAULT_MODEL);
        assert!(backend.api_url.ends_with("/HCX-DASH-002"));
        assert_eq!(backend.name(), "clova:HCX-DASH-002");
    }
}
