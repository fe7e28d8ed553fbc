//! Shared machinery for hosted LLM backends
//!
//! Both remote providers get the same fixed Korean instruction prompt, the
//! same strict "0"/"1" parse policy, and the same conservative-default
//! mapping: a failed or unparseable call becomes a clean verdict at the
//! backend boundary, logged for audit, never an error surfaced to the
//! evaluation harness.

use async_trait::async_trait;
use haetae_core::{Label, Verdict};
use std::time::Duration;

/// Instruction prompt embedding the classification criteria. The literal
/// criteria follow the benchmark protocol for Korean hate-speech detection.
const PROMPT_TEMPLATE: &str = "\
당신은 문장에서 혐오 표현을 탐지해서, 혐오 표현이 있다면 '1', 없다면 '0'을 출력하는 모델입니다.
혐오 표현 :
1. 직접적인 욕설, 멸칭, Slur (우회표현 포함)
2. 인종/민족/국적/종교/성별/장애/연령/출신지/외모/경제상태 등 특성을 근거로 한 비하 유포
3. 특정 개인/집단에 대한 폭력/해악/배제 등 제거 박탈 요구 및 위협
4. 특정 직업군/지역/커뮤니티 전체에 대한 일반화된 조롱 및 폄하

다음은 혐오가 아닙니다.
1. 성별/연령 등의 단순한 언급만 있을 때
2. 일반적 불만/감탄/중립적 사실 서술, 비판적 인용
문장: \"{text}\"";

/// System role line for providers that accept a system message
pub(crate) const SYSTEM_PROMPT: &str = "당신은 혐오 표현 감지 AI입니다.";

/// Output-token budget: just enough for a one-character verdict
pub(crate) const MAX_VERDICT_TOKENS: u32 = 2;

/// Build the user prompt for one input text
pub(crate) fn build_prompt(text: &str) -> String {
    PROMPT_TEMPLATE.replace("{text}", text)
}

/// Why a remote call failed to produce a verdict
#[derive(Debug, thiserror::Error)]
pub enum BackendFailure {
    /// The request never completed
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-success status
    #[error("service returned status {0}")]
    Status(u16),

    /// The response body was not a literal "0" or "1"
    #[error("unparseable verdict: {0:?}")]
    Unparseable(String),
}

impl BackendFailure {
    /// Transient failures are worth one more attempt; everything else maps
    /// straight to the conservative default.
    fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status(429) | Self::Status(500..=599)
        )
    }
}

/// Strict parse of a model response: only the literal characters are valid.
pub(crate) fn parse_verdict(content: &str) -> Result<Label, BackendFailure> {
    match content.trim() {
        "0" => Ok(Label::Clean),
        "1" => Ok(Label::Hate),
        other => Err(BackendFailure::Unparseable(other.to_string())),
    }
}

/// Retry and pacing policy for one hosted backend
#[derive(Debug, Clone)]
pub(crate) struct CallPolicy {
    /// Additional attempts after the first, for transient failures only
    pub max_retries: usize,
    /// Fixed delay before a retry
    pub retry_delay: Duration,
    /// Fixed delay between batch items, for rate-limit avoidance
    pub request_gap: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            request_gap: Duration::from_millis(500),
        }
    }
}

/// The raw request path of a hosted backend
#[async_trait]
pub(crate) trait VerdictRequest: Send + Sync {
    async fn request_verdict(&self, text: &str) -> Result<Label, BackendFailure>;
}

/// Drive a request with bounded retry and map any final failure to the
/// conservative default verdict. A single bad call must never abort a
/// multi-thousand-example evaluation run.
pub(crate) async fn classify_conservative(
    requester: &dyn VerdictRequest,
    backend: &str,
    text: &str,
    policy: &CallPolicy,
) -> Verdict {
    let mut attempt = 0usize;
    loop {
        match requester.request_verdict(text).await {
            Ok(label) => return Verdict::bare(label),
            Err(failure) if failure.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::debug!(backend, attempt, %failure, "transient failure, retrying");
                tokio::time::sleep(policy.retry_delay).await;
            }
            Err(failure) => {
                tracing::warn!(
                    backend,
                    %failure,
                    "remote call failed, returning conservative default"
                );
                return Verdict::conservative_default();
            }
        }
    }
}
