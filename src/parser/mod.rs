//! Remote intent parser
//!
//! Builds a context-rich prompt, calls the language model with a per-attempt
//! timeout and retry/backoff, and turns the untrusted reply into an [`Intent`].

use crate::error::AssistantError;
use crate::models::{Intent, UserContext};
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub mod prompt;
pub mod response;

pub use prompt::build_prompt;
pub use response::{parse_intent, sanitize_response};

/// Text-in, text-out generative model (remote, unreliable)
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Timeout and backoff schedule around the model call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    /// Base of the exponential backoff used for overload/rate-limit errors
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Delay after any other failure
    pub flat_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(30),
            base_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(5000),
            flat_backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the `attempt`-th (1-based) failure
    pub fn backoff_for(&self, attempt: u32, error: &AssistantError) -> Duration {
        if error.is_overload() {
            let factor = 2u32.saturating_pow(attempt);
            self.base_backoff
                .checked_mul(factor)
                .unwrap_or(self.max_backoff)
                .min(self.max_backoff)
        } else {
            self.flat_backoff
        }
    }
}

/// Call the model, retrying per `policy`. Returns the last error once
/// attempts are exhausted.
pub async fn generate_with_retry(
    model: &dyn LanguageModel,
    prompt: &str,
    policy: &RetryPolicy,
) -> Result<String> {
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match tokio::time::timeout(policy.attempt_timeout, model.generate(prompt)).await
        {
            Ok(Ok(text)) => {
                debug!(attempt, "Model call succeeded");
                return Ok(text);
            }
            Ok(Err(AssistantError::Config(msg))) => {
                return Err(AssistantError::Config(msg));
            }
            Ok(Err(e)) => e,
            Err(_) => AssistantError::Timeout(policy.attempt_timeout.as_secs()),
        };

        if attempt >= policy.max_attempts {
            warn!(attempt, "Model call failed, retries exhausted: {}", error);
            return Err(error);
        }

        let delay = policy.backoff_for(attempt, &error);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            overload = error.is_overload(),
            "Model call failed, retrying: {}",
            error
        );
        tokio::time::sleep(delay).await;
    }
}

/// Prompt → model → sanitised JSON → [`Intent`]
pub struct RemoteIntentParser {
    model: Arc<dyn LanguageModel>,
    policy: RetryPolicy,
}

impl RemoteIntentParser {
    pub fn new(model: Arc<dyn LanguageModel>, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    pub async fn parse(&self, message: &str, context: &UserContext) -> Result<Intent> {
        let prompt = build_prompt(message, context);
        let raw = generate_with_retry(self.model.as_ref(), &prompt, &self.policy).await?;

        let intent = parse_intent(&raw, context.current_date)?;
        info!(intent = ?intent.kind(), "Remote parser classified message");

        Ok(intent)
    }
}

/// One canned reaction of [`ScriptedLanguageModel`]
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    RateLimited,
    Failure(String),
    /// Never answers; trips the per-attempt timeout
    Hang,
}

/// Language model that replays a script, for development and tests.
/// Keeps the assistant exercisable without network access.
pub struct ScriptedLanguageModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLanguageModel {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(vec![ScriptedReply::Text(text.into())])
    }

    /// Prompts received so far, in call order
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    pub async fn calls(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().await.push(prompt.to_string());

        let reply = self.replies.lock().await.pop_front();
        match reply {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::RateLimited) => Err(AssistantError::RateLimited(
                "429 RESOURCE_EXHAUSTED: quota exceeded".to_string(),
            )),
            Some(ScriptedReply::Failure(msg)) => Err(AssistantError::LlmError(msg)),
            Some(ScriptedReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(AssistantError::LlmError("hung call returned".to_string()))
            }
            None => Err(AssistantError::LlmError("script exhausted".to_string())),
        }
    }
}
