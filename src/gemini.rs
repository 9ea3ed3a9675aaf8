//! Gemini API client
//!
//! Backs the remote intent parser. Uses a long-lived reqwest::Client for
//! connection pooling; retries and timeouts are applied by the caller.

use crate::error::AssistantError;
use crate::parser::LanguageModel;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/{}:generateContent", BASE_URL, model),
        })
    }

    fn build_request(prompt: &str) -> GeminiRequest {
        GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.1,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(AssistantError::Config(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let request = Self::build_request(prompt);

        debug!(prompt_len = prompt.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AssistantError::LlmError(format!("Gemini API request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);

            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
                    AssistantError::RateLimited(format!("{}: {}", status, error_text))
                }
                _ => AssistantError::LlmError(format!("Gemini API error {}: {}", status, error_text)),
            });
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AssistantError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        extract_text(gemini_response)
    }
}

fn extract_text(response: GeminiResponse) -> crate::Result<String> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AssistantError::LlmError("No candidates from Gemini API".to_string()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        debug!(finish_reason = reason, "Gemini candidate received");
    }

    let text: String = candidate
        .content
        .parts
        .into_iter()
        .map(|p| p.text)
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        return Err(AssistantError::LlmError(
            "Empty response from Gemini".to_string(),
        ));
    }

    Ok(text)
}

const SYSTEM_PROMPT: &str = r#"Bạn là trợ lý tài chính cá nhân. Nhiệm vụ duy nhất của bạn là phân tích tin nhắn tiếng Việt của người dùng và trả về MỘT đối tượng JSON hợp lệ theo đúng định dạng được yêu cầu. Không giải thích, không dùng markdown."#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GeminiClient::build_request("chi 50k ăn sáng");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "chi 50k ăn sáng");
        assert!(json.get("generationConfig").is_some());
        assert!(json.get("systemInstruction").is_some());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let raw = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "{\"intent\":"}, {"text": "\"UNKNOWN\"}"}]},
                "finishReason": "STOP"
            }]
        }"#;
        let response: GeminiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(response).unwrap(), r#"{"intent":"UNKNOWN"}"#);
    }

    #[test]
    fn test_extract_text_without_candidates() {
        let response: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(extract_text(response).is_err());
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = GeminiClient::new(String::new(), "gemini-2.0-flash").unwrap();
        let result = client.generate("xin chào").await;

        assert!(matches!(result, Err(AssistantError::Config(_))));
    }
}
