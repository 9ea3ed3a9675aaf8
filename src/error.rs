//! Error types for the finance chat assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Dialogue Pipeline Errors
    // =============================

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("State error: {0}")]
    StateError(String),

    // =============================
    // Remote Model Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM rate limited: {0}")]
    RateLimited(String),

    #[error("LLM call timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Model response has no intent field")]
    MissingIntent,

    // =============================
    // Infrastructure
    // =============================

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

const OVERLOAD_MARKERS: &[&str] = &[
    "429",
    "503",
    "quota",
    "rate limit",
    "overload",
    "resource_exhausted",
    "too many requests",
    "unavailable",
];

impl AssistantError {
    /// Whether the failure looks like the remote model pushing back
    /// (rate limit, quota exhaustion, overload)
    pub fn is_overload(&self) -> bool {
        match self {
            AssistantError::RateLimited(_) => true,
            AssistantError::LlmError(msg) => {
                let lowered = msg.to_lowercase();
                OVERLOAD_MARKERS.iter().any(|m| lowered.contains(m))
            }
            AssistantError::HttpError(e) => e
                .status()
                .map(|s| s.as_u16() == 429 || s.as_u16() == 503)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Whether the remote model answered but its output could not be used
    pub fn is_malformed_output(&self) -> bool {
        matches!(
            self,
            AssistantError::MalformedResponse(_)
                | AssistantError::MissingIntent
                | AssistantError::SerializationError(_)
        )
    }
}
