//! Runtime configuration
//!
//! Read from the process environment (a `.env` file is loaded by the
//! binaries before calling [`AssistantConfig::from_env`]).

use crate::error::AssistantError;
use crate::parser::RetryPolicy;
use std::env;
use std::time::Duration;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_PORT: u16 = 8080;
const PLACEHOLDER_KEYS: &[&str] = &["", "mock_key", "your_gemini_api_key_here"];

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// `None` disables the remote parser; every unmatched message goes to the fallback
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub retry: RetryPolicy,
    pub database_url: Option<String>,
    pub port: u16,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
            database_url: None,
            port: DEFAULT_PORT,
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> crate::Result<Self> {
        let defaults = Self::default();

        let gemini_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !PLACEHOLDER_KEYS.contains(&k.as_str()));

        let gemini_model = env::var("GEMINI_MODEL").unwrap_or(defaults.gemini_model);

        let mut retry = defaults.retry;
        if let Some(secs) = parse_var::<u64>("LLM_TIMEOUT_SECS")? {
            retry.attempt_timeout = Duration::from_secs(secs);
        }
        if let Some(attempts) = parse_var::<u32>("LLM_MAX_ATTEMPTS")? {
            if attempts == 0 {
                return Err(AssistantError::Config(
                    "LLM_MAX_ATTEMPTS must be at least 1".to_string(),
                ));
            }
            retry.max_attempts = attempts;
        }

        let database_url = env::var("DATABASE_URL")
            .or_else(|_| env::var("POSTGRES_URL"))
            .ok()
            .filter(|url| !url.trim().is_empty());

        let port = match parse_var::<u16>("PORT")? {
            Some(port) => port,
            None => parse_var::<u16>("API_PORT")?.unwrap_or(defaults.port),
        };

        Ok(Self {
            gemini_api_key,
            gemini_model,
            retry,
            database_url,
            port,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> crate::Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AssistantError::Config(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(None),
    }
}
