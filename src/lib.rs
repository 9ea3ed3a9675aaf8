//! Finance Chat Assistant
//!
//! Turns free-form Vietnamese chat messages into structured personal-finance
//! operations:
//! - Extracts amounts ("50k", "2 triệu") and dates ("cuối năm", "tháng 6")
//! - Matches cheap intents locally before calling the language model
//! - Fills missing fields through a per-user slot-filling dialogue
//! - Degrades to heuristics when the model is unavailable
//! - Only proposes changes; commits happen through an explicit confirm call
//!
//! DIALOGUE LOOP:
//! MESSAGE → PENDING SLOT? → LOCAL → REMOTE → FALLBACK → DISPATCH → CONFIRM

pub mod api;
pub mod assistant;
pub mod audit;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod finance;
pub mod gemini;
pub mod matcher;
pub mod models;
pub mod parser;
pub mod state;

pub use error::Result;

// Re-export common types
pub use assistant::Assistant;
pub use models::*;
