//! Deterministic slot extractors
//!
//! Pure functions over raw message text. Used by the local matcher, the
//! follow-up handler, the fallback responder and to normalise model output.

pub mod amount;
pub mod date;

pub use amount::{extract_amount, find_amount, AmountMatch, MAX_AMOUNT};
pub use date::{extract_date, DateExtractor, MonthDay, START_OF_YEAR};
