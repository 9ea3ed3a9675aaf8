//! Sanitising and decoding model replies
//!
//! Model output is untrusted text: it may be fenced in markdown, wrapped in
//! prose, or contain Mongo-shell literals. Everything is normalised here.

use crate::error::AssistantError;
use crate::extract::{extract_amount, extract_date, MAX_AMOUNT};
use crate::models::{
    Amount, CategoryDraft, GoalDraft, Intent, StatsQuery, TransactionDraft, TransactionQuery,
    TransactionType,
};
use crate::Result;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

const MAX_QUERY_LIMIT: usize = 20;

lazy_static! {
    static ref SHELL_LITERAL: Regex =
        Regex::new(r#"(?:ISODate|ObjectId)\(\s*["']([^"']*)["']\s*\)"#).unwrap();
}

/// Strip fences and prose, rewrite shell literals; returns the JSON text
pub fn sanitize_response(raw: &str) -> Result<String> {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let unfenced = trimmed.replace("```json", "").replace("```", "");

    let start = unfenced.find('{');
    let end = unfenced.rfind('}');

    let body = match (start, end) {
        (Some(s), Some(e)) if s < e => &unfenced[s..=e],
        _ => {
            return Err(AssistantError::MalformedResponse(format!(
                "no JSON object in model reply: {}",
                truncate(raw, 200)
            )))
        }
    };

    Ok(SHELL_LITERAL.replace_all(body, "\"$1\"").into_owned())
}

/// Decode a model reply into an [`Intent`]; `today` anchors relative dates
pub fn parse_intent(raw: &str, today: NaiveDate) -> Result<Intent> {
    let json = sanitize_response(raw)?;
    let value: Value = serde_json::from_str(&json)?;

    let intent = value
        .get("intent")
        .and_then(Value::as_str)
        .ok_or(AssistantError::MissingIntent)?
        .trim()
        .to_uppercase();

    let data = match value.get("data") {
        Some(d) if d.is_object() => d,
        _ => &value,
    };

    let parsed = match intent.as_str() {
        "ADD_TRANSACTION" => Intent::AddTransaction(transaction_draft(data, today)),
        "ADD_CATEGORY" => Intent::AddCategory(CategoryDraft {
            name: text(data, &["name", "categoryName"]),
            kind: transaction_type(data),
            icon: text(data, &["icon"]),
        }),
        "ADD_GOAL" => Intent::AddGoal(GoalDraft {
            name: text(data, &["name", "goalName"]).unwrap_or_default(),
            target_amount: amount(data, &["targetAmount", "target_amount", "amount"]),
            deadline: date(data, &["deadline", "date"], today),
        }),
        "QUICK_STATS" => Intent::QuickStats(StatsQuery {
            month: data
                .get("month")
                .and_then(Value::as_u64)
                .and_then(|m| u32::try_from(m).ok())
                .filter(|m| (1..=12).contains(m)),
            year: data
                .get("year")
                .and_then(Value::as_i64)
                .and_then(|y| i32::try_from(y).ok()),
        }),
        "QUERY_TRANSACTIONS" => Intent::QueryTransactions(TransactionQuery {
            kind: transaction_type(data),
            limit: data
                .get("limit")
                .and_then(Value::as_u64)
                .map(|l| usize::try_from(l).unwrap_or(MAX_QUERY_LIMIT).clamp(1, MAX_QUERY_LIMIT))
                .unwrap_or_else(|| TransactionQuery::default().limit),
        }),
        _ => Intent::Unknown {
            reply: text(&value, &["response"]).or_else(|| text(data, &["response"])),
        },
    };

    Ok(parsed)
}

fn transaction_draft(data: &Value, today: NaiveDate) -> TransactionDraft {
    let kind = transaction_type(data).unwrap_or(TransactionType::Expense);
    let name = text(data, &["name", "description"]).unwrap_or_else(|| match kind {
        TransactionType::Expense => "Chi tiêu".to_string(),
        TransactionType::Income => "Thu nhập".to_string(),
    });

    TransactionDraft {
        name,
        amount: amount(data, &["amount"]),
        kind,
        account_guess: text(data, &["account", "accountGuess", "accountName"]),
        category_guess: text(data, &["category", "categoryGuess", "categoryName"]),
        date: date(data, &["date"], today),
    }
}

fn first<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| data.get(*k))
        .find(|v| !v.is_null())
}

fn text(data: &Value, keys: &[&str]) -> Option<String> {
    first(data, keys)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(str::to_string)
}

fn transaction_type(data: &Value) -> Option<TransactionType> {
    first(data, &["type", "kind"])
        .and_then(Value::as_str)
        .and_then(TransactionType::parse)
}

/// Numbers are taken as-is; strings go through the amount extractor
fn amount(data: &Value, keys: &[&str]) -> Option<Amount> {
    match first(data, keys)? {
        Value::Number(n) => {
            let rounded = n.as_f64()?.round();
            if rounded > 0.0 && rounded <= MAX_AMOUNT as f64 {
                Some(rounded as Amount)
            } else {
                None
            }
        }
        Value::String(s) => extract_amount(s),
        _ => None,
    }
}

/// ISO prefixes are taken as-is; anything else goes through the date extractor
fn date(data: &Value, keys: &[&str], today: NaiveDate) -> Option<NaiveDate> {
    let raw = first(data, keys)?.as_str()?.trim();

    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .or_else(|| extract_date(raw, today))
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntentKind;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_sanitize_strips_fences_and_prose() {
        let raw = "Đây là kết quả:\n```json\n{\"intent\": \"UNKNOWN\"}\n```\nCảm ơn!";
        assert_eq!(sanitize_response(raw).unwrap(), "{\"intent\": \"UNKNOWN\"}");

        let bare_fence = "```\n{\"intent\": \"UNKNOWN\"}\n```";
        assert_eq!(sanitize_response(bare_fence).unwrap(), "{\"intent\": \"UNKNOWN\"}");
    }

    #[test]
    fn test_sanitize_rewrites_shell_literals() {
        let raw = r#"{"intent": "ADD_GOAL", "data": {"deadline": ISODate("2026-12-31T00:00:00Z"), "id": ObjectId('abc123')}}"#;
        let cleaned = sanitize_response(raw).unwrap();

        assert!(cleaned.contains(r#""deadline": "2026-12-31T00:00:00Z""#));
        assert!(cleaned.contains(r#""id": "abc123""#));
        assert!(serde_json::from_str::<Value>(&cleaned).is_ok());
    }

    #[test]
    fn test_sanitize_without_json() {
        let err = sanitize_response("Xin lỗi, tôi không hiểu").unwrap_err();
        assert!(matches!(err, AssistantError::MalformedResponse(_)));
    }

    #[test]
    fn test_missing_intent() {
        let err = parse_intent(r#"{"data": {}}"#, today()).unwrap_err();
        assert!(matches!(err, AssistantError::MissingIntent));
    }

    #[test]
    fn test_invalid_json_propagates() {
        let err = parse_intent(r#"{"intent": "ADD_GOAL", "data": {,}}"#, today()).unwrap_err();
        assert!(err.is_malformed_output());
    }

    #[test]
    fn test_goal_with_iso_date_literal() {
        let raw = r#"{"intent": "ADD_GOAL", "data": {"name": "Mua nhà", "targetAmount": 2000000000, "deadline": ISODate("2026-12-31T00:00:00.000Z")}}"#;
        let intent = parse_intent(raw, today()).unwrap();

        assert_eq!(
            intent,
            Intent::AddGoal(GoalDraft {
                name: "Mua nhà".to_string(),
                target_amount: Some(2_000_000_000),
                deadline: NaiveDate::from_ymd_opt(2026, 12, 31),
            })
        );
    }

    #[test]
    fn test_lenient_amount_and_date_strings() {
        let raw = r#"{"intent": "ADD_TRANSACTION", "data": {"name": "Ăn trưa", "amount": "45k", "type": "chitieu", "date": "hôm qua"}}"#;
        let Intent::AddTransaction(draft) = parse_intent(raw, today()).unwrap() else {
            panic!("expected transaction");
        };

        assert_eq!(draft.amount, Some(45_000));
        assert_eq!(draft.kind, TransactionType::Expense);
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2026, 10, 18));
    }

    #[test]
    fn test_null_fields_stay_missing() {
        let raw = r#"{"intent": "ADD_GOAL", "data": {"name": "Mua laptop", "targetAmount": null, "deadline": null}}"#;
        let Intent::AddGoal(goal) = parse_intent(raw, today()).unwrap() else {
            panic!("expected goal");
        };

        assert_eq!(goal.target_amount, None);
        assert_eq!(goal.deadline, None);
    }

    #[test]
    fn test_flat_payload_and_unknown_reply() {
        let flat = r#"{"intent": "add_category", "name": "Thú cưng", "type": "CHITIEU"}"#;
        let Intent::AddCategory(category) = parse_intent(flat, today()).unwrap() else {
            panic!("expected category");
        };
        assert_eq!(category.name.as_deref(), Some("Thú cưng"));

        let unknown = r#"{"intent": "UNKNOWN", "response": "Mình chưa hiểu ý bạn."}"#;
        assert_eq!(
            parse_intent(unknown, today()).unwrap(),
            Intent::Unknown {
                reply: Some("Mình chưa hiểu ý bạn.".to_string())
            }
        );
    }

    #[test]
    fn test_stats_and_query_payloads() {
        let stats = parse_intent(r#"{"intent": "QUICK_STATS", "data": {"month": 6}}"#, today()).unwrap();
        assert_eq!(
            stats,
            Intent::QuickStats(StatsQuery {
                month: Some(6),
                year: None
            })
        );

        let overflowing = parse_intent(
            r#"{"intent": "QUICK_STATS", "data": {"month": 4294967302, "year": 4294969322}}"#,
            today(),
        )
        .unwrap();
        assert_eq!(overflowing, Intent::QuickStats(StatsQuery::default()));

        let query = parse_intent(
            r#"{"intent": "QUERY_TRANSACTIONS", "data": {"type": "THUNHAP", "limit": 500}}"#,
            today(),
        )
        .unwrap();
        assert_eq!(query.kind(), IntentKind::QueryTransactions);
        assert_eq!(
            query,
            Intent::QueryTransactions(TransactionQuery {
                kind: Some(TransactionType::Income),
                limit: MAX_QUERY_LIMIT,
            })
        );
    }
}
