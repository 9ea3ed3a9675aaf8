//! Local pattern matcher
//!
//! Classifies cheap, unambiguous messages without calling the model:
//! statistics queries, listings and transaction shorthand such as
//! "chi 50k ăn sáng" or "thu 10tr lương".

use crate::extract::{extract_date, find_amount};
use crate::models::{
    Intent, ListTarget, StatsQuery, TransactionDraft, TransactionQuery, TransactionType,
};
use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

/// Upper bound for "xem N giao dịch"
pub const MAX_LISTED_TRANSACTIONS: usize = 20;

lazy_static! {
    static ref STATS: Regex = Regex::new(
        r"thống kê|tổng kết|báo cáo|tổng quan|tình hình tài chính|tổng thu|tổng chi|thu chi|(?:tiêu|chi|xài)\s+(?:hết\s+)?bao nhiêu"
    )
    .unwrap();
    static ref STATS_MONTH: Regex =
        Regex::new(r"tháng\s+(\d{1,2})(?:\s*(?:/|năm)\s*(\d{4}))?").unwrap();
    static ref STATS_YEAR: Regex = Regex::new(r"năm\s+(\d{4})").unwrap();

    static ref LIST_VERB: Regex = Regex::new(
        r"xem|liệt kê|danh sách|hiển thị|kiểm tra|có\s+những"
    )
    .unwrap();
    static ref RECENT_TRANSACTIONS: Regex =
        Regex::new(r"(?:giao dịch|khoản chi|khoản thu)\s+gần\s+(?:đây|nhất)").unwrap();
    static ref LIST_COUNT: Regex = Regex::new(r"(\d{1,2})\s+giao dịch").unwrap();

    static ref SHORTHAND: Regex = Regex::new(
        r"^(chi tiêu|chi|tiêu|trả|mua|đóng|thu nhập|thu|nhận|lương|bán)\s+(.+)$"
    )
    .unwrap();

    static ref DATE_WORDS: Regex = Regex::new(
        r"hôm nay|hôm qua|ngày mai|\b\d{1,2}/\d{1,2}(?:/\d{4})?\b"
    )
    .unwrap();
    static ref ACCOUNT_HINT: Regex =
        Regex::new(r"\s(?:bằng|qua|từ)\s+(.+)$").unwrap();
    static ref LEADING_FILLER: Regex = Regex::new(r"^(?:cho|vào|để)\s+").unwrap();
}

const INCOME_VERBS: &[&str] = &["thu nhập", "thu", "nhận", "lương", "bán"];

pub struct LocalMatcher;

impl LocalMatcher {
    /// First matching family wins: statistics, listings, then shorthand.
    /// `None` defers to the remote parser.
    pub fn classify(message: &str, today: NaiveDate) -> Option<Intent> {
        let text = normalize(message);

        if let Some(query) = match_stats(&text, today) {
            return Some(Intent::QuickStats(query));
        }

        if let Some(intent) = match_listing(&text) {
            return Some(intent);
        }

        match_shorthand(&text, today).map(Intent::AddTransaction)
    }
}

/// Lowercase and collapse whitespace
pub fn normalize(message: &str) -> String {
    message
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn match_stats(text: &str, today: NaiveDate) -> Option<StatsQuery> {
    if !STATS.is_match(text) {
        return None;
    }

    if text.contains("tháng trước") {
        let (year, month) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        return Some(StatsQuery {
            month: Some(month),
            year: Some(year),
        });
    }

    if let Some(caps) = STATS_MONTH.captures(text) {
        let month = caps[1].parse().ok().filter(|m| (1..=12).contains(m));
        let year = caps
            .get(2)
            .and_then(|y| y.as_str().parse().ok())
            .or_else(|| explicit_year(text));
        return Some(StatsQuery { month, year });
    }

    Some(StatsQuery {
        month: None,
        year: explicit_year(text),
    })
}

fn explicit_year(text: &str) -> Option<i32> {
    STATS_YEAR
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Listing requests. Transactions become a `QueryTransactions` so the
/// type filter and count carry through.
pub fn match_listing(text: &str) -> Option<Intent> {
    if RECENT_TRANSACTIONS.is_match(text) {
        return Some(Intent::QueryTransactions(transaction_query(text)));
    }

    if !LIST_VERB.is_match(text) {
        return None;
    }

    if text.contains("giao dịch") || text.contains("khoản chi") || text.contains("khoản thu") {
        return Some(Intent::QueryTransactions(transaction_query(text)));
    }
    if text.contains("tài khoản") || text.contains("ví tiền") {
        return Some(Intent::List(ListTarget::Accounts));
    }
    if text.contains("danh mục") {
        return Some(Intent::List(ListTarget::Categories));
    }
    if text.contains("mục tiêu") {
        return Some(Intent::List(ListTarget::Goals));
    }

    None
}

fn transaction_query(text: &str) -> TransactionQuery {
    let kind = if text.contains("thu nhập") || text.contains("khoản thu") {
        Some(TransactionType::Income)
    } else if text.contains("chi tiêu") || text.contains("khoản chi") {
        Some(TransactionType::Expense)
    } else {
        None
    };

    let limit = LIST_COUNT
        .captures(text)
        .and_then(|caps| caps[1].parse::<usize>().ok())
        .map(|n| n.clamp(1, MAX_LISTED_TRANSACTIONS))
        .unwrap_or(TransactionQuery::default().limit);

    TransactionQuery { kind, limit }
}

fn match_shorthand(text: &str, today: NaiveDate) -> Option<TransactionDraft> {
    let caps = SHORTHAND.captures(text)?;
    let verb = caps.get(1)?;
    let kind = if INCOME_VERBS.contains(&verb.as_str()) {
        TransactionType::Income
    } else {
        TransactionType::Expense
    };

    build_transaction(text, verb.range(), kind, today)
}

/// Assemble a draft from `text` (already normalized) given the span of the
/// keyword that marked it as a transaction. Requires an amount.
pub fn build_transaction(
    text: &str,
    keyword: Range<usize>,
    kind: TransactionType,
    today: NaiveDate,
) -> Option<TransactionDraft> {
    let amount = find_amount(text)?;
    let keyword_text = &text[keyword.clone()];

    // remove keyword and amount token, back to front so offsets stay valid
    let mut spans = [keyword, amount.span];
    spans.sort_by_key(|s| std::cmp::Reverse(s.start));
    let mut rest = text.to_string();
    for span in spans {
        if span.end <= rest.len() && span.start <= span.end {
            rest.replace_range(span, " ");
        }
    }

    let rest = normalize(&DATE_WORDS.replace_all(&rest, " "));

    let padded = format!(" {}", rest);
    let (rest, account_guess) = match ACCOUNT_HINT.captures(&padded) {
        Some(caps) => {
            let start = caps.get(0).map_or(padded.len(), |m| m.start());
            (padded[..start].trim().to_string(), Some(caps[1].trim().to_string()))
        }
        None => (rest, None),
    };

    let name = LEADING_FILLER.replace(&rest, "").trim().to_string();
    let name = if !name.is_empty() {
        capitalize(&name)
    } else if keyword_text == "lương" {
        "Lương".to_string()
    } else {
        capitalize(kind.label())
    };

    // future dates are not bookable from chat; confirmation falls back to today
    let date = extract_date(text, today).filter(|d| *d <= today);

    Some(TransactionDraft {
        name,
        amount: Some(amount.value),
        kind,
        account_guess: account_guess.map(|a| capitalize(&a)),
        category_guess: None,
        date,
    })
}

/// Uppercase the first character
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn draft(message: &str) -> TransactionDraft {
        match LocalMatcher::classify(message, today()) {
            Some(Intent::AddTransaction(draft)) => draft,
            other => panic!("expected transaction for {:?}, got {:?}", message, other),
        }
    }

    #[test]
    fn test_expense_shorthand() {
        let d = draft("chi 50k ăn sáng");
        assert_eq!(d.amount, Some(50_000));
        assert_eq!(d.kind, TransactionType::Expense);
        assert_eq!(d.name, "Ăn sáng");
        assert_eq!(d.date, None);
    }

    #[test]
    fn test_income_shorthand() {
        let d = draft("thu 10tr lương");
        assert_eq!(d.amount, Some(10_000_000));
        assert_eq!(d.kind, TransactionType::Income);
        assert_eq!(d.name, "Lương");

        let d = draft("Lương 15 triệu");
        assert_eq!(d.kind, TransactionType::Income);
        assert_eq!(d.name, "Lương");
    }

    #[test]
    fn test_shorthand_date_and_account() {
        let d = draft("chi 120k cho cà phê hôm qua bằng tiền mặt");
        assert_eq!(d.name, "Cà phê");
        assert_eq!(d.account_guess.as_deref(), Some("Tiền mặt"));
        assert_eq!(d.date, NaiveDate::from_ymd_opt(2026, 10, 18));
    }

    #[test]
    fn test_shorthand_without_name_uses_label() {
        let d = draft("chi 200k");
        assert_eq!(d.name, "Chi tiêu");
    }

    #[test]
    fn test_shorthand_without_amount_defers() {
        assert_eq!(LocalMatcher::classify("chi invalid", today()), None);
        assert_eq!(LocalMatcher::classify("invalid", today()), None);
        assert_eq!(LocalMatcher::classify("mua laptop", today()), None);
    }

    #[test]
    fn test_goal_creation_is_not_local() {
        assert_eq!(LocalMatcher::classify("tạo mục tiêu mua nhà 2 tỷ cuối năm", today()), None);
    }

    #[test]
    fn test_stats_queries() {
        assert_eq!(
            LocalMatcher::classify("thống kê tháng này", today()),
            Some(Intent::QuickStats(StatsQuery::default()))
        );
        assert_eq!(
            LocalMatcher::classify("Báo cáo thu chi tháng 6", today()),
            Some(Intent::QuickStats(StatsQuery { month: Some(6), year: None }))
        );
        assert_eq!(
            LocalMatcher::classify("tháng 3/2025 tôi tiêu hết bao nhiêu", today()),
            Some(Intent::QuickStats(StatsQuery { month: Some(3), year: Some(2025) }))
        );
        assert_eq!(
            LocalMatcher::classify("tổng kết năm 2025", today()),
            Some(Intent::QuickStats(StatsQuery { month: None, year: Some(2025) }))
        );
    }

    #[test]
    fn test_stats_previous_month_wraps_year() {
        let jan = NaiveDate::from_ymd_opt(2027, 1, 10).unwrap();
        assert_eq!(
            match_stats("thống kê tháng trước", jan),
            Some(StatsQuery { month: Some(12), year: Some(2026) })
        );
    }

    #[test]
    fn test_listing_queries() {
        assert_eq!(
            LocalMatcher::classify("xem danh mục", today()),
            Some(Intent::List(ListTarget::Categories))
        );
        assert_eq!(
            LocalMatcher::classify("liệt kê tài khoản của tôi", today()),
            Some(Intent::List(ListTarget::Accounts))
        );
        assert_eq!(
            LocalMatcher::classify("xem các mục tiêu", today()),
            Some(Intent::List(ListTarget::Goals))
        );
        assert_eq!(
            LocalMatcher::classify("giao dịch gần đây", today()),
            Some(Intent::QueryTransactions(TransactionQuery::default()))
        );
        assert_eq!(
            LocalMatcher::classify("xem 10 giao dịch chi tiêu", today()),
            Some(Intent::QueryTransactions(TransactionQuery {
                kind: Some(TransactionType::Expense),
                limit: 10,
            }))
        );
    }

    #[test]
    fn test_stats_before_listing() {
        assert!(matches!(
            LocalMatcher::classify("xem thống kê tháng 6", today()),
            Some(Intent::QuickStats(_))
        ));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("ăn sáng"), "Ăn sáng");
        assert_eq!(capitalize(""), "");
    }
}
