//! Money expression extraction
//!
//! "50k", "2 triệu", "1,5tr", "15.000.000đ", "2 tỷ" → whole dong.

use crate::models::Amount;
use lazy_static::lazy_static;
use regex::Regex;
use std::ops::Range;

/// Upper sanity bound for any amount typed in chat
pub const MAX_AMOUNT: Amount = 999_999_999_999;

const NUMBER: &str = r"(\d+(?:[.,]\d+)*)";

lazy_static! {
    /// Ordered: multiplier-carrying patterns before the bare fallback
    static ref AMOUNT_PATTERNS: Vec<(Regex, f64)> = vec![
        (unit_pattern(r"tỷ|tỉ|ty|billion"), 1_000_000_000.0),
        (unit_pattern(r"triệu|trieu|tr|million"), 1_000_000.0),
        (unit_pattern(r"nghìn|ngàn|nghin|ngan|k|thousand"), 1_000.0),
        (currency_pattern(), 1.0),
    ];

    static ref BARE_NUMBER: Regex = Regex::new(&format!(r"(?:^|[^\d.,]){}", NUMBER))
        .expect("bare number pattern");
}

fn unit_pattern(units: &str) -> Regex {
    Regex::new(&format!(r"(?i){}\s*(?:{})\b", NUMBER, units)).expect("amount unit pattern")
}

fn currency_pattern() -> Regex {
    Regex::new(&format!(r"(?i){}\s*(?:đồng|đ|dong|vnđ|vnd)", NUMBER)).expect("currency pattern")
}

/// An amount found in text, with the byte span of the token it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountMatch {
    pub value: Amount,
    pub span: Range<usize>,
}

/// Extract an amount in whole dong, or `None` when nothing plausible is found
pub fn extract_amount(text: &str) -> Option<Amount> {
    find_amount(&text.to_lowercase()).map(|m| m.value)
}

/// Locate the first amount in already-lowercased `text`.
/// A matched token that fails the range check yields `None`, not a later token.
pub fn find_amount(text: &str) -> Option<AmountMatch> {
    for (pattern, multiplier) in AMOUNT_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let token = caps.get(0)?;
            let raw = caps.get(1)?.as_str();
            let has_multiplier = *multiplier > 1.0;
            let value = parse_number(raw, has_multiplier).and_then(|n| to_amount(n * multiplier))?;
            return Some(AmountMatch {
                value,
                span: token.range(),
            });
        }
    }

    // Digits touching '/' belong to a date such as "12/10"
    let number = BARE_NUMBER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find(|m| !text[..m.start()].ends_with('/') && !text[m.end()..].starts_with('/'))?;
    let value = parse_number(number.as_str(), false).and_then(to_amount)?;
    Some(AmountMatch {
        value,
        span: number.range(),
    })
}

/// Resolve `,` / `.` in a numeric token.
///
/// With a multiplier a single separator is a decimal point and several
/// separators are thousands groupings. Without one, separators followed by
/// exactly three digits are groupings; anything else is a decimal point.
fn parse_number(raw: &str, has_multiplier: bool) -> Option<f64> {
    let groups: Vec<&str> = raw.split(|c| c == '.' || c == ',').collect();

    if groups.len() == 1 {
        return raw.parse().ok();
    }

    let all_thousands = groups[1..].iter().all(|g| g.len() == 3);
    let grouping = if has_multiplier {
        groups.len() > 2 && all_thousands
    } else {
        all_thousands
    };

    if grouping {
        return groups.concat().parse().ok();
    }

    if groups.len() == 2 {
        return format!("{}.{}", groups[0], groups[1]).parse().ok();
    }

    None
}

fn to_amount(value: f64) -> Option<Amount> {
    let rounded = value.round();
    if rounded <= 0.0 || rounded > MAX_AMOUNT as f64 {
        return None;
    }
    Some(rounded as Amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousand_suffix() {
        assert_eq!(extract_amount("50k"), Some(50_000));
        assert_eq!(extract_amount("chi 50k ăn sáng"), Some(50_000));
        assert_eq!(extract_amount("120 K"), Some(120_000));
        assert_eq!(extract_amount("300 nghìn"), Some(300_000));
        assert_eq!(extract_amount("5 ngàn"), Some(5_000));
    }

    #[test]
    fn test_million_suffix() {
        assert_eq!(extract_amount("2 triệu"), Some(2_000_000));
        assert_eq!(extract_amount("20 triệu"), Some(20_000_000));
        assert_eq!(extract_amount("5tr"), Some(5_000_000));
        assert_eq!(extract_amount("lương 15 TR"), Some(15_000_000));
    }

    #[test]
    fn test_billion_suffix() {
        assert_eq!(extract_amount("mua nhà 2 tỷ"), Some(2_000_000_000));
    }

    #[test]
    fn test_decimal_with_multiplier() {
        assert_eq!(extract_amount("1,5 triệu"), Some(1_500_000));
        assert_eq!(extract_amount("2.5tr"), Some(2_500_000));
        assert_eq!(extract_amount("1.500 triệu"), Some(1_500_000));
    }

    #[test]
    fn test_currency_suffix_and_grouping() {
        assert_eq!(extract_amount("15000000đ"), Some(15_000_000));
        assert_eq!(extract_amount("15.000.000đ"), Some(15_000_000));
        assert_eq!(extract_amount("200,000 VND"), Some(200_000));
        assert_eq!(extract_amount("50000 đồng"), Some(50_000));
    }

    #[test]
    fn test_bare_number_fallback() {
        assert_eq!(extract_amount("75000"), Some(75_000));
        assert_eq!(extract_amount("tiền điện 1.250.000"), Some(1_250_000));
    }

    #[test]
    fn test_date_fragment_is_not_an_amount() {
        assert_eq!(extract_amount("hôm qua 12/10"), None);
        assert_eq!(extract_amount("ngày 25/12/2026"), None);
        assert_eq!(extract_amount("12/10 trả 300000"), Some(300_000));
        assert_eq!(extract_amount("hôm qua 12/10 hết 45k"), Some(45_000));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(extract_amount("0k"), None);
        assert_eq!(extract_amount("0"), None);
        assert_eq!(extract_amount("1000 tỷ"), None);
        assert_eq!(extract_amount("999999999999"), Some(MAX_AMOUNT));
        assert_eq!(extract_amount("1000000000000đ"), None);
    }

    #[test]
    fn test_no_amount() {
        assert_eq!(extract_amount("invalid"), None);
        assert_eq!(extract_amount("mua laptop"), None);
        assert_eq!(extract_amount(""), None);
    }

    #[test]
    fn test_find_amount_span() {
        let text = "chi 50k ăn sáng";
        let found = find_amount(text).unwrap();
        assert_eq!(found.value, 50_000);
        assert_eq!(&text[found.span], "50k");

        let text = "tiền điện 1.250.000 tháng này";
        let found = find_amount(text).unwrap();
        assert_eq!(&text[found.span], "1.250.000");
    }

    #[test]
    fn test_thousand_property_over_range() {
        for n in [1u64, 7, 42, 999, 12_345, 500_000] {
            assert_eq!(extract_amount(&format!("{}k", n)), Some(n as Amount * 1_000));
            assert_eq!(extract_amount(&format!("{} triệu", n)), Some(n as Amount * 1_000_000));
        }
    }
}
