//! Fallback responder
//!
//! Used when the remote parser is unavailable. Looser than the local
//! matcher: transaction keywords may appear anywhere, and category and goal
//! creation are recognised heuristically.

use crate::extract::{extract_amount, DateExtractor};
use crate::matcher::{build_transaction, capitalize, match_listing, match_stats, normalize};
use crate::models::{CategoryDraft, GoalDraft, Intent, TransactionType};
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

/// Static feature list, the last resort reply
pub const HELP_MESSAGE: &str = "Mình có thể giúp bạn:\n\
- Ghi chi tiêu / thu nhập: \"chi 50k ăn sáng\", \"thu 10tr lương\"\n\
- Tạo danh mục: \"tạo danh mục Ăn uống loại chi tiêu\"\n\
- Tạo mục tiêu tiết kiệm: \"tạo mục tiêu mua laptop 20 triệu cuối năm\"\n\
- Xem thống kê: \"thống kê tháng này\"\n\
- Xem danh sách: \"xem giao dịch gần đây\", \"xem danh mục\", \"xem mục tiêu\"";

lazy_static! {
    static ref EXPENSE_KEYWORD: Regex =
        Regex::new(r"chi tiêu|\bchi\b|\btiêu\b|\btrả\b|\bmua\b|\bđóng\b|\bhết\b|\bmất\b").unwrap();
    static ref INCOME_KEYWORD: Regex =
        Regex::new(r"thu nhập|\bthu\b|\bnhận\b|\blương\b|\bthưởng\b|\bbán\b|\bđược\b").unwrap();

    static ref CATEGORY: Regex =
        Regex::new(r"(?:tạo|thêm)\s+(?:mới\s+)?danh mục\s+(.+)$").unwrap();
    static ref CATEGORY_KIND: Regex =
        Regex::new(r"\s*(?:loại\s+)?(chi tiêu|thu nhập)\s*$").unwrap();

    static ref GOAL_TRIGGER: Regex =
        Regex::new(r"mục tiêu|tiết kiệm|để dành|dành dụm").unwrap();

    /// Ordered: the first pattern that yields a non-empty name wins
    static ref GOAL_NAME_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"mục tiêu\s+(?:là\s+|để\s+)?(.+)$").unwrap(),
        Regex::new(r"tiết kiệm\s+(?:tiền\s+)?(?:để\s+)?(.+)$").unwrap(),
        Regex::new(r"(?:để dành|dành dụm)\s+(?:tiền\s+)?(?:để\s+)?(.+)$").unwrap(),
    ];

    /// Words that start the amount/deadline tail of a goal phrase
    static ref GOAL_NAME_STOP: Regex = Regex::new(
        r"\d|\s(?:trong|trước|vào|đến|tới|cuối|đầu|giữa|tháng|năm|tuần|ngày|hôm|khoảng|với|hết)\b"
    )
    .unwrap();
}

/// Goal names recognised without a trigger phrase structure
const GOAL_KEYWORDS: &[&str] = &[
    "mua nhà",
    "mua xe",
    "mua laptop",
    "mua máy tính",
    "mua điện thoại",
    "du lịch",
    "đám cưới",
    "học phí",
    "quỹ khẩn cấp",
    "nghỉ hưu",
];

pub struct FallbackResponder {
    dates: DateExtractor,
}

impl FallbackResponder {
    pub fn new(dates: DateExtractor) -> Self {
        Self { dates }
    }

    /// Best-effort classification. `None` means the caller should reply
    /// with [`HELP_MESSAGE`].
    pub fn classify(&self, message: &str, today: NaiveDate) -> Option<Intent> {
        let text = normalize(message);

        if let Some(query) = match_stats(&text, today) {
            return Some(Intent::QuickStats(query));
        }

        if let Some(intent) = match_listing(&text) {
            return Some(intent);
        }

        if let Some(draft) = category_draft(&text) {
            return Some(Intent::AddCategory(draft));
        }

        if let Some(draft) = extract_goal_info(&text, today, &self.dates) {
            return Some(Intent::AddGoal(draft));
        }

        loose_transaction(&text, today).map(Intent::AddTransaction)
    }
}

impl Default for FallbackResponder {
    fn default() -> Self {
        Self::new(DateExtractor::default())
    }
}

fn category_draft(text: &str) -> Option<CategoryDraft> {
    let caps = CATEGORY.captures(text)?;
    let mut name = caps[1].trim().to_string();

    let kind = match CATEGORY_KIND.captures(&name) {
        Some(kind_caps) => {
            let kind = TransactionType::parse(&kind_caps[1]);
            let cut = kind_caps.get(0).map_or(name.len(), |m| m.start());
            name.truncate(cut);
            kind
        }
        None => None,
    };

    let name = name.trim();
    Some(CategoryDraft {
        name: (!name.is_empty()).then(|| capitalize(name)),
        kind,
        icon: None,
    })
}

/// Goal heuristic: a trigger phrase, a name from the ordered patterns or
/// the keyword list, then amount and deadline via the extractors.
pub fn extract_goal_info(text: &str, today: NaiveDate, dates: &DateExtractor) -> Option<GoalDraft> {
    let text = normalize(text);
    if !GOAL_TRIGGER.is_match(&text) {
        return None;
    }

    let name = GOAL_NAME_PATTERNS
        .iter()
        .filter_map(|pattern| pattern.captures(&text))
        .map(|caps| goal_name(&caps[1]))
        .find(|name| !name.is_empty())
        .or_else(|| {
            GOAL_KEYWORDS
                .iter()
                .find(|kw| text.contains(**kw))
                .map(|kw| kw.to_string())
        })
        .unwrap_or_default();

    Some(GoalDraft {
        name: capitalize(&name),
        target_amount: extract_amount(&text),
        deadline: dates.extract(&text, today),
    })
}

fn goal_name(raw: &str) -> String {
    let cut = GOAL_NAME_STOP.find(raw).map_or(raw.len(), |m| m.start());
    raw[..cut]
        .trim()
        .trim_start_matches("mới ")
        .trim()
        .to_string()
}

fn loose_transaction(text: &str, today: NaiveDate) -> Option<crate::models::TransactionDraft> {
    let (keyword, kind) = match INCOME_KEYWORD.find(text) {
        Some(m) => (m, TransactionType::Income),
        None => (EXPENSE_KEYWORD.find(text)?, TransactionType::Expense),
    };

    build_transaction(text, keyword.range(), kind, today)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn responder() -> FallbackResponder {
        FallbackResponder::default()
    }

    #[test]
    fn test_goal_info_complete() {
        let goal = extract_goal_info("tạo mục tiêu mua nhà 2 tỷ cuối năm", today(), &DateExtractor::default())
            .unwrap();
        assert_eq!(goal.name, "Mua nhà");
        assert_eq!(goal.target_amount, Some(2_000_000_000));
        assert_eq!(goal.deadline, NaiveDate::from_ymd_opt(2026, 12, 31));
    }

    #[test]
    fn test_goal_info_name_only() {
        let goal = extract_goal_info("tạo mục tiêu mua laptop", today(), &DateExtractor::default()).unwrap();
        assert_eq!(goal.name, "Mua laptop");
        assert_eq!(goal.target_amount, None);
        assert_eq!(goal.deadline, None);
    }

    #[test]
    fn test_goal_info_saving_phrase() {
        let goal = extract_goal_info(
            "mình muốn tiết kiệm để du lịch Nhật 50 triệu trước tháng 6 năm sau",
            today(),
            &DateExtractor::default(),
        )
        .unwrap();
        assert_eq!(goal.name, "Du lịch nhật");
        assert_eq!(goal.target_amount, Some(50_000_000));
        assert_eq!(goal.deadline, NaiveDate::from_ymd_opt(2027, 6, 30));
    }

    #[test]
    fn test_goal_keyword_whitelist() {
        let goal = extract_goal_info("tiết kiệm 300 triệu cho mua xe", today(), &DateExtractor::default())
            .unwrap();
        assert_eq!(goal.name, "Mua xe");
        assert_eq!(goal.target_amount, Some(300_000_000));
    }

    #[test]
    fn test_past_goal_deadline_left_to_dispatcher() {
        let goal = extract_goal_info("tạo mục tiêu mua xe 500 triệu tháng 6", today(), &DateExtractor::default())
            .unwrap();
        assert_eq!(goal.deadline, NaiveDate::from_ymd_opt(2026, 6, 30));
    }

    #[test]
    fn test_not_a_goal() {
        assert!(extract_goal_info("chi 50k ăn sáng", today(), &DateExtractor::default()).is_none());
    }

    #[test]
    fn test_loose_transaction_keywords() {
        match responder().classify("hôm nay mình ăn trưa hết 45k", today()) {
            Some(Intent::AddTransaction(draft)) => {
                assert_eq!(draft.amount, Some(45_000));
                assert_eq!(draft.kind, TransactionType::Expense);
                assert_eq!(draft.name, "Mình ăn trưa");
                assert_eq!(draft.date, Some(today()));
            }
            other => panic!("unexpected {:?}", other),
        }

        match responder().classify("tháng này được thưởng 2 triệu", today()) {
            Some(Intent::AddTransaction(draft)) => {
                assert_eq!(draft.kind, TransactionType::Income);
                assert_eq!(draft.amount, Some(2_000_000));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_category_creation() {
        assert_eq!(
            responder().classify("tạo danh mục ăn uống loại chi tiêu", today()),
            Some(Intent::AddCategory(CategoryDraft {
                name: Some("Ăn uống".to_string()),
                kind: Some(TransactionType::Expense),
                icon: None,
            }))
        );

        assert_eq!(
            responder().classify("thêm danh mục Freelance", today()),
            Some(Intent::AddCategory(CategoryDraft {
                name: Some("Freelance".to_string()),
                kind: None,
                icon: None,
            }))
        );
    }

    #[test]
    fn test_stats_and_listing_reused() {
        assert!(matches!(
            responder().classify("thống kê tháng 6", today()),
            Some(Intent::QuickStats(_))
        ));
        assert!(matches!(
            responder().classify("xem mục tiêu", today()),
            Some(Intent::List(_))
        ));
    }

    #[test]
    fn test_nothing_matches() {
        assert_eq!(responder().classify("xin chào", today()), None);
        assert_eq!(responder().classify("invalid", today()), None);
    }
}
