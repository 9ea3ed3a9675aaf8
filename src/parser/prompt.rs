//! Prompt construction for the remote intent parser

use crate::models::{format_date, format_vnd, UserContext};
use chrono::{Datelike, Duration as ChronoDuration};

const RECENT_TRANSACTIONS: usize = 5;

/// Build the classification prompt for `message`, embedding the user's
/// finance context and the exact JSON contract expected back
pub fn build_prompt(message: &str, context: &UserContext) -> String {
    let today = context.current_date;
    let tomorrow = today + ChronoDuration::days(1);
    let year = today.year();

    format!(
        r#"Phân tích tin nhắn của người dùng và trả về DUY NHẤT một đối tượng JSON.

HÔM NAY: {today_vn} (ISO: {today_iso})

DANH MỤC CỦA NGƯỜI DÙNG:
{categories}

TÀI KHOẢN CỦA NGƯỜI DÙNG:
{accounts}

GIAO DỊCH GẦN ĐÂY:
{recent}

QUY TẮC TIỀN TỆ (VND, số nguyên):
- "50k", "50 nghìn", "50 ngàn" = 50000
- "2 triệu", "2tr" = 2000000; "1,5 triệu" = 1500000
- "2 tỷ" = 2000000000
- "15.000.000đ" = 15000000
- Không đoán số tiền. Nếu người dùng không nói số tiền, dùng null.

QUY TẮC NGÀY (luôn trả về dạng YYYY-MM-DD):
- "hôm nay" = {today_iso}; "ngày mai" = {tomorrow_iso}
- "cuối năm" = {year}-12-31; "giữa năm" = {year}-06-30
- "tháng 6" = {year}-06-30 (ngày cuối của tháng)
- "cuối năm sau" = {next_year}-12-31
- Không đoán hạn chót. Nếu người dùng không nói thời hạn, dùng null.
- KHÔNG dùng ISODate(...) hay ObjectId(...), chỉ dùng chuỗi.

LOẠI GIAO DỊCH: "CHITIEU" (chi tiêu) hoặc "THUNHAP" (thu nhập).
Ưu tiên dùng tên danh mục và tài khoản có sẵn ở trên khi phù hợp.

ĐỊNH DẠNG TRẢ VỀ:
{{"intent": "<ADD_TRANSACTION|ADD_CATEGORY|ADD_GOAL|QUICK_STATS|QUERY_TRANSACTIONS|UNKNOWN>", "data": {{...}}, "response": "<câu trả lời ngắn khi UNKNOWN>"}}

VÍ DỤ:
"chi 50k ăn sáng" →
{{"intent": "ADD_TRANSACTION", "data": {{"name": "Ăn sáng", "amount": 50000, "type": "CHITIEU", "account": null, "category": "Ăn uống", "date": "{today_iso}"}}}}

"nhận lương 15 triệu vào Vietcombank" →
{{"intent": "ADD_TRANSACTION", "data": {{"name": "Lương", "amount": 15000000, "type": "THUNHAP", "account": "Vietcombank", "category": "Lương", "date": "{today_iso}"}}}}

"tạo danh mục Thú cưng cho chi tiêu" →
{{"intent": "ADD_CATEGORY", "data": {{"name": "Thú cưng", "type": "CHITIEU", "icon": null}}}}

"tạo mục tiêu mua nhà 2 tỷ cuối năm" →
{{"intent": "ADD_GOAL", "data": {{"name": "Mua nhà", "targetAmount": 2000000000, "deadline": "{year}-12-31"}}}}

"tạo mục tiêu mua laptop" →
{{"intent": "ADD_GOAL", "data": {{"name": "Mua laptop", "targetAmount": null, "deadline": null}}}}

"tiết kiệm 50 triệu đi du lịch trước tháng 6 năm sau" →
{{"intent": "ADD_GOAL", "data": {{"name": "Đi du lịch", "targetAmount": 50000000, "deadline": "{next_year}-06-30"}}}}

"tháng này tiêu bao nhiêu rồi" →
{{"intent": "QUICK_STATS", "data": {{"month": {month}, "year": {year}}}}}

"5 khoản chi gần nhất" →
{{"intent": "QUERY_TRANSACTIONS", "data": {{"type": "CHITIEU", "limit": 5}}}}

"bạn là ai" →
{{"intent": "UNKNOWN", "data": {{}}, "response": "Mình là trợ lý tài chính, mình giúp bạn ghi chép thu chi và đặt mục tiêu tiết kiệm."}}

TIN NHẮN: "{message}"
JSON:"#,
        today_vn = format_date(today),
        today_iso = today,
        tomorrow_iso = tomorrow,
        year = year,
        next_year = year + 1,
        month = today.month(),
        categories = render_categories(context),
        accounts = render_accounts(context),
        recent = render_recent(context),
        message = message.replace('"', "'"),
    )
}

fn render_categories(context: &UserContext) -> String {
    if context.categories.is_empty() {
        return "(chưa có)".to_string();
    }
    context
        .categories
        .iter()
        .map(|c| format!("- {} ({})", c.name, c.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_accounts(context: &UserContext) -> String {
    if context.accounts.is_empty() {
        return "(chưa có)".to_string();
    }
    context
        .accounts
        .iter()
        .map(|a| match &a.bank_name {
            Some(bank) => format!("- {} ({}, {})", a.name, a.account_type, bank),
            None => format!("- {} ({})", a.name, a.account_type),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_recent(context: &UserContext) -> String {
    if context.recent_transactions.is_empty() {
        return "(chưa có)".to_string();
    }
    context
        .recent_transactions
        .iter()
        .take(RECENT_TRANSACTIONS)
        .map(|t| format!("- {}: {} ({})", t.name, format_vnd(t.amount), t.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Account, Category, Transaction, TransactionType};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn context() -> UserContext {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let recent = (1..=7)
            .map(|i| Transaction {
                transaction_id: Uuid::new_v4(),
                name: format!("Giao dịch {}", i),
                amount: i * 10_000,
                kind: TransactionType::Expense,
                account: None,
                category: None,
                date: today,
            })
            .collect();

        UserContext {
            categories: vec![Category {
                category_id: Uuid::new_v4(),
                name: "Ăn uống".to_string(),
                kind: TransactionType::Expense,
                icon: None,
            }],
            accounts: vec![Account {
                account_id: Uuid::new_v4(),
                name: "Tiền lương".to_string(),
                account_type: "BANK".to_string(),
                bank_name: Some("Vietcombank".to_string()),
                balance: 0,
            }],
            recent_transactions: recent,
            current_date: today,
        }
    }

    #[test]
    fn test_prompt_embeds_context() {
        let prompt = build_prompt("chi 50k ăn sáng", &context());

        assert!(prompt.contains("Ăn uống (CHITIEU)"));
        assert!(prompt.contains("Tiền lương (BANK, Vietcombank)"));
        assert!(prompt.contains("19/10/2026"));
        assert!(prompt.contains("2026-12-31"));
        assert!(prompt.contains("TIN NHẮN: \"chi 50k ăn sáng\""));
    }

    #[test]
    fn test_prompt_limits_recent_transactions() {
        let prompt = build_prompt("xin chào", &context());

        assert!(prompt.contains("Giao dịch 5"));
        assert!(!prompt.contains("Giao dịch 6"));
    }

    #[test]
    fn test_prompt_with_empty_context() {
        let ctx = UserContext::empty(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        let prompt = build_prompt("xin chào", &ctx);

        assert!(prompt.contains("(chưa có)"));
        assert!(prompt.contains("2027-12-31"));
    }
}
