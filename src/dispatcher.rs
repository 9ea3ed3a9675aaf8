//! Intent dispatcher
//!
//! Turns an [`Intent`] into an [`ActionResult`] plus the state transition the
//! caller must apply. Reads from the finance store for statistics and
//! listings; never writes.

use crate::audit::compute_fingerprint;
use crate::extract::date::{first_day_of_month, last_day_of_month};
use crate::finance::FinanceStore;
use crate::models::{
    format_date, format_vnd, ActionData, ActionKind, ActionResult, CategoryConfirmation,
    CategoryDraft, GoalConfirmation, GoalDraft, Intent, ListTarget, Slot, StatsQuery,
    TransactionConfirmation, TransactionDraft, TransactionQuery, TransactionType,
};
use crate::state::ConversationState;
use crate::Result;
use chrono::{Datelike, NaiveDate};
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Reply for an unrecognised message when the model offered none
pub const UNKNOWN_REPLY: &str = "Xin lỗi, mình chưa hiểu yêu cầu của bạn. Bạn có thể thử: \
\"chi 50k ăn sáng\", \"tạo mục tiêu mua laptop 20 triệu cuối năm\" hoặc \"thống kê tháng này\".";

const CATEGORY_VALIDATION: &str = "Vui lòng cho biết tên và loại danh mục (chi tiêu hoặc thu nhập). \
Ví dụ: \"tạo danh mục Ăn uống loại chi tiêu\".";

const GOAL_NAME_VALIDATION: &str = "Bạn muốn đặt mục tiêu gì? \
Ví dụ: \"tạo mục tiêu mua laptop 20 triệu cuối năm\".";

/// What the state machine should do after a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Idle,
    Await(ConversationState),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub result: ActionResult,
    pub transition: Transition,
}

impl Dispatch {
    fn idle(result: ActionResult) -> Self {
        Self {
            result,
            transition: Transition::Idle,
        }
    }
}

pub struct Dispatcher {
    finance: Arc<dyn FinanceStore>,
}

impl Dispatcher {
    pub fn new(finance: Arc<dyn FinanceStore>) -> Self {
        Self { finance }
    }

    pub async fn handle(&self, intent: Intent, user_id: Uuid, today: NaiveDate) -> Result<Dispatch> {
        debug!(user_id = %user_id, intent = ?intent.kind(), "Dispatching intent");

        match intent {
            Intent::AddTransaction(draft) => Ok(transaction(draft, today)),
            Intent::AddCategory(draft) => Ok(category(draft)),
            Intent::AddGoal(draft) => Ok(goal(draft, today)),
            Intent::QuickStats(query) => self.stats(user_id, query, today).await,
            Intent::QueryTransactions(query) => self.transactions(user_id, query).await,
            Intent::List(target) => self.listing(user_id, target).await,
            Intent::Unknown { reply } => Ok(Dispatch::idle(ActionResult::chat(
                reply
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_REPLY.to_string()),
            ))),
        }
    }

    async fn stats(&self, user_id: Uuid, query: StatsQuery, today: NaiveDate) -> Result<Dispatch> {
        let Some((start, end, label)) = stats_window(query, today) else {
            return Ok(Dispatch::idle(ActionResult::chat(
                "Tháng không hợp lệ. Ví dụ: \"thống kê tháng 6\".",
            )));
        };

        let stats = self.finance.summary_stats(user_id, start, end).await?;

        let text = format!(
            "Thống kê {}:\n- Tổng thu: {}\n- Tổng chi: {}\n- Dòng tiền: {}",
            label,
            format_vnd(stats.total_income),
            format_vnd(stats.total_expense),
            format_vnd(stats.cash_flow),
        );

        Ok(Dispatch::idle(
            ActionResult::chat(text).with_data(ActionData::Stats(stats)),
        ))
    }

    async fn transactions(&self, user_id: Uuid, query: TransactionQuery) -> Result<Dispatch> {
        let items = self.finance.list_transactions(user_id, query).await?;

        if items.is_empty() {
            return Ok(Dispatch::idle(ActionResult::chat("Bạn chưa có giao dịch nào.")));
        }

        let mut text = format!("{} giao dịch gần nhất:", items.len());
        for (i, t) in items.iter().enumerate() {
            let sign = match t.kind {
                TransactionType::Expense => "-",
                TransactionType::Income => "+",
            };
            let _ = write!(
                text,
                "\n{}. {} {}: {}{}",
                i + 1,
                format_date(t.date),
                t.name,
                sign,
                format_vnd(t.amount)
            );
        }

        Ok(Dispatch::idle(ActionResult::chat(text)))
    }

    async fn listing(&self, user_id: Uuid, target: ListTarget) -> Result<Dispatch> {
        let text = match target {
            ListTarget::Accounts => {
                let accounts = self.finance.list_accounts(user_id).await?;
                if accounts.is_empty() {
                    "Bạn chưa có tài khoản nào.".to_string()
                } else {
                    let mut text = String::from("Tài khoản của bạn:");
                    for a in &accounts {
                        let _ = write!(text, "\n- {} ({}", a.name, a.account_type);
                        if let Some(bank) = &a.bank_name {
                            let _ = write!(text, ", {}", bank);
                        }
                        let _ = write!(text, "): {}", format_vnd(a.balance));
                    }
                    text
                }
            }
            ListTarget::Categories => {
                let categories = self.finance.list_categories(user_id).await?;
                if categories.is_empty() {
                    "Bạn chưa có danh mục nào.".to_string()
                } else {
                    let mut text = String::from("Danh mục của bạn:");
                    for c in &categories {
                        let _ = write!(text, "\n- {} ({})", c.name, c.kind.label());
                    }
                    text
                }
            }
            ListTarget::Goals => {
                let goals = self.finance.list_goals(user_id).await?;
                if goals.is_empty() {
                    "Bạn chưa có mục tiêu tiết kiệm nào.".to_string()
                } else {
                    let mut text = String::from("Mục tiêu của bạn:");
                    for g in &goals {
                        let _ = write!(
                            text,
                            "\n- {}: {} / {}, hạn {}",
                            g.name,
                            format_vnd(g.current_amount),
                            format_vnd(g.target_amount),
                            format_date(g.deadline)
                        );
                    }
                    text
                }
            }
        };

        Ok(Dispatch::idle(ActionResult::chat(text)))
    }
}

fn transaction(mut draft: TransactionDraft, today: NaiveDate) -> Dispatch {
    if draft.name.trim().is_empty() {
        draft.name = crate::matcher::capitalize(draft.kind.label());
    }

    let Some(amount) = draft.amount else {
        let verb = match draft.kind {
            TransactionType::Expense => "đã chi",
            TransactionType::Income => "đã nhận",
        };
        let text = format!(
            "Bạn {} bao nhiêu cho \"{}\"? Ví dụ: 50k, 2 triệu, 1.500.000đ",
            verb, draft.name
        );
        return ask(text, ConversationState::awaiting_transaction(Slot::TransactionAmount, draft));
    };

    let payload = TransactionConfirmation {
        name: draft.name,
        amount,
        kind: draft.kind,
        account: draft.account_guess,
        category: draft.category_guess,
        date: draft.date.unwrap_or(today),
    };

    let mut text = format!(
        "Xác nhận thêm {}: {} - {}, ngày {}",
        payload.kind.label(),
        payload.name,
        format_vnd(payload.amount),
        format_date(payload.date)
    );
    if let Some(category) = &payload.category {
        let _ = write!(text, ", danh mục {}", category);
    }
    if let Some(account) = &payload.account {
        let _ = write!(text, ", tài khoản {}", account);
    }
    text.push('?');

    let confirmation_id = compute_fingerprint(ActionKind::ConfirmAddTransaction, &payload);
    confirm(
        text,
        ActionKind::ConfirmAddTransaction,
        ActionData::Transaction(payload),
        confirmation_id,
    )
}

fn category(draft: CategoryDraft) -> Dispatch {
    let name = draft
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let (Some(name), Some(kind)) = (name, draft.kind) else {
        return Dispatch::idle(ActionResult::chat(CATEGORY_VALIDATION));
    };

    let payload = CategoryConfirmation {
        name,
        kind,
        icon: draft.icon,
    };
    let text = format!(
        "Xác nhận tạo danh mục \"{}\" ({})?",
        payload.name,
        payload.kind.label()
    );

    let confirmation_id = compute_fingerprint(ActionKind::ConfirmAddCategory, &payload);
    confirm(
        text,
        ActionKind::ConfirmAddCategory,
        ActionData::Category(payload),
        confirmation_id,
    )
}

fn goal(mut draft: GoalDraft, today: NaiveDate) -> Dispatch {
    draft.name = draft.name.trim().to_string();
    if draft.name.is_empty() {
        return Dispatch::idle(ActionResult::chat(GOAL_NAME_VALIDATION));
    }

    // A past deadline counts as missing
    if draft.deadline.is_some_and(|d| d < today) {
        debug!(deadline = ?draft.deadline, "Dropping past goal deadline");
        draft.deadline = None;
    }

    match draft.missing_slot() {
        Some(Slot::GoalAmount) => {
            let text = format!(
                "Bạn cần bao nhiêu tiền cho mục tiêu \"{}\"? Ví dụ: 20 triệu, 2 tỷ",
                draft.name
            );
            ask(text, ConversationState::awaiting_goal(Slot::GoalAmount, draft))
        }
        Some(slot) => {
            let text = format!(
                "Bạn muốn hoàn thành mục tiêu \"{}\" khi nào? Ví dụ: cuối năm, tháng 6, 31/12/2026",
                draft.name
            );
            ask(text, ConversationState::awaiting_goal(slot, draft))
        }
        None => {
            let (Some(target_amount), Some(deadline)) = (draft.target_amount, draft.deadline) else {
                return Dispatch::idle(ActionResult::chat(GOAL_NAME_VALIDATION));
            };

            let payload = GoalConfirmation {
                name: draft.name,
                target_amount,
                deadline,
            };
            let text = format!(
                "Xác nhận tạo mục tiêu \"{}\": {} trước ngày {}?",
                payload.name,
                format_vnd(payload.target_amount),
                format_date(payload.deadline)
            );

            let confirmation_id = compute_fingerprint(ActionKind::ConfirmAddGoal, &payload);
            confirm(
                text,
                ActionKind::ConfirmAddGoal,
                ActionData::Goal(payload),
                confirmation_id,
            )
        }
    }
}

fn ask(text: String, state: ConversationState) -> Dispatch {
    let pending = match &state.pending {
        crate::state::PendingDraft::AddTransaction(d) => ActionData::PendingTransaction(d.clone()),
        crate::state::PendingDraft::AddGoal(d) => ActionData::PendingGoal(d.clone()),
    };

    Dispatch {
        result: ActionResult::need_more_info(text, state.waiting_for, pending),
        transition: Transition::Await(state),
    }
}

fn confirm(text: String, action: ActionKind, data: ActionData, confirmation_id: String) -> Dispatch {
    Dispatch::idle(ActionResult {
        response_text: text,
        action,
        data: Some(data),
        waiting_for: None,
        confirmation_id: Some(confirmation_id),
    })
}

/// Inclusive date window and its label for a statistics query
fn stats_window(query: StatsQuery, today: NaiveDate) -> Option<(NaiveDate, NaiveDate, String)> {
    match (query.month, query.year) {
        (Some(month), year) => {
            let year = year.unwrap_or(today.year());
            let start = NaiveDate::from_ymd_opt(year, month, 1)?;
            let end = last_day_of_month(year, month)?;
            Some((start, end, format!("tháng {}/{}", month, year)))
        }
        (None, Some(year)) => {
            let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
            let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
            Some((start, end, format!("năm {}", year)))
        }
        (None, None) => {
            let start = first_day_of_month(today);
            let end = last_day_of_month(today.year(), today.month())?;
            Some((
                start,
                end,
                format!("tháng {}/{}", today.month(), today.year()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finance::InMemoryFinanceStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn dispatcher() -> (Dispatcher, Arc<InMemoryFinanceStore>) {
        let store = Arc::new(InMemoryFinanceStore::new());
        (Dispatcher::new(store.clone()), store)
    }

    fn complete_goal() -> GoalDraft {
        GoalDraft {
            name: "Mua nhà".to_string(),
            target_amount: Some(2_000_000_000),
            deadline: NaiveDate::from_ymd_opt(2026, 12, 31),
        }
    }

    #[tokio::test]
    async fn test_past_goal_deadline_is_asked_again() {
        let (dispatcher, _) = dispatcher();
        let mut draft = complete_goal();
        draft.deadline = NaiveDate::from_ymd_opt(2026, 6, 30);

        let dispatch = dispatcher
            .handle(Intent::AddGoal(draft), Uuid::new_v4(), today())
            .await
            .unwrap();

        assert_eq!(dispatch.result.action, ActionKind::NeedMoreInfo);
        assert_eq!(dispatch.result.waiting_for, Some(Slot::GoalDeadline));
        match dispatch.transition {
            Transition::Await(state) => match state.pending {
                crate::state::PendingDraft::AddGoal(pending) => {
                    assert_eq!(pending.deadline, None);
                    assert_eq!(pending.target_amount, Some(2_000_000_000));
                }
                other => panic!("unexpected pending draft {:?}", other),
            },
            Transition::Idle => panic!("expected a pending deadline"),
        }

        let mut due_today = complete_goal();
        due_today.deadline = Some(today());
        let dispatch = dispatcher
            .handle(Intent::AddGoal(due_today), Uuid::new_v4(), today())
            .await
            .unwrap();
        assert_eq!(dispatch.result.action, ActionKind::ConfirmAddGoal);
    }

    #[tokio::test]
    async fn test_complete_transaction_confirms_with_today() {
        let (dispatcher, _) = dispatcher();
        let mut draft = TransactionDraft::new("Ăn sáng", TransactionType::Expense);
        draft.amount = Some(50_000);

        let dispatch = dispatcher
            .handle(Intent::AddTransaction(draft), Uuid::new_v4(), today())
            .await
            .unwrap();

        assert_eq!(dispatch.transition, Transition::Idle);
        assert_eq!(dispatch.result.action, ActionKind::ConfirmAddTransaction);
        let json = serde_json::to_value(&dispatch.result).unwrap();
        assert_eq!(json["data"]["amount"], 50_000);
        assert_eq!(json["data"]["type"], "CHITIEU");
        assert_eq!(json["data"]["date"], "2026-10-19");
        assert_eq!(json["confirmationId"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_transaction_without_amount_awaits() {
        let (dispatcher, _) = dispatcher();
        let draft = TransactionDraft::new("Tiền điện", TransactionType::Expense);

        let dispatch = dispatcher
            .handle(Intent::AddTransaction(draft.clone()), Uuid::new_v4(), today())
            .await
            .unwrap();

        assert_eq!(dispatch.result.action, ActionKind::NeedMoreInfo);
        assert_eq!(dispatch.result.waiting_for, Some(Slot::TransactionAmount));
        assert_eq!(
            dispatch.transition,
            Transition::Await(ConversationState::awaiting_transaction(
                Slot::TransactionAmount,
                draft
            ))
        );
    }

    #[tokio::test]
    async fn test_goal_asks_amount_before_deadline() {
        let (dispatcher, _) = dispatcher();

        let dispatch = dispatcher
            .handle(Intent::AddGoal(GoalDraft::new("Mua laptop")), Uuid::new_v4(), today())
            .await
            .unwrap();
        assert_eq!(dispatch.result.waiting_for, Some(Slot::GoalAmount));

        let mut draft = GoalDraft::new("Mua laptop");
        draft.target_amount = Some(20_000_000);
        let dispatch = dispatcher
            .handle(Intent::AddGoal(draft), Uuid::new_v4(), today())
            .await
            .unwrap();
        assert_eq!(dispatch.result.waiting_for, Some(Slot::GoalDeadline));
        assert!(dispatch.result.response_text.contains("Ví dụ"));
    }

    #[tokio::test]
    async fn test_complete_goal_is_idempotent() {
        let (dispatcher, _) = dispatcher();
        let user = Uuid::new_v4();

        let first = dispatcher.handle(Intent::AddGoal(complete_goal()), user, today()).await.unwrap();
        let second = dispatcher.handle(Intent::AddGoal(complete_goal()), user, today()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.result.action, ActionKind::ConfirmAddGoal);
        let json = serde_json::to_value(&first.result).unwrap();
        assert!(json["data"]["deadline"].as_str().unwrap().ends_with("-12-31"));
        assert_eq!(json["data"]["targetAmount"], 2_000_000_000i64);
    }

    #[tokio::test]
    async fn test_goal_without_name_is_rejected() {
        let (dispatcher, _) = dispatcher();
        let mut draft = complete_goal();
        draft.name = "  ".to_string();

        let dispatch = dispatcher.handle(Intent::AddGoal(draft), Uuid::new_v4(), today()).await.unwrap();
        assert_eq!(dispatch.result.action, ActionKind::ChatResponse);
        assert_eq!(dispatch.transition, Transition::Idle);
    }

    #[tokio::test]
    async fn test_category_requires_name_and_type() {
        let (dispatcher, _) = dispatcher();
        let user = Uuid::new_v4();

        let missing_type = CategoryDraft {
            name: Some("Ăn uống".to_string()),
            kind: None,
            icon: None,
        };
        let dispatch = dispatcher.handle(Intent::AddCategory(missing_type), user, today()).await.unwrap();
        assert_eq!(dispatch.result.action, ActionKind::ChatResponse);
        assert_eq!(dispatch.transition, Transition::Idle);

        let complete = CategoryDraft {
            name: Some("Ăn uống".to_string()),
            kind: Some(TransactionType::Expense),
            icon: None,
        };
        let dispatch = dispatcher.handle(Intent::AddCategory(complete), user, today()).await.unwrap();
        assert_eq!(dispatch.result.action, ActionKind::ConfirmAddCategory);
    }

    #[tokio::test]
    async fn test_stats_for_current_and_explicit_month() {
        let (dispatcher, store) = dispatcher();
        let user = Uuid::new_v4();

        store
            .create_transaction(
                user,
                TransactionConfirmation {
                    name: "Lương".to_string(),
                    amount: 15_000_000,
                    kind: TransactionType::Income,
                    account: None,
                    category: None,
                    date: NaiveDate::from_ymd_opt(2026, 6, 5).unwrap(),
                },
            )
            .await
            .unwrap();

        let current = dispatcher
            .handle(Intent::QuickStats(StatsQuery::default()), user, today())
            .await
            .unwrap();
        assert!(current.result.response_text.contains("tháng 10/2026"));
        assert!(current.result.response_text.contains("Tổng thu: 0đ"));

        let june = dispatcher
            .handle(Intent::QuickStats(StatsQuery { month: Some(6), year: None }), user, today())
            .await
            .unwrap();
        assert!(june.result.response_text.contains("15.000.000đ"));
        let json = serde_json::to_value(&june.result).unwrap();
        assert_eq!(json["data"]["cashFlow"], 15_000_000);
    }

    #[tokio::test]
    async fn test_listings() {
        let (dispatcher, store) = dispatcher();
        let user = Uuid::new_v4();

        let empty = dispatcher.handle(Intent::List(ListTarget::Goals), user, today()).await.unwrap();
        assert!(empty.result.response_text.contains("chưa có"));

        store.add_account(user, "Ví tiền mặt", "CASH", None).await;
        let accounts = dispatcher.handle(Intent::List(ListTarget::Accounts), user, today()).await.unwrap();
        assert!(accounts.result.response_text.contains("Ví tiền mặt (CASH)"));

        let none = dispatcher
            .handle(Intent::QueryTransactions(TransactionQuery::default()), user, today())
            .await
            .unwrap();
        assert_eq!(none.result.response_text, "Bạn chưa có giao dịch nào.");
    }

    #[tokio::test]
    async fn test_unknown_uses_model_reply_or_default() {
        let (dispatcher, _) = dispatcher();
        let user = Uuid::new_v4();

        let reply = dispatcher
            .handle(Intent::Unknown { reply: Some("Chào bạn!".into()) }, user, today())
            .await
            .unwrap();
        assert_eq!(reply.result.response_text, "Chào bạn!");

        let fallback = dispatcher.handle(Intent::unknown(), user, today()).await.unwrap();
        assert_eq!(fallback.result.response_text, UNKNOWN_REPLY);
    }
}
