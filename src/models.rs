//! Core data models for the finance chat assistant

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Whole Vietnamese dong
pub type Amount = i64;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TransactionType {
    #[serde(rename = "CHITIEU")]
    Expense,
    #[serde(rename = "THUNHAP")]
    Income,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Expense => "CHITIEU",
            TransactionType::Income => "THUNHAP",
        }
    }

    /// Accepts the wire codes plus the loose spellings models tend to emit
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "chitieu" | "chi_tieu" | "chi tiêu" | "chi" | "expense" => Some(TransactionType::Expense),
            "thunhap" | "thu_nhap" | "thu nhập" | "thu" | "income" => Some(TransactionType::Income),
            _ => None,
        }
    }

    /// Vietnamese label used in replies
    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Expense => "chi tiêu",
            TransactionType::Income => "thu nhập",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Field the dialogue is waiting for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    TransactionAmount,
    GoalAmount,
    GoalDeadline,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::TransactionAmount => "transaction_amount",
            Slot::GoalAmount => "goal_amount",
            Slot::GoalDeadline => "goal_deadline",
        }
    }

    pub fn is_amount(&self) -> bool {
        matches!(self, Slot::TransactionAmount | Slot::GoalAmount)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    AddTransaction,
    AddCategory,
    AddGoal,
    QuickStats,
    QueryTransactions,
    List,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    ChatResponse,
    NeedMoreInfo,
    ConfirmAddTransaction,
    ConfirmAddCategory,
    ConfirmAddGoal,
}

impl ActionKind {
    pub fn is_confirmation(&self) -> bool {
        matches!(
            self,
            ActionKind::ConfirmAddTransaction
                | ActionKind::ConfirmAddCategory
                | ActionKind::ConfirmAddGoal
        )
    }
}

//
// ================= Drafts =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDraft {
    pub name: String,
    pub amount: Option<Amount>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub account_guess: Option<String>,
    pub category_guess: Option<String>,
    pub date: Option<NaiveDate>,
}

impl TransactionDraft {
    pub fn new(name: impl Into<String>, kind: TransactionType) -> Self {
        Self {
            name: name.into(),
            amount: None,
            kind,
            account_guess: None,
            category_guess: None,
            date: None,
        }
    }

    /// First required field still missing
    pub fn missing_slot(&self) -> Option<Slot> {
        if self.amount.is_none() {
            Some(Slot::TransactionAmount)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GoalDraft {
    pub name: String,
    pub target_amount: Option<Amount>,
    pub deadline: Option<NaiveDate>,
}

impl GoalDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_amount: None,
            deadline: None,
        }
    }

    /// Amount is asked before deadline
    pub fn missing_slot(&self) -> Option<Slot> {
        if self.target_amount.is_none() {
            Some(Slot::GoalAmount)
        } else if self.deadline.is_none() {
            Some(Slot::GoalDeadline)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StatsQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub kind: Option<TransactionType>,
    pub limit: usize,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self { kind: None, limit: 5 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListTarget {
    Accounts,
    Categories,
    Goals,
}

//
// ================= Intent =================
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    AddTransaction(TransactionDraft),
    AddCategory(CategoryDraft),
    AddGoal(GoalDraft),
    QuickStats(StatsQuery),
    QueryTransactions(TransactionQuery),
    List(ListTarget),
    Unknown { reply: Option<String> },
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::AddTransaction(_) => IntentKind::AddTransaction,
            Intent::AddCategory(_) => IntentKind::AddCategory,
            Intent::AddGoal(_) => IntentKind::AddGoal,
            Intent::QuickStats(_) => IntentKind::QuickStats,
            Intent::QueryTransactions(_) => IntentKind::QueryTransactions,
            Intent::List(_) => IntentKind::List,
            Intent::Unknown { .. } => IntentKind::Unknown,
        }
    }

    pub fn unknown() -> Self {
        Intent::Unknown { reply: None }
    }
}

//
// ================= Confirmation Payloads =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionConfirmation {
    pub name: String,
    pub amount: Amount,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub account: Option<String>,
    pub category: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryConfirmation {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GoalConfirmation {
    pub name: String,
    pub target_amount: Amount,
    pub deadline: NaiveDate,
}

/// Structured payload attached to an action result
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ActionData {
    Transaction(TransactionConfirmation),
    Category(CategoryConfirmation),
    Goal(GoalConfirmation),
    PendingTransaction(TransactionDraft),
    PendingGoal(GoalDraft),
    Stats(SummaryStats),
}

//
// ================= Action Result =================
//

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub response_text: String,
    pub action: ActionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ActionData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_for: Option<Slot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_id: Option<String>,
}

impl ActionResult {
    pub fn chat(text: impl Into<String>) -> Self {
        Self {
            response_text: text.into(),
            action: ActionKind::ChatResponse,
            data: None,
            waiting_for: None,
            confirmation_id: None,
        }
    }

    pub fn need_more_info(text: impl Into<String>, slot: Slot, pending: ActionData) -> Self {
        Self {
            response_text: text.into(),
            action: ActionKind::NeedMoreInfo,
            data: Some(pending),
            waiting_for: Some(slot),
            confirmation_id: None,
        }
    }

    pub fn with_data(mut self, data: ActionData) -> Self {
        self.data = Some(data);
        self
    }
}

//
// ================= Finance Records =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub account_id: Uuid,
    pub name: String,
    pub account_type: String,
    pub bank_name: Option<String>,
    pub balance: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub category_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub name: String,
    pub amount: Amount,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub account: Option<String>,
    pub category: Option<String>,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavingsGoal {
    pub goal_id: Uuid,
    pub name: String,
    pub target_amount: Amount,
    pub current_amount: Amount,
    pub deadline: NaiveDate,
}

/// Read-only snapshot used to enrich the remote prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub categories: Vec<Category>,
    pub accounts: Vec<Account>,
    pub recent_transactions: Vec<Transaction>,
    pub current_date: NaiveDate,
}

impl UserContext {
    pub fn empty(current_date: NaiveDate) -> Self {
        Self {
            categories: Vec::new(),
            accounts: Vec::new(),
            recent_transactions: Vec::new(),
            current_date,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_income: Amount,
    pub total_expense: Amount,
    pub cash_flow: Amount,
}

/// Format an amount the Vietnamese way: `1.500.000đ`
pub fn format_vnd(amount: Amount) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if amount < 0 {
        format!("-{}đ", grouped)
    } else {
        format!("{}đ", grouped)
    }
}

/// Format a date the way users write it: `31/12/2026`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
