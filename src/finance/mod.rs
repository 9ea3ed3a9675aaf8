//! Finance data boundary
//!
//! Read access for prompt context, statistics and listings, plus the entity
//! creators used by the explicit confirm path. The dialogue engine itself
//! only ever reads.

use crate::models::{
    Account, Category, CategoryConfirmation, GoalConfirmation, SavingsGoal, SummaryStats,
    Transaction, TransactionConfirmation, TransactionQuery, TransactionType, UserContext,
};
use crate::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod postgres;
pub use postgres::PgFinanceStore;

/// Recent transactions embedded in the prompt context
pub const CONTEXT_RECENT_TRANSACTIONS: usize = 5;

#[async_trait::async_trait]
pub trait FinanceStore: Send + Sync {
    async fn user_context(&self, user_id: Uuid, today: NaiveDate) -> Result<UserContext>;

    /// Totals over `[start, end]`, both inclusive
    async fn summary_stats(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SummaryStats>;

    /// Most recent first
    async fn list_transactions(&self, user_id: Uuid, query: TransactionQuery) -> Result<Vec<Transaction>>;
    async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<Account>>;
    async fn list_categories(&self, user_id: Uuid) -> Result<Vec<Category>>;
    async fn list_goals(&self, user_id: Uuid) -> Result<Vec<SavingsGoal>>;

    async fn create_transaction(&self, user_id: Uuid, input: TransactionConfirmation) -> Result<Transaction>;
    async fn create_category(&self, user_id: Uuid, input: CategoryConfirmation) -> Result<Category>;
    async fn create_goal(&self, user_id: Uuid, input: GoalConfirmation) -> Result<SavingsGoal>;
}

#[derive(Default, Clone)]
struct UserLedger {
    accounts: Vec<Account>,
    categories: Vec<Category>,
    transactions: Vec<Transaction>,
    goals: Vec<SavingsGoal>,
}

/// In-memory finance store for development and tests
pub struct InMemoryFinanceStore {
    ledgers: Arc<RwLock<HashMap<Uuid, UserLedger>>>,
}

impl InMemoryFinanceStore {
    pub fn new() -> Self {
        Self {
            ledgers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register an account (accounts are managed outside the chat flow)
    pub async fn add_account(
        &self,
        user_id: Uuid,
        name: &str,
        account_type: &str,
        bank_name: Option<&str>,
    ) -> Account {
        let account = Account {
            account_id: Uuid::new_v4(),
            name: name.to_string(),
            account_type: account_type.to_string(),
            bank_name: bank_name.map(str::to_string),
            balance: 0,
        };

        let mut ledgers = self.ledgers.write().await;
        ledgers
            .entry(user_id)
            .or_default()
            .accounts
            .push(account.clone());

        account
    }
}

impl Default for InMemoryFinanceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FinanceStore for InMemoryFinanceStore {
    async fn user_context(&self, user_id: Uuid, today: NaiveDate) -> Result<UserContext> {
        let ledgers = self.ledgers.read().await;
        let Some(ledger) = ledgers.get(&user_id) else {
            return Ok(UserContext::empty(today));
        };

        let mut recent = ledger.transactions.clone();
        recent.sort_by(|a, b| b.date.cmp(&a.date));
        recent.truncate(CONTEXT_RECENT_TRANSACTIONS);

        Ok(UserContext {
            categories: ledger.categories.clone(),
            accounts: ledger.accounts.clone(),
            recent_transactions: recent,
            current_date: today,
        })
    }

    async fn summary_stats(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SummaryStats> {
        let ledgers = self.ledgers.read().await;
        let mut stats = SummaryStats::default();

        if let Some(ledger) = ledgers.get(&user_id) {
            for t in ledger
                .transactions
                .iter()
                .filter(|t| t.date >= start && t.date <= end)
            {
                match t.kind {
                    TransactionType::Income => stats.total_income += t.amount,
                    TransactionType::Expense => stats.total_expense += t.amount,
                }
            }
        }

        stats.cash_flow = stats.total_income - stats.total_expense;
        Ok(stats)
    }

    async fn list_transactions(&self, user_id: Uuid, query: TransactionQuery) -> Result<Vec<Transaction>> {
        let ledgers = self.ledgers.read().await;

        let mut items: Vec<Transaction> = ledgers
            .get(&user_id)
            .map(|l| l.transactions.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|t| query.kind.map_or(true, |k| t.kind == k))
            .collect();

        // reversed first so the stable sort puts same-day entries newest first
        items.reverse();
        items.sort_by(|a, b| b.date.cmp(&a.date));
        items.truncate(query.limit);

        Ok(items)
    }

    async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<Account>> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers.get(&user_id).map(|l| l.accounts.clone()).unwrap_or_default())
    }

    async fn list_categories(&self, user_id: Uuid) -> Result<Vec<Category>> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers.get(&user_id).map(|l| l.categories.clone()).unwrap_or_default())
    }

    async fn list_goals(&self, user_id: Uuid) -> Result<Vec<SavingsGoal>> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers.get(&user_id).map(|l| l.goals.clone()).unwrap_or_default())
    }

    async fn create_transaction(&self, user_id: Uuid, input: TransactionConfirmation) -> Result<Transaction> {
        let transaction = Transaction {
            transaction_id: Uuid::new_v4(),
            name: input.name,
            amount: input.amount,
            kind: input.kind,
            account: input.account,
            category: input.category,
            date: input.date,
        };

        let mut ledgers = self.ledgers.write().await;
        ledgers
            .entry(user_id)
            .or_default()
            .transactions
            .push(transaction.clone());

        Ok(transaction)
    }

    async fn create_category(&self, user_id: Uuid, input: CategoryConfirmation) -> Result<Category> {
        let category = Category {
            category_id: Uuid::new_v4(),
            name: input.name,
            kind: input.kind,
            icon: input.icon,
        };

        let mut ledgers = self.ledgers.write().await;
        ledgers
            .entry(user_id)
            .or_default()
            .categories
            .push(category.clone());

        Ok(category)
    }

    async fn create_goal(&self, user_id: Uuid, input: GoalConfirmation) -> Result<SavingsGoal> {
        let goal = SavingsGoal {
            goal_id: Uuid::new_v4(),
            name: input.name,
            target_amount: input.target_amount,
            current_amount: 0,
            deadline: input.deadline,
        };

        let mut ledgers = self.ledgers.write().await;
        ledgers.entry(user_id).or_default().goals.push(goal.clone());

        Ok(goal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn tx(name: &str, amount: i64, kind: TransactionType, date: NaiveDate) -> TransactionConfirmation {
        TransactionConfirmation {
            name: name.to_string(),
            amount,
            kind,
            account: None,
            category: None,
            date,
        }
    }

    #[tokio::test]
    async fn test_summary_stats_window() {
        let store = InMemoryFinanceStore::new();
        let user = Uuid::new_v4();

        store.create_transaction(user, tx("Lương", 15_000_000, TransactionType::Income, d(2026, 10, 5))).await.unwrap();
        store.create_transaction(user, tx("Ăn sáng", 50_000, TransactionType::Expense, d(2026, 10, 6))).await.unwrap();
        store.create_transaction(user, tx("Tiền nhà", 5_000_000, TransactionType::Expense, d(2026, 9, 30))).await.unwrap();

        let stats = store.summary_stats(user, d(2026, 10, 1), d(2026, 10, 31)).await.unwrap();
        assert_eq!(stats.total_income, 15_000_000);
        assert_eq!(stats.total_expense, 50_000);
        assert_eq!(stats.cash_flow, 14_950_000);
    }

    #[tokio::test]
    async fn test_list_transactions_newest_first_with_filter() {
        let store = InMemoryFinanceStore::new();
        let user = Uuid::new_v4();

        store.create_transaction(user, tx("A", 1_000, TransactionType::Expense, d(2026, 10, 1))).await.unwrap();
        store.create_transaction(user, tx("B", 2_000, TransactionType::Income, d(2026, 10, 3))).await.unwrap();
        store.create_transaction(user, tx("C", 3_000, TransactionType::Expense, d(2026, 10, 2))).await.unwrap();

        let all = store.list_transactions(user, TransactionQuery::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C", "A"]);

        let expenses = store
            .list_transactions(user, TransactionQuery { kind: Some(TransactionType::Expense), limit: 1 })
            .await
            .unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(expenses[0].name, "C");
    }

    #[tokio::test]
    async fn test_user_context() {
        let store = InMemoryFinanceStore::new();
        let user = Uuid::new_v4();
        let today = d(2026, 10, 19);

        assert!(store.user_context(user, today).await.unwrap().accounts.is_empty());

        store.add_account(user, "Ví", "CASH", None).await;
        for i in 0..8 {
            store.create_transaction(user, tx("x", 1_000 + i, TransactionType::Expense, today)).await.unwrap();
        }

        let ctx = store.user_context(user, today).await.unwrap();
        assert_eq!(ctx.accounts.len(), 1);
        assert_eq!(ctx.recent_transactions.len(), CONTEXT_RECENT_TRANSACTIONS);
        assert_eq!(ctx.current_date, today);
    }
}
