//! Postgres-backed finance store

use super::{FinanceStore, CONTEXT_RECENT_TRANSACTIONS};
use crate::error::AssistantError;
use crate::models::{
    Account, Category, CategoryConfirmation, GoalConfirmation, SavingsGoal, SummaryStats,
    Transaction, TransactionConfirmation, TransactionQuery, TransactionType, UserContext,
};
use crate::Result;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS finance_accounts (
      account_id UUID PRIMARY KEY,
      user_id UUID NOT NULL,
      name TEXT NOT NULL,
      account_type TEXT NOT NULL,
      bank_name TEXT,
      balance BIGINT NOT NULL DEFAULT 0
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS finance_categories (
      category_id UUID PRIMARY KEY,
      user_id UUID NOT NULL,
      name TEXT NOT NULL,
      kind TEXT NOT NULL,
      icon TEXT
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS finance_transactions (
      transaction_id UUID PRIMARY KEY,
      user_id UUID NOT NULL,
      name TEXT NOT NULL,
      amount BIGINT NOT NULL,
      kind TEXT NOT NULL,
      account TEXT,
      category TEXT,
      tx_date DATE NOT NULL,
      created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_finance_transactions_user_date
    ON finance_transactions (user_id, tx_date DESC);
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS finance_goals (
      goal_id UUID PRIMARY KEY,
      user_id UUID NOT NULL,
      name TEXT NOT NULL,
      target_amount BIGINT NOT NULL,
      current_amount BIGINT NOT NULL DEFAULT 0,
      deadline DATE NOT NULL
    );
    "#,
];

pub struct PgFinanceStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PgFinanceStore {
    /// Lazy pool: no connection is opened until the first query
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(database_url)
            .map_err(|e| {
                AssistantError::DatabaseError(format!("Failed to create postgres pool: {}", e))
            })?;

        info!("Finance store backend: postgres");

        Ok(Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                for statement in SCHEMA {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AssistantError::DatabaseError(format!(
                    "Failed to initialize finance schema: {}",
                    e
                ))
            })?;

        Ok(())
    }
}

fn parse_kind(raw: &str) -> Result<TransactionType> {
    TransactionType::parse(raw)
        .ok_or_else(|| AssistantError::DatabaseError(format!("Unknown transaction kind: {}", raw)))
}

fn row_to_transaction(row: &PgRow) -> Result<Transaction> {
    let kind: String = row.try_get("kind")?;
    Ok(Transaction {
        transaction_id: row.try_get("transaction_id")?,
        name: row.try_get("name")?,
        amount: row.try_get("amount")?,
        kind: parse_kind(&kind)?,
        account: row.try_get("account")?,
        category: row.try_get("category")?,
        date: row.try_get("tx_date")?,
    })
}

fn row_to_category(row: &PgRow) -> Result<Category> {
    let kind: String = row.try_get("kind")?;
    Ok(Category {
        category_id: row.try_get("category_id")?,
        name: row.try_get("name")?,
        kind: parse_kind(&kind)?,
        icon: row.try_get("icon")?,
    })
}

fn row_to_account(row: &PgRow) -> Result<Account> {
    Ok(Account {
        account_id: row.try_get("account_id")?,
        name: row.try_get("name")?,
        account_type: row.try_get("account_type")?,
        bank_name: row.try_get("bank_name")?,
        balance: row.try_get("balance")?,
    })
}

fn row_to_goal(row: &PgRow) -> Result<SavingsGoal> {
    Ok(SavingsGoal {
        goal_id: row.try_get("goal_id")?,
        name: row.try_get("name")?,
        target_amount: row.try_get("target_amount")?,
        current_amount: row.try_get("current_amount")?,
        deadline: row.try_get("deadline")?,
    })
}

#[async_trait::async_trait]
impl FinanceStore for PgFinanceStore {
    async fn user_context(&self, user_id: Uuid, today: NaiveDate) -> Result<UserContext> {
        let categories = self.list_categories(user_id).await?;
        let accounts = self.list_accounts(user_id).await?;
        let recent_transactions = self
            .list_transactions(
                user_id,
                TransactionQuery {
                    kind: None,
                    limit: CONTEXT_RECENT_TRANSACTIONS,
                },
            )
            .await?;

        Ok(UserContext {
            categories,
            accounts,
            recent_transactions,
            current_date: today,
        })
    }

    async fn summary_stats(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SummaryStats> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT
              COALESCE(SUM(CASE WHEN kind = 'THUNHAP' THEN amount ELSE 0 END), 0)::BIGINT AS total_income,
              COALESCE(SUM(CASE WHEN kind = 'CHITIEU' THEN amount ELSE 0 END), 0)::BIGINT AS total_expense
            FROM finance_transactions
            WHERE user_id = $1 AND tx_date BETWEEN $2 AND $3
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        let total_income: i64 = row.try_get("total_income")?;
        let total_expense: i64 = row.try_get("total_expense")?;

        Ok(SummaryStats {
            total_income,
            total_expense,
            cash_flow: total_income - total_expense,
        })
    }

    async fn list_transactions(&self, user_id: Uuid, query: TransactionQuery) -> Result<Vec<Transaction>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT transaction_id, name, amount, kind, account, category, tx_date
            FROM finance_transactions
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR kind = $2)
            ORDER BY tx_date DESC, created_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(query.kind.map(|k| k.as_str()))
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<Account>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            "SELECT account_id, name, account_type, bank_name, balance FROM finance_accounts WHERE user_id = $1 ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_account).collect()
    }

    async fn list_categories(&self, user_id: Uuid) -> Result<Vec<Category>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            "SELECT category_id, name, kind, icon FROM finance_categories WHERE user_id = $1 ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_category).collect()
    }

    async fn list_goals(&self, user_id: Uuid) -> Result<Vec<SavingsGoal>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            "SELECT goal_id, name, target_amount, current_amount, deadline FROM finance_goals WHERE user_id = $1 ORDER BY deadline",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_goal).collect()
    }

    async fn create_transaction(&self, user_id: Uuid, input: TransactionConfirmation) -> Result<Transaction> {
        self.ensure_schema().await?;

        let transaction = Transaction {
            transaction_id: Uuid::new_v4(),
            name: input.name,
            amount: input.amount,
            kind: input.kind,
            account: input.account,
            category: input.category,
            date: input.date,
        };

        sqlx::query(
            r#"
            INSERT INTO finance_transactions
              (transaction_id, user_id, name, amount, kind, account, category, tx_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(transaction.transaction_id)
        .bind(user_id)
        .bind(&transaction.name)
        .bind(transaction.amount)
        .bind(transaction.kind.as_str())
        .bind(&transaction.account)
        .bind(&transaction.category)
        .bind(transaction.date)
        .execute(&self.pool)
        .await?;

        Ok(transaction)
    }

    async fn create_category(&self, user_id: Uuid, input: CategoryConfirmation) -> Result<Category> {
        self.ensure_schema().await?;

        let category = Category {
            category_id: Uuid::new_v4(),
            name: input.name,
            kind: input.kind,
            icon: input.icon,
        };

        sqlx::query(
            "INSERT INTO finance_categories (category_id, user_id, name, kind, icon) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(category.category_id)
        .bind(user_id)
        .bind(&category.name)
        .bind(category.kind.as_str())
        .bind(&category.icon)
        .execute(&self.pool)
        .await?;

        Ok(category)
    }

    async fn create_goal(&self, user_id: Uuid, input: GoalConfirmation) -> Result<SavingsGoal> {
        self.ensure_schema().await?;

        let goal = SavingsGoal {
            goal_id: Uuid::new_v4(),
            name: input.name,
            target_amount: input.target_amount,
            current_amount: 0,
            deadline: input.deadline,
        };

        sqlx::query(
            r#"
            INSERT INTO finance_goals (goal_id, user_id, name, target_amount, current_amount, deadline)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(goal.goal_id)
        .bind(user_id)
        .bind(&goal.name)
        .bind(goal.target_amount)
        .bind(goal.current_amount)
        .bind(goal.deadline)
        .execute(&self.pool)
        .await?;

        Ok(goal)
    }
}
