//! Conversation state persistence
//!
//! One pending slot-filling dialogue per user. Currently in-memory; the
//! [`StateStore`] trait lets a shared cache replace it without touching the
//! dialogue logic.

use crate::models::{GoalDraft, IntentKind, Slot, TransactionDraft};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

/// Partially collected payload; the variant fixes which fields may exist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "lastIntent", content = "pendingData", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingDraft {
    AddTransaction(TransactionDraft),
    AddGoal(GoalDraft),
}

/// A dialogue waiting for exactly one more field.
/// "No pending slot" is the absence of a stored state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub waiting_for: Slot,
    #[serde(flatten)]
    pub pending: PendingDraft,
}

impl ConversationState {
    pub fn awaiting_transaction(slot: Slot, draft: TransactionDraft) -> Self {
        Self {
            waiting_for: slot,
            pending: PendingDraft::AddTransaction(draft),
        }
    }

    pub fn awaiting_goal(slot: Slot, draft: GoalDraft) -> Self {
        Self {
            waiting_for: slot,
            pending: PendingDraft::AddGoal(draft),
        }
    }

    pub fn last_intent(&self) -> IntentKind {
        match self.pending {
            PendingDraft::AddTransaction(_) => IntentKind::AddTransaction,
            PendingDraft::AddGoal(_) => IntentKind::AddGoal,
        }
    }
}

/// Trait for conversation state persistence
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, user_id: Uuid) -> Result<Option<ConversationState>>;
    async fn save(&self, user_id: Uuid, state: ConversationState) -> Result<()>;
    async fn clear(&self, user_id: Uuid) -> Result<()>;
}

/// In-memory state store; restarts drop pending dialogues
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<Uuid, ConversationState>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.states.read().await.len()
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self, user_id: Uuid) -> Result<Option<ConversationState>> {
        let states = self.states.read().await;
        Ok(states.get(&user_id).cloned())
    }

    async fn save(&self, user_id: Uuid, state: ConversationState) -> Result<()> {
        let mut states = self.states.write().await;
        states.insert(user_id, state);
        Ok(())
    }

    async fn clear(&self, user_id: Uuid) -> Result<()> {
        let mut states = self.states.write().await;
        states.remove(&user_id);
        Ok(())
    }
}

/// Per-user async mutexes serialising state transitions.
/// Different users never contend.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`'s dialogue
    pub async fn acquire(&self, user_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;

            // drop entries nobody is holding or waiting on
            locks.retain(|id, l| *id == user_id || Arc::strong_count(l) > 1);

            locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }
}
