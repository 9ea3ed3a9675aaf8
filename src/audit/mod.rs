//! Confirmation fingerprints and commit log
//!
//! Every confirmation payload carries a content hash. The confirm endpoint
//! recomputes it so a client cannot commit a payload the assistant never
//! proposed.

use crate::models::ActionKind;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A committed confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    pub record_id: Uuid,
    pub user_id: Uuid,
    pub action: ActionKind,
    pub confirmation_id: String,
    pub entity_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Commit trail storage
pub struct ConfirmationLog {
    records: Arc<RwLock<HashMap<Uuid, ConfirmationRecord>>>,
}

impl ConfirmationLog {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn record(
        &self,
        user_id: Uuid,
        action: ActionKind,
        confirmation_id: String,
        entity_id: Uuid,
    ) -> Result<Uuid> {
        let record = ConfirmationRecord {
            record_id: Uuid::new_v4(),
            user_id,
            action,
            confirmation_id,
            entity_id,
            created_at: Utc::now(),
        };

        let record_id = record.record_id;
        let mut records = self.records.write().await;
        records.insert(record_id, record);
        Ok(record_id)
    }

    /// All records for a user (sorted by created_at)
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ConfirmationRecord>> {
        let records = self.records.read().await;

        let mut items: Vec<_> = records
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();

        items.sort_by_key(|record| record.created_at);

        Ok(items)
    }
}

impl Default for ConfirmationLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 of `action` + the JSON form of `payload`, hex-encoded.
/// Identical payloads always hash identically.
pub fn compute_fingerprint<T: Serialize>(action: ActionKind, payload: &T) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), &action).is_err()
        || serde_json::to_writer(&mut HashWriter(&mut hasher), payload).is_err()
    {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Check a client-supplied id against the payload it claims to confirm
pub fn verify_fingerprint<T: Serialize>(action: ActionKind, payload: &T, claimed: &str) -> bool {
    let expected = compute_fingerprint(action, payload);
    !expected.is_empty() && expected == claimed
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
