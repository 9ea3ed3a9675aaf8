//! Conversation engine - implements the dialogue loop
//!
//! MESSAGE → LOCK → PENDING SLOT? → FOLLOW-UP
//!                              └→ LOCAL → REMOTE → FALLBACK → DISPATCH → TRANSITION
//!
//! Every path ends in an [`ActionResult`]; errors are logged and turned
//! into a reply, never surfaced to the caller.

use crate::audit::{verify_fingerprint, ConfirmationLog, ConfirmationRecord};
use crate::config::AssistantConfig;
use crate::dispatcher::{Dispatch, Dispatcher, Transition};
use crate::error::AssistantError;
use crate::extract::{extract_amount, DateExtractor};
use crate::fallback::{FallbackResponder, HELP_MESSAGE};
use crate::finance::{FinanceStore, InMemoryFinanceStore, PgFinanceStore};
use crate::gemini::GeminiClient;
use crate::matcher::{normalize, LocalMatcher};
use crate::models::{
    format_date, format_vnd, ActionData, ActionKind, ActionResult, CategoryConfirmation,
    GoalConfirmation, Intent, Slot, TransactionConfirmation, UserContext,
};
use crate::parser::RemoteIntentParser;
use crate::state::{ConversationState, InMemoryStateStore, PendingDraft, StateStore, UserLocks};
use crate::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const CANCEL_WORDS: &[&str] = &["hủy", "huỷ", "thôi", "cancel", "bỏ qua"];

const APOLOGY: &str = "Xin lỗi, đã có lỗi xảy ra. Vui lòng thử lại từ đầu.";
const MALFORMED_REPLY: &str =
    "Xin lỗi, mình chưa hiểu rõ yêu cầu của bạn. Bạn có thể diễn đạt lại không?";
const CANCELLED: &str = "Đã hủy thao tác đang chờ.";
const NOTHING_TO_CANCEL: &str = "Không có thao tác nào đang chờ để hủy.";

/// Outcome of an explicit confirm call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Committed {
    pub action: ActionKind,
    pub entity_id: Uuid,
    pub record_id: Uuid,
    pub response_text: String,
}

/// Per-user dialogue engine over injectable stores
pub struct Assistant {
    states: Arc<dyn StateStore>,
    finance: Arc<dyn FinanceStore>,
    parser: Option<RemoteIntentParser>,
    dispatcher: Dispatcher,
    fallback: FallbackResponder,
    dates: DateExtractor,
    locks: UserLocks,
    confirmations: ConfirmationLog,
}

impl Assistant {
    /// Without a parser every unmatched message goes straight to the fallback
    pub fn new(states: Arc<dyn StateStore>, finance: Arc<dyn FinanceStore>) -> Self {
        let dates = DateExtractor::default();
        Self {
            states,
            dispatcher: Dispatcher::new(finance.clone()),
            finance,
            parser: None,
            fallback: FallbackResponder::new(dates),
            dates,
            locks: UserLocks::new(),
            confirmations: ConfirmationLog::new(),
        }
    }

    /// Wire stores and the model from configuration: Postgres when a
    /// database URL is set, Gemini when an API key is set.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let finance: Arc<dyn FinanceStore> = match &config.database_url {
            Some(url) => Arc::new(PgFinanceStore::connect_lazy(url)?),
            None => {
                info!("Finance store backend: in-memory");
                Arc::new(InMemoryFinanceStore::new())
            }
        };

        let assistant = Self::new(Arc::new(InMemoryStateStore::new()), finance);

        match &config.gemini_api_key {
            Some(key) => {
                let model = GeminiClient::new(key.clone(), &config.gemini_model)?;
                info!(model = %config.gemini_model, "Remote intent parser enabled");
                Ok(assistant.with_parser(RemoteIntentParser::new(Arc::new(model), config.retry)))
            }
            None => {
                warn!("GEMINI_API_KEY not set: remote parser disabled, using local and fallback matching only");
                Ok(assistant)
            }
        }
    }

    pub fn with_parser(mut self, parser: RemoteIntentParser) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn with_date_extractor(mut self, dates: DateExtractor) -> Self {
        self.dates = dates;
        self.fallback = FallbackResponder::new(dates);
        self
    }

    pub fn has_remote_parser(&self) -> bool {
        self.parser.is_some()
    }

    /// Single entry point: handle one chat message
    pub async fn process_message(&self, text: &str, user_id: Uuid) -> ActionResult {
        self.process_message_on(text, user_id, Local::now().date_naive())
            .await
    }

    /// [`Assistant::process_message`] against an explicit "today"
    pub async fn process_message_on(&self, text: &str, user_id: Uuid, today: NaiveDate) -> ActionResult {
        let _guard = self.locks.acquire(user_id).await;

        let message = text.trim();
        info!(user_id = %user_id, chars = message.chars().count(), "Assistant: message received");

        if message.is_empty() {
            return ActionResult::chat(HELP_MESSAGE);
        }

        let pending = match self.states.load(user_id).await {
            Ok(pending) => pending,
            Err(e) => {
                error!(user_id = %user_id, "Failed to load conversation state: {}", e);
                return ActionResult::chat(APOLOGY);
            }
        };

        let cancel = is_cancel(message);

        if let Some(state) = pending {
            if cancel {
                info!(user_id = %user_id, slot = ?state.waiting_for, "Pending dialogue cancelled");
                return match self.states.clear(user_id).await {
                    Ok(()) => ActionResult::chat(CANCELLED),
                    Err(e) => {
                        error!(user_id = %user_id, "Failed to clear state: {}", e);
                        ActionResult::chat(APOLOGY)
                    }
                };
            }

            return match self.handle_follow_up(message, user_id, state, today).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(user_id = %user_id, "Follow-up failed, resetting dialogue: {}", e);
                    if let Err(clear_err) = self.states.clear(user_id).await {
                        error!(user_id = %user_id, "Failed to clear state: {}", clear_err);
                    }
                    ActionResult::chat(APOLOGY)
                }
            };
        }

        if cancel {
            return ActionResult::chat(NOTHING_TO_CANCEL);
        }

        match self.handle_new_message(message, user_id, today).await {
            Ok(result) => result,
            Err(e) => {
                error!(user_id = %user_id, "Message handling failed: {}", e);
                ActionResult::chat(APOLOGY)
            }
        }
    }

    /// Drop any pending dialogue for `user_id`
    pub async fn reset(&self, user_id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(user_id).await;
        self.states.clear(user_id).await
    }

    pub async fn pending_state(&self, user_id: Uuid) -> Result<Option<ConversationState>> {
        self.states.load(user_id).await
    }

    /// Synchronous matching, then dispatch. `None` defers to the remote parser.
    pub async fn try_local_processing(
        &self,
        message: &str,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<Dispatch>> {
        let Some(intent) = LocalMatcher::classify(message, today) else {
            return Ok(None);
        };

        debug!(user_id = %user_id, intent = ?intent.kind(), "Local matcher hit");
        self.dispatcher.handle(intent, user_id, today).await.map(Some)
    }

    /// Heuristic handling when the remote parser is unavailable.
    /// `None` means nothing matched; the caller replies with the help text.
    pub async fn handle_fallback(
        &self,
        message: &str,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<Option<Dispatch>> {
        let Some(intent) = self.fallback.classify(message, today) else {
            return Ok(None);
        };

        debug!(user_id = %user_id, intent = ?intent.kind(), "Fallback matched");
        self.dispatcher.handle(intent, user_id, today).await.map(Some)
    }

    async fn handle_new_message(&self, message: &str, user_id: Uuid, today: NaiveDate) -> Result<ActionResult> {
        if let Some(dispatch) = self.try_local_processing(message, user_id, today).await? {
            return self.finish(user_id, dispatch).await;
        }

        let Some(parser) = &self.parser else {
            debug!(user_id = %user_id, "No remote parser configured, using fallback");
            return self.fallback_or_help(message, user_id, today).await;
        };

        let context = match self.finance.user_context(user_id, today).await {
            Ok(context) => context,
            Err(e) => {
                warn!(user_id = %user_id, "User context unavailable, prompting without it: {}", e);
                UserContext::empty(today)
            }
        };

        let intent = match parser.parse(message, &context).await {
            Ok(intent) => intent,
            Err(e) if e.is_malformed_output() => {
                warn!(user_id = %user_id, "Unusable model output: {}", e);
                Intent::Unknown {
                    reply: Some(MALFORMED_REPLY.to_string()),
                }
            }
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    overload = e.is_overload(),
                    "Remote parser failed, using fallback: {}",
                    e
                );
                return self.fallback_or_help(message, user_id, today).await;
            }
        };

        let dispatch = self.dispatcher.handle(intent, user_id, today).await?;
        self.finish(user_id, dispatch).await
    }

    async fn fallback_or_help(&self, message: &str, user_id: Uuid, today: NaiveDate) -> Result<ActionResult> {
        match self.handle_fallback(message, user_id, today).await? {
            Some(dispatch) => self.finish(user_id, dispatch).await,
            None => Ok(ActionResult::chat(HELP_MESSAGE)),
        }
    }

    async fn handle_follow_up(
        &self,
        message: &str,
        user_id: Uuid,
        state: ConversationState,
        today: NaiveDate,
    ) -> Result<ActionResult> {
        debug!(user_id = %user_id, slot = ?state.waiting_for, "Handling follow-up");

        let intent = match self.fill_slot(message, &state, today) {
            Ok(intent) => intent,
            Err(AssistantError::Extraction(reason)) => {
                debug!(user_id = %user_id, slot = ?state.waiting_for, "Slot not filled: {}", reason);
                return Ok(reask(state));
            }
            Err(e) => return Err(e),
        };

        let dispatch = self.dispatcher.handle(intent, user_id, today).await?;
        self.finish(user_id, dispatch).await
    }

    /// Merge the answer into the pending draft
    fn fill_slot(&self, message: &str, state: &ConversationState, today: NaiveDate) -> Result<Intent> {
        match (&state.pending, state.waiting_for) {
            (PendingDraft::AddTransaction(draft), Slot::TransactionAmount) => {
                let mut draft = draft.clone();
                draft.amount = Some(
                    extract_amount(message)
                        .ok_or_else(|| AssistantError::Extraction("no amount in reply".into()))?,
                );
                Ok(Intent::AddTransaction(draft))
            }
            (PendingDraft::AddGoal(draft), Slot::GoalAmount) => {
                let mut draft = draft.clone();
                draft.target_amount = Some(
                    extract_amount(message)
                        .ok_or_else(|| AssistantError::Extraction("no amount in reply".into()))?,
                );
                Ok(Intent::AddGoal(draft))
            }
            (PendingDraft::AddGoal(draft), Slot::GoalDeadline) => {
                let deadline = self
                    .dates
                    .extract(message, today)
                    .ok_or_else(|| AssistantError::Extraction("no date in reply".into()))?;
                if deadline < today {
                    return Err(AssistantError::Extraction(format!(
                        "deadline {} is in the past",
                        deadline
                    )));
                }

                let mut draft = draft.clone();
                draft.deadline = Some(deadline);
                Ok(Intent::AddGoal(draft))
            }
            (_, slot) => Err(AssistantError::StateError(format!(
                "slot {} does not belong to {:?}",
                slot,
                state.last_intent()
            ))),
        }
    }

    async fn finish(&self, user_id: Uuid, dispatch: Dispatch) -> Result<ActionResult> {
        match dispatch.transition {
            Transition::Idle => self.states.clear(user_id).await?,
            Transition::Await(state) => {
                info!(user_id = %user_id, slot = ?state.waiting_for, "Awaiting slot");
                self.states.save(user_id, state).await?;
            }
        }

        Ok(dispatch.result)
    }

    /// Commit a confirmation the user accepted. The payload must hash to
    /// `confirmation_id`, i.e. be exactly what the assistant proposed.
    pub async fn confirm(
        &self,
        user_id: Uuid,
        action: ActionKind,
        data: Value,
        confirmation_id: &str,
    ) -> Result<Committed> {
        let _guard = self.locks.acquire(user_id).await;

        let (entity_id, response_text) = match action {
            ActionKind::ConfirmAddTransaction => {
                let payload: TransactionConfirmation = serde_json::from_value(data)?;
                ensure_fingerprint(action, &payload, confirmation_id)?;

                let t = self.finance.create_transaction(user_id, payload).await?;
                (
                    t.transaction_id,
                    format!(
                        "Đã thêm {}: {} - {}, ngày {}.",
                        t.kind.label(),
                        t.name,
                        format_vnd(t.amount),
                        format_date(t.date)
                    ),
                )
            }
            ActionKind::ConfirmAddCategory => {
                let payload: CategoryConfirmation = serde_json::from_value(data)?;
                ensure_fingerprint(action, &payload, confirmation_id)?;

                let c = self.finance.create_category(user_id, payload).await?;
                (c.category_id, format!("Đã tạo danh mục \"{}\".", c.name))
            }
            ActionKind::ConfirmAddGoal => {
                let payload: GoalConfirmation = serde_json::from_value(data)?;
                ensure_fingerprint(action, &payload, confirmation_id)?;

                let g = self.finance.create_goal(user_id, payload).await?;
                (
                    g.goal_id,
                    format!(
                        "Đã tạo mục tiêu \"{}\": {} trước ngày {}.",
                        g.name,
                        format_vnd(g.target_amount),
                        format_date(g.deadline)
                    ),
                )
            }
            other => {
                return Err(AssistantError::Validation(format!(
                    "{:?} is not a confirmation action",
                    other
                )))
            }
        };

        let record_id = self
            .confirmations
            .record(user_id, action, confirmation_id.to_string(), entity_id)
            .await?;

        info!(
            user_id = %user_id,
            action = ?action,
            entity_id = %entity_id,
            "Confirmation committed"
        );

        Ok(Committed {
            action,
            entity_id,
            record_id,
            response_text,
        })
    }

    pub async fn confirmations(&self, user_id: Uuid) -> Result<Vec<ConfirmationRecord>> {
        self.confirmations.list_for_user(user_id).await
    }
}

fn is_cancel(message: &str) -> bool {
    let text = normalize(message);
    let text = text.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    let text = text.strip_suffix(" đi").unwrap_or(text);
    CANCEL_WORDS.contains(&text)
}

fn ensure_fingerprint<T: Serialize>(action: ActionKind, payload: &T, claimed: &str) -> Result<()> {
    if verify_fingerprint(action, payload, claimed) {
        Ok(())
    } else {
        Err(AssistantError::Validation(
            "confirmation id does not match payload".to_string(),
        ))
    }
}

/// Same state, example-bearing question
fn reask(state: ConversationState) -> ActionResult {
    let text = if state.waiting_for.is_amount() {
        "Mình chưa nhận ra số tiền. Vui lòng nhập lại, ví dụ: 50k, 2 triệu, 1.500.000đ (hoặc \"hủy\" để bỏ qua)."
    } else {
        "Mình chưa nhận ra thời hạn. Vui lòng nhập lại, ví dụ: cuối năm, tháng 6 năm sau, 31/12/2027 (hoặc \"hủy\" để bỏ qua)."
    };

    let pending = match state.pending {
        PendingDraft::AddTransaction(draft) => ActionData::PendingTransaction(draft),
        PendingDraft::AddGoal(draft) => ActionData::PendingGoal(draft),
    };

    ActionResult::need_more_info(text, state.waiting_for, pending)
}
