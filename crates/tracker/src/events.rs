//! Inbound event classification and dispatch.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{Result, TrackerError};
use crate::roster::Roster;
use crate::sink::NotificationSink;
use crate::tracker::{
    CompletionReceipt, IndexEntry, ReplyOutcome, StartOutcome, StreakSet, Tracker, UndoReceipt,
};

/// An event from the chat transport.
///
/// ```json
/// {"user_id": 1, "chat_id": 10, "handle": "anna", "type": "text", "text": "Anna"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub user_id: i64,
    pub chat_id: i64,
    /// Transport username of the sender, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(flatten)]
    pub action: Action,
}

/// What the sender asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Start,
    Join,
    MarkCompletion,
    MarkYesterday,
    Undo,
    List,
    ParticipantIndex,
    SetStreak { target_user_id: i64, days: u32 },
    RequestCustomStreak { target_user_id: i64 },
    /// Free text that matched no command.
    Text { text: String },
}

impl Action {
    /// Operation name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Join => "join",
            Action::MarkCompletion => "mark_completion",
            Action::MarkYesterday => "mark_yesterday",
            Action::Undo => "undo",
            Action::List => "list",
            Action::ParticipantIndex => "participant_index",
            Action::SetStreak { .. } => "set_streak",
            Action::RequestCustomStreak { .. } => "request_custom_streak",
            Action::Text { .. } => "text",
        }
    }
}

/// Structured result of a dispatched event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum Outcome {
    Start(StartOutcome),
    AwaitingName,
    Completed(CompletionReceipt),
    Undone(UndoReceipt),
    Roster(Roster),
    ParticipantIndex(Vec<IndexEntry>),
    StreakSet(StreakSet),
    AwaitingCustomStreak { target_user_id: i64 },
    Reply(ReplyOutcome),
}

impl<S: NotificationSink> Tracker<S> {
    /// Route `event` to its operation.
    ///
    /// Errors are logged with the operation, user and chat before being
    /// returned to the caller.
    pub async fn dispatch(&self, event: &InboundEvent) -> Result<Outcome> {
        let InboundEvent {
            user_id,
            chat_id,
            ref handle,
            ref action,
        } = *event;

        let result = match action {
            Action::Start => self.handle_start(user_id, chat_id).await.map(Outcome::Start),
            Action::Join => self
                .handle_join_request(user_id, chat_id)
                .await
                .map(|()| Outcome::AwaitingName),
            Action::MarkCompletion => self
                .handle_mark_completion(user_id, chat_id)
                .await
                .map(Outcome::Completed),
            Action::MarkYesterday => self
                .handle_mark_yesterday(user_id, chat_id)
                .await
                .map(Outcome::Completed),
            Action::Undo => self.handle_undo(user_id, chat_id).await.map(Outcome::Undone),
            Action::List => self
                .handle_list_request(user_id, chat_id)
                .await
                .map(Outcome::Roster),
            Action::ParticipantIndex => self
                .handle_participant_index(user_id, chat_id)
                .await
                .map(Outcome::ParticipantIndex),
            Action::SetStreak {
                target_user_id,
                days,
            } => self
                .handle_admin_set_streak(user_id, chat_id, *target_user_id, *days)
                .await
                .map(Outcome::StreakSet),
            Action::RequestCustomStreak { target_user_id } => self
                .handle_admin_custom_streak_request(user_id, chat_id, *target_user_id)
                .await
                .map(|()| Outcome::AwaitingCustomStreak {
                    target_user_id: *target_user_id,
                }),
            Action::Text { text } => self
                .handle_text(user_id, chat_id, handle.as_deref(), text)
                .await
                .map(Outcome::Reply),
        };

        if let Err(e) = &result {
            log_failure(action.name(), user_id, chat_id, e);
        }
        result
    }
}

fn log_failure(operation: &'static str, user_id: i64, chat_id: i64, e: &TrackerError) {
    if e.is_user_facing() {
        info!(operation, user_id, chat_id, code = e.code(), "Rejected: {}", e);
    } else {
        error!(operation, user_id, chat_id, "Operation failed: {}", e);
    }
}
