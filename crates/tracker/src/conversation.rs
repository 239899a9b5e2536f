//! Multi-turn conversations persisted per `(user, chat)`.
//!
//! A conversation is entered with [`begin`], which overwrites whatever flow
//! was pending for the same key. The next free-text message is turned into a
//! [`Reply`] by [`interpret`]; the caller runs the domain operation and only
//! then calls [`finish`], so a rejected reply leaves the flow in place for a
//! retry.

use database::validation::{parse_streak_days, validate_display_name};
use database::{pending_conversation, ConversationState, ValidationError};
use sqlx::SqlitePool;

use crate::error::Result;

/// A free-text message interpreted against the pending state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Display name for the join flow, already trimmed.
    Name(String),
    /// Streak value for an administrative edit.
    CustomStreak { target_user_id: i64, days: u32 },
}

/// Interpret `text` as the answer to `state`.
pub fn interpret(state: &ConversationState, text: &str) -> std::result::Result<Reply, ValidationError> {
    match state {
        ConversationState::AwaitingName => validate_display_name(text).map(Reply::Name),
        ConversationState::AwaitingCustomStreak { target_user_id } => {
            let days = parse_streak_days(text)?;
            Ok(Reply::CustomStreak {
                target_user_id: *target_user_id,
                days,
            })
        }
    }
}

/// Enter `state` for `(user_id, chat_id)`, replacing any pending flow.
pub async fn begin(
    pool: &SqlitePool,
    user_id: i64,
    chat_id: i64,
    state: ConversationState,
) -> Result<()> {
    pending_conversation::upsert_pending(pool, user_id, chat_id, &state).await?;
    tracing::debug!(user_id, chat_id, kind = state.kind(), "Conversation started");
    Ok(())
}

/// The pending state for `(user_id, chat_id)`, if any.
pub async fn pending(
    pool: &SqlitePool,
    user_id: i64,
    chat_id: i64,
) -> Result<Option<ConversationState>> {
    let row = pending_conversation::get_pending(pool, user_id, chat_id).await?;
    Ok(row.map(|p| p.state))
}

/// Leave the pending flow for `(user_id, chat_id)`.
pub async fn finish(pool: &SqlitePool, user_id: i64, chat_id: i64) -> Result<()> {
    if pending_conversation::clear_pending(pool, user_id, chat_id).await? {
        tracing::debug!(user_id, chat_id, "Conversation finished");
    }
    Ok(())
}
