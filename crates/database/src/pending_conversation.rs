//! Pending conversation storage.
//!
//! One row per `(user_id, chat_id)`. Writing a new state replaces whatever
//! was pending for that key.

use sqlx::{FromRow, SqlitePool};

use crate::models::{ConversationState, PendingConversation};
use crate::Result;

#[derive(FromRow)]
struct PendingRow {
    user_id: i64,
    chat_id: i64,
    kind: String,
    context: Option<String>,
    created_at: String,
}

impl PendingRow {
    fn into_model(self) -> Result<PendingConversation> {
        let state = ConversationState::from_parts(&self.kind, self.context.as_deref())?;
        Ok(PendingConversation {
            user_id: self.user_id,
            chat_id: self.chat_id,
            state,
            created_at: self.created_at,
        })
    }
}

/// Store `state` as the pending conversation for `(user_id, chat_id)`.
pub async fn upsert_pending(
    pool: &SqlitePool,
    user_id: i64,
    chat_id: i64,
    state: &ConversationState,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO pending_conversations (user_id, chat_id, kind, context)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id, chat_id) DO UPDATE SET
            kind = excluded.kind,
            context = excluded.context,
            created_at = datetime('now')
        "#,
    )
    .bind(user_id)
    .bind(chat_id)
    .bind(state.kind())
    .bind(state.context())
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the pending conversation for `(user_id, chat_id)`.
pub async fn get_pending(
    pool: &SqlitePool,
    user_id: i64,
    chat_id: i64,
) -> Result<Option<PendingConversation>> {
    let row = sqlx::query_as::<_, PendingRow>(
        r#"
        SELECT user_id, chat_id, kind, context, created_at
        FROM pending_conversations
        WHERE user_id = ? AND chat_id = ?
        "#,
    )
    .bind(user_id)
    .bind(chat_id)
    .fetch_optional(pool)
    .await?;

    row.map(PendingRow::into_model).transpose()
}

/// Delete the pending conversation for `(user_id, chat_id)`.
///
/// Returns true if a row was deleted.
pub async fn clear_pending(pool: &SqlitePool, user_id: i64, chat_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM pending_conversations
        WHERE user_id = ? AND chat_id = ?
        "#,
    )
    .bind(user_id)
    .bind(chat_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
