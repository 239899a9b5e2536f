//! Participant registry operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Participant;

/// Ordering for participant listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinOrder {
    /// Most recent joiners first (roster display).
    #[default]
    NewestFirst,
    /// Earliest joiners first (administrative index).
    OldestFirst,
}

/// Insert or update a participant.
///
/// An existing row keeps its original `joined_at`; chat binding, handle and
/// display name are overwritten. Returns the stored row.
pub async fn upsert_participant(pool: &SqlitePool, participant: &Participant) -> Result<Participant> {
    sqlx::query(
        r#"
        INSERT INTO participants (user_id, chat_id, handle, display_name, joined_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            chat_id = excluded.chat_id,
            handle = excluded.handle,
            display_name = excluded.display_name
        "#,
    )
    .bind(participant.user_id)
    .bind(participant.chat_id)
    .bind(&participant.handle)
    .bind(&participant.display_name)
    .bind(participant.joined_at)
    .execute(pool)
    .await?;

    get_participant(pool, participant.user_id).await
}

/// Get a participant by user id.
pub async fn get_participant(pool: &SqlitePool, user_id: i64) -> Result<Participant> {
    sqlx::query_as::<_, Participant>(
        r#"
        SELECT user_id, chat_id, handle, display_name, joined_at
        FROM participants
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Participant",
        id: user_id.to_string(),
    })
}

/// Check whether a participant exists.
pub async fn participant_exists(pool: &SqlitePool, user_id: i64) -> Result<bool> {
    let result = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT 1
        FROM participants
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(result.is_some())
}

/// List all participants in the given join order.
pub async fn list_participants(pool: &SqlitePool, order: JoinOrder) -> Result<Vec<Participant>> {
    let query = match order {
        JoinOrder::NewestFirst => {
            r#"
            SELECT user_id, chat_id, handle, display_name, joined_at
            FROM participants
            ORDER BY joined_at DESC, user_id DESC
            "#
        }
        JoinOrder::OldestFirst => {
            r#"
            SELECT user_id, chat_id, handle, display_name, joined_at
            FROM participants
            ORDER BY joined_at ASC, user_id ASC
            "#
        }
    };

    let participants = sqlx::query_as::<_, Participant>(query)
        .fetch_all(pool)
        .await?;

    Ok(participants)
}

/// Count registered participants.
pub async fn count_participants(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM participants
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count)
}
