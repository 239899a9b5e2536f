//! Completion ledger: day-keyed completion facts.
//!
//! The `(user_id, completed_on)` primary key is the final guard against
//! duplicate completions. Callers may check [`has_completed`] first, but
//! only the insert in [`mark_completed`] is authoritative.

use std::collections::{BTreeSet, HashSet};

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::{map_unique_violation, DatabaseError, Result};
use crate::models::{Completion, Participant};

/// Record a completion for `user_id` on `day`.
///
/// Returns [`DatabaseError::AlreadyExists`] if the day is already recorded.
pub async fn mark_completed(
    pool: &SqlitePool,
    user_id: i64,
    day: NaiveDate,
    note: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO completions (user_id, completed_on, note)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(day)
    .bind(note)
    .execute(pool)
    .await
    .map_err(|e| map_unique_violation(e, "Completion", || format!("{}/{}", user_id, day)))?;

    Ok(())
}

/// Remove the completion for `user_id` on `day`.
///
/// Returns [`DatabaseError::NotFound`] if nothing was recorded.
pub async fn unmark(pool: &SqlitePool, user_id: i64, day: NaiveDate) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM completions
        WHERE user_id = ? AND completed_on = ?
        "#,
    )
    .bind(user_id)
    .bind(day)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Completion",
            id: format!("{}/{}", user_id, day),
        });
    }

    Ok(())
}

/// Check whether `user_id` completed the habit on `day`.
pub async fn has_completed(pool: &SqlitePool, user_id: i64, day: NaiveDate) -> Result<bool> {
    let result = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT 1
        FROM completions
        WHERE user_id = ? AND completed_on = ?
        "#,
    )
    .bind(user_id)
    .bind(day)
    .fetch_optional(pool)
    .await?;

    Ok(result.is_some())
}

/// Get a single completion record.
pub async fn get_completion(
    pool: &SqlitePool,
    user_id: i64,
    day: NaiveDate,
) -> Result<Option<Completion>> {
    let record = sqlx::query_as::<_, Completion>(
        r#"
        SELECT user_id, completed_on, note
        FROM completions
        WHERE user_id = ? AND completed_on = ?
        "#,
    )
    .bind(user_id)
    .bind(day)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Users with a completion on `day`.
pub async fn completed_users_on(pool: &SqlitePool, day: NaiveDate) -> Result<HashSet<i64>> {
    let rows = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT user_id
        FROM completions
        WHERE completed_on = ?
        "#,
    )
    .bind(day)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Participants without a completion on `day`.
pub async fn pending_participants_on(pool: &SqlitePool, day: NaiveDate) -> Result<Vec<Participant>> {
    let participants = sqlx::query_as::<_, Participant>(
        r#"
        SELECT p.user_id, p.chat_id, p.handle, p.display_name, p.joined_at
        FROM participants p
        LEFT JOIN completions c
            ON c.user_id = p.user_id
            AND c.completed_on = ?
        WHERE c.user_id IS NULL
        ORDER BY p.joined_at ASC, p.user_id ASC
        "#,
    )
    .bind(day)
    .fetch_all(pool)
    .await?;

    Ok(participants)
}

/// Every day on which `user_id` has a completion.
pub async fn completion_days(pool: &SqlitePool, user_id: i64) -> Result<BTreeSet<NaiveDate>> {
    let days = sqlx::query_scalar::<_, NaiveDate>(
        r#"
        SELECT completed_on
        FROM completions
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(days.into_iter().collect())
}

/// Earliest completion day across all participants.
pub async fn earliest_completion(pool: &SqlitePool) -> Result<Option<NaiveDate>> {
    let day = sqlx::query_scalar::<_, Option<NaiveDate>>(
        r#"
        SELECT MIN(completed_on) FROM completions
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(day)
}

/// Replace a user's completions in `[clear_from, clear_to]` with `entries`.
///
/// Runs in a single transaction, so readers never observe a half-written
/// range.
pub async fn rewrite_range(
    pool: &SqlitePool,
    user_id: i64,
    clear_from: NaiveDate,
    clear_to: NaiveDate,
    entries: &[(NaiveDate, Option<String>)],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        DELETE FROM completions
        WHERE user_id = ? AND completed_on >= ? AND completed_on <= ?
        "#,
    )
    .bind(user_id)
    .bind(clear_from)
    .bind(clear_to)
    .execute(&mut *tx)
    .await?;

    for (day, note) in entries {
        sqlx::query(
            r#"
            INSERT INTO completions (user_id, completed_on, note)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(*day)
        .bind(note.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "Completion", || format!("{}/{}", user_id, day)))?;
    }

    tx.commit().await?;

    tracing::debug!(
        user_id,
        %clear_from,
        %clear_to,
        inserted = entries.len(),
        "Rewrote completion range"
    );

    Ok(())
}
