//! Achievement storage.

use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::error::{map_unique_violation, Result};
use crate::models::{Achievement, AchievementHolder, AchievementKind};

/// Record that `user_id` reached `kind` on `day`.
///
/// Returns [`crate::DatabaseError::AlreadyExists`] if it was recorded before.
pub async fn record_achievement(
    pool: &SqlitePool,
    user_id: i64,
    kind: AchievementKind,
    day: NaiveDate,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO achievements (user_id, achievement_type, achieved_on)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(day)
    .execute(pool)
    .await
    .map_err(|e| map_unique_violation(e, "Achievement", || format!("{}/{}", user_id, kind)))?;

    Ok(())
}

/// Check whether `user_id` already holds `kind`.
pub async fn has_achievement(pool: &SqlitePool, user_id: i64, kind: AchievementKind) -> Result<bool> {
    let result = sqlx::query_scalar::<_, i32>(
        r#"
        SELECT 1
        FROM achievements
        WHERE user_id = ? AND achievement_type = ?
        "#,
    )
    .bind(user_id)
    .bind(kind.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(result.is_some())
}

/// All achievements of a user, oldest first.
pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Achievement>> {
    let rows = sqlx::query_as::<_, Achievement>(
        r#"
        SELECT user_id, achievement_type, achieved_on
        FROM achievements
        WHERE user_id = ?
        ORDER BY achieved_on ASC, achievement_type ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every recorded achievement with the holder's name, most recent first.
pub async fn list_holders(pool: &SqlitePool) -> Result<Vec<AchievementHolder>> {
    let rows = sqlx::query_as::<_, AchievementHolder>(
        r#"
        SELECT p.user_id, p.handle, p.display_name, a.achievement_type, a.achieved_on
        FROM achievements a
        INNER JOIN participants p ON p.user_id = a.user_id
        ORDER BY a.achieved_on DESC, p.user_id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::upsert_participant;
    use crate::test_support::{day, participant_at, test_db};
    use crate::DatabaseError;
    use chrono::Utc;

    #[tokio::test]
    async fn test_record_is_one_shot() {
        let db = test_db().await;
        upsert_participant(db.pool(), &participant_at(1, 10, "Anna", Utc::now()))
            .await
            .unwrap();

        assert!(!has_achievement(db.pool(), 1, AchievementKind::HundredDays).await.unwrap());
        record_achievement(db.pool(), 1, AchievementKind::HundredDays, day(10))
            .await
            .unwrap();
        let again = record_achievement(db.pool(), 1, AchievementKind::HundredDays, day(11)).await;
        assert!(matches!(again, Err(DatabaseError::AlreadyExists { .. })));

        let rows = list_for_user(db.pool(), 1).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].achieved_on, day(10));
        assert_eq!(rows[0].kind(), Some(AchievementKind::HundredDays));
    }

    #[tokio::test]
    async fn test_list_holders_joins_names() {
        let db = test_db().await;
        upsert_participant(db.pool(), &participant_at(1, 10, "Anna", Utc::now()))
            .await
            .unwrap();
        upsert_participant(db.pool(), &participant_at(2, 20, "Boris", Utc::now()))
            .await
            .unwrap();
        record_achievement(db.pool(), 1, AchievementKind::HundredDays, day(3))
            .await
            .unwrap();
        record_achievement(db.pool(), 2, AchievementKind::YearLong, day(8))
            .await
            .unwrap();

        let holders = list_holders(db.pool()).await.unwrap();
        assert_eq!(holders.len(), 2);
        assert_eq!(holders[0].name(), "Boris");
        assert_eq!(holders[0].kind(), Some(AchievementKind::YearLong));
        assert_eq!(holders[1].name(), "Anna");
    }
}
