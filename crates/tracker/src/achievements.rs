//! One-shot milestone detection.

use chrono::NaiveDate;
use database::{achievement, participant, AchievementKind};
use sqlx::SqlitePool;

use crate::error::{participant_lookup, Result};
use crate::sink::{Notification, NotificationSink};

/// Record every tier `streak` qualifies for that `user_id` does not hold yet.
///
/// Each newly recorded tier sends one notification to the participant's
/// chat. Returns the tiers recorded by this call; re-running with the same
/// streak records nothing.
pub async fn check_and_record<S>(
    pool: &SqlitePool,
    sink: &S,
    user_id: i64,
    streak: u32,
    today: NaiveDate,
) -> Result<Vec<AchievementKind>>
where
    S: NotificationSink + ?Sized,
{
    let qualifying: Vec<AchievementKind> = AchievementKind::ALL
        .into_iter()
        .filter(|kind| streak >= kind.threshold())
        .collect();

    if qualifying.is_empty() {
        return Ok(Vec::new());
    }

    let holder = participant::get_participant(pool, user_id)
        .await
        .map_err(participant_lookup(user_id))?;

    let mut unlocked = Vec::new();
    for kind in qualifying {
        if achievement::has_achievement(pool, user_id, kind).await? {
            continue;
        }

        match achievement::record_achievement(pool, user_id, kind, today).await {
            Ok(()) => {}
            // Recorded concurrently; the other writer notifies
            Err(e) if e.is_already_exists() => continue,
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id, achievement = %kind, streak, "Achievement unlocked");

        let notification = Notification::AchievementUnlocked {
            user_id,
            name: holder.name(),
            kind,
            streak,
            achieved_on: today,
        };
        sink.notify(holder.chat_id, &notification).await?;

        unlocked.push(kind);
    }

    Ok(unlocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::sink::RecordingSink;
    use chrono::Utc;
    use database::{Database, Participant};

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, n).unwrap()
    }

    async fn setup() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        let p = Participant {
            user_id: 1,
            chat_id: 100,
            handle: Some("anna".to_string()),
            display_name: Some("Anna".to_string()),
            joined_at: Utc::now(),
        };
        participant::upsert_participant(db.pool(), &p).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_below_threshold_records_nothing() {
        let db = setup().await;
        let sink = RecordingSink::new();

        let unlocked = check_and_record(db.pool(), &sink, 1, 99, day(1)).await.unwrap();
        assert!(unlocked.is_empty());
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_recording_is_idempotent() {
        let db = setup().await;
        let sink = RecordingSink::new();

        let first = check_and_record(db.pool(), &sink, 1, 100, day(1)).await.unwrap();
        let second = check_and_record(db.pool(), &sink, 1, 101, day(2)).await.unwrap();

        assert_eq!(first, vec![AchievementKind::HundredDays]);
        assert!(second.is_empty());

        let rows = achievement::list_for_user(db.pool(), 1).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].achieved_on, day(1));

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 100);
    }

    #[tokio::test]
    async fn test_year_long_streak_unlocks_both_tiers() {
        let db = setup().await;
        let sink = RecordingSink::new();

        let unlocked = check_and_record(db.pool(), &sink, 1, 365, day(1)).await.unwrap();
        assert_eq!(
            unlocked,
            vec![AchievementKind::HundredDays, AchievementKind::YearLong]
        );
        assert_eq!(sink.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_participant() {
        let db = setup().await;
        let sink = RecordingSink::new();

        let err = check_and_record(db.pool(), &sink, 2, 100, day(1)).await.unwrap_err();
        assert!(matches!(err, TrackerError::UnknownParticipant(2)));
    }

    #[tokio::test]
    async fn test_notification_failure_propagates() {
        let db = setup().await;
        let sink = RecordingSink::new();
        sink.fail_for(100);

        let err = check_and_record(db.pool(), &sink, 1, 100, day(1)).await.unwrap_err();
        assert!(matches!(err, TrackerError::NotificationFailed(_)));
        // The achievement itself stays recorded
        assert!(achievement::has_achievement(db.pool(), 1, AchievementKind::HundredDays)
            .await
            .unwrap());
    }
}
