//! Roster snapshots: who is in, who is done today, and the achievement roll.

use std::collections::HashSet;

use chrono::{FixedOffset, NaiveDate};
use database::{achievement, completion, participant, AchievementKind, JoinOrder};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::error::Result;
use crate::streak;

/// One roster row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantStatus {
    pub user_id: i64,
    pub name: String,
    pub completed_today: bool,
    pub streak: u32,
}

/// A holder of a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FameEntry {
    pub user_id: i64,
    pub name: String,
    pub achieved_on: NaiveDate,
}

/// Achievement roll, most recent first within each tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HallOfFame {
    /// Holders of the year-long milestone.
    pub legends: Vec<FameEntry>,
    /// Holders of the hundred-day milestone who are not legends yet.
    pub centurions: Vec<FameEntry>,
}

impl HallOfFame {
    /// True when nobody holds a milestone yet.
    pub fn is_empty(&self) -> bool {
        self.legends.is_empty() && self.centurions.is_empty()
    }
}

/// Full roster as shown after a list request or a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Roster {
    /// Day the roster describes.
    pub day: NaiveDate,
    /// Participants, most recently joined first.
    pub participants: Vec<ParticipantStatus>,
    pub group_streak: u32,
    /// Whether the requesting user completed today, when one is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_completed: Option<bool>,
    /// Omitted from the wire form until someone holds a milestone.
    #[serde(skip_serializing_if = "HallOfFame::is_empty")]
    pub hall_of_fame: HallOfFame,
}

/// Status rows for every participant as of `today`.
pub async fn participant_statuses(
    pool: &SqlitePool,
    today: NaiveDate,
) -> Result<Vec<ParticipantStatus>> {
    let participants = participant::list_participants(pool, JoinOrder::NewestFirst).await?;
    let done = completion::completed_users_on(pool, today).await?;

    let mut rows = Vec::with_capacity(participants.len());
    for p in participants {
        let streak = streak::individual_streak(pool, p.user_id, today).await?;
        rows.push(ParticipantStatus {
            user_id: p.user_id,
            name: p.name(),
            completed_today: done.contains(&p.user_id),
            streak,
        });
    }
    Ok(rows)
}

/// Current achievement roll.
pub async fn hall_of_fame(pool: &SqlitePool) -> Result<HallOfFame> {
    let holders = achievement::list_holders(pool).await?;

    let legend_ids: HashSet<i64> = holders
        .iter()
        .filter(|h| h.kind() == Some(AchievementKind::YearLong))
        .map(|h| h.user_id)
        .collect();

    let mut fame = HallOfFame::default();
    for holder in holders {
        let entry = FameEntry {
            user_id: holder.user_id,
            name: holder.name(),
            achieved_on: holder.achieved_on,
        };
        match holder.kind() {
            Some(AchievementKind::YearLong) => fame.legends.push(entry),
            Some(AchievementKind::HundredDays) if !legend_ids.contains(&holder.user_id) => {
                fame.centurions.push(entry)
            }
            Some(AchievementKind::HundredDays) => {}
            None => {
                tracing::warn!(
                    user_id = holder.user_id,
                    achievement = %holder.achievement_type,
                    "Skipping unknown achievement type"
                );
            }
        }
    }
    Ok(fame)
}

/// Build the roster for `today`.
pub async fn build_roster(
    pool: &SqlitePool,
    zone: FixedOffset,
    today: NaiveDate,
    requester: Option<i64>,
) -> Result<Roster> {
    let participants = participant_statuses(pool, today).await?;
    let group_streak = streak::group_streak(pool, zone, today).await?;
    let hall_of_fame = hall_of_fame(pool).await?;

    let requester_completed = requester.map(|user_id| {
        participants
            .iter()
            .any(|p| p.user_id == user_id && p.completed_today)
    });

    Ok(Roster {
        day: today,
        participants,
        group_streak,
        requester_completed,
        hall_of_fame,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use database::{Database, Participant};

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, n).unwrap()
    }

    async fn setup() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for (i, name) in ["Anna", "Boris", "Clara"].iter().enumerate() {
            let p = Participant {
                user_id: i as i64 + 1,
                chat_id: (i as i64 + 1) * 10,
                handle: None,
                display_name: Some(name.to_string()),
                joined_at: base + Duration::days(i as i64),
            };
            participant::upsert_participant(db.pool(), &p).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_build_roster() {
        let db = setup().await;
        let zone = FixedOffset::east_opt(5 * 3600).unwrap();
        for n in 1..=3 {
            completion::mark_completed(db.pool(), 1, day(n), None).await.unwrap();
        }
        completion::mark_completed(db.pool(), 3, day(3), None).await.unwrap();

        let roster = build_roster(db.pool(), zone, day(3), Some(1)).await.unwrap();

        let names: Vec<&str> = roster.participants.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Clara", "Boris", "Anna"]);

        let anna = &roster.participants[2];
        assert!(anna.completed_today);
        assert_eq!(anna.streak, 3);
        assert!(!roster.participants[1].completed_today);
        assert_eq!(roster.group_streak, 0);
        assert_eq!(roster.requester_completed, Some(true));
        assert!(roster.hall_of_fame.is_empty());
        let json = serde_json::to_value(&roster).unwrap();
        assert!(json.get("hall_of_fame").is_none());

        let roster = build_roster(db.pool(), zone, day(3), None).await.unwrap();
        assert_eq!(roster.requester_completed, None);
    }

    #[tokio::test]
    async fn test_hall_of_fame_tiers() {
        let db = setup().await;
        achievement::record_achievement(db.pool(), 1, AchievementKind::HundredDays, day(1))
            .await
            .unwrap();
        achievement::record_achievement(db.pool(), 1, AchievementKind::YearLong, day(5))
            .await
            .unwrap();
        achievement::record_achievement(db.pool(), 2, AchievementKind::HundredDays, day(2))
            .await
            .unwrap();
        achievement::record_achievement(db.pool(), 3, AchievementKind::HundredDays, day(4))
            .await
            .unwrap();

        let fame = hall_of_fame(db.pool()).await.unwrap();

        assert_eq!(fame.legends.len(), 1);
        assert_eq!(fame.legends[0].name, "Anna");
        assert_eq!(fame.legends[0].achieved_on, day(5));

        let centurions: Vec<&str> = fame.centurions.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(centurions, ["Clara", "Boris"]);
        assert!(!fame.is_empty());

        let zone = FixedOffset::east_opt(5 * 3600).unwrap();
        let roster = build_roster(db.pool(), zone, day(5), None).await.unwrap();
        let json = serde_json::to_value(&roster).unwrap();
        assert_eq!(json["hall_of_fame"]["legends"][0]["name"], "Anna");
    }
}
