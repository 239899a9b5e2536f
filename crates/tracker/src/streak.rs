//! Consecutive-day streaks for a single participant and for the whole group.
//!
//! Both walks start at the day before `today` and move backward until the
//! first incomplete day. Today only adds to the streak once it is complete,
//! so an unfinished today never breaks an existing run. The walk never goes
//! below the earliest completion on record, because no earlier day can be
//! complete.

use std::collections::HashSet;

use chrono::{FixedOffset, NaiveDate};
use database::{completion, participant, JoinOrder, Participant};
use sqlx::SqlitePool;

use crate::error::Result;

/// Count consecutive complete days ending at `today`.
///
/// `floor` is the earliest day that can possibly be complete; `None` means
/// nothing was ever completed and the streak is zero.
pub fn consecutive_run<F>(today: NaiveDate, floor: Option<NaiveDate>, mut is_complete: F) -> u32
where
    F: FnMut(NaiveDate) -> bool,
{
    let Some(floor) = floor else {
        return 0;
    };

    let mut streak = 0;
    let mut day = today.pred_opt();
    while let Some(d) = day {
        if d < floor || !is_complete(d) {
            break;
        }
        streak += 1;
        day = d.pred_opt();
    }

    if today >= floor && is_complete(today) {
        streak += 1;
    }

    streak
}

/// Whether `day` is complete for the group.
///
/// Every participant who had joined by `day` must have completed it. A day
/// nobody was eligible for is not complete.
pub fn eligible_day_complete(
    joins: &[(i64, NaiveDate)],
    day: NaiveDate,
    completed: &HashSet<i64>,
) -> bool {
    let mut eligible = joins.iter().filter(|(_, joined)| *joined <= day).peekable();
    if eligible.peek().is_none() {
        return false;
    }
    eligible.all(|(user_id, _)| completed.contains(user_id))
}

/// Calendar day a participant joined on, in `zone`.
pub fn join_day(participant: &Participant, zone: FixedOffset) -> NaiveDate {
    participant.joined_at.with_timezone(&zone).date_naive()
}

/// Individual streak of `user_id` as of `today`.
pub async fn individual_streak(pool: &SqlitePool, user_id: i64, today: NaiveDate) -> Result<u32> {
    let days = completion::completion_days(pool, user_id).await?;
    let floor = days.first().copied();
    Ok(consecutive_run(today, floor, |d| days.contains(&d)))
}

/// Group streak as of `today`, with join days computed in `zone`.
pub async fn group_streak(pool: &SqlitePool, zone: FixedOffset, today: NaiveDate) -> Result<u32> {
    let participants = participant::list_participants(pool, JoinOrder::OldestFirst).await?;
    if participants.is_empty() {
        return Ok(0);
    }

    let Some(floor) = completion::earliest_completion(pool).await? else {
        return Ok(0);
    };

    let joins: Vec<(i64, NaiveDate)> = participants
        .iter()
        .map(|p| (p.user_id, join_day(p, zone)))
        .collect();

    let mut streak = 0;
    let mut day = today.pred_opt();
    while let Some(d) = day {
        if d < floor {
            break;
        }
        let completed = completion::completed_users_on(pool, d).await?;
        if !eligible_day_complete(&joins, d, &completed) {
            break;
        }
        streak += 1;
        day = d.pred_opt();
    }

    if today >= floor {
        let completed = completion::completed_users_on(pool, today).await?;
        if eligible_day_complete(&joins, today, &completed) {
            streak += 1;
        }
    }

    tracing::debug!(streak, %today, "Computed group streak");
    Ok(streak)
}
