//! Twice-daily reminders for participants who have not completed today.
//!
//! The loop recomputes its next trigger from the wall clock on every
//! iteration. Sleeps are capped at `max_nap`, after which the clock is read
//! again before deciding whether to fire. A trigger that wakes up late or on
//! another local day is dropped rather than sent for a stale day.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use database::completion;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::clock::Calendar;
use crate::error::Result;
use crate::roster;
use crate::sink::{Notification, NotificationSink};

/// Which of the two daily reminders is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    Midday,
    LastChance,
}

/// Local times of the two daily reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderSchedule {
    pub midday: NaiveTime,
    pub evening: NaiveTime,
}

impl Default for ReminderSchedule {
    fn default() -> Self {
        Self {
            midday: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN),
            evening: NaiveTime::from_hms_opt(21, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// The next reminder to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub kind: ReminderKind,
    /// Instant the reminder is due.
    pub at: DateTime<Utc>,
    /// Calendar day the reminder is about.
    pub day: NaiveDate,
}

impl ReminderSchedule {
    /// First trigger strictly after `now`, with local times read in `zone`.
    pub fn next_trigger(&self, now: DateTime<Utc>, zone: FixedOffset) -> Trigger {
        let today = now.with_timezone(&zone).date_naive();

        [
            (ReminderKind::Midday, self.midday),
            (ReminderKind::LastChance, self.evening),
        ]
        .into_iter()
        .map(|(kind, time)| {
            let mut day = today;
            let mut at = local_instant(day, time, zone);
            if at <= now {
                day = day.succ_opt().unwrap_or(day);
                at += Duration::days(1);
            }
            Trigger { kind, at, day }
        })
        .min_by_key(|t| t.at)
        .unwrap_or(Trigger {
            kind: ReminderKind::Midday,
            at: now + Duration::days(1),
            day: today,
        })
    }
}

fn local_instant(day: NaiveDate, time: NaiveTime, zone: FixedOffset) -> DateTime<Utc> {
    let local = day.and_time(time) - Duration::seconds(i64::from(zone.local_minus_utc()));
    Utc.from_utc_datetime(&local)
}

/// Outcome of one reminder batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderReport {
    pub kind: ReminderKind,
    pub day: NaiveDate,
    /// Participants without a completion for `day`.
    pub pending: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Long-lived reminder loop.
pub struct ReminderScheduler<S: NotificationSink> {
    pool: SqlitePool,
    calendar: Calendar,
    sink: S,
    schedule: ReminderSchedule,
    max_nap: StdDuration,
}

impl<S: NotificationSink> ReminderScheduler<S> {
    /// Default cap on a single sleep.
    pub const DEFAULT_MAX_NAP: StdDuration = StdDuration::from_secs(900);

    /// How late a trigger may fire before it is considered missed.
    pub const LATE_GRACE: StdDuration = StdDuration::from_secs(300);

    pub fn new(pool: SqlitePool, calendar: Calendar, sink: S, schedule: ReminderSchedule) -> Self {
        Self {
            pool,
            calendar,
            sink,
            schedule,
            max_nap: Self::DEFAULT_MAX_NAP,
        }
    }

    /// Cap each sleep at `max_nap`.
    pub fn with_max_nap(mut self, max_nap: StdDuration) -> Self {
        self.max_nap = max_nap;
        self
    }

    /// Next trigger from the current wall-clock time.
    pub fn next_trigger(&self) -> Trigger {
        self.schedule
            .next_trigger(self.calendar.now(), self.calendar.zone())
    }

    /// Remind every participant without a completion for `day`.
    ///
    /// Failed deliveries are logged and counted; they do not stop the batch.
    pub async fn send_reminders(&self, kind: ReminderKind, day: NaiveDate) -> Result<ReminderReport> {
        let pending = completion::pending_participants_on(&self.pool, day).await?;

        let mut report = ReminderReport {
            kind,
            day,
            pending: pending.len(),
            delivered: 0,
            failed: 0,
        };

        if pending.is_empty() {
            info!(?kind, %day, "Everyone is done, no reminders to send");
            return Ok(report);
        }

        let statuses = roster::participant_statuses(&self.pool, day).await?;

        for participant in pending {
            let notification = Notification::Reminder {
                kind,
                day,
                user_id: participant.user_id,
                roster: statuses.clone(),
            };

            match self.sink.notify(participant.chat_id, &notification).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        user_id = participant.user_id,
                        chat_id = participant.chat_id,
                        error = %e,
                        "Failed to send reminder"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            ?kind,
            %day,
            delivered = report.delivered,
            failed = report.failed,
            "Reminders sent"
        );
        Ok(report)
    }

    /// Sleep until the next trigger, then send its batch.
    ///
    /// A trigger woken up more than [`Self::LATE_GRACE`] past due, or on a
    /// different local day, is dropped and the schedule is recomputed.
    pub async fn run_once(&self) -> Result<ReminderReport> {
        loop {
            let trigger = self.next_trigger();
            info!(kind = ?trigger.kind, at = %trigger.at, "Next reminder scheduled");

            let now = loop {
                let now = self.calendar.now();
                if now >= trigger.at {
                    break now;
                }
                let wait = (trigger.at - now)
                    .to_std()
                    .unwrap_or(StdDuration::ZERO)
                    .min(self.max_nap);
                tokio::time::sleep(wait).await;
            };

            let late = (now - trigger.at).to_std().unwrap_or(StdDuration::ZERO);
            if late > Self::LATE_GRACE || self.calendar.day_of(now) != trigger.day {
                warn!(
                    kind = ?trigger.kind,
                    day = %trigger.day,
                    at = %trigger.at,
                    now = %now,
                    "Skipping stale reminder"
                );
                continue;
            }

            return self.send_reminders(trigger.kind, trigger.day).await;
        }
    }

    /// Run forever. Failed batches are logged and the loop moves on.
    pub async fn run(self) {
        info!(
            midday = %self.schedule.midday,
            evening = %self.schedule.evening,
            zone = %self.calendar.zone(),
            "Reminder scheduler started"
        );

        loop {
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Reminder batch failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::sink::RecordingSink;
    use chrono::TimeZone;
    use database::{participant, Database, Participant};
    use std::sync::Arc;

    fn utc5() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_next_trigger_in_reference_zone() {
        let schedule = ReminderSchedule::default();

        // 05:00 local: midday today (07:00 UTC)
        let t = schedule.next_trigger(at(2024, 1, 10, 0, 0), utc5());
        assert_eq!(t.kind, ReminderKind::Midday);
        assert_eq!(t.at, at(2024, 1, 10, 7, 0));
        assert_eq!(t.day, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());

        // 15:00 local: last chance tonight (16:00 UTC)
        let t = schedule.next_trigger(at(2024, 1, 10, 10, 0), utc5());
        assert_eq!(t.kind, ReminderKind::LastChance);
        assert_eq!(t.at, at(2024, 1, 10, 16, 0));

        // 22:00 local: midday tomorrow
        let t = schedule.next_trigger(at(2024, 1, 10, 17, 0), utc5());
        assert_eq!(t.kind, ReminderKind::Midday);
        assert_eq!(t.at, at(2024, 1, 11, 7, 0));
        assert_eq!(t.day, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
    }

    #[test]
    fn test_next_trigger_is_strictly_in_the_future() {
        let schedule = ReminderSchedule::default();
        let t = schedule.next_trigger(at(2024, 1, 10, 7, 0), utc5());
        assert_eq!(t.kind, ReminderKind::LastChance);
        assert_eq!(t.at, at(2024, 1, 10, 16, 0));
    }

    async fn setup() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1)
            .await
            .unwrap();
        db.migrate().await.unwrap();
        for user_id in 1..=3 {
            let p = Participant {
                user_id,
                chat_id: user_id * 10,
                handle: None,
                display_name: Some(format!("user{}", user_id)),
                joined_at: at(2024, 1, 1, 0, 0),
            };
            participant::upsert_participant(db.pool(), &p).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_send_reminders_skips_completed_and_survives_failures() {
        let db = setup().await;
        let day = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        completion::mark_completed(db.pool(), 1, day, None).await.unwrap();

        let sink = Arc::new(RecordingSink::new());
        sink.fail_for(20);
        let clock = Arc::new(ManualClock::new(at(2024, 1, 10, 7, 0)));
        let scheduler = ReminderScheduler::new(
            db.pool().clone(),
            Calendar::new(clock, utc5()),
            sink.clone(),
            ReminderSchedule::default(),
        );

        let report = scheduler
            .send_reminders(ReminderKind::Midday, day)
            .await
            .unwrap();
        assert_eq!(report.pending, 2);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 30);
        match &sent[0].1 {
            Notification::Reminder { kind, roster, user_id, .. } => {
                assert_eq!(*kind, ReminderKind::Midday);
                assert_eq!(*user_id, 3);
                assert_eq!(roster.len(), 3);
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    /// Clock that moves forward by `step` every time it is read.
    struct SteppingClock {
        now: std::sync::Mutex<DateTime<Utc>>,
        step: Duration,
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut now = self.now.lock().unwrap();
            let current = *now;
            *now += self.step;
            current
        }
    }

    #[tokio::test]
    async fn test_run_once_naps_until_trigger() {
        let db = setup().await;
        let sink = Arc::new(RecordingSink::new());
        // Reads: 06:00 (schedule), 06:20, 06:40, 07:00 (fire)
        let clock = Arc::new(SteppingClock {
            now: std::sync::Mutex::new(at(2024, 1, 10, 6, 0)),
            step: Duration::minutes(20),
        });
        let scheduler = ReminderScheduler::new(
            db.pool().clone(),
            Calendar::new(clock.clone(), utc5()),
            sink.clone(),
            ReminderSchedule::default(),
        )
        .with_max_nap(StdDuration::from_millis(1));

        let report = scheduler.run_once().await.unwrap();

        assert_eq!(report.kind, ReminderKind::Midday);
        assert_eq!(report.day, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(report.delivered, 3);
        assert_eq!(*clock.now.lock().unwrap(), at(2024, 1, 10, 7, 20));
    }

    /// Clock that returns scripted readings, repeating the last one.
    struct ScriptedClock {
        readings: std::sync::Mutex<std::collections::VecDeque<DateTime<Utc>>>,
    }

    impl Clock for ScriptedClock {
        fn now(&self) -> DateTime<Utc> {
            let mut readings = self.readings.lock().unwrap();
            if readings.len() > 1 {
                readings.pop_front().unwrap()
            } else {
                *readings.front().unwrap()
            }
        }
    }

    #[tokio::test]
    async fn test_run_once_skips_trigger_missed_during_clock_jump() {
        let db = setup().await;
        let sink = Arc::new(RecordingSink::new());
        // 10:00 local Jan 10 schedules midday, then the host wakes at
        // 15:00 local Jan 11 and the evening reminder is next.
        let clock = Arc::new(ScriptedClock {
            readings: std::sync::Mutex::new(
                vec![
                    at(2024, 1, 10, 5, 0),
                    at(2024, 1, 11, 10, 0),
                    at(2024, 1, 11, 10, 0),
                    at(2024, 1, 11, 16, 0),
                ]
                .into(),
            ),
        });
        let scheduler = ReminderScheduler::new(
            db.pool().clone(),
            Calendar::new(clock, utc5()),
            sink.clone(),
            ReminderSchedule::default(),
        )
        .with_max_nap(StdDuration::from_millis(1));

        let report = scheduler.run_once().await.unwrap();

        assert_eq!(report.kind, ReminderKind::LastChance);
        assert_eq!(report.day, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        assert_eq!(report.delivered, 3);

        let sent = sink.sent();
        assert_eq!(sent.len(), 3);
        for (_, notification) in &sent {
            match notification {
                Notification::Reminder { kind, day, .. } => {
                    assert_eq!(*kind, ReminderKind::LastChance);
                    assert_eq!(*day, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
                }
                other => panic!("unexpected notification: {:?}", other),
            }
        }
    }
}
