//! Operation surface for inbound events.

use chrono::{Duration, NaiveDate};
use database::validation::{validate_display_name, validate_streak_days, validate_user_id};
use database::{completion, participant, AchievementKind, ConversationState, JoinOrder, Participant};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::achievements;
use crate::clock::Calendar;
use crate::conversation::{self, Reply};
use crate::error::{participant_lookup, Result, TrackerError};
use crate::notes::NotePicker;
use crate::roster::{self, Roster};
use crate::sink::NotificationSink;
use crate::streak;

/// Result of a start command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartOutcome {
    /// Not registered yet; a join flow was started.
    AwaitingName,
    /// Already registered; here is the roster.
    AlreadyRegistered { roster: Roster },
}

/// A participant that finished the join flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registered {
    pub participant: Participant,
    pub roster: Roster,
}

/// Receipt for a recorded completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReceipt {
    pub user_id: i64,
    /// Day the completion was recorded for.
    pub day: NaiveDate,
    pub note: Option<String>,
    /// Individual streak as of today.
    pub streak: u32,
    /// Milestones reached by this completion.
    pub unlocked: Vec<AchievementKind>,
    pub roster: Roster,
}

/// Receipt for an undone completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoReceipt {
    pub user_id: i64,
    pub day: NaiveDate,
    pub roster: Roster,
}

/// Receipt for an administrative streak edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakSet {
    pub target_user_id: i64,
    pub days: u32,
    /// Streak recomputed after the edit.
    pub streak: u32,
    pub unlocked: Vec<AchievementKind>,
}

/// One row of the administrative participant index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub user_id: i64,
    pub name: String,
}

/// What a free-text reply resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplyOutcome {
    /// Nothing was pending for this user and chat.
    Ignored,
    Registered(Registered),
    StreakSet(StreakSet),
}

/// Engagement-tracking core.
///
/// Every operation re-reads authoritative state from the store; the tracker
/// keeps no copies between calls. Operations on one tracker are meant to be
/// driven sequentially, while a [`crate::ReminderScheduler`] may read the
/// same store concurrently.
pub struct Tracker<S: NotificationSink> {
    pool: SqlitePool,
    calendar: Calendar,
    sink: S,
    notes: NotePicker,
}

impl<S: NotificationSink> Tracker<S> {
    /// Create a tracker over `pool`.
    pub fn new(pool: SqlitePool, calendar: Calendar, sink: S) -> Self {
        Self {
            pool,
            calendar,
            sink,
            notes: NotePicker::default(),
        }
    }

    /// Replace the congratulation notes.
    pub fn with_notes(mut self, notes: NotePicker) -> Self {
        self.notes = notes;
        self
    }

    /// Today in the reference timezone.
    pub fn today(&self) -> NaiveDate {
        self.calendar.today()
    }

    /// Insert or update a participant.
    ///
    /// `joined_at` of an existing participant is kept; everything else is
    /// overwritten.
    pub async fn register(
        &self,
        user_id: i64,
        chat_id: i64,
        handle: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<Participant> {
        validate_user_id(user_id)?;

        let handle = handle.map(str::trim).filter(|h| !h.is_empty());
        let display_name = match display_name {
            Some(name) => Some(validate_display_name(name)?),
            None => handle.map(str::to_string),
        };

        let participant = Participant {
            user_id,
            chat_id,
            handle: handle.map(str::to_string),
            display_name,
            joined_at: self.calendar.now(),
        };
        let stored = participant::upsert_participant(&self.pool, &participant).await?;

        info!(user_id, chat_id, name = %stored.name(), "Participant registered");
        Ok(stored)
    }

    /// Entry point for a new user: the roster if registered, otherwise a join flow.
    pub async fn handle_start(&self, user_id: i64, chat_id: i64) -> Result<StartOutcome> {
        validate_user_id(user_id)?;

        if participant::participant_exists(&self.pool, user_id).await? {
            let roster = self.roster_for(Some(user_id)).await?;
            return Ok(StartOutcome::AlreadyRegistered { roster });
        }

        self.handle_join_request(user_id, chat_id).await?;
        Ok(StartOutcome::AwaitingName)
    }

    /// Start the join flow; the next free text in this chat is the name.
    pub async fn handle_join_request(&self, user_id: i64, chat_id: i64) -> Result<()> {
        validate_user_id(user_id)?;
        conversation::begin(&self.pool, user_id, chat_id, ConversationState::AwaitingName).await?;
        info!(user_id, chat_id, operation = "join", "Waiting for name");
        Ok(())
    }

    /// Route free text to the pending flow for `(user_id, chat_id)`.
    pub async fn handle_text(
        &self,
        user_id: i64,
        chat_id: i64,
        handle: Option<&str>,
        text: &str,
    ) -> Result<ReplyOutcome> {
        match conversation::pending(&self.pool, user_id, chat_id).await? {
            None => {
                debug!(user_id, chat_id, "No pending conversation, ignoring text");
                Ok(ReplyOutcome::Ignored)
            }
            Some(ConversationState::AwaitingName) => {
                self.handle_name_reply(user_id, chat_id, handle, text).await
            }
            Some(ConversationState::AwaitingCustomStreak { .. }) => {
                self.handle_custom_streak_reply(user_id, chat_id, text).await
            }
        }
    }

    /// Answer to the join flow.
    ///
    /// Invalid names keep the flow pending so the user can retry.
    pub async fn handle_name_reply(
        &self,
        user_id: i64,
        chat_id: i64,
        handle: Option<&str>,
        text: &str,
    ) -> Result<ReplyOutcome> {
        let state = conversation::pending(&self.pool, user_id, chat_id).await?;
        let Some(state @ ConversationState::AwaitingName) = state else {
            return Ok(ReplyOutcome::Ignored);
        };

        let Reply::Name(name) = conversation::interpret(&state, text)? else {
            return Ok(ReplyOutcome::Ignored);
        };

        let participant = self.register(user_id, chat_id, handle, Some(&name)).await?;
        conversation::finish(&self.pool, user_id, chat_id).await?;

        let roster = self.roster_for(Some(user_id)).await?;
        Ok(ReplyOutcome::Registered(Registered { participant, roster }))
    }

    /// Record today's completion.
    pub async fn handle_mark_completion(&self, user_id: i64, chat_id: i64) -> Result<CompletionReceipt> {
        let today = self.today();
        self.complete_day(user_id, chat_id, today, "mark_completion").await
    }

    /// Record yesterday's completion retroactively.
    pub async fn handle_mark_yesterday(&self, user_id: i64, chat_id: i64) -> Result<CompletionReceipt> {
        let today = self.today();
        let yesterday = today.pred_opt().unwrap_or(today);
        self.complete_day(user_id, chat_id, yesterday, "mark_yesterday").await
    }

    async fn complete_day(
        &self,
        user_id: i64,
        chat_id: i64,
        day: NaiveDate,
        operation: &'static str,
    ) -> Result<CompletionReceipt> {
        participant::get_participant(&self.pool, user_id)
            .await
            .map_err(participant_lookup(user_id))?;

        if completion::has_completed(&self.pool, user_id, day).await? {
            return Err(TrackerError::AlreadyCompleted { user_id, day });
        }

        let note = self.notes.pick();
        completion::mark_completed(&self.pool, user_id, day, note.as_deref())
            .await
            .map_err(|e| {
                // Lost the race against a concurrent completion
                if e.is_already_exists() {
                    TrackerError::AlreadyCompleted { user_id, day }
                } else {
                    TrackerError::Store(e)
                }
            })?;

        let today = self.today();
        let streak = streak::individual_streak(&self.pool, user_id, today).await?;
        info!(user_id, chat_id, operation, %day, streak, "Completion recorded");

        let unlocked =
            achievements::check_and_record(&self.pool, &self.sink, user_id, streak, today).await?;
        let roster = self.roster_for(Some(user_id)).await?;

        Ok(CompletionReceipt {
            user_id,
            day,
            note,
            streak,
            unlocked,
            roster,
        })
    }

    /// Remove today's completion.
    pub async fn handle_undo(&self, user_id: i64, chat_id: i64) -> Result<UndoReceipt> {
        participant::get_participant(&self.pool, user_id)
            .await
            .map_err(participant_lookup(user_id))?;

        let day = self.today();
        completion::unmark(&self.pool, user_id, day).await.map_err(|e| {
            if e.is_not_found() {
                TrackerError::NothingToUndo { user_id, day }
            } else {
                TrackerError::Store(e)
            }
        })?;

        info!(user_id, chat_id, operation = "undo", %day, "Completion undone");

        let roster = self.roster_for(Some(user_id)).await?;
        Ok(UndoReceipt { user_id, day, roster })
    }

    /// Current roster from the requester's point of view.
    pub async fn handle_list_request(&self, user_id: i64, _chat_id: i64) -> Result<Roster> {
        self.roster_for(Some(user_id)).await
    }

    /// Every participant in join order, oldest first.
    pub async fn handle_participant_index(&self, _user_id: i64, _chat_id: i64) -> Result<Vec<IndexEntry>> {
        let participants = participant::list_participants(&self.pool, JoinOrder::OldestFirst).await?;
        Ok(participants
            .into_iter()
            .map(|p| IndexEntry {
                user_id: p.user_id,
                name: p.name(),
            })
            .collect())
    }

    /// Set `target_user_id`'s streak to exactly `days`.
    pub async fn handle_admin_set_streak(
        &self,
        user_id: i64,
        chat_id: i64,
        target_user_id: i64,
        days: u32,
    ) -> Result<StreakSet> {
        validate_streak_days(days)?;
        info!(user_id, chat_id, target_user_id, days, operation = "set_streak", "Setting streak");
        self.set_streak(target_user_id, days).await
    }

    /// Ask for a custom streak value for `target_user_id`.
    pub async fn handle_admin_custom_streak_request(
        &self,
        user_id: i64,
        chat_id: i64,
        target_user_id: i64,
    ) -> Result<()> {
        participant::get_participant(&self.pool, target_user_id)
            .await
            .map_err(participant_lookup(target_user_id))?;

        conversation::begin(
            &self.pool,
            user_id,
            chat_id,
            ConversationState::AwaitingCustomStreak { target_user_id },
        )
        .await?;
        info!(user_id, chat_id, target_user_id, "Waiting for custom streak");
        Ok(())
    }

    /// Answer to the custom streak flow.
    pub async fn handle_custom_streak_reply(
        &self,
        user_id: i64,
        chat_id: i64,
        text: &str,
    ) -> Result<ReplyOutcome> {
        let state = conversation::pending(&self.pool, user_id, chat_id).await?;
        let Some(state @ ConversationState::AwaitingCustomStreak { .. }) = state else {
            return Ok(ReplyOutcome::Ignored);
        };

        let Reply::CustomStreak {
            target_user_id,
            days,
        } = conversation::interpret(&state, text)?
        else {
            return Ok(ReplyOutcome::Ignored);
        };

        info!(user_id, chat_id, target_user_id, days, operation = "custom_streak", "Setting streak");
        let result = self.set_streak(target_user_id, days).await?;
        conversation::finish(&self.pool, user_id, chat_id).await?;
        Ok(ReplyOutcome::StreakSet(result))
    }

    /// Rewrite the completion history so the streak as of today is `days`.
    ///
    /// Days `[today - days, today]` are cleared and `[today - days + 1, today]`
    /// filled in, so the day before the run is always a gap.
    async fn set_streak(&self, target_user_id: i64, days: u32) -> Result<StreakSet> {
        participant::get_participant(&self.pool, target_user_id)
            .await
            .map_err(participant_lookup(target_user_id))?;

        let today = self.today();
        let span = i64::from(days);
        let clear_from = today - Duration::days(span);

        let entries: Vec<(NaiveDate, Option<String>)> = (0..span)
            .map(|offset| (today - Duration::days(offset), self.notes.pick()))
            .collect();

        completion::rewrite_range(&self.pool, target_user_id, clear_from, today, &entries).await?;

        let streak = streak::individual_streak(&self.pool, target_user_id, today).await?;
        let unlocked =
            achievements::check_and_record(&self.pool, &self.sink, target_user_id, streak, today)
                .await?;

        info!(target_user_id, days, streak, "Streak set");
        Ok(StreakSet {
            target_user_id,
            days,
            streak,
            unlocked,
        })
    }

    async fn roster_for(&self, requester: Option<i64>) -> Result<Roster> {
        roster::build_roster(&self.pool, self.calendar.zone(), self.today(), requester).await
    }
}
