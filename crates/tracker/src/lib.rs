//! Engagement-tracking core for a group habit challenge.
//!
//! Participants mark a daily habit as done at most once per calendar day.
//! The [`Tracker`] turns inbound events into structured outcomes: personal
//! and group streaks, one-time milestone achievements and rosters. The
//! [`ReminderScheduler`] nudges participants who have not completed the
//! current day at two fixed local times.
//!
//! The chat transport stays outside: events come in as [`InboundEvent`]
//! values and notifications leave through a [`NotificationSink`]. Nothing
//! here renders user-facing text.
//!
//! # Architecture
//!
//! ```text
//! InboundEvent ──► Tracker::dispatch ──┬─► direct action (mark, undo, list, ...)
//!                                      └─► conversation (name, custom streak)
//!                                                │
//!                       completions ◄────────────┘
//!                            │
//!              streak engine ─► achievement engine ─► NotificationSink
//!                            │
//! ReminderScheduler ─────────┴──────────────────────► NotificationSink
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chrono::FixedOffset;
//! use database::Database;
//! use tracker::{Calendar, LoggingSink, SystemClock, Tracker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite:habit.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let zone = FixedOffset::east_opt(5 * 3600).ok_or("bad offset")?;
//!     let calendar = Calendar::new(Arc::new(SystemClock), zone);
//!     let tracker = Tracker::new(db.pool().clone(), calendar, LoggingSink);
//!
//!     let receipt = tracker.handle_mark_completion(1001, 1001).await?;
//!     println!("streak: {}", receipt.streak);
//!     Ok(())
//! }
//! ```

pub mod achievements;
pub mod clock;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod notes;
pub mod processor;
pub mod roster;
pub mod scheduler;
pub mod sink;
pub mod streak;
mod tracker;

pub use clock::{Calendar, Clock, ManualClock, SystemClock};
pub use config::{ConfigError, TrackerConfig};
pub use error::{Result, TrackerError};
pub use events::{Action, InboundEvent, Outcome};
pub use notes::NotePicker;
pub use processor::{EventProcessor, ProcessResult, ProcessStats, Response};
pub use roster::{FameEntry, HallOfFame, ParticipantStatus, Roster};
pub use scheduler::{ReminderKind, ReminderReport, ReminderSchedule, ReminderScheduler, Trigger};
pub use sink::{LoggingSink, NoOpSink, Notification, NotificationSink, RecordingSink};
pub use tracker::{
    CompletionReceipt, IndexEntry, Registered, ReplyOutcome, StartOutcome, StreakSet, Tracker,
    UndoReceipt,
};
