//! Notification sink trait and implementations.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use database::AchievementKind;
use serde::Serialize;

use crate::error::TrackerError;
use crate::roster::ParticipantStatus;
use crate::scheduler::ReminderKind;

/// Structured notification pushed to a chat outside of a request/response.
///
/// The transport renders these; the core never builds user-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A participant reached a milestone for the first time.
    AchievementUnlocked {
        user_id: i64,
        name: String,
        kind: AchievementKind,
        streak: u32,
        achieved_on: NaiveDate,
    },
    /// A participant has not completed the habit yet today.
    Reminder {
        kind: ReminderKind,
        day: NaiveDate,
        user_id: i64,
        roster: Vec<ParticipantStatus>,
    },
}

/// Trait for delivering notifications to chats.
///
/// Abstracted to support different transports (chat bots, tests, etc.)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver `notification` to `chat_id`.
    async fn notify(&self, chat_id: i64, notification: &Notification) -> Result<(), TrackerError>;
}

#[async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    async fn notify(&self, chat_id: i64, notification: &Notification) -> Result<(), TrackerError> {
        (**self).notify(chat_id, notification).await
    }
}

/// A no-op sink that discards all notifications.
#[derive(Debug, Clone, Default)]
pub struct NoOpSink;

#[async_trait]
impl NotificationSink for NoOpSink {
    async fn notify(&self, _chat_id: i64, _notification: &Notification) -> Result<(), TrackerError> {
        Ok(())
    }
}

/// A sink that logs every notification as JSON.
#[derive(Debug, Clone, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn notify(&self, chat_id: i64, notification: &Notification) -> Result<(), TrackerError> {
        let payload = serde_json::to_string(notification)
            .map_err(|e| TrackerError::NotificationFailed(e.to_string()))?;
        tracing::info!(chat_id, notification = %payload, "Notification");
        Ok(())
    }
}

/// A sink that keeps every notification in memory.
///
/// Chats listed with [`RecordingSink::fail_for`] reject deliveries.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(i64, Notification)>>,
    failing_chats: Mutex<Vec<i64>>,
}

impl RecordingSink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to `chat_id` fail.
    pub fn fail_for(&self, chat_id: i64) {
        lock(&self.failing_chats).push(chat_id);
    }

    /// Everything delivered so far.
    pub fn sent(&self) -> Vec<(i64, Notification)> {
        lock(&self.sent).clone()
    }

    /// Forget everything delivered so far.
    pub fn clear(&self) {
        lock(&self.sent).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, chat_id: i64, notification: &Notification) -> Result<(), TrackerError> {
        if lock(&self.failing_chats).contains(&chat_id) {
            return Err(TrackerError::NotificationFailed(format!(
                "chat {} is unreachable",
                chat_id
            )));
        }
        lock(&self.sent).push((chat_id, notification.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unlocked() -> Notification {
        Notification::AchievementUnlocked {
            user_id: 1,
            name: "Anna".to_string(),
            kind: AchievementKind::HundredDays,
            streak: 100,
            achieved_on: NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_noop_and_logging_sinks() {
        NoOpSink.notify(1, &unlocked()).await.unwrap();
        LoggingSink.notify(1, &unlocked()).await.unwrap();
    }

    #[tokio::test]
    async fn test_recording_sink_failures() {
        let sink = Arc::new(RecordingSink::new());
        sink.fail_for(2);

        sink.notify(1, &unlocked()).await.unwrap();
        let err = sink.notify(2, &unlocked()).await.unwrap_err();
        assert!(matches!(err, TrackerError::NotificationFailed(_)));

        assert_eq!(sink.sent().len(), 1);
        assert_eq!(sink.sent()[0].0, 1);
    }

    #[test]
    fn test_notification_serializes_with_type_tag() {
        let json = serde_json::to_value(unlocked()).unwrap();
        assert_eq!(json["type"], "achievement_unlocked");
        assert_eq!(json["kind"], "100_days");
        assert_eq!(json["achieved_on"], "2024-04-10");
    }
}
