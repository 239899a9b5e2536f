//! Error types for tracker operations.

use chrono::NaiveDate;
use database::{DatabaseError, ValidationError};
use thiserror::Error;

/// Errors that can occur while handling an inbound event.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The user already completed the habit on this day.
    #[error("user {user_id} already completed {day}")]
    AlreadyCompleted { user_id: i64, day: NaiveDate },

    /// Undo requested but nothing was recorded for the day.
    #[error("nothing to undo for user {user_id} on {day}")]
    NothingToUndo { user_id: i64, day: NaiveDate },

    /// The referenced user is not a registered participant.
    #[error("unknown participant: {0}")]
    UnknownParticipant(i64),

    /// A value supplied by the user was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// The persistent store failed.
    #[error("store failure: {0}")]
    Store(#[from] DatabaseError),

    /// The notification sink could not deliver a message.
    #[error("notification failed: {0}")]
    NotificationFailed(String),
}

impl TrackerError {
    /// Stable machine-readable code for the transport.
    pub fn code(&self) -> &'static str {
        match self {
            TrackerError::AlreadyCompleted { .. } => "already_completed",
            TrackerError::NothingToUndo { .. } => "nothing_to_undo",
            TrackerError::UnknownParticipant(_) => "unknown_participant",
            TrackerError::InvalidInput(_) => "invalid_input",
            TrackerError::Store(_) => "store_failure",
            TrackerError::NotificationFailed(_) => "notification_failed",
        }
    }

    /// Whether the user can act on this error (as opposed to a system fault).
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            TrackerError::Store(_) | TrackerError::NotificationFailed(_)
        )
    }
}

/// Map a store "not found" for a participant lookup to [`TrackerError::UnknownParticipant`].
pub(crate) fn participant_lookup(user_id: i64) -> impl FnOnce(DatabaseError) -> TrackerError {
    move |e| {
        if e.is_not_found() {
            TrackerError::UnknownParticipant(user_id)
        } else {
            TrackerError::Store(e)
        }
    }
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_facing() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = TrackerError::AlreadyCompleted { user_id: 1, day };
        assert_eq!(err.code(), "already_completed");
        assert!(err.is_user_facing());
        assert_eq!(err.to_string(), "user 1 already completed 2024-01-01");

        let err = TrackerError::Store(DatabaseError::NotFound {
            entity: "Participant",
            id: "1".to_string(),
        });
        assert!(!err.is_user_facing());
    }

    #[test]
    fn test_participant_lookup_mapping() {
        let err = participant_lookup(9)(DatabaseError::NotFound {
            entity: "Participant",
            id: "9".to_string(),
        });
        assert!(matches!(err, TrackerError::UnknownParticipant(9)));

        let err = participant_lookup(9)(DatabaseError::Corrupt {
            entity: "Participant",
            detail: "x".to_string(),
        });
        assert!(matches!(err, TrackerError::Store(_)));
    }
}
