//! Database models.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::DatabaseError;

/// A member of the habit group, identified by the transport's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Participant {
    /// Stable external user id (always positive).
    pub user_id: i64,
    /// Chat the participant most recently joined from; reminders go here.
    pub chat_id: i64,
    /// External handle (username), if the transport knows one.
    pub handle: Option<String>,
    /// Name chosen during the join flow.
    pub display_name: Option<String>,
    /// When the participant first joined. Never changes after insert.
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Name to show for this participant.
    ///
    /// Falls back to the handle, then to the numeric id.
    pub fn name(&self) -> String {
        display_name_or_handle(self.user_id, self.display_name.as_deref(), self.handle.as_deref())
    }
}

pub(crate) fn display_name_or_handle(
    user_id: i64,
    display_name: Option<&str>,
    handle: Option<&str>,
) -> String {
    display_name
        .or(handle)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", user_id))
}

/// "User X completed the habit on day D".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Completion {
    /// Participant id.
    pub user_id: i64,
    /// Calendar day in the reference timezone.
    pub completed_on: NaiveDate,
    /// Congratulation note captured when the completion was recorded.
    pub note: Option<String>,
}

/// Milestones a participant can reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AchievementKind {
    /// 100 consecutive days.
    #[serde(rename = "100_days")]
    HundredDays,
    /// 365 consecutive days.
    #[serde(rename = "365_days")]
    YearLong,
}

impl AchievementKind {
    /// Every tier, lowest threshold first.
    pub const ALL: [AchievementKind; 2] = [AchievementKind::HundredDays, AchievementKind::YearLong];

    /// Stored identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementKind::HundredDays => "100_days",
            AchievementKind::YearLong => "365_days",
        }
    }

    /// Streak length required to earn this tier.
    pub fn threshold(&self) -> u32 {
        match self {
            AchievementKind::HundredDays => 100,
            AchievementKind::YearLong => 365,
        }
    }

    /// Parse a stored identifier.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "100_days" => Some(AchievementKind::HundredDays),
            "365_days" => Some(AchievementKind::YearLong),
            _ => None,
        }
    }
}

impl fmt::Display for AchievementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Achievement {
    /// Participant id.
    pub user_id: i64,
    /// Stored identifier, see [`AchievementKind::as_str`].
    pub achievement_type: String,
    /// Day the threshold was first met.
    pub achieved_on: NaiveDate,
}

impl Achievement {
    /// Typed milestone, if the stored identifier is known.
    pub fn kind(&self) -> Option<AchievementKind> {
        AchievementKind::parse(&self.achievement_type)
    }
}

/// An achievement joined with the holder's name fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AchievementHolder {
    pub user_id: i64,
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub achievement_type: String,
    pub achieved_on: NaiveDate,
}

impl AchievementHolder {
    /// Name to show for the holder.
    pub fn name(&self) -> String {
        display_name_or_handle(self.user_id, self.display_name.as_deref(), self.handle.as_deref())
    }

    /// Typed milestone, if the stored identifier is known.
    pub fn kind(&self) -> Option<AchievementKind> {
        AchievementKind::parse(&self.achievement_type)
    }
}

/// What the next free-text reply from a user in a chat should answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationState {
    /// Waiting for the display name after a join request.
    AwaitingName,
    /// Waiting for an integer streak value for another participant.
    AwaitingCustomStreak {
        /// Participant whose streak will be set.
        target_user_id: i64,
    },
}

impl ConversationState {
    const AWAITING_NAME: &'static str = "awaiting_name";
    const AWAITING_CUSTOM_STREAK: &'static str = "awaiting_custom_streak";

    /// Stored kind tag.
    pub fn kind(&self) -> &'static str {
        match self {
            ConversationState::AwaitingName => Self::AWAITING_NAME,
            ConversationState::AwaitingCustomStreak { .. } => Self::AWAITING_CUSTOM_STREAK,
        }
    }

    /// Stored context payload.
    pub fn context(&self) -> Option<String> {
        match self {
            ConversationState::AwaitingName => None,
            ConversationState::AwaitingCustomStreak { target_user_id } => {
                Some(target_user_id.to_string())
            }
        }
    }

    /// Rebuild a state from its stored `(kind, context)` pair.
    pub fn from_parts(kind: &str, context: Option<&str>) -> Result<Self, DatabaseError> {
        match kind {
            Self::AWAITING_NAME => Ok(ConversationState::AwaitingName),
            Self::AWAITING_CUSTOM_STREAK => {
                let raw = context.ok_or_else(|| DatabaseError::Corrupt {
                    entity: "PendingConversation",
                    detail: "custom streak flow without target".to_string(),
                })?;
                let target_user_id = raw.trim().parse().map_err(|_| DatabaseError::Corrupt {
                    entity: "PendingConversation",
                    detail: format!("invalid target user id '{}'", raw),
                })?;
                Ok(ConversationState::AwaitingCustomStreak { target_user_id })
            }
            other => Err(DatabaseError::Corrupt {
                entity: "PendingConversation",
                detail: format!("unknown kind '{}'", other),
            }),
        }
    }
}

/// An outstanding multi-step interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConversation {
    pub user_id: i64,
    pub chat_id: i64,
    pub state: ConversationState,
    /// Creation timestamp.
    pub created_at: String,
}
