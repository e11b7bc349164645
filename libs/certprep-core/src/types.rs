//! Core types for the scheduling engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Card learning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    New,
    Learning,
    Review,
    Relearning,
}

impl Default for CardState {
    fn default() -> Self {
        Self::New
    }
}

impl CardState {
    /// Numeric code used on the wire and in storage (0-3).
    pub fn to_value(self) -> u8 {
        match self {
            Self::New => 0,
            Self::Learning => 1,
            Self::Review => 2,
            Self::Relearning => 3,
        }
    }

    /// Create from numeric code.
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::New),
            1 => Some(Self::Learning),
            2 => Some(Self::Review),
            3 => Some(Self::Relearning),
            _ => None,
        }
    }

    /// Learning and Relearning cards are rescheduled on short-term steps.
    pub fn is_short_term(self) -> bool {
        matches!(self, Self::Learning | Self::Relearning)
    }
}

/// Rating for a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    /// Convert to 4-point numeric value (1-4).
    pub fn to_value(self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    /// Create from 4-point numeric value.
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Again),
            2 => Some(Self::Hard),
            3 => Some(Self::Good),
            4 => Some(Self::Easy),
            _ => None,
        }
    }

    /// Validate an untrusted rating (e.g. from a request body).
    pub fn parse(value: i64) -> Result<Self> {
        u8::try_from(value)
            .ok()
            .and_then(Self::from_value)
            .ok_or(CoreError::InvalidRating(value))
    }

    /// Anything but Again counts as a successful recall.
    pub fn is_recall(self) -> bool {
        self != Self::Again
    }
}

/// Memory state of one card for one user.
///
/// A materialized view of the latest [`ReviewEvent`] for the pair; it only
/// exists once the card has been reviewed. Retrievability is not stored and
/// is derived from `last_review` and `stability` at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardMemoryState {
    pub state: CardState,
    pub difficulty: f64,
    pub stability: f64,
    pub due: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_review: Option<DateTime<Utc>>,
    pub review_count: u32,
    pub lapse_count: u32,
    /// Consecutive non-Again ratings while relearning.
    #[serde(default)]
    pub relearning_streak: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_rating: Option<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_rating: Option<Rating>,
}

impl CardMemoryState {
    /// Days since the last review, clamped to zero.
    pub fn elapsed_days(&self, now: DateTime<Utc>) -> f64 {
        match self.last_review {
            Some(last) => {
                let secs = now.signed_duration_since(last).num_seconds();
                (secs as f64 / 86400.0).max(0.0)
            }
            None => 0.0,
        }
    }

    /// Probability of recall at `now`.
    pub fn retrievability_at(&self, now: DateTime<Utc>) -> f64 {
        crate::algorithm::retrievability(self.elapsed_days(now), self.stability)
    }

    /// Days past due at `now` (negative when not yet due).
    pub fn overdue_days(&self, now: DateTime<Utc>) -> f64 {
        now.signed_duration_since(self.due).num_seconds() as f64 / 86400.0
    }
}

/// Immutable review log entry; the source of truth for card state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub card_id: Uuid,
    /// 1-based position in the card's log; equals the state version it produced.
    pub sequence: i64,
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
    pub response_time_ms: u32,
    /// Retention target in force when the review was graded.
    pub desired_retention: f64,
    pub state_before: CardState,
    pub elapsed_days: f64,
    pub resulting_state: CardMemoryState,
}
