//! Database models and API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{ApiError, Result};

// Re-export shared types from certprep-core
pub use certprep_core::{
    CardMemoryState, CardState, ExamConfig, ExamHistory, Prediction, Rating, ReviewEvent,
    StudyRoi, TopicMastery,
};

// === Database Entity Types ===

/// Course in the content catalog
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Topic within a course
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Topic {
    pub id: Uuid,
    pub course_id: Uuid,
    pub name: String,
    /// Share of the exam, in percent
    pub weight_pct: f64,
    pub sort_order: i32,
}

/// Card content
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Card {
    pub id: Uuid,
    pub course_id: Uuid,
    pub topic_id: Uuid,
    pub front: String,
    pub back: String,
    pub sort_order: i32,
}

/// A user's enrollment in a course
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub desired_retention: f64,
    pub is_active: bool,
    pub enrolled_at: DateTime<Utc>,
}

/// Card memory state row in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbMemoryState {
    pub card_id: Uuid,
    pub state: i16,
    pub difficulty: f64,
    pub stability: f64,
    pub due: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
    pub review_count: i32,
    pub lapse_count: i32,
    pub relearning_streak: i32,
    pub last_rating: Option<i16>,
    pub prior_rating: Option<i16>,
    pub version: i64,
}

impl DbMemoryState {
    /// Convert to certprep-core state
    pub fn to_core_state(&self) -> Result<CardMemoryState> {
        Ok(CardMemoryState {
            state: state_from_code(self.state)?,
            difficulty: self.difficulty,
            stability: self.stability,
            due: self.due,
            last_review: self.last_review,
            review_count: self.review_count.max(0) as u32,
            lapse_count: self.lapse_count.max(0) as u32,
            relearning_streak: self.relearning_streak.max(0) as u32,
            last_rating: self.last_rating.map(rating_from_code).transpose()?,
            prior_rating: self.prior_rating.map(rating_from_code).transpose()?,
        })
    }
}

/// Review event row in PostgreSQL
#[derive(Debug, Clone, FromRow)]
pub struct DbReviewEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub card_id: Uuid,
    pub sequence: i64,
    pub rating: i16,
    pub reviewed_at: DateTime<Utc>,
    pub response_time_ms: i32,
    pub desired_retention: f64,
    pub state_before: i16,
    pub elapsed_days: f64,
    pub resulting_state: Json<CardMemoryState>,
}

impl DbReviewEvent {
    /// Convert to certprep-core event
    pub fn into_core_event(self) -> Result<ReviewEvent> {
        Ok(ReviewEvent {
            id: self.id,
            user_id: self.user_id,
            card_id: self.card_id,
            sequence: self.sequence,
            rating: rating_from_code(self.rating)?,
            reviewed_at: self.reviewed_at,
            response_time_ms: self.response_time_ms.max(0) as u32,
            desired_retention: self.desired_retention,
            state_before: state_from_code(self.state_before)?,
            elapsed_days: self.elapsed_days,
            resulting_state: self.resulting_state.0,
        })
    }
}

fn state_from_code(code: i16) -> Result<CardState> {
    u8::try_from(code)
        .ok()
        .and_then(CardState::from_value)
        .ok_or_else(|| ApiError::Internal(format!("Stored card state {} is invalid", code)))
}

fn rating_from_code(code: i16) -> Result<Rating> {
    u8::try_from(code)
        .ok()
        .and_then(Rating::from_value)
        .ok_or_else(|| ApiError::Internal(format!("Stored rating {} is invalid", code)))
}

// === API Request/Response Types ===

/// Request body for POST /cards/review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub card_id: Uuid,
    /// 1 = Again, 2 = Hard, 3 = Good, 4 = Easy
    pub rating: i64,
    #[serde(default)]
    pub response_time_ms: i64,
}

/// Response for POST /cards/review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub card_id: Uuid,
    /// 0 = New, 1 = Learning, 2 = Review, 3 = Relearning
    pub state: u8,
    pub due: DateTime<Utc>,
    pub difficulty: f64,
    pub stability: f64,
    pub retrievability: f64,
    pub next_review_in_hours: f64,
    pub review_count: u32,
    pub lapse_count: u32,
    /// Write attempts needed, more than one after a concurrent review
    pub attempts: u32,
}

/// Query params for GET /cards/due
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DueCardsQuery {
    pub limit: Option<usize>,
    pub course_id: Option<Uuid>,
}

/// Card content plus the user's memory state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardWithReview {
    pub id: Uuid,
    pub course_id: Uuid,
    pub topic_id: Uuid,
    pub front: String,
    pub back: String,
    pub state: u8,
    pub due: DateTime<Utc>,
    pub difficulty: f64,
    pub stability: f64,
    pub retrievability: f64,
}

impl CardWithReview {
    pub fn reviewed(card: &Card, memory: &CardMemoryState, now: DateTime<Utc>) -> Self {
        Self {
            id: card.id,
            course_id: card.course_id,
            topic_id: card.topic_id,
            front: card.front.clone(),
            back: card.back.clone(),
            state: memory.state.to_value(),
            due: memory.due,
            difficulty: memory.difficulty,
            stability: memory.stability,
            retrievability: memory.retrievability_at(now),
        }
    }

    /// A never-reviewed card, due immediately.
    pub fn unseen(card: &Card, now: DateTime<Utc>) -> Self {
        Self {
            id: card.id,
            course_id: card.course_id,
            topic_id: card.topic_id,
            front: card.front.clone(),
            back: card.back.clone(),
            state: CardState::New.to_value(),
            due: now,
            difficulty: 0.0,
            stability: 0.0,
            retrievability: 1.0,
        }
    }
}

/// Response for GET /cards/due
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DueCardsResponse {
    pub cards: Vec<CardWithReview>,
    pub total_due: usize,
}

/// Response for GET /cards/{card_id}/history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardHistoryResponse {
    pub card_id: Uuid,
    pub events: Vec<ReviewEvent>,
    /// State rebuilt from the event log
    pub replayed_state: Option<CardMemoryState>,
    pub stored_state: Option<CardMemoryState>,
    pub version: Option<i64>,
    /// Whether the stored state matches the replay
    pub consistent: bool,
}

/// Weak topic entry in a prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeakTopicResponse {
    pub topic_id: Uuid,
    pub topic_name: String,
    pub mastery_score: f64,
    pub weight_pct: f64,
    pub priority: f64,
}

/// Response for GET /predictions/{course_id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_score: f64,
    /// Percent, 0-100
    pub pass_probability: f64,
    pub passing_score: f64,
    pub weak_topics: Vec<WeakTopicResponse>,
    pub total_topics: usize,
    pub studied_topics: usize,
    pub recommendation: String,
    pub insufficient_data: bool,
}

impl From<Prediction> for PredictionResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            predicted_score: round_to(prediction.predicted_score, 1),
            pass_probability: round_to(prediction.pass_probability * 100.0, 1),
            passing_score: round_to(prediction.passing_score, 1),
            weak_topics: prediction
                .weak_topics
                .into_iter()
                .map(|w| WeakTopicResponse {
                    topic_id: w.topic_id,
                    topic_name: w.name,
                    mastery_score: round_to(w.mastery_score, 4),
                    weight_pct: w.weight_pct,
                    priority: round_to(w.priority, 4),
                })
                .collect(),
            total_topics: prediction.total_topics,
            studied_topics: prediction.studied_topics,
            recommendation: prediction.recommendation.message(),
            insufficient_data: prediction.insufficient_data,
        }
    }
}

/// Response for GET /predictions/{course_id}/roi
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoiResponse {
    pub total_cards: u32,
    pub mastered_cards: u32,
    pub remaining_cards: u32,
    pub estimated_hours_remaining: f64,
    pub total_study_hours: f64,
    pub reviews_per_hour: f64,
    pub rate_source: certprep_core::RateSource,
}

impl From<StudyRoi> for RoiResponse {
    fn from(roi: StudyRoi) -> Self {
        Self {
            total_cards: roi.total_cards,
            mastered_cards: roi.mastered_cards,
            remaining_cards: roi.remaining_cards,
            estimated_hours_remaining: round_to(roi.estimated_hours_remaining, 1),
            total_study_hours: round_to(roi.total_study_hours, 1),
            reviews_per_hour: round_to(roi.reviews_per_hour, 1),
            rate_source: roi.rate_source,
        }
    }
}

/// Request body for PUT /enrollments/{id}/retention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRetentionRequest {
    pub desired_retention: f64,
}

/// Response for GET /enrollments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentListResponse {
    pub enrollments: Vec<Enrollment>,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_db_memory_state_round_trip_codes() {
        let now = Utc::now();
        let row = DbMemoryState {
            card_id: Uuid::new_v4(),
            state: 3,
            difficulty: 6.2,
            stability: 1.5,
            due: now + Duration::hours(1),
            last_review: Some(now),
            review_count: 7,
            lapse_count: 2,
            relearning_streak: 1,
            last_rating: Some(3),
            prior_rating: Some(1),
            version: 7,
        };

        let state = row.to_core_state().unwrap();
        assert_eq!(state.state, CardState::Relearning);
        assert_eq!(state.last_rating, Some(Rating::Good));
        assert_eq!(state.prior_rating, Some(Rating::Again));
        assert_eq!(state.relearning_streak, 1);
    }

    #[test]
    fn test_db_memory_state_rejects_bad_state() {
        let row = DbMemoryState {
            card_id: Uuid::new_v4(),
            state: 9,
            difficulty: 5.0,
            stability: 1.0,
            due: Utc::now(),
            last_review: None,
            review_count: 0,
            lapse_count: 0,
            relearning_streak: 0,
            last_rating: None,
            prior_rating: None,
            version: 1,
        };
        assert!(matches!(row.to_core_state(), Err(ApiError::Internal(_))));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.46, 1), 2.5);
        assert_eq!(round_to(0.123456, 4), 0.1235);
    }

    #[test]
    fn test_review_request_defaults_response_time() {
        let request: ReviewRequest = serde_json::from_value(serde_json::json!({
            "card_id": Uuid::nil(),
            "rating": 3
        }))
        .unwrap();
        assert_eq!(request.response_time_ms, 0);
    }
}
