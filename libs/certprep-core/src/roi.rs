//! Remaining study effort for a course.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ReviewEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct RoiParams {
    pub window_days: i64,
    /// Reviews it takes on average to master one card.
    pub reviews_per_card: f64,
    pub default_reviews_per_hour: f64,
    /// Below either minimum the observed rate is not trusted.
    pub min_reviews: usize,
    pub min_hours: f64,
    /// Longer answers are treated as the user walking away.
    pub max_response_ms: u32,
    /// Assumed time for reviews logged without a response time.
    pub missing_response_ms: u32,
}

impl Default for RoiParams {
    fn default() -> Self {
        Self {
            window_days: 14,
            reviews_per_card: 5.0,
            default_reviews_per_hour: 120.0,
            min_reviews: 20,
            min_hours: 0.25,
            max_response_ms: 300_000,
            missing_response_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Observed,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRoi {
    pub total_cards: u32,
    pub mastered_cards: u32,
    pub remaining_cards: u32,
    pub estimated_hours_remaining: f64,
    pub total_study_hours: f64,
    pub reviews_per_hour: f64,
    pub rate_source: RateSource,
}

/// Estimate hours left to master the remaining cards.
///
/// `events` are all of the user's review events for the course.
pub fn estimate_remaining_hours(
    total_cards: u32,
    mastered_cards: u32,
    events: &[ReviewEvent],
    now: DateTime<Utc>,
    params: &RoiParams,
) -> StudyRoi {
    let remaining_cards = total_cards.saturating_sub(mastered_cards);
    let review_hours = |e: &ReviewEvent| {
        let ms = match e.response_time_ms {
            0 => params.missing_response_ms,
            ms => ms.min(params.max_response_ms),
        };
        f64::from(ms) / 3_600_000.0
    };

    let window_start = now - Duration::days(params.window_days);
    let (window_reviews, window_hours) = events
        .iter()
        .filter(|e| e.reviewed_at > window_start && e.reviewed_at <= now)
        .fold((0usize, 0.0f64), |(n, h), e| (n + 1, h + review_hours(e)));

    let (reviews_per_hour, rate_source) =
        if window_reviews < params.min_reviews || window_hours < params.min_hours {
            (params.default_reviews_per_hour, RateSource::Default)
        } else {
            (window_reviews as f64 / window_hours, RateSource::Observed)
        };

    StudyRoi {
        total_cards,
        mastered_cards,
        remaining_cards,
        estimated_hours_remaining: f64::from(remaining_cards) * params.reviews_per_card
            / reviews_per_hour,
        total_study_hours: events.iter().map(review_hours).sum(),
        reviews_per_hour,
        rate_source,
    }
}
