//! Topic and course mastery.
//!
//! A card counts as mastered only under [`MASTERY_POLICY`]; every aggregate
//! in this crate (mastery score, prediction, remaining effort) goes through it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CardMemoryState, Rating, ReviewEvent};

/// Thresholds a card must meet to count as mastered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryPolicy {
    pub min_reviews: u32,
    /// Both of the last two ratings must be at least this.
    pub min_rating: Rating,
    /// Current probability of recall must be at least this.
    pub min_retrievability: f64,
    /// Trailing window for `recent_accuracy`.
    pub accuracy_window_days: i64,
}

pub const MASTERY_POLICY: MasteryPolicy = MasteryPolicy {
    min_reviews: 2,
    min_rating: Rating::Good,
    min_retrievability: 0.7,
    accuracy_window_days: 14,
};

impl MasteryPolicy {
    pub fn is_mastered(&self, memory: &CardMemoryState, now: DateTime<Utc>) -> bool {
        let rated_well = |r: Option<Rating>| r.is_some_and(|r| r >= self.min_rating);
        memory.review_count >= self.min_reviews
            && rated_well(memory.last_rating)
            && rated_well(memory.prior_rating)
            && memory.retrievability_at(now) >= self.min_retrievability
    }
}

/// Whether a card is mastered under [`MASTERY_POLICY`].
pub fn is_mastered(memory: &CardMemoryState, now: DateTime<Utc>) -> bool {
    MASTERY_POLICY.is_mastered(memory, now)
}

/// One card of a topic and the user's state for it (`None` if never reviewed).
#[derive(Debug, Clone, PartialEq)]
pub struct CardProgress {
    pub card_id: Uuid,
    pub memory: Option<CardMemoryState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicMastery {
    pub topic_id: Uuid,
    pub total_cards: u32,
    pub studied_cards: u32,
    pub mastered_cards: u32,
    /// Cards whose latest rating was Again.
    pub failed_cards: u32,
    pub mastery_score: f64,
    /// Share of Good/Easy ratings in the trailing window; `None` without reviews.
    pub recent_accuracy: Option<f64>,
    pub recent_reviews: u32,
}

impl TopicMastery {
    pub fn is_studied(&self) -> bool {
        self.studied_cards > 0
    }
}

/// Course totals summed over its topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseMastery {
    pub total_cards: u32,
    pub studied_cards: u32,
    pub mastered_cards: u32,
    pub failed_cards: u32,
    pub mastery_score: f64,
}

/// Aggregate one topic at `now`.
///
/// `events` are the user's review events for cards of this topic; only those
/// inside the policy's accuracy window are counted.
pub fn compute_topic_mastery(
    topic_id: Uuid,
    cards: &[CardProgress],
    events: &[ReviewEvent],
    now: DateTime<Utc>,
) -> TopicMastery {
    let total_cards = cards.len() as u32;
    let mut studied_cards = 0;
    let mut mastered_cards = 0;
    let mut failed_cards = 0;

    for memory in cards.iter().filter_map(|c| c.memory.as_ref()) {
        studied_cards += 1;
        if is_mastered(memory, now) {
            mastered_cards += 1;
        }
        if memory.last_rating == Some(Rating::Again) {
            failed_cards += 1;
        }
    }

    let window_start = now - Duration::days(MASTERY_POLICY.accuracy_window_days);
    let (recent_reviews, recent_correct) = events
        .iter()
        .filter(|e| e.reviewed_at > window_start && e.reviewed_at <= now)
        .fold((0u32, 0u32), |(n, ok), e| {
            (n + 1, ok + u32::from(e.rating >= MASTERY_POLICY.min_rating))
        });

    TopicMastery {
        topic_id,
        total_cards,
        studied_cards,
        mastered_cards,
        failed_cards,
        mastery_score: ratio(mastered_cards, total_cards),
        recent_accuracy: (recent_reviews > 0).then(|| ratio(recent_correct, recent_reviews)),
        recent_reviews,
    }
}

pub fn compute_course_mastery(topics: &[TopicMastery]) -> CourseMastery {
    let total_cards = topics.iter().map(|t| t.total_cards).sum();
    let mastered_cards = topics.iter().map(|t| t.mastered_cards).sum();
    CourseMastery {
        total_cards,
        studied_cards: topics.iter().map(|t| t.studied_cards).sum(),
        mastered_cards,
        failed_cards: topics.iter().map(|t| t.failed_cards).sum(),
        mastery_score: ratio(mastered_cards, total_cards),
    }
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CardState;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn memory(
        review_count: u32,
        last: Rating,
        prior: Option<Rating>,
        days_since_review: i64,
        stability: f64,
    ) -> CardMemoryState {
        let last_review = now() - Duration::days(days_since_review);
        CardMemoryState {
            state: CardState::Review,
            difficulty: 5.0,
            stability,
            due: last_review + Duration::days(stability as i64),
            last_review: Some(last_review),
            review_count,
            lapse_count: 0,
            relearning_streak: 0,
            last_rating: Some(last),
            prior_rating: prior,
        }
    }

    fn event(rating: Rating, days_ago: i64) -> ReviewEvent {
        let at = now() - Duration::days(days_ago);
        ReviewEvent {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            card_id: Uuid::nil(),
            sequence: 1,
            rating,
            reviewed_at: at,
            response_time_ms: 5000,
            desired_retention: 0.9,
            state_before: CardState::Review,
            elapsed_days: 1.0,
            resulting_state: memory(3, rating, Some(Rating::Good), days_ago, 5.0),
        }
    }

    #[test]
    fn mastered_requires_two_good_ratings_and_recall() {
        assert!(is_mastered(&memory(2, Rating::Good, Some(Rating::Easy), 1, 10.0), now()));
        // one review only
        assert!(!is_mastered(&memory(1, Rating::Easy, None, 1, 10.0), now()));
        // hard in the last two
        assert!(!is_mastered(&memory(5, Rating::Good, Some(Rating::Hard), 1, 10.0), now()));
        assert!(!is_mastered(&memory(5, Rating::Again, Some(Rating::Good), 1, 10.0), now()));
    }

    #[test]
    fn mastery_decays_with_retrievability() {
        // R = 1 / (1 + 40 / 90) ~ 0.69
        let stale = memory(4, Rating::Good, Some(Rating::Good), 40, 10.0);
        assert!(stale.retrievability_at(now()) < 0.7);
        assert!(!is_mastered(&stale, now()));

        let fresh = memory(4, Rating::Good, Some(Rating::Good), 30, 10.0);
        assert!(is_mastered(&fresh, now()));
    }

    #[test]
    fn topic_mastery_counts_unstudied_cards_against_score() {
        let topic = Uuid::new_v4();
        let cards = vec![
            CardProgress {
                card_id: Uuid::new_v4(),
                memory: Some(memory(3, Rating::Good, Some(Rating::Good), 1, 10.0)),
            },
            CardProgress {
                card_id: Uuid::new_v4(),
                memory: Some(memory(3, Rating::Again, Some(Rating::Good), 1, 2.0)),
            },
            CardProgress {
                card_id: Uuid::new_v4(),
                memory: None,
            },
            CardProgress {
                card_id: Uuid::new_v4(),
                memory: None,
            },
        ];

        let mastery = compute_topic_mastery(topic, &cards, &[], now());

        assert_eq!(mastery.topic_id, topic);
        assert_eq!(mastery.total_cards, 4);
        assert_eq!(mastery.studied_cards, 2);
        assert_eq!(mastery.mastered_cards, 1);
        assert_eq!(mastery.failed_cards, 1);
        assert_eq!(mastery.mastery_score, 0.25);
        assert_eq!(mastery.recent_accuracy, None);
    }

    #[test]
    fn empty_topic_scores_zero() {
        let mastery = compute_topic_mastery(Uuid::new_v4(), &[], &[], now());
        assert_eq!(mastery.mastery_score, 0.0);
        assert!(!mastery.is_studied());
    }

    #[test]
    fn recent_accuracy_uses_trailing_window() {
        let events = vec![
            event(Rating::Good, 1),
            event(Rating::Easy, 3),
            event(Rating::Again, 5),
            event(Rating::Hard, 10),
            // outside the 14-day window
            event(Rating::Again, 20),
            event(Rating::Again, 30),
        ];
        let mastery = compute_topic_mastery(Uuid::new_v4(), &[], &events, now());
        assert_eq!(mastery.recent_reviews, 4);
        assert_eq!(mastery.recent_accuracy, Some(0.5));
    }

    #[test]
    fn course_mastery_sums_topics() {
        let topic = |total, mastered| TopicMastery {
            topic_id: Uuid::new_v4(),
            total_cards: total,
            studied_cards: mastered,
            mastered_cards: mastered,
            failed_cards: 0,
            mastery_score: f64::from(mastered) / f64::from(total),
            recent_accuracy: None,
            recent_reviews: 0,
        };
        let course = compute_course_mastery(&[topic(10, 5), topic(30, 5)]);
        assert_eq!(course.total_cards, 40);
        assert_eq!(course.mastered_cards, 10);
        assert_eq!(course.mastery_score, 0.25);

        assert_eq!(compute_course_mastery(&[]).mastery_score, 0.0);
    }
}
