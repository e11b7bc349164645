//! Review scheduler: one graded review in, next memory state and due date out.
//!
//! State transitions:
//! - New -> Learning on Again/Hard, New -> Review on Good/Easy
//! - Learning -> Review on Good/Easy, otherwise stays Learning
//! - Review -> Relearning on Again (a lapse)
//! - Relearning -> Review after `graduation_streak` consecutive non-Again ratings
//!
//! Review cards are scheduled where the forgetting curve reaches the desired
//! retention. Learning and Relearning cards get a short-term step instead.

use chrono::{DateTime, Duration, Utc};

use crate::algorithm::{interval_from_stability, Fsrs, MemoryState};
use crate::error::{CoreError, Result};
use crate::types::{CardMemoryState, CardState, Rating, ReviewEvent};

/// Result of scheduling a card after review.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingResult {
    pub new_state: CardMemoryState,
    pub next_due: DateTime<Utc>,
    pub elapsed_days: f64,
    pub lapsed: bool,
}

/// Scheduler with configurable parameters.
#[derive(Debug, Clone)]
pub struct Scheduler {
    pub model: Fsrs,
    pub graduation_streak: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            model: Fsrs::default(),
            graduation_streak: 2,
        }
    }
}

impl Scheduler {
    /// Calculate the next state after a review at `now`.
    ///
    /// `prev == None` means the card has never been reviewed by this user.
    pub fn schedule(
        &self,
        prev: Option<&CardMemoryState>,
        rating: Rating,
        now: DateTime<Utc>,
        desired_retention: f64,
    ) -> Result<SchedulingResult> {
        if !(desired_retention > 0.0 && desired_retention < 1.0) {
            return Err(CoreError::InvalidRetention(desired_retention));
        }

        let elapsed_days = prev.map(|p| p.elapsed_days(now)).unwrap_or(0.0);
        let memory = self.model.next_memory(
            prev.map(|p| MemoryState {
                difficulty: p.difficulty,
                stability: p.stability,
            }),
            rating,
            elapsed_days,
        )?;

        let (state, relearning_streak, lapsed) = match prev {
            Some(p) => self.transition(p.state, p.relearning_streak, rating),
            None => self.transition(CardState::New, 0, rating),
        };

        let next_due = if state.is_short_term() {
            now + Self::short_term_interval(memory.stability)
        } else {
            now + self.review_interval(memory.stability, desired_retention)
        };

        let new_state = CardMemoryState {
            state,
            difficulty: memory.difficulty,
            stability: memory.stability,
            due: next_due,
            last_review: Some(now),
            review_count: prev.map(|p| p.review_count).unwrap_or(0) + 1,
            lapse_count: prev.map(|p| p.lapse_count).unwrap_or(0) + u32::from(lapsed),
            relearning_streak,
            last_rating: Some(rating),
            prior_rating: prev.and_then(|p| p.last_rating),
        };

        Ok(SchedulingResult {
            new_state,
            next_due,
            elapsed_days,
            lapsed,
        })
    }

    /// Rebuild a card's state from its review log.
    ///
    /// Events are applied in commit (`sequence`) order, each with the
    /// retention target logged alongside it.
    pub fn replay(&self, events: &[ReviewEvent]) -> Result<Option<CardMemoryState>> {
        let mut ordered: Vec<&ReviewEvent> = events.iter().collect();
        ordered.sort_by_key(|e| (e.sequence, e.reviewed_at));

        let mut state: Option<CardMemoryState> = None;
        for event in ordered {
            let result = self.schedule(
                state.as_ref(),
                event.rating,
                event.reviewed_at,
                event.desired_retention,
            )?;
            state = Some(result.new_state);
        }
        Ok(state)
    }

    /// Returns (next state, relearning streak, whether this review was a lapse).
    fn transition(&self, current: CardState, streak: u32, rating: Rating) -> (CardState, u32, bool) {
        match (current, rating) {
            (CardState::New, Rating::Again | Rating::Hard) => (CardState::Learning, 0, false),
            (CardState::New, _) => (CardState::Review, 0, false),
            (CardState::Learning, Rating::Again | Rating::Hard) => (CardState::Learning, 0, false),
            (CardState::Learning, _) => (CardState::Review, 0, false),
            (CardState::Review, Rating::Again) => (CardState::Relearning, 0, true),
            (CardState::Review, _) => (CardState::Review, 0, false),
            (CardState::Relearning, Rating::Again) => (CardState::Relearning, 0, true),
            (CardState::Relearning, _) => {
                let streak = streak + 1;
                if streak >= self.graduation_streak {
                    (CardState::Review, 0, false)
                } else {
                    (CardState::Relearning, streak, false)
                }
            }
        }
    }

    /// Interval for a Review card, between one day and the maximum interval.
    fn review_interval(&self, stability: f64, desired_retention: f64) -> Duration {
        let days = interval_from_stability(stability, desired_retention)
            .max(1.0)
            .min(self.model.maximum_interval);
        Duration::seconds((days * 86400.0).round() as i64)
    }

    /// Short-term step for learning/relearning states.
    fn short_term_interval(stability: f64) -> Duration {
        // Use 10 minutes to 1 day based on stability
        let minutes = (stability * 60.0).clamp(10.0, 1440.0);
        Duration::seconds((minutes * 60.0).round() as i64)
    }
}
