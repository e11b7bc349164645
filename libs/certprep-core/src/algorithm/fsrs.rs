//! FSRS (Free Spaced Repetition Scheduler) memory model.
//!
//! Modern algorithm based on memory research using DSR model:
//! - Difficulty (D): Card difficulty 1-10
//! - Stability (S): Days until retention drops to 90%
//! - Retrievability (R): Probability of recall
//!
//! The update rule is a pure function of the previous (D, S), the rating and
//! the days elapsed since the previous review.

use super::{retrievability, MemoryState, MAX_DIFFICULTY, MIN_DIFFICULTY, MIN_STABILITY};
use crate::error::{CoreError, Result};
use crate::types::Rating;

/// FSRS model with configurable parameters.
#[derive(Debug, Clone)]
pub struct Fsrs {
    pub maximum_interval: f64,
    /// FSRS-4.5 weights w[0..=10].
    pub w: [f64; 11],
    /// Multiplier on the recall growth term for Hard.
    pub hard_penalty: f64,
    /// Multiplier on the recall growth term for Easy.
    pub easy_bonus: f64,
    /// Fixed stability multiplier applied on a lapse.
    pub lapse_penalty: f64,
}

impl Default for Fsrs {
    fn default() -> Self {
        Self {
            maximum_interval: 36500.0,
            w: [
                0.4, 0.6, 2.4, 5.8, // w[0-3]: initial stability for Again, Hard, Good, Easy
                4.93, // w[4]: initial difficulty base
                0.94, // w[5]: initial difficulty modifier
                0.86, // w[6]: difficulty decay
                0.01, // w[7]: mean reversion weight
                1.49, // w[8]: stability exp base
                0.14, // w[9]: stability decay
                0.94, // w[10]: retrievability effect
            ],
            hard_penalty: 0.29,
            easy_bonus: 2.61,
            lapse_penalty: 0.3,
        }
    }
}

impl Fsrs {
    /// Next (D, S) after a review graded `rating`, `elapsed_days` after the
    /// previous one. `prev == None` is the first review of the card.
    pub fn next_memory(
        &self,
        prev: Option<MemoryState>,
        rating: Rating,
        elapsed_days: f64,
    ) -> Result<MemoryState> {
        if !elapsed_days.is_finite() || elapsed_days < 0.0 {
            return Err(CoreError::InvalidElapsed(elapsed_days));
        }

        let rating_value = rating.to_value();
        let Some(prev) = prev else {
            return Ok(MemoryState {
                difficulty: self.initial_difficulty(rating_value),
                stability: self.initial_stability(rating_value),
            });
        };

        let current_s = prev.stability.max(MIN_STABILITY);
        let current_d = prev.difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        let r = retrievability(elapsed_days, current_s);

        let stability = if rating.is_recall() {
            self.next_stability_recall(current_s, current_d, r, rating_value)
        } else {
            self.next_stability_lapse(current_s)
        };

        Ok(MemoryState {
            difficulty: self.next_difficulty(current_d, rating_value),
            stability,
        })
    }

    /// Calculate initial stability for a new card based on first rating.
    /// S0(G) = w[G-1] where G is rating 1-4
    fn initial_stability(&self, rating: u8) -> f64 {
        let index = (rating.saturating_sub(1)) as usize;
        self.w[index.min(3)].max(MIN_STABILITY)
    }

    /// Calculate initial difficulty for a new card based on first rating.
    /// D0(G) = w[4] - w[5] * (G - 3)
    fn initial_difficulty(&self, rating: u8) -> f64 {
        let d0 = self.w[4] - self.w[5] * (rating as f64 - 3.0);
        d0.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    /// Calculate next difficulty using mean reversion.
    /// D' = w[7] * D0(G) + (1 - w[7]) * D
    /// Apply decay: D'' = D' - w[6] * (G - 3)
    fn next_difficulty(&self, current_d: f64, rating: u8) -> f64 {
        let d0 = self.initial_difficulty(3);
        let d_new = self.w[7] * d0 + (1.0 - self.w[7]) * current_d;
        let d_decayed = d_new - self.w[6] * (rating as f64 - 3.0);
        d_decayed.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
    }

    /// Calculate next stability after successful recall.
    /// S' = S * (1 + e^(w[8]) * (11 - D) * S^(-w[9]) * (e^(w[10]*(1-R)) - 1) * modifier)
    fn next_stability_recall(
        &self,
        stability: f64,
        difficulty: f64,
        retrievability: f64,
        rating: u8,
    ) -> f64 {
        let exp_w8 = self.w[8].exp();
        let d_factor = 11.0 - difficulty;
        let s_decay = stability.powf(-self.w[9]);
        let r_factor = (self.w[10] * (1.0 - retrievability)).exp() - 1.0;

        let modifier = match rating {
            2 => self.hard_penalty,
            4 => self.easy_bonus,
            _ => 1.0,
        };

        let growth = 1.0 + exp_w8 * d_factor * s_decay * r_factor * modifier;
        (stability * growth).clamp(MIN_STABILITY, self.maximum_interval)
    }

    /// Calculate next stability after forgetting (lapse).
    /// S' = S * lapse_penalty
    fn next_stability_lapse(&self, stability: f64) -> f64 {
        (stability * self.lapse_penalty).max(MIN_STABILITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn memory(difficulty: f64, stability: f64) -> Option<MemoryState> {
        Some(MemoryState {
            difficulty,
            stability,
        })
    }

    #[test]
    fn first_review_ignores_elapsed_time() {
        let fsrs = Fsrs::default();
        let a = fsrs.next_memory(None, Rating::Good, 0.0).unwrap();
        let b = fsrs.next_memory(None, Rating::Good, 42.0).unwrap();
        assert_eq!(a, b);
        assert!((a.stability - 2.4).abs() < 1e-9);
    }

    #[test]
    fn initial_stability_values() {
        let fsrs = Fsrs::default();

        // Initial stability should increase with rating
        let s_again = fsrs.initial_stability(1);
        let s_hard = fsrs.initial_stability(2);
        let s_good = fsrs.initial_stability(3);
        let s_easy = fsrs.initial_stability(4);

        assert!(s_again < s_hard);
        assert!(s_hard < s_good);
        assert!(s_good < s_easy);
    }

    #[test]
    fn initial_difficulty_values() {
        let fsrs = Fsrs::default();

        // Initial difficulty should decrease with rating
        let d_again = fsrs.initial_difficulty(1);
        let d_hard = fsrs.initial_difficulty(2);
        let d_good = fsrs.initial_difficulty(3);
        let d_easy = fsrs.initial_difficulty(4);

        assert!(d_again > d_hard);
        assert!(d_hard > d_good);
        assert!(d_good > d_easy);
    }

    #[test]
    fn stability_increases_on_successful_recall() {
        let fsrs = Fsrs::default();
        for rating in [Rating::Hard, Rating::Good, Rating::Easy] {
            let next = fsrs.next_memory(memory(5.0, 5.0), rating, 5.0).unwrap();
            assert!(next.stability > 5.0, "{rating:?} gave {}", next.stability);
        }
    }

    #[test]
    fn stability_shrinks_by_fixed_penalty_on_lapse() {
        let fsrs = Fsrs::default();
        let next = fsrs.next_memory(memory(5.0, 10.0), Rating::Again, 10.0).unwrap();
        assert!((next.stability - 3.0).abs() < 1e-9);
    }

    #[test]
    fn lapse_never_drops_below_floor() {
        let fsrs = Fsrs::default();
        let next = fsrs
            .next_memory(memory(5.0, MIN_STABILITY), Rating::Again, 1.0)
            .unwrap();
        assert_eq!(next.stability, MIN_STABILITY);
    }

    #[test]
    fn hard_penalty_reduces_stability_growth() {
        let fsrs = Fsrs::default();
        let good = fsrs.next_memory(memory(5.0, 10.0), Rating::Good, 10.0).unwrap();
        let hard = fsrs.next_memory(memory(5.0, 10.0), Rating::Hard, 10.0).unwrap();
        assert!(hard.stability < good.stability);
    }

    #[test]
    fn easy_bonus_increases_stability_growth() {
        let fsrs = Fsrs::default();
        let good = fsrs.next_memory(memory(5.0, 10.0), Rating::Good, 10.0).unwrap();
        let easy = fsrs.next_memory(memory(5.0, 10.0), Rating::Easy, 10.0).unwrap();
        assert!(easy.stability > good.stability);
    }

    #[test]
    fn lower_retrievability_earns_larger_gain() {
        let fsrs = Fsrs::default();
        let on_time = fsrs.next_memory(memory(5.0, 10.0), Rating::Good, 10.0).unwrap();
        let late = fsrs.next_memory(memory(5.0, 10.0), Rating::Good, 40.0).unwrap();
        assert!(late.stability > on_time.stability);
    }

    #[test]
    fn higher_difficulty_earns_smaller_gain() {
        let fsrs = Fsrs::default();
        let easy_card = fsrs.next_memory(memory(2.0, 10.0), Rating::Good, 10.0).unwrap();
        let hard_card = fsrs.next_memory(memory(9.0, 10.0), Rating::Good, 10.0).unwrap();
        assert!(hard_card.stability < easy_card.stability);
    }

    #[test]
    fn difficulty_decreases_on_easy() {
        let fsrs = Fsrs::default();
        let next = fsrs.next_memory(memory(5.0, 5.0), Rating::Easy, 5.0).unwrap();
        assert!(next.difficulty < 5.0);
    }

    #[test]
    fn difficulty_increases_on_again_and_hard() {
        let fsrs = Fsrs::default();
        let again = fsrs.next_memory(memory(5.0, 5.0), Rating::Again, 5.0).unwrap();
        let hard = fsrs.next_memory(memory(5.0, 5.0), Rating::Hard, 5.0).unwrap();
        assert!(again.difficulty > 5.0);
        assert!(hard.difficulty > 5.0);
        assert!(again.difficulty > hard.difficulty);
    }

    #[test]
    fn difficulty_clamped_to_bounds() {
        let fsrs = Fsrs::default();
        let up = fsrs.next_memory(memory(10.0, 5.0), Rating::Again, 5.0).unwrap();
        assert!(up.difficulty <= MAX_DIFFICULTY);
        let down = fsrs.next_memory(memory(1.0, 5.0), Rating::Easy, 5.0).unwrap();
        assert!(down.difficulty >= MIN_DIFFICULTY);
    }

    #[test]
    fn stability_respects_maximum() {
        let fsrs = Fsrs::default();
        let next = fsrs
            .next_memory(memory(1.0, 30000.0), Rating::Easy, 90000.0)
            .unwrap();
        assert!(next.stability <= fsrs.maximum_interval);
    }

    #[test]
    fn negative_elapsed_is_rejected() {
        let fsrs = Fsrs::default();
        let err = fsrs.next_memory(memory(5.0, 5.0), Rating::Good, -0.5).unwrap_err();
        assert_eq!(err, CoreError::InvalidElapsed(-0.5));
        assert!(fsrs.next_memory(None, Rating::Good, f64::NAN).is_err());
    }

    fn arb_rating() -> impl Strategy<Value = Rating> {
        prop_oneof![
            Just(Rating::Again),
            Just(Rating::Hard),
            Just(Rating::Good),
            Just(Rating::Easy),
        ]
    }

    proptest! {
        #[test]
        fn next_memory_stays_in_bounds(
            difficulty in MIN_DIFFICULTY..=MAX_DIFFICULTY,
            stability in MIN_STABILITY..36500.0f64,
            elapsed in 0.0f64..20000.0,
            rating in arb_rating(),
            first in any::<bool>(),
        ) {
            let fsrs = Fsrs::default();
            let prev = if first { None } else { memory(difficulty, stability) };
            let next = fsrs.next_memory(prev, rating, elapsed).unwrap();
            prop_assert!(next.stability.is_finite());
            prop_assert!(next.stability > 0.0);
            prop_assert!(next.difficulty >= MIN_DIFFICULTY);
            prop_assert!(next.difficulty <= MAX_DIFFICULTY);
        }

        #[test]
        fn retrievability_decreases_with_elapsed(
            stability in MIN_STABILITY..10000.0f64,
            earlier in 0.0f64..5000.0,
            gap in 0.001f64..5000.0,
        ) {
            let r_early = retrievability(earlier, stability);
            let r_late = retrievability(earlier + gap, stability);
            prop_assert!(r_late < r_early);
        }
    }
}
