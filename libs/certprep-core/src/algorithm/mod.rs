//! Memory model: the difficulty / stability / retrievability (DSR) update rule.
//!
//! The forgetting curve below is shared by the scheduler, the mastery policy
//! and the predictor. Changing it changes every derived number.

pub mod fsrs;

pub use fsrs::Fsrs;

/// Lower bound for stability in days.
pub const MIN_STABILITY: f64 = 0.1;

/// Valid difficulty range.
pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Difficulty and stability of one card after a review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryState {
    pub difficulty: f64,
    pub stability: f64,
}

/// Power-law forgetting curve.
/// R = (1 + t / (9 * S))^(-1)
pub fn retrievability(elapsed_days: f64, stability: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    let factor = 1.0 + elapsed_days.max(0.0) / (9.0 * stability);
    factor.powf(-1.0)
}

/// Elapsed days after which R drops to `desired_retention`.
/// I = 9 * S * (1/r - 1)
pub fn interval_from_stability(stability: f64, desired_retention: f64) -> f64 {
    9.0 * stability * (1.0 / desired_retention - 1.0)
}
