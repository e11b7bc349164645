//! Scheduling and readiness core shared by the certprep backend.
//!
//! Provides:
//! - FSRS-style memory model (difficulty / stability / retrievability)
//! - Review scheduler with state transitions and event replay
//! - Due-set selection for study sessions
//! - Topic mastery, pass-probability and remaining-effort estimates
//!
//! Everything here is pure: the current time is always passed in and no
//! function performs I/O.

pub mod algorithm;
pub mod due;
pub mod error;
pub mod mastery;
pub mod prediction;
pub mod roi;
pub mod scheduler;
pub mod types;

pub use algorithm::{interval_from_stability, retrievability, Fsrs, MemoryState};
pub use due::{select_due, DueCandidate, DueEntry, DueSelection, NewCandidate, SessionBudget};
pub use error::{CoreError, Result};
pub use mastery::{
    compute_course_mastery, compute_topic_mastery, is_mastered, CardProgress, CourseMastery,
    MasteryPolicy, TopicMastery, MASTERY_POLICY,
};
pub use prediction::{
    predict, ExamConfig, ExamHistory, ExamSection, Prediction, PredictorParams, Recommendation,
    TopicWeight, WeakTopic,
};
pub use roi::{estimate_remaining_hours, RateSource, RoiParams, StudyRoi};
pub use scheduler::{Scheduler, SchedulingResult};
pub use types::{CardMemoryState, CardState, Rating, ReviewEvent};
