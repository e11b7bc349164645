//! Persistence interfaces
//!
//! The content catalog and exam configuration are read-only collaborators;
//! the review store owns enrollments, memory states and the review log.
//! [`Database`] implements all of them on PostgreSQL, [`MemoryStore`] in
//! process.

pub mod memory;
pub mod postgres;

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Card, CardMemoryState, Course, Enrollment, ExamConfig, ExamHistory, ReviewEvent, Topic};

pub use memory::MemoryStore;
pub use postgres::Database;

/// Memory state together with its optimistic-lock version
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedMemoryState {
    pub memory: CardMemoryState,
    pub version: i64,
}

/// One graded review to persist atomically.
///
/// `expected_version` is the version the new state was computed from, or
/// `None` for the first review of the card.
#[derive(Debug, Clone)]
pub struct ReviewCommit {
    pub expected_version: Option<i64>,
    pub event: ReviewEvent,
}

/// Which of a user's cards a query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressScope {
    All,
    Course(Uuid),
    Topic(Uuid),
    Card(Uuid),
}

impl ProgressScope {
    pub fn includes(&self, card: &Card) -> bool {
        match *self {
            ProgressScope::All => true,
            ProgressScope::Course(id) => card.course_id == id,
            ProgressScope::Topic(id) => card.topic_id == id,
            ProgressScope::Card(id) => card.id == id,
        }
    }
}

/// Read-only course, topic and card content
pub trait ContentCatalog: Send + Sync {
    fn get_course(&self, course_id: Uuid) -> impl Future<Output = Result<Option<Course>>> + Send;

    fn get_topic(&self, topic_id: Uuid) -> impl Future<Output = Result<Option<Topic>>> + Send;

    /// Topics of a course in content order
    fn list_topics(&self, course_id: Uuid) -> impl Future<Output = Result<Vec<Topic>>> + Send;

    fn get_card(&self, card_id: Uuid) -> impl Future<Output = Result<Option<Card>>> + Send;

    fn get_cards(&self, card_ids: &[Uuid]) -> impl Future<Output = Result<Vec<Card>>> + Send;

    /// Cards of a course in content order
    fn list_cards(&self, course_id: Uuid) -> impl Future<Output = Result<Vec<Card>>> + Send;
}

/// Read-only exam blueprint and mock-exam results
pub trait ExamConfigProvider: Send + Sync {
    fn exam_config(&self, course_id: Uuid) -> impl Future<Output = Result<Option<ExamConfig>>> + Send;

    /// `None` when the user has taken no mock exams for the course
    fn exam_history(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> impl Future<Output = Result<Option<ExamHistory>>> + Send;
}

/// Enrollments, memory states and the append-only review log
pub trait ReviewStore: Send + Sync {
    fn get_enrollment(&self, enrollment_id: Uuid) -> impl Future<Output = Result<Option<Enrollment>>> + Send;

    fn find_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> impl Future<Output = Result<Option<Enrollment>>> + Send;

    fn list_enrollments(&self, user_id: Uuid) -> impl Future<Output = Result<Vec<Enrollment>>> + Send;

    /// Returns the updated enrollment, or `None` if it does not exist
    fn update_retention(
        &self,
        enrollment_id: Uuid,
        desired_retention: f64,
    ) -> impl Future<Output = Result<Option<Enrollment>>> + Send;

    fn get_memory_state(
        &self,
        user_id: Uuid,
        card_id: Uuid,
    ) -> impl Future<Output = Result<Option<VersionedMemoryState>>> + Send;

    /// Memory states keyed by card id
    fn list_memory_states(
        &self,
        user_id: Uuid,
        scope: ProgressScope,
    ) -> impl Future<Output = Result<Vec<(Uuid, CardMemoryState)>>> + Send;

    /// Write the resulting state and append the event in one transaction.
    ///
    /// Fails with `ApiError::Conflict` when the stored version no longer
    /// matches `expected_version`. Returns the new version.
    fn commit_review(&self, commit: &ReviewCommit) -> impl Future<Output = Result<i64>> + Send;

    /// Events ordered by review time, optionally only those after `since`
    fn list_review_events(
        &self,
        user_id: Uuid,
        scope: ProgressScope,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vec<ReviewEvent>>> + Send;

    /// Distinct cards first reviewed at or after `since`
    fn count_new_introduced(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<u32>> + Send;
}

/// Everything the HTTP layer needs from storage
pub trait Repository: ContentCatalog + ExamConfigProvider + ReviewStore + 'static {}

impl<T> Repository for T where T: ContentCatalog + ExamConfigProvider + ReviewStore + 'static {}
