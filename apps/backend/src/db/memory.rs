//! In-process store with the same semantics as the PostgreSQL one
//!
//! Backs the router in tests and local runs without a database. Version
//! checks on review commits behave exactly like the conditional UPDATE.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::{
    ContentCatalog, ExamConfigProvider, ProgressScope, ReviewCommit, ReviewStore,
    VersionedMemoryState,
};
use crate::error::{ApiError, Result};
use crate::models::*;

#[derive(Default)]
struct Catalog {
    courses: HashMap<Uuid, Course>,
    exam_configs: HashMap<Uuid, ExamConfig>,
    topics: Vec<Topic>,
    cards: Vec<Card>,
}

impl Catalog {
    fn card(&self, card_id: Uuid) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == card_id)
    }

    fn in_scope(&self, card_id: Uuid, scope: ProgressScope) -> bool {
        self.card(card_id).is_some_and(|c| scope.includes(c))
    }
}

struct MockExamResult {
    user_id: Uuid,
    course_id: Uuid,
    score_pct: f64,
}

#[derive(Default)]
struct Progress {
    enrollments: Vec<Enrollment>,
    states: HashMap<(Uuid, Uuid), VersionedMemoryState>,
    events: Vec<ReviewEvent>,
    mock_exams: Vec<MockExamResult>,
}

/// Catalog and progress held in memory.
///
/// Locks are always taken catalog first, then progress.
#[derive(Default)]
pub struct MemoryStore {
    catalog: RwLock<Catalog>,
    progress: RwLock<Progress>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_course(&self, course: Course, exam_config: Option<ExamConfig>) {
        let mut catalog = self.catalog.write().await;
        if let Some(config) = exam_config {
            catalog.exam_configs.insert(course.id, config);
        }
        catalog.courses.insert(course.id, course);
    }

    pub async fn insert_topic(&self, topic: Topic) {
        self.catalog.write().await.topics.push(topic);
    }

    pub async fn insert_card(&self, card: Card) {
        self.catalog.write().await.cards.push(card);
    }

    pub async fn insert_enrollment(&self, enrollment: Enrollment) {
        self.progress.write().await.enrollments.push(enrollment);
    }

    pub async fn record_mock_exam(&self, user_id: Uuid, course_id: Uuid, score_pct: f64) {
        self.progress.write().await.mock_exams.push(MockExamResult {
            user_id,
            course_id,
            score_pct,
        });
    }
}

impl ContentCatalog for MemoryStore {
    async fn get_course(&self, course_id: Uuid) -> Result<Option<Course>> {
        Ok(self.catalog.read().await.courses.get(&course_id).cloned())
    }

    async fn get_topic(&self, topic_id: Uuid) -> Result<Option<Topic>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.topics.iter().find(|t| t.id == topic_id).cloned())
    }

    async fn list_topics(&self, course_id: Uuid) -> Result<Vec<Topic>> {
        let catalog = self.catalog.read().await;
        let mut topics: Vec<Topic> = catalog
            .topics
            .iter()
            .filter(|t| t.course_id == course_id)
            .cloned()
            .collect();
        topics.sort_by_key(|t| (t.sort_order, t.id));
        Ok(topics)
    }

    async fn get_card(&self, card_id: Uuid) -> Result<Option<Card>> {
        Ok(self.catalog.read().await.card(card_id).cloned())
    }

    async fn get_cards(&self, card_ids: &[Uuid]) -> Result<Vec<Card>> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .cards
            .iter()
            .filter(|c| card_ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn list_cards(&self, course_id: Uuid) -> Result<Vec<Card>> {
        let catalog = self.catalog.read().await;
        let mut cards: Vec<Card> = catalog
            .cards
            .iter()
            .filter(|c| c.course_id == course_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| (c.sort_order, c.id));
        Ok(cards)
    }
}

impl ExamConfigProvider for MemoryStore {
    async fn exam_config(&self, course_id: Uuid) -> Result<Option<ExamConfig>> {
        Ok(self.catalog.read().await.exam_configs.get(&course_id).cloned())
    }

    async fn exam_history(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<ExamHistory>> {
        let progress = self.progress.read().await;
        let scores: Vec<f64> = progress
            .mock_exams
            .iter()
            .filter(|m| m.user_id == user_id && m.course_id == course_id)
            .map(|m| m.score_pct)
            .collect();

        if scores.is_empty() {
            return Ok(None);
        }
        Ok(Some(ExamHistory {
            attempts: scores.len() as u32,
            mean_score_pct: scores.iter().sum::<f64>() / scores.len() as f64,
        }))
    }
}

impl ReviewStore for MemoryStore {
    async fn get_enrollment(&self, enrollment_id: Uuid) -> Result<Option<Enrollment>> {
        let progress = self.progress.read().await;
        Ok(progress
            .enrollments
            .iter()
            .find(|e| e.id == enrollment_id)
            .cloned())
    }

    async fn find_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        let progress = self.progress.read().await;
        Ok(progress
            .enrollments
            .iter()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .cloned())
    }

    async fn list_enrollments(&self, user_id: Uuid) -> Result<Vec<Enrollment>> {
        let progress = self.progress.read().await;
        let mut enrollments: Vec<Enrollment> = progress
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        enrollments.sort_by_key(|e| (e.enrolled_at, e.id));
        Ok(enrollments)
    }

    async fn update_retention(
        &self,
        enrollment_id: Uuid,
        desired_retention: f64,
    ) -> Result<Option<Enrollment>> {
        let mut progress = self.progress.write().await;
        Ok(progress
            .enrollments
            .iter_mut()
            .find(|e| e.id == enrollment_id)
            .map(|e| {
                e.desired_retention = desired_retention;
                e.clone()
            }))
    }

    async fn get_memory_state(
        &self,
        user_id: Uuid,
        card_id: Uuid,
    ) -> Result<Option<VersionedMemoryState>> {
        let progress = self.progress.read().await;
        Ok(progress.states.get(&(user_id, card_id)).cloned())
    }

    async fn list_memory_states(
        &self,
        user_id: Uuid,
        scope: ProgressScope,
    ) -> Result<Vec<(Uuid, CardMemoryState)>> {
        let catalog = self.catalog.read().await;
        let progress = self.progress.read().await;
        Ok(progress
            .states
            .iter()
            .filter(|((user, card), _)| *user == user_id && catalog.in_scope(*card, scope))
            .map(|((_, card), state)| (*card, state.memory.clone()))
            .collect())
    }

    async fn commit_review(&self, commit: &ReviewCommit) -> Result<i64> {
        let event = &commit.event;
        let key = (event.user_id, event.card_id);
        let mut progress = self.progress.write().await;

        let current = progress.states.get(&key).map(|s| s.version);
        let version = match (commit.expected_version, current) {
            (None, None) => 1,
            (Some(expected), Some(stored)) if expected == stored => stored + 1,
            _ => {
                return Err(ApiError::Conflict(format!(
                    "Card {} was reviewed concurrently",
                    event.card_id
                )))
            }
        };

        progress.states.insert(
            key,
            VersionedMemoryState {
                memory: event.resulting_state.clone(),
                version,
            },
        );
        progress.events.push(ReviewEvent {
            sequence: version,
            ..event.clone()
        });
        Ok(version)
    }

    async fn list_review_events(
        &self,
        user_id: Uuid,
        scope: ProgressScope,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReviewEvent>> {
        let catalog = self.catalog.read().await;
        let progress = self.progress.read().await;
        let mut events: Vec<ReviewEvent> = progress
            .events
            .iter()
            .filter(|e| e.user_id == user_id && catalog.in_scope(e.card_id, scope))
            .filter(|e| since.map_or(true, |s| e.reviewed_at > s))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.reviewed_at, e.card_id, e.sequence));
        Ok(events)
    }

    async fn count_new_introduced(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u32> {
        let progress = self.progress.read().await;
        let mut cards: Vec<Uuid> = progress
            .events
            .iter()
            .filter(|e| {
                e.user_id == user_id && e.state_before == CardState::New && e.reviewed_at >= since
            })
            .map(|e| e.card_id)
            .collect();
        cards.sort();
        cards.dedup();
        Ok(cards.len() as u32)
    }
}
