//! PostgreSQL database operations

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool, Row};
use uuid::Uuid;

use crate::db::{
    ContentCatalog, ExamConfigProvider, ProgressScope, ReviewCommit, ReviewStore,
    VersionedMemoryState,
};
use crate::error::{ApiError, Result};
use crate::models::*;

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Bind values for the optional scope filters.
fn scope_filters(scope: ProgressScope) -> (Option<Uuid>, Option<Uuid>, Option<Uuid>) {
    match scope {
        ProgressScope::All => (None, None, None),
        ProgressScope::Course(id) => (Some(id), None, None),
        ProgressScope::Topic(id) => (None, Some(id), None),
        ProgressScope::Card(id) => (None, None, Some(id)),
    }
}

fn rating_code(rating: Rating) -> i16 {
    i16::from(rating.to_value())
}

fn state_code(state: CardState) -> i16 {
    i16::from(state.to_value())
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl ContentCatalog for Database {
    async fn get_course(&self, course_id: Uuid) -> Result<Option<Course>> {
        let course = sqlx::query_as::<_, Course>(
            r#"
            SELECT id, name, created_at
            FROM courses
            WHERE id = $1
            "#,
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(course)
    }

    async fn get_topic(&self, topic_id: Uuid) -> Result<Option<Topic>> {
        let topic = sqlx::query_as::<_, Topic>(
            r#"
            SELECT id, course_id, name, weight_pct, sort_order
            FROM topics
            WHERE id = $1
            "#,
        )
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(topic)
    }

    async fn list_topics(&self, course_id: Uuid) -> Result<Vec<Topic>> {
        let topics = sqlx::query_as::<_, Topic>(
            r#"
            SELECT id, course_id, name, weight_pct, sort_order
            FROM topics
            WHERE course_id = $1
            ORDER BY sort_order, id
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(topics)
    }

    async fn get_card(&self, card_id: Uuid) -> Result<Option<Card>> {
        let card = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, course_id, topic_id, front, back, sort_order
            FROM cards
            WHERE id = $1
            "#,
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(card)
    }

    async fn get_cards(&self, card_ids: &[Uuid]) -> Result<Vec<Card>> {
        let cards = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, course_id, topic_id, front, back, sort_order
            FROM cards
            WHERE id = ANY($1)
            "#,
        )
        .bind(card_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }

    async fn list_cards(&self, course_id: Uuid) -> Result<Vec<Card>> {
        let cards = sqlx::query_as::<_, Card>(
            r#"
            SELECT id, course_id, topic_id, front, back, sort_order
            FROM cards
            WHERE course_id = $1
            ORDER BY sort_order, id
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(cards)
    }
}

impl ExamConfigProvider for Database {
    async fn exam_config(&self, course_id: Uuid) -> Result<Option<ExamConfig>> {
        let config = sqlx::query_scalar::<_, Option<Json<ExamConfig>>>(
            r#"
            SELECT exam_config
            FROM courses
            WHERE id = $1
            "#,
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config.flatten().map(|c| c.0))
    }

    async fn exam_history(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<ExamHistory>> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS attempts, AVG(score_pct) AS mean_score_pct
            FROM mock_exam_results
            WHERE user_id = $1 AND course_id = $2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;

        let attempts: i64 = row.get("attempts");
        let mean: Option<f64> = row.get("mean_score_pct");

        Ok(match (attempts, mean) {
            (n, Some(mean_score_pct)) if n > 0 => Some(ExamHistory {
                attempts: u32::try_from(n).unwrap_or(u32::MAX),
                mean_score_pct,
            }),
            _ => None,
        })
    }
}

impl ReviewStore for Database {
    async fn get_enrollment(&self, enrollment_id: Uuid) -> Result<Option<Enrollment>> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT id, user_id, course_id, desired_retention, is_active, enrolled_at
            FROM user_enrollments
            WHERE id = $1
            "#,
        )
        .bind(enrollment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(enrollment)
    }

    async fn find_enrollment(&self, user_id: Uuid, course_id: Uuid) -> Result<Option<Enrollment>> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT id, user_id, course_id, desired_retention, is_active, enrolled_at
            FROM user_enrollments
            WHERE user_id = $1 AND course_id = $2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(enrollment)
    }

    async fn list_enrollments(&self, user_id: Uuid) -> Result<Vec<Enrollment>> {
        let enrollments = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT id, user_id, course_id, desired_retention, is_active, enrolled_at
            FROM user_enrollments
            WHERE user_id = $1
            ORDER BY enrolled_at, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(enrollments)
    }

    async fn update_retention(
        &self,
        enrollment_id: Uuid,
        desired_retention: f64,
    ) -> Result<Option<Enrollment>> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            UPDATE user_enrollments
            SET desired_retention = $2
            WHERE id = $1
            RETURNING id, user_id, course_id, desired_retention, is_active, enrolled_at
            "#,
        )
        .bind(enrollment_id)
        .bind(desired_retention)
        .fetch_optional(&self.pool)
        .await?;

        Ok(enrollment)
    }

    async fn get_memory_state(
        &self,
        user_id: Uuid,
        card_id: Uuid,
    ) -> Result<Option<VersionedMemoryState>> {
        let row = sqlx::query_as::<_, DbMemoryState>(
            r#"
            SELECT card_id, state, difficulty, stability, due, last_review,
                   review_count, lapse_count, relearning_streak, last_rating, prior_rating, version
            FROM card_memory_states
            WHERE user_id = $1 AND card_id = $2
            "#,
        )
        .bind(user_id)
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(VersionedMemoryState {
                memory: r.to_core_state()?,
                version: r.version,
            })
        })
        .transpose()
    }

    async fn list_memory_states(
        &self,
        user_id: Uuid,
        scope: ProgressScope,
    ) -> Result<Vec<(Uuid, CardMemoryState)>> {
        let (course_id, topic_id, card_id) = scope_filters(scope);
        let rows = sqlx::query_as::<_, DbMemoryState>(
            r#"
            SELECT s.card_id, s.state, s.difficulty, s.stability, s.due, s.last_review,
                   s.review_count, s.lapse_count, s.relearning_streak,
                   s.last_rating, s.prior_rating, s.version
            FROM card_memory_states s
            JOIN cards c ON c.id = s.card_id
            WHERE s.user_id = $1
              AND ($2::uuid IS NULL OR c.course_id = $2)
              AND ($3::uuid IS NULL OR c.topic_id = $3)
              AND ($4::uuid IS NULL OR s.card_id = $4)
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(topic_id)
        .bind(card_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| Ok((r.card_id, r.to_core_state()?)))
            .collect()
    }

    async fn commit_review(&self, commit: &ReviewCommit) -> Result<i64> {
        let event = &commit.event;
        let state = &event.resulting_state;
        let mut tx = self.pool.begin().await?;

        let version = match commit.expected_version {
            None => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO card_memory_states (user_id, card_id, state, difficulty, stability,
                                                    due, last_review, review_count, lapse_count,
                                                    relearning_streak, last_rating, prior_rating,
                                                    version, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, 1, NOW())
                    ON CONFLICT (user_id, card_id) DO NOTHING
                    RETURNING version
                    "#,
                )
                .bind(event.user_id)
                .bind(event.card_id)
                .bind(state_code(state.state))
                .bind(state.difficulty)
                .bind(state.stability)
                .bind(state.due)
                .bind(state.last_review)
                .bind(clamp_i32(state.review_count))
                .bind(clamp_i32(state.lapse_count))
                .bind(clamp_i32(state.relearning_streak))
                .bind(state.last_rating.map(rating_code))
                .bind(state.prior_rating.map(rating_code))
                .fetch_optional(&mut *tx)
                .await?
            }
            Some(expected) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    UPDATE card_memory_states
                    SET state = $3, difficulty = $4, stability = $5, due = $6, last_review = $7,
                        review_count = $8, lapse_count = $9, relearning_streak = $10,
                        last_rating = $11, prior_rating = $12,
                        version = version + 1, updated_at = NOW()
                    WHERE user_id = $1 AND card_id = $2 AND version = $13
                    RETURNING version
                    "#,
                )
                .bind(event.user_id)
                .bind(event.card_id)
                .bind(state_code(state.state))
                .bind(state.difficulty)
                .bind(state.stability)
                .bind(state.due)
                .bind(state.last_review)
                .bind(clamp_i32(state.review_count))
                .bind(clamp_i32(state.lapse_count))
                .bind(clamp_i32(state.relearning_streak))
                .bind(state.last_rating.map(rating_code))
                .bind(state.prior_rating.map(rating_code))
                .bind(expected)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        // Dropping the transaction rolls it back
        let Some(version) = version else {
            return Err(ApiError::Conflict(format!(
                "Card {} was reviewed concurrently",
                event.card_id
            )));
        };

        sqlx::query(
            r#"
            INSERT INTO review_events (id, user_id, card_id, sequence, rating, reviewed_at,
                                       response_time_ms, desired_retention, state_before,
                                       elapsed_days, resulting_state)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.id)
        .bind(event.user_id)
        .bind(event.card_id)
        .bind(version)
        .bind(rating_code(event.rating))
        .bind(event.reviewed_at)
        .bind(clamp_i32(event.response_time_ms))
        .bind(event.desired_retention)
        .bind(state_code(event.state_before))
        .bind(event.elapsed_days)
        .bind(Json(state))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(version)
    }

    async fn list_review_events(
        &self,
        user_id: Uuid,
        scope: ProgressScope,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReviewEvent>> {
        let (course_id, topic_id, card_id) = scope_filters(scope);
        let rows = sqlx::query_as::<_, DbReviewEvent>(
            r#"
            SELECT e.id, e.user_id, e.card_id, e.sequence, e.rating, e.reviewed_at, e.response_time_ms,
                   e.desired_retention, e.state_before, e.elapsed_days, e.resulting_state
            FROM review_events e
            JOIN cards c ON c.id = e.card_id
            WHERE e.user_id = $1
              AND ($2::uuid IS NULL OR c.course_id = $2)
              AND ($3::uuid IS NULL OR c.topic_id = $3)
              AND ($4::uuid IS NULL OR e.card_id = $4)
              AND ($5::timestamptz IS NULL OR e.reviewed_at > $5)
            ORDER BY e.reviewed_at, e.card_id, e.sequence
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(topic_id)
        .bind(card_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DbReviewEvent::into_core_event).collect()
    }

    async fn count_new_introduced(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<u32> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(DISTINCT card_id)
            FROM review_events
            WHERE user_id = $1 AND state_before = 0 AND reviewed_at >= $2
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}
