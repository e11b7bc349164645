//! Test fixtures and factory functions for creating test data.

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use certprep_backend::db::{Database, MemoryStore};
use certprep_backend::models::{Card, Course, Enrollment, ExamConfig, Topic};

/// Ids of a seeded course.
pub struct SeededCourse {
    pub course_id: Uuid,
    pub topic_ids: Vec<Uuid>,
    /// Card ids per topic, in content order
    pub cards: Vec<Vec<Uuid>>,
}

impl SeededCourse {
    pub fn all_cards(&self) -> Vec<Uuid> {
        self.cards.iter().flatten().copied().collect()
    }
}

/// Build a course with `weights.len()` topics of `cards_per_topic` cards each.
pub fn course_catalog(
    weights: &[f64],
    cards_per_topic: usize,
) -> (Course, Vec<Topic>, Vec<Card>) {
    let course = Course {
        id: Uuid::new_v4(),
        name: format!("Course {}", &Uuid::new_v4().to_string()[..8]),
        created_at: Utc::now(),
    };

    let topics: Vec<Topic> = weights
        .iter()
        .enumerate()
        .map(|(i, &weight_pct)| Topic {
            id: Uuid::new_v4(),
            course_id: course.id,
            name: format!("Topic {}", i + 1),
            weight_pct,
            sort_order: i as i32,
        })
        .collect();

    let cards = topics
        .iter()
        .enumerate()
        .flat_map(|(t, topic)| {
            (0..cards_per_topic).map(move |c| Card {
                id: Uuid::new_v4(),
                course_id: topic.course_id,
                topic_id: topic.id,
                front: format!("Question {}.{}?", t + 1, c + 1),
                back: format!("Answer {}.{}.", t + 1, c + 1),
                sort_order: (t * cards_per_topic + c) as i32,
            })
        })
        .collect();

    (course, topics, cards)
}

fn seeded(course: &Course, topics: &[Topic], cards: &[Card]) -> SeededCourse {
    SeededCourse {
        course_id: course.id,
        topic_ids: topics.iter().map(|t| t.id).collect(),
        cards: topics
            .iter()
            .map(|t| {
                cards
                    .iter()
                    .filter(|c| c.topic_id == t.id)
                    .map(|c| c.id)
                    .collect()
            })
            .collect(),
    }
}

/// Seed a course into the in-memory store.
pub async fn seed_course(
    store: &MemoryStore,
    weights: &[f64],
    cards_per_topic: usize,
    exam_config: Option<ExamConfig>,
) -> SeededCourse {
    let (course, topics, cards) = course_catalog(weights, cards_per_topic);
    let result = seeded(&course, &topics, &cards);

    store.insert_course(course, exam_config).await;
    for topic in topics {
        store.insert_topic(topic).await;
    }
    for card in cards {
        store.insert_card(card).await;
    }
    result
}

pub fn enrollment(user_id: Uuid, course_id: Uuid, desired_retention: f64) -> Enrollment {
    Enrollment {
        id: Uuid::new_v4(),
        user_id,
        course_id,
        desired_retention,
        is_active: true,
        enrolled_at: Utc::now() - Duration::days(30),
    }
}

/// Enroll a user in the in-memory store and return the enrollment id.
pub async fn enroll(
    store: &MemoryStore,
    user_id: Uuid,
    course_id: Uuid,
    desired_retention: f64,
) -> Uuid {
    let enrollment = enrollment(user_id, course_id, desired_retention);
    let id = enrollment.id;
    store.insert_enrollment(enrollment).await;
    id
}

/// Seed a course into PostgreSQL.
pub async fn seed_course_pg(db: &Database, weights: &[f64], cards_per_topic: usize) -> SeededCourse {
    let (course, topics, cards) = course_catalog(weights, cards_per_topic);

    sqlx::query("INSERT INTO courses (id, name, exam_config) VALUES ($1, $2, $3)")
        .bind(course.id)
        .bind(&course.name)
        .bind(json!({ "passing_score": 70, "sections": [] }))
        .execute(db.pool())
        .await
        .expect("Failed to insert course");

    for topic in &topics {
        sqlx::query(
            "INSERT INTO topics (id, course_id, name, weight_pct, sort_order) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(topic.id)
        .bind(topic.course_id)
        .bind(&topic.name)
        .bind(topic.weight_pct)
        .bind(topic.sort_order)
        .execute(db.pool())
        .await
        .expect("Failed to insert topic");
    }

    for card in &cards {
        sqlx::query(
            "INSERT INTO cards (id, course_id, topic_id, front, back, sort_order) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(card.id)
        .bind(card.course_id)
        .bind(card.topic_id)
        .bind(&card.front)
        .bind(&card.back)
        .bind(card.sort_order)
        .execute(db.pool())
        .await
        .expect("Failed to insert card");
    }

    seeded(&course, &topics, &cards)
}

/// Create a review request body.
pub fn review_request(card_id: Uuid, rating: i64) -> serde_json::Value {
    json!({
        "card_id": card_id,
        "rating": rating,
        "response_time_ms": 4000
    })
}

/// Create an update retention request body.
pub fn retention_request(desired_retention: f64) -> serde_json::Value {
    json!({ "desired_retention": desired_retention })
}
