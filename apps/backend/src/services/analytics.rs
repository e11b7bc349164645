//! Mastery, exam prediction and remaining-effort estimates
//!
//! Recomputed from stored state on every request. Sparse data yields
//! zero-valued results, never errors.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use certprep_core::{
    compute_course_mastery, compute_topic_mastery, estimate_remaining_hours, predict, CardProgress,
    Prediction, PredictorParams, RoiParams, StudyRoi, TopicMastery, TopicWeight, MASTERY_POLICY,
};

use crate::config::StudySettings;
use crate::db::{ProgressScope, Repository};
use crate::error::{ApiError, Result};
use crate::models::{Card, CardMemoryState, ExamConfig, ReviewEvent, Topic};

/// Everything loaded for one user's progress in one course
struct CourseProgress {
    topics: Vec<Topic>,
    mastery: Vec<TopicMastery>,
    events: Vec<ReviewEvent>,
}

async fn load_course_progress<S: Repository>(
    store: &S,
    user_id: Uuid,
    course_id: Uuid,
    now: DateTime<Utc>,
) -> Result<CourseProgress> {
    store
        .get_course(course_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Course {}", course_id)))?;

    let topics = store.list_topics(course_id).await?;
    let cards = store.list_cards(course_id).await?;
    let states: HashMap<Uuid, CardMemoryState> = store
        .list_memory_states(user_id, ProgressScope::Course(course_id))
        .await?
        .into_iter()
        .collect();
    let events = store
        .list_review_events(user_id, ProgressScope::Course(course_id), None)
        .await?;

    let topic_of: HashMap<Uuid, Uuid> = cards.iter().map(|c| (c.id, c.topic_id)).collect();
    let mastery = topics
        .iter()
        .map(|topic| {
            let progress = topic_progress(&cards, &states, topic.id);
            let topic_events: Vec<ReviewEvent> = events
                .iter()
                .filter(|e| topic_of.get(&e.card_id) == Some(&topic.id))
                .cloned()
                .collect();
            compute_topic_mastery(topic.id, &progress, &topic_events, now)
        })
        .collect();

    Ok(CourseProgress {
        topics,
        mastery,
        events,
    })
}

fn topic_progress(
    cards: &[Card],
    states: &HashMap<Uuid, CardMemoryState>,
    topic_id: Uuid,
) -> Vec<CardProgress> {
    cards
        .iter()
        .filter(|c| c.topic_id == topic_id)
        .map(|c| CardProgress {
            card_id: c.id,
            memory: states.get(&c.id).cloned(),
        })
        .collect()
}

/// Mastery of a single topic
pub async fn topic_mastery<S: Repository>(
    store: &S,
    user_id: Uuid,
    topic_id: Uuid,
    now: DateTime<Utc>,
) -> Result<TopicMastery> {
    let topic = store
        .get_topic(topic_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Topic {}", topic_id)))?;

    let cards = store.list_cards(topic.course_id).await?;
    let states: HashMap<Uuid, CardMemoryState> = store
        .list_memory_states(user_id, ProgressScope::Topic(topic_id))
        .await?
        .into_iter()
        .collect();
    let window_start = now - Duration::days(MASTERY_POLICY.accuracy_window_days);
    let events = store
        .list_review_events(user_id, ProgressScope::Topic(topic_id), Some(window_start))
        .await?;

    Ok(compute_topic_mastery(
        topic_id,
        &topic_progress(&cards, &states, topic_id),
        &events,
        now,
    ))
}

/// Predicted exam outcome for a course
pub async fn predict_course<S: Repository>(
    store: &S,
    settings: &StudySettings,
    user_id: Uuid,
    course_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Prediction> {
    let progress = load_course_progress(store, user_id, course_id, now).await?;
    let config = store.exam_config(course_id).await?.unwrap_or_else(|| {
        tracing::debug!(%course_id, "no exam config, using defaults");
        ExamConfig::default()
    });
    let history = store.exam_history(user_id, course_id).await?;

    let weights: Vec<TopicWeight> = progress
        .topics
        .iter()
        .map(|t| TopicWeight {
            topic_id: t.id,
            name: t.name.clone(),
            weight_pct: t.weight_pct,
        })
        .collect();
    let params = PredictorParams {
        weak_topic_limit: settings.weak_topic_limit,
        ..PredictorParams::default()
    };

    let prediction = predict(&config, &weights, &progress.mastery, history.as_ref(), &params);

    tracing::debug!(
        %user_id,
        %course_id,
        predicted_score = prediction.predicted_score,
        pass_probability = prediction.pass_probability,
        insufficient_data = prediction.insufficient_data,
        "prediction computed"
    );

    Ok(prediction)
}

/// Hours of study left for a course
pub async fn estimate_roi<S: Repository>(
    store: &S,
    user_id: Uuid,
    course_id: Uuid,
    now: DateTime<Utc>,
) -> Result<StudyRoi> {
    let progress = load_course_progress(store, user_id, course_id, now).await?;
    let course = compute_course_mastery(&progress.mastery);

    Ok(estimate_remaining_hours(
        course.total_cards,
        course.mastered_cards,
        &progress.events,
        now,
        &RoiParams::default(),
    ))
}
