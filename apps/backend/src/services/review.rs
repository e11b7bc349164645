//! Grading reviews: schedule, then commit state and event atomically

use std::future::Future;

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use certprep_core::{CardMemoryState, Rating, ReviewEvent, Scheduler, SchedulingResult};

use crate::config::StudySettings;
use crate::db::{ProgressScope, Repository, ReviewCommit, ReviewStore};
use crate::error::{ApiError, Result};
use crate::models::{CardHistoryResponse, ReviewRequest};

/// Result of a committed review
#[derive(Debug, Clone)]
pub struct GradeOutcome {
    pub card_id: Uuid,
    pub result: SchedulingResult,
    pub desired_retention: f64,
    pub version: i64,
    /// Commit attempts, including the successful one
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails with something other than a conflict,
/// or `max_attempts` is reached. Returns the value and the attempt count.
pub async fn retry_on_conflict<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<(T, u32)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Err(ApiError::Conflict(reason)) if attempt < max_attempts => {
                tracing::debug!(attempt, %reason, "retrying after version conflict");
                attempt += 1;
            }
            other => return other.map(|value| (value, attempt)),
        }
    }
}

/// Retention target for a user's review of a card in `course_id`.
pub async fn resolve_retention<S: ReviewStore>(
    store: &S,
    settings: &StudySettings,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<f64> {
    Ok(store
        .find_enrollment(user_id, course_id)
        .await?
        .map(|e| e.desired_retention)
        .unwrap_or(settings.default_desired_retention))
}

/// Grade one review at `now`.
///
/// Each attempt re-reads the stored state, so a writer that lost a race is
/// rescheduled against the winner's result instead of overwriting it.
pub async fn grade_review<S: Repository>(
    store: &S,
    settings: &StudySettings,
    user_id: Uuid,
    request: &ReviewRequest,
    now: DateTime<Utc>,
) -> Result<GradeOutcome> {
    // Stored timestamps have microsecond precision; replay must see the same clock
    let now = now.trunc_subsecs(6);
    let rating = Rating::parse(request.rating)?;
    if request.response_time_ms < 0 {
        return Err(ApiError::InvalidInput(format!(
            "response_time_ms must not be negative, got {}",
            request.response_time_ms
        )));
    }
    let response_time_ms = u32::try_from(request.response_time_ms).unwrap_or(u32::MAX);

    let card = store
        .get_card(request.card_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Card {}", request.card_id)))?;
    let desired_retention = resolve_retention(store, settings, user_id, card.course_id).await?;
    let scheduler = &Scheduler::default();
    let card_id = card.id;

    let ((result, version), attempts) =
        retry_on_conflict(settings.review_max_attempts, |_| async move {
            let prev = store.get_memory_state(user_id, card_id).await?;
            // A retry may land on a review stamped after our own clock
            let reviewed_at = prev
                .as_ref()
                .and_then(|p| p.memory.last_review)
                .map_or(now, |last| last.max(now));
            let result = scheduler.schedule(
                prev.as_ref().map(|p| &p.memory),
                rating,
                reviewed_at,
                desired_retention,
            )?;

            let commit = ReviewCommit {
                expected_version: prev.as_ref().map(|p| p.version),
                event: ReviewEvent {
                    id: Uuid::new_v4(),
                    user_id,
                    card_id,
                    sequence: prev.as_ref().map_or(1, |p| p.version + 1),
                    rating,
                    reviewed_at,
                    response_time_ms,
                    desired_retention,
                    state_before: prev.map(|p| p.memory.state).unwrap_or_default(),
                    elapsed_days: result.elapsed_days,
                    resulting_state: result.new_state.clone(),
                },
            };
            let version = store.commit_review(&commit).await?;
            Ok::<_, ApiError>((result, version))
        })
        .await?;

    tracing::info!(
        %user_id,
        %card_id,
        rating = rating.to_value(),
        state = ?result.new_state.state,
        stability = result.new_state.stability,
        due = %result.next_due,
        attempts,
        "review graded"
    );

    Ok(GradeOutcome {
        card_id,
        result,
        desired_retention,
        version,
        attempts,
    })
}

/// Review log for one card, with the state rebuilt from it.
pub async fn card_history<S: Repository>(
    store: &S,
    user_id: Uuid,
    card_id: Uuid,
) -> Result<CardHistoryResponse> {
    store
        .get_card(card_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Card {}", card_id)))?;

    // Read the state first; events committed after it are left out
    let stored = store.get_memory_state(user_id, card_id).await?;
    let version = stored.as_ref().map_or(0, |s| s.version);
    let events: Vec<ReviewEvent> = store
        .list_review_events(user_id, ProgressScope::Card(card_id), None)
        .await?
        .into_iter()
        .filter(|e| e.sequence <= version)
        .collect();
    let replayed_state: Option<CardMemoryState> = Scheduler::default().replay(&events)?;

    let consistent = replayed_state.as_ref() == stored.as_ref().map(|s| &s.memory);
    if !consistent {
        tracing::warn!(%user_id, %card_id, "stored memory state differs from replayed log");
    }

    Ok(CardHistoryResponse {
        card_id,
        events,
        replayed_state,
        version: stored.as_ref().map(|s| s.version),
        stored_state: stored.map(|s| s.memory),
        consistent,
    })
}
