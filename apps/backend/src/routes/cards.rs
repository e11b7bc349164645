//! Card review endpoints

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use uuid::Uuid;

use crate::db::Repository;
use crate::error::Result;
use crate::models::*;
use crate::routes::auth::AuthenticatedUser;
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::services::review::{card_history, grade_review};
use crate::services::study::due_cards;
use crate::AppState;

/// POST /api/v1/cards/review
pub async fn review<S: Repository>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiJson(payload): ApiJson<ReviewRequest>,
) -> Result<Json<ReviewResponse>> {
    let now = Utc::now();
    let outcome =
        grade_review(state.store.as_ref(), &state.settings, auth.user_id, &payload, now).await?;

    let memory = &outcome.result.new_state;
    let hours = (outcome.result.next_due - now).num_seconds() as f64 / 3600.0;

    Ok(Json(ReviewResponse {
        card_id: outcome.card_id,
        state: memory.state.to_value(),
        due: outcome.result.next_due,
        difficulty: memory.difficulty,
        stability: memory.stability,
        retrievability: memory.retrievability_at(now),
        next_review_in_hours: (hours * 10.0).round() / 10.0,
        review_count: memory.review_count,
        lapse_count: memory.lapse_count,
        attempts: outcome.attempts,
    }))
}

/// GET /api/v1/cards/due
pub async fn due<S: Repository>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiQuery(query): ApiQuery<DueCardsQuery>,
) -> Result<Json<DueCardsResponse>> {
    let response = due_cards(
        state.store.as_ref(),
        &state.settings,
        auth.user_id,
        query.course_id,
        query.limit,
        Utc::now(),
    )
    .await?;

    Ok(Json(response))
}

/// GET /api/v1/cards/:card_id/history
pub async fn history<S: Repository>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiPath(card_id): ApiPath<Uuid>,
) -> Result<Json<CardHistoryResponse>> {
    let response = card_history(state.store.as_ref(), auth.user_id, card_id).await?;
    Ok(Json(response))
}
