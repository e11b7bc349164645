//! Exam prediction endpoints

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use uuid::Uuid;

use crate::db::Repository;
use crate::error::Result;
use crate::models::*;
use crate::routes::auth::AuthenticatedUser;
use crate::routes::extract::ApiPath;
use crate::services::analytics;
use crate::AppState;

/// GET /api/v1/predictions/:course_id
pub async fn predict<S: Repository>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiPath(course_id): ApiPath<Uuid>,
) -> Result<Json<PredictionResponse>> {
    let prediction = analytics::predict_course(
        state.store.as_ref(),
        &state.settings,
        auth.user_id,
        course_id,
        Utc::now(),
    )
    .await?;

    Ok(Json(prediction.into()))
}

/// GET /api/v1/predictions/:course_id/roi
pub async fn roi<S: Repository>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiPath(course_id): ApiPath<Uuid>,
) -> Result<Json<RoiResponse>> {
    let roi =
        analytics::estimate_roi(state.store.as_ref(), auth.user_id, course_id, Utc::now()).await?;

    Ok(Json(roi.into()))
}
