//! Enrollment endpoints

use std::ops::RangeInclusive;

use axum::{extract::State, Extension, Json};
use uuid::Uuid;

use crate::db::Repository;
use crate::error::{ApiError, Result};
use crate::models::*;
use crate::routes::auth::AuthenticatedUser;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::AppState;

/// Accepted range for an enrollment's desired retention
pub const RETENTION_RANGE: RangeInclusive<f64> = 0.80..=0.95;

/// GET /api/v1/enrollments
pub async fn list<S: Repository>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<Json<EnrollmentListResponse>> {
    let enrollments = state.store.list_enrollments(auth.user_id).await?;
    Ok(Json(EnrollmentListResponse { enrollments }))
}

/// PUT /api/v1/enrollments/:id/retention
pub async fn update_retention<S: Repository>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiPath(enrollment_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateRetentionRequest>,
) -> Result<Json<Enrollment>> {
    if !RETENTION_RANGE.contains(&payload.desired_retention) {
        return Err(ApiError::InvalidInput(format!(
            "desired_retention must be between {} and {}, got {}",
            RETENTION_RANGE.start(),
            RETENTION_RANGE.end(),
            payload.desired_retention
        )));
    }

    // Other users' enrollments are reported as missing
    state
        .store
        .get_enrollment(enrollment_id)
        .await?
        .filter(|e| e.user_id == auth.user_id)
        .ok_or_else(|| ApiError::NotFound(format!("Enrollment {}", enrollment_id)))?;

    let updated = state
        .store
        .update_retention(enrollment_id, payload.desired_retention)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Enrollment {}", enrollment_id)))?;

    tracing::info!(
        user_id = %auth.user_id,
        %enrollment_id,
        desired_retention = updated.desired_retention,
        "desired retention updated"
    );

    Ok(Json(updated))
}
