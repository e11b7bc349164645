//! Mastery endpoints

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use uuid::Uuid;

use crate::db::Repository;
use crate::error::Result;
use crate::models::TopicMastery;
use crate::routes::auth::AuthenticatedUser;
use crate::routes::extract::ApiPath;
use crate::services::analytics;
use crate::AppState;

/// GET /api/v1/mastery/topics/:topic_id
pub async fn topic<S: Repository>(
    State(state): State<AppState<S>>,
    Extension(auth): Extension<AuthenticatedUser>,
    ApiPath(topic_id): ApiPath<Uuid>,
) -> Result<Json<TopicMastery>> {
    let mastery =
        analytics::topic_mastery(state.store.as_ref(), auth.user_id, topic_id, Utc::now()).await?;
    Ok(Json(mastery))
}
