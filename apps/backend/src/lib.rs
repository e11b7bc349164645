pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{Config, StudySettings};
use crate::db::{Database, Repository};

/// Shared application state
pub struct AppState<S> {
    pub store: Arc<S>,
    pub settings: Arc<StudySettings>,
}

impl<S> AppState<S> {
    pub fn new(store: S, settings: StudySettings) -> Self {
        Self {
            store: Arc::new(store),
            settings: Arc::new(settings),
        }
    }
}

// Manual impl: `S` itself need not be Clone
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
        }
    }
}

/// Build the API router over any store
pub fn router<S: Repository>(state: AppState<S>) -> Router {
    let protected_routes = Router::new()
        // Card routes
        .route("/cards/review", post(routes::cards::review::<S>))
        .route("/cards/due", get(routes::cards::due::<S>))
        .route("/cards/:card_id/history", get(routes::cards::history::<S>))
        // Prediction routes
        .route("/predictions/:course_id", get(routes::predictions::predict::<S>))
        .route("/predictions/:course_id/roi", get(routes::predictions::roi::<S>))
        // Mastery routes
        .route("/mastery/topics/:topic_id", get(routes::mastery::topic::<S>))
        // Enrollment routes
        .route("/enrollments", get(routes::enrollments::list::<S>))
        .route(
            "/enrollments/:id/retention",
            put(routes::enrollments::update_retention::<S>),
        )
        .layer(middleware::from_fn(routes::auth::identity_middleware));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    logging::init_tracing(&config.log_level);

    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url, config.database_max_connections).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    let app = router(AppState::new(db, config.study.clone()));

    let addr = config.bind_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
