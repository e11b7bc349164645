//! Common test utilities and fixtures for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - TestContext backed by the in-memory store (no database needed)
//! - PgTestContext for the PostgreSQL tests, which are `#[ignore]`d
//! - Identity header helpers
//!
//! # Requirements
//! PostgreSQL tests require DATABASE_URL to point at a disposable database.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestRequest, TestServer};
use uuid::Uuid;

use certprep_backend::config::StudySettings;
use certprep_backend::db::{Database, MemoryStore};
use certprep_backend::routes::auth::USER_ID_HEADER;
use certprep_backend::{router, AppState};

/// Test context over the in-memory store.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    app: Router,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_settings(StudySettings::default())
    }

    pub fn with_settings(settings: StudySettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            store: store.clone(),
            settings: Arc::new(settings),
        };
        Self {
            store,
            app: router(state),
        }
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.router()).unwrap()
    }
}

/// Test context over PostgreSQL.
///
/// # Panics
/// Panics if DATABASE_URL is not set or the connection fails.
pub struct PgTestContext {
    pub db: Arc<Database>,
    app: Router,
}

impl PgTestContext {
    pub async fn new() -> Self {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

        let db = Database::connect(&database_url, 5)
            .await
            .expect("Failed to connect to test database");

        db.run_migrations()
            .await
            .expect("Failed to run migrations");

        let db = Arc::new(db);
        let state = AppState {
            store: db.clone(),
            settings: Arc::new(StudySettings::default()),
        };

        Self {
            db,
            app: router(state),
        }
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.app.clone()).unwrap()
    }

    /// Remove a course and everything that references it.
    pub async fn cleanup_course(&self, course_id: Uuid) {
        let _ = sqlx::query(
            "DELETE FROM review_events WHERE card_id IN (SELECT id FROM cards WHERE course_id = $1)",
        )
        .bind(course_id)
        .execute(self.db.pool())
        .await;

        let _ = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(self.db.pool())
            .await;
    }
}

/// Identity header as forwarded by the gateway.
pub fn user_header(user_id: Uuid) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(USER_ID_HEADER),
        HeaderValue::from_str(&user_id.to_string()).unwrap(),
    )
}

/// Attach the identity header to a request.
pub trait AsUser {
    fn as_user(self, user_id: Uuid) -> Self;
}

impl AsUser for TestRequest {
    fn as_user(self, user_id: Uuid) -> Self {
        let (name, value) = user_header(user_id);
        self.add_header(name, value)
    }
}
