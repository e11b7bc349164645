//! Identity middleware
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user id in the `X-User-Id` header.

use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use crate::error::{ApiError, Result};

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated user stored in request extensions
#[derive(Clone, Copy, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Identity middleware - extracts the user id forwarded by the gateway
pub async fn identity_middleware(mut request: Request<Body>, next: Next) -> Result<Response> {
    let header = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?;

    let user_id = Uuid::parse_str(header.trim())
        .map_err(|_| ApiError::Unauthorized("Invalid X-User-Id header".to_string()))?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}
