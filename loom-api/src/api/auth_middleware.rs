//! Bearer session authentication middleware
//!
//! Protected routes require `Authorization: Bearer <token>`. The token is
//! hashed and looked up in the sessions table; the resolved user is stored
//! in request extensions for handlers to extract.

use crate::auth::sha256_hex;
use crate::{db, ApiError, AppState};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use loom_common::db::models::User;

/// Authenticated user attached to the request by the middleware
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let token_hash = sha256_hex(token.as_bytes());
    let user = db::sessions::find_user_by_token_hash(&state.pool, &token_hash)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session".to_string()))?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}
