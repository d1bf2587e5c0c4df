//! Authenticated image proxy
//!
//! Generated image URLs point at the provider's blob storage and expire;
//! browsers also hit CORS/auth walls fetching them directly. This endpoint
//! fetches server-side and re-serves the bytes with long-lived caching.
//! The allowlist keeps it from becoming an open proxy.

use crate::api::auth_middleware::CurrentUser;
use crate::{ApiError, ApiResult, AppState};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Hosts the image provider serves generated images from
const ALLOWED_DOMAINS: &[&str] = &[
    "oaidalleapiprodscus.blob.core.windows.net",
    "openai.com",
    "dalleprodscus.blob.core.windows.net",
    "blob.core.windows.net",
];

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    #[serde(default)]
    pub url: String,
}

/// GET /api/images/proxy?url=...
pub async fn proxy_image(
    State(state): State<AppState>,
    Extension(CurrentUser(_user)): Extension<CurrentUser>,
    Query(params): Query<ProxyParams>,
) -> ApiResult<Response> {
    if params.url.is_empty() {
        return Err(ApiError::BadRequest(
            "URL parameter is required".to_string(),
        ));
    }

    if !ALLOWED_DOMAINS
        .iter()
        .any(|domain| params.url.contains(domain))
    {
        return Err(ApiError::Forbidden("URL not allowed".to_string()));
    }

    let response = state
        .http_client
        .get(&params.url)
        .header("User-Agent", "Mozilla/5.0 (compatible; LucidLoom/1.0)")
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ApiError::UpstreamTimeout("Image fetch timeout".to_string())
            } else {
                ApiError::Internal(format!("Failed to proxy image: {}", e))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        warn!(%status, url = %params.url, "Image proxy upstream failure");
        return Err(ApiError::Upstream(
            status.as_u16(),
            format!(
                "Failed to fetch image: {}. The image URL may have expired.",
                status.as_u16()
            ),
        ));
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/png")
        .to_string();

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read image body: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            // Provider URLs expire but the bytes never change; cache hard.
            (header::CACHE_CONTROL, "public, max-age=31536000".to_string()),
        ],
        bytes,
    )
        .into_response())
}
