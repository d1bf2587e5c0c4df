//! Dream CRUD, regeneration, and style rewriting
//!
//! `create_dream` returns as soon as the bare dream row exists; the
//! interpretation arrives asynchronously and clients either watch the
//! per-dream WebSocket channel or poll the dream until `interpretation`
//! is non-null.

use crate::api::auth_middleware::CurrentUser;
use crate::{db, ApiError, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use loom_common::db::models::{Dream, Interpretation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct DreamCreate {
    pub title: String,
    pub raw_text: String,
    /// Off by default: every generated image costs real money
    #[serde(default)]
    pub generate_image: bool,
}

#[derive(Debug, Deserialize)]
pub struct DreamUpdate {
    pub title: Option<String>,
    pub raw_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    pub style: String,
}

#[derive(Debug, Serialize)]
pub struct RewriteResponse {
    pub rewritten_narrative: String,
    pub style: String,
}

/// Interpretation as exposed to clients
#[derive(Debug, Serialize)]
pub struct InterpretationOut {
    pub poetic_narrative: Option<String>,
    pub meaning: Option<String>,
    pub symbols: Option<String>,
    pub emotions: Option<String>,
    pub image_url: Option<String>,
}

impl From<Interpretation> for InterpretationOut {
    fn from(i: Interpretation) -> Self {
        Self {
            poetic_narrative: i.poetic_narrative,
            meaning: i.meaning,
            symbols: i.symbols,
            emotions: i.emotions,
            image_url: i.image_url,
        }
    }
}

/// Dream as exposed to clients, with its interpretation when present
#[derive(Debug, Serialize)]
pub struct DreamOut {
    pub id: i64,
    pub title: String,
    pub raw_text: String,
    pub created_at: DateTime<Utc>,
    pub interpretation: Option<InterpretationOut>,
}

impl DreamOut {
    pub fn new(dream: Dream, interpretation: Option<Interpretation>) -> Self {
        Self {
            id: dream.id,
            title: dream.title,
            raw_text: dream.raw_text,
            created_at: dream.created_at,
            interpretation: interpretation.map(Into::into),
        }
    }
}

/// POST /dreams
pub async fn create_dream(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<DreamCreate>,
) -> ApiResult<Json<DreamOut>> {
    let dream = db::dreams::insert(&state.pool, user.id, &req.title, &req.raw_text).await?;

    // Processing is detached from this request; the WebSocket channel (or a
    // later re-fetch) carries the result.
    state.processor.spawn(dream.id, req.generate_image);

    Ok(Json(DreamOut::new(dream, None)))
}

/// GET /dreams
pub async fn list_dreams(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<DreamOut>>> {
    let dreams = db::dreams::list_for_user(&state.pool, user.id).await?;
    let mut interpretations = db::interpretations::map_for_user(&state.pool, user.id).await?;

    let out = dreams
        .into_iter()
        .map(|dream| {
            let interpretation = interpretations.remove(&dream.id);
            DreamOut::new(dream, interpretation)
        })
        .collect();

    Ok(Json(out))
}

/// GET /dreams/:dream_id
pub async fn get_dream(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(dream_id): Path<i64>,
) -> ApiResult<Json<DreamOut>> {
    let dream = find_owned_dream(&state, dream_id, user.id).await?;
    let interpretation = db::interpretations::find_by_dream(&state.pool, dream_id).await?;
    Ok(Json(DreamOut::new(dream, interpretation)))
}

/// PUT /dreams/:dream_id
pub async fn update_dream(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(dream_id): Path<i64>,
    Json(req): Json<DreamUpdate>,
) -> ApiResult<Json<DreamOut>> {
    find_owned_dream(&state, dream_id, user.id).await?;

    db::dreams::update(&state.pool, dream_id, req.title.as_deref(), req.raw_text.as_deref())
        .await?;

    let dream = find_owned_dream(&state, dream_id, user.id).await?;
    let interpretation = db::interpretations::find_by_dream(&state.pool, dream_id).await?;
    Ok(Json(DreamOut::new(dream, interpretation)))
}

/// DELETE /dreams/:dream_id
pub async fn delete_dream(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(dream_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    find_owned_dream(&state, dream_id, user.id).await?;
    db::dreams::delete(&state.pool, dream_id).await?;
    Ok(Json(serde_json::json!({
        "message": "Dream deleted successfully"
    })))
}

/// POST /dreams/:dream_id/regenerate
///
/// Clears any existing interpretation first so the one-row-per-dream
/// invariant holds, then re-enters the pipeline. Regeneration always
/// requests image generation.
pub async fn regenerate_dream(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(dream_id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    find_owned_dream(&state, dream_id, user.id).await?;

    db::interpretations::delete_by_dream(&state.pool, dream_id).await?;
    state.processor.spawn(dream_id, true);

    Ok(Json(serde_json::json!({
        "message": "Dream regeneration started",
        "dream_id": dream_id,
    })))
}

/// POST /dreams/:dream_id/rewrite
pub async fn rewrite_dream(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(dream_id): Path<i64>,
    Json(req): Json<RewriteRequest>,
) -> ApiResult<Json<RewriteResponse>> {
    let dream = find_owned_dream(&state, dream_id, user.id).await?;

    let rewritten = state
        .gateway
        .rewrite(&dream.raw_text, &req.style)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to rewrite dream: {}", e)))?;

    Ok(Json(RewriteResponse {
        rewritten_narrative: rewritten,
        style: req.style,
    }))
}

async fn find_owned_dream(state: &AppState, dream_id: i64, user_id: i64) -> ApiResult<Dream> {
    db::dreams::find_for_user(&state.pool, dream_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Dream not found".to_string()))
}
