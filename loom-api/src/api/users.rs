//! Account information, statistics, export, and deletion

use crate::api::auth_middleware::CurrentUser;
use crate::auth::verify_password;
use crate::{db, ApiError, ApiResult, AppState};
use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

/// GET /user/info
pub async fn user_info(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    Ok(Json(json!({
        "id": user.id,
        "email": user.email,
        "username": user.username,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "email_verified": user.is_verified(),
    })))
}

/// GET /user/stats
pub async fn user_stats(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let dreams = db::dreams::list_for_user(&state.pool, user.id).await?;
    let interpretations = db::interpretations::map_for_user(&state.pool, user.id).await?;

    let dreams_with_interpretation = dreams
        .iter()
        .filter(|d| interpretations.contains_key(&d.id))
        .count();
    let dreams_with_images = dreams
        .iter()
        .filter(|d| {
            interpretations
                .get(&d.id)
                .map(|i| i.image_url.is_some())
                .unwrap_or(false)
        })
        .count();

    let oldest = dreams.iter().map(|d| d.created_at).min();
    let newest = dreams.iter().map(|d| d.created_at).max();

    Ok(Json(json!({
        "total_dreams": dreams.len(),
        "dreams_with_images": dreams_with_images,
        "dreams_with_interpretation": dreams_with_interpretation,
        "oldest_dream_date": oldest.map(|d| d.to_rfc3339()),
        "newest_dream_date": newest.map(|d| d.to_rfc3339()),
    })))
}

/// GET /user/export
pub async fn export_user_data(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let dreams = db::dreams::list_for_user(&state.pool, user.id).await?;
    let mut interpretations = db::interpretations::map_for_user(&state.pool, user.id).await?;

    let exported: Vec<Value> = dreams
        .into_iter()
        .map(|dream| {
            let mut entry = json!({
                "id": dream.id,
                "title": dream.title,
                "raw_text": dream.raw_text,
                "created_at": dream.created_at.to_rfc3339(),
            });
            if let Some(interpretation) = interpretations.remove(&dream.id) {
                entry["interpretation"] = json!({
                    "poetic_narrative": interpretation.poetic_narrative,
                    "meaning": interpretation.meaning,
                    "symbols": interpretation.symbols,
                    "emotions": interpretation.emotions,
                    "image_url": interpretation.image_url,
                });
            }
            entry
        })
        .collect();

    Ok(Json(json!({
        "user_email": user.email,
        "export_date": Utc::now().to_rfc3339(),
        "total_dreams": exported.len(),
        "dreams": exported,
    })))
}

/// DELETE /user/account
///
/// Password-confirmed. Dreams, interpretations, and sessions cascade with
/// the user row.
pub async fn delete_account(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<DeleteAccountRequest>,
) -> ApiResult<Json<Value>> {
    if !verify_password(&req.password, &user.hashed_password) {
        return Err(ApiError::BadRequest("Incorrect password".to_string()));
    }

    db::users::delete(&state.pool, user.id).await?;

    Ok(Json(json!({
        "message": "Account deleted successfully"
    })))
}
