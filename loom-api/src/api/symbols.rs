//! Dream symbol explanation

use crate::api::auth_middleware::CurrentUser;
use crate::{ApiError, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::{Extension, Json};
use serde_json::{json, Value};

/// GET /symbols/:symbol/explain
pub async fn explain_symbol(
    State(state): State<AppState>,
    Extension(CurrentUser(_user)): Extension<CurrentUser>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<Value>> {
    let explanation = state
        .gateway
        .explain_symbol(&symbol)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to explain symbol: {}", e)))?;

    Ok(Json(json!({
        "symbol": symbol,
        "general_meaning": explanation.general_meaning,
        "psychological": explanation.psychological,
        "cultural": explanation.cultural,
        "personal_context": explanation.personal_context,
    })))
}
