//! Per-user analytics
//!
//! `summary` is computed locally from stored interpretations; `patterns`
//! sends the most recent dreams to the AI gateway for a six-field report.

use crate::api::auth_middleware::CurrentUser;
use crate::services::ai::{AiError, DreamSummary, PatternReport};
use crate::{db, ApiError, ApiResult, AppState};
use axum::extract::State;
use axum::{Extension, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Entries returned in each top-N list
const TOP_COUNT: usize = 10;

/// GET /analytics/summary
pub async fn summary(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<Value>> {
    let dreams = db::dreams::list_for_user(&state.pool, user.id).await?;
    let interpretations = db::interpretations::map_for_user(&state.pool, user.id).await?;

    let mut symbol_counts: HashMap<String, usize> = HashMap::new();
    let mut emotion_counts: HashMap<String, usize> = HashMap::new();
    let mut dreams_with_images = 0usize;

    for dream in &dreams {
        if let Some(interpretation) = interpretations.get(&dream.id) {
            if interpretation.image_url.is_some() {
                dreams_with_images += 1;
            }
            for symbol in split_terms(interpretation.symbols.as_deref()) {
                *symbol_counts.entry(symbol).or_default() += 1;
            }
            for emotion in split_terms(interpretation.emotions.as_deref()) {
                *emotion_counts.entry(emotion).or_default() += 1;
            }
        }
    }

    let top_symbols: Vec<Value> = top_terms(symbol_counts)
        .into_iter()
        .map(|(symbol, count)| json!({ "symbol": symbol, "count": count }))
        .collect();
    let top_emotions: Vec<Value> = top_terms(emotion_counts)
        .into_iter()
        .map(|(emotion, count)| json!({ "emotion": emotion, "count": count }))
        .collect();

    // Full timestamps so the frontend can group by the user's local day
    let dreams_with_dates: Vec<Value> = dreams
        .iter()
        .map(|d| json!({ "created_at": d.created_at.to_rfc3339(), "count": 1 }))
        .collect();

    Ok(Json(json!({
        "total_dreams": dreams.len(),
        "dreams_with_images": dreams_with_images,
        "top_symbols": top_symbols,
        "top_emotions": top_emotions,
        "dreams_with_dates": dreams_with_dates,
    })))
}

/// POST /analytics/patterns
pub async fn patterns(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<PatternReport>> {
    // Newest first: the gateway caps its prompt at the 10 most recent
    let dreams = db::dreams::list_for_user(&state.pool, user.id).await?;
    if dreams.len() < 2 {
        return Err(ApiError::BadRequest(
            "Need at least 2 dreams to analyze patterns. Keep logging your dreams!".to_string(),
        ));
    }

    let interpretations = db::interpretations::map_for_user(&state.pool, user.id).await?;
    let summaries: Vec<DreamSummary> = dreams
        .into_iter()
        .map(|dream| {
            let interpretation = interpretations.get(&dream.id);
            DreamSummary {
                title: dream.title,
                raw_text: dream.raw_text,
                symbols: interpretation.and_then(|i| i.symbols.clone()),
                emotions: interpretation.and_then(|i| i.emotions.clone()),
            }
        })
        .collect();

    let report = state
        .gateway
        .analyze_patterns(&summaries)
        .await
        .map_err(|e| match e {
            AiError::NotConfigured(msg) => {
                ApiError::Internal(format!("Configuration error: {}", msg))
            }
            other => ApiError::Internal(format!("Failed to analyze patterns: {}", other)),
        })?;

    Ok(Json(report))
}

/// Split a stored comma/newline-delimited field into trimmed terms
fn split_terms(field: Option<&str>) -> Vec<String> {
    field
        .unwrap_or("")
        .replace('\n', ",")
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

/// Top terms by count, name-ordered within equal counts for stable output
fn top_terms(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut terms: Vec<(String, usize)> = counts.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    terms.truncate(TOP_COUNT);
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_terms_handles_commas_and_newlines() {
        let terms = split_terms(Some("flight, glass\nwater,  sky "));
        assert_eq!(terms, vec!["flight", "glass", "water", "sky"]);
    }

    #[test]
    fn test_split_terms_empty_and_none() {
        assert!(split_terms(None).is_empty());
        assert!(split_terms(Some("  ,\n, ")).is_empty());
    }

    #[test]
    fn test_top_terms_sorted_and_capped() {
        let mut counts = HashMap::new();
        for i in 0..15 {
            counts.insert(format!("term{:02}", i), i);
        }
        let top = top_terms(counts);
        assert_eq!(top.len(), TOP_COUNT);
        assert_eq!(top[0].1, 14, "highest count first");
    }
}
