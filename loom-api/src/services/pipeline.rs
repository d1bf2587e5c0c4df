//! Dream processing pipeline
//!
//! Turns a freshly submitted dream into a persisted interpretation:
//!
//! ```text
//! Created → Analyzing → (GeneratingImage) → Persisted(Success | Failure)
//! ```
//!
//! The submitting request returns as soon as the dream row exists; the rest
//! runs in a detached task that publishes status updates through the
//! connection registry at each transition and always ends by persisting
//! exactly one interpretation row — on failure, a row whose `meaning`
//! carries a human-readable explanation, so the dream never appears stuck
//! in processing.
//!
//! There is no retry and no cancellation: each AI call gets one bounded
//! attempt, and a started run always reaches a terminal state. Regeneration
//! is an external trigger that deletes the prior interpretation first.

use crate::db;
use crate::db::interpretations::NewInterpretation;
use crate::services::ai::{AiError, DreamIntelligence};
use crate::ws::StatusRegistry;
use loom_common::db::models::Dream;
use loom_common::events::{DreamStatus, StatusUpdate};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Marker prefixes on `meaning` that encode a terminal processing failure
///
/// Clients parse `meaning` as display text either way; these literals are
/// part of the stored-data contract and must not change.
pub const CONFIG_ERROR_PREFIX: &str = "⚠️ Configuration Error:";
pub const FAILURE_PREFIX: &str = "⚠️ AI interpretation unavailable:";

/// Background dream processor
///
/// Cheap to clone; every spawned run carries its own handle to the pool,
/// registry, and gateway, so runs for different dreams proceed
/// independently.
#[derive(Clone)]
pub struct DreamProcessor {
    pool: SqlitePool,
    registry: Arc<StatusRegistry>,
    intelligence: Arc<dyn DreamIntelligence>,
}

impl DreamProcessor {
    pub fn new(
        pool: SqlitePool,
        registry: Arc<StatusRegistry>,
        intelligence: Arc<dyn DreamIntelligence>,
    ) -> Self {
        Self {
            pool,
            registry,
            intelligence,
        }
    }

    /// Kick off background processing for a dream (fire and forget)
    ///
    /// The caller's request/response cycle ends before this task runs; the
    /// task owns its pool handle and cannot fail the caller.
    pub fn spawn(&self, dream_id: i64, generate_image: bool) {
        let processor = self.clone();
        tokio::spawn(async move {
            processor.process(dream_id, generate_image).await;
        });
    }

    /// Run one dream to a terminal state; never propagates an error
    pub async fn process(&self, dream_id: i64, generate_image: bool) {
        let dream = match db::dreams::find(&self.pool, dream_id).await {
            Ok(Some(dream)) => dream,
            Ok(None) => {
                warn!(dream_id, "Dream vanished before processing started");
                return;
            }
            Err(e) => {
                error!(dream_id, "Failed to load dream for processing: {}", e);
                return;
            }
        };

        info!(dream_id, title = %dream.title, "Processing dream");

        let draft = match self.analyze(&dream, generate_image).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!(dream_id, "Dream analysis failed: {}", e);
                failure_interpretation(&e)
            }
        };

        if let Err(e) = db::interpretations::insert(&self.pool, dream_id, &draft).await {
            // Nothing left to fall back to; the dream stays interpretation-less
            // and regenerate remains available.
            error!(dream_id, "Failed to persist interpretation: {}", e);
        } else {
            info!(dream_id, "Interpretation saved");
        }

        // Terminal signal fires on success and failure alike; watching
        // clients re-fetch the dream to see which it was.
        self.registry.publish(dream_id, StatusUpdate::done(dream_id));
    }

    /// The fallible middle of the pipeline: interpret, optionally illustrate,
    /// normalize. Errors stay typed until `process` flattens them.
    async fn analyze(
        &self,
        dream: &Dream,
        generate_image: bool,
    ) -> Result<NewInterpretation, AiError> {
        self.registry.publish(
            dream.id,
            StatusUpdate::progress(DreamStatus::Analyzing, "Analyzing your dream..."),
        );

        let analysis = self.intelligence.interpret(&dream.raw_text).await?;

        let image_url = if generate_image {
            self.registry.publish(
                dream.id,
                StatusUpdate::progress(DreamStatus::GeneratingImage, "Generating realistic image..."),
            );

            match self
                .intelligence
                .generate_image(&analysis.image_prompt, &dream.raw_text)
                .await
            {
                Ok(url) => Some(url),
                Err(e) => {
                    // The text analysis is still worth keeping; the stored
                    // row simply has no image.
                    warn!(dream_id = dream.id, "Image generation failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(NewInterpretation {
            poetic_narrative: Some(analysis.poetic_narrative),
            meaning: Some(analysis.meaning),
            symbols: flatten_field(analysis.symbols),
            emotions: flatten_field(analysis.emotions),
            image_url,
        })
    }
}

/// Flatten the prose error encoding into an interpretation row
///
/// Configuration problems and upstream failures get distinct markers so the
/// client can tell the user whether to fix their deployment or just retry
/// later. All analysis fields stay NULL.
fn failure_interpretation(error: &AiError) -> NewInterpretation {
    let meaning = if error.is_configuration() {
        format!("{} {}", CONFIG_ERROR_PREFIX, error)
    } else {
        format!("{} {}", FAILURE_PREFIX, error)
    };

    NewInterpretation {
        meaning: Some(meaning),
        ..NewInterpretation::default()
    }
}

/// Normalize a structured gateway field to its stored string form
///
/// The model is asked for flat comma-separated strings but sometimes
/// returns an object or array; persistence only holds TEXT.
fn flatten_field(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            Some(joined)
        }
        object @ Value::Object(_) => Some(object.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_passes_strings_through() {
        assert_eq!(
            flatten_field(json!("flight, glass")),
            Some("flight, glass".to_string())
        );
    }

    #[test]
    fn test_flatten_null_stays_null() {
        assert_eq!(flatten_field(Value::Null), None);
    }

    #[test]
    fn test_flatten_joins_arrays() {
        assert_eq!(
            flatten_field(json!(["fear", "curiosity", "hope"])),
            Some("fear, curiosity, hope".to_string())
        );
    }

    #[test]
    fn test_flatten_serializes_objects() {
        let flattened = flatten_field(json!({"flight": "freedom"})).unwrap();
        assert!(flattened.contains("\"flight\""));
        assert!(flattened.contains("\"freedom\""));
    }

    #[test]
    fn test_configuration_failure_uses_config_marker() {
        let draft = failure_interpretation(&AiError::NotConfigured(
            "GROQ_API_KEY not configured.".to_string(),
        ));
        let meaning = draft.meaning.unwrap();
        assert!(meaning.starts_with(CONFIG_ERROR_PREFIX));
        assert!(meaning.contains("GROQ_API_KEY"));
        assert!(draft.poetic_narrative.is_none());
        assert!(draft.symbols.is_none());
        assert!(draft.emotions.is_none());
        assert!(draft.image_url.is_none());
    }

    #[test]
    fn test_upstream_failure_uses_unavailable_marker() {
        let draft =
            failure_interpretation(&AiError::Api("Groq", "rate limit exceeded".to_string()));
        let meaning = draft.meaning.unwrap();
        assert!(meaning.starts_with(FAILURE_PREFIX));
        assert!(meaning.contains("rate limit exceeded"));
    }
}
