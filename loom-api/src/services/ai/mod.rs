//! AI provider gateway
//!
//! Stateless adapters over the two external AI providers: Groq for all text
//! generation (interpretation, rewrite, symbol explanation, pattern
//! analysis) and OpenAI for image generation. Every operation is a single
//! bounded-timeout request; failures surface as typed [`AiError`] values and
//! are never retried here.

pub mod groq;
pub mod image;

pub use groq::GroqClient;
pub use image::ImageClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// AI gateway errors
#[derive(Debug, Error)]
pub enum AiError {
    /// Required provider credential missing or placeholder
    #[error("{0}")]
    NotConfigured(String),

    /// Provider responded with a non-success status
    #[error("{0} API error: {1}")]
    Api(&'static str, String),

    /// Transport failure or timeout reaching the provider
    #[error("Network error: {0}")]
    Network(String),

    /// Provider reply could not be interpreted as the expected structure
    #[error("Parse error: {0}")]
    Parse(String),

    /// Declared-but-disabled provider path (free image generation)
    #[error("{0}")]
    Unavailable(String),
}

impl AiError {
    /// True for failures caused by deployment configuration rather than the
    /// upstream service — the pipeline words these differently for users.
    pub fn is_configuration(&self) -> bool {
        matches!(self, AiError::NotConfigured(_))
    }
}

/// Structured interpretation of a single dream
///
/// `symbols` and `emotions` stay as raw JSON values: the model is asked for
/// flat strings but occasionally returns an object or an array, and the
/// pipeline owns flattening those before persistence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DreamAnalysis {
    #[serde(default)]
    pub poetic_narrative: String,
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub symbols: Value,
    #[serde(default)]
    pub emotions: Value,
    #[serde(default)]
    pub image_prompt: String,
}

/// Structured explanation of a single dream symbol
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolExplanation {
    #[serde(default)]
    pub general_meaning: String,
    #[serde(default)]
    pub psychological: String,
    #[serde(default)]
    pub cultural: String,
    #[serde(default)]
    pub personal_context: String,
}

/// Cross-dream pattern report; all six fields always populated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternReport {
    pub recurring_themes: String,
    pub emotional_patterns: String,
    pub symbol_patterns: String,
    pub temporal_insights: String,
    pub personal_growth: String,
    pub recommendations: String,
}

/// Per-dream input to pattern analysis
#[derive(Debug, Clone)]
pub struct DreamSummary {
    pub title: String,
    pub raw_text: String,
    pub symbols: Option<String>,
    pub emotions: Option<String>,
}

/// The two gateway operations the processing pipeline depends on
///
/// The production implementation is [`AiGateway`]; tests substitute stubs to
/// exercise pipeline ordering and failure handling without network access.
#[async_trait]
pub trait DreamIntelligence: Send + Sync {
    /// Interpret a dream's raw text into structured analysis
    async fn interpret(&self, raw_text: &str) -> Result<DreamAnalysis, AiError>;

    /// Generate an illustrative image; returns the hosted image URL
    async fn generate_image(&self, prompt: &str, dream_text: &str) -> Result<String, AiError>;
}

/// Production gateway combining the Groq text client and OpenAI image client
pub struct AiGateway {
    text: GroqClient,
    image: ImageClient,
}

impl AiGateway {
    pub fn new(groq_api_key: Option<String>, openai_api_key: Option<String>) -> Self {
        Self {
            text: GroqClient::new(groq_api_key),
            image: ImageClient::new(openai_api_key),
        }
    }

    /// Rewrite a dream in a given narrative style (unknown style → poetic)
    pub async fn rewrite(&self, raw_text: &str, style: &str) -> Result<String, AiError> {
        self.text.rewrite(raw_text, style).await
    }

    /// Explain a single dream symbol
    pub async fn explain_symbol(&self, symbol: &str) -> Result<SymbolExplanation, AiError> {
        self.text.explain_symbol(symbol).await
    }

    /// Analyze patterns across a user's dreams (at most the 10 most recent)
    pub async fn analyze_patterns(
        &self,
        dreams: &[DreamSummary],
    ) -> Result<PatternReport, AiError> {
        self.text.analyze_patterns(dreams).await
    }

    /// Generate a dream image, selecting the free or paid provider path
    ///
    /// The free path is declared but permanently stubbed out; see
    /// [`ImageClient::generate`].
    pub async fn generate_dream_image(
        &self,
        prompt: &str,
        dream_text: &str,
        use_free: bool,
    ) -> Result<String, AiError> {
        self.image.generate(prompt, dream_text, use_free).await
    }
}

#[async_trait]
impl DreamIntelligence for AiGateway {
    async fn interpret(&self, raw_text: &str) -> Result<DreamAnalysis, AiError> {
        self.text.interpret(raw_text).await
    }

    async fn generate_image(&self, prompt: &str, dream_text: &str) -> Result<String, AiError> {
        // The pipeline always takes the paid path: the free tier is too
        // unreliable to gate a background job on.
        self.image.generate(prompt, dream_text, false).await
    }
}

/// Truncate to at most `max_chars` characters on a char boundary
///
/// Provider prompts have hard length limits; byte-indexed slicing would
/// panic mid-codepoint on non-ASCII dream text.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
