//! Dream image generation client
//!
//! Two declared provider paths:
//! - Paid: OpenAI DALL-E 3, the only operational path.
//! - Free: permanently stubbed out. Free-tier image services proved too slow
//!   and unreliable to gate a background job on, so the branch fails fast
//!   with an explanatory message instead of being removed. Keeping the flag
//!   and routing intact preserves the cost-control switch.

use super::{truncate_chars, AiError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const OPENAI_IMAGE_URL: &str = "https://api.openai.com/v1/images/generations";
const IMAGE_MODEL: &str = "dall-e-3";
const IMAGE_SIZE: &str = "1024x1024";

/// Image generation is the slowest provider call
const IMAGE_TIMEOUT: Duration = Duration::from_secs(90);

/// DALL-E 3 accepts up to 4000 chars; we stay well under for cost and focus
const MAX_PROMPT_CHARS: usize = 1000;

/// Dream-text excerpt appended for grounding
const DREAM_SNIPPET_CHARS: usize = 300;

/// Base artistic direction for every dream image
const ARTISTIC_DIRECTION: &str = "Create a surreal, dream-like scene. Focus on the main symbols \
     and emotions. Use soft, cinematic lighting, gentle fog, and a slightly magical atmosphere. \
     Make the scene feel poetic, calm, and otherworldly, not scary unless the dream naturally \
     suggests darkness. Avoid showing real people clearly; use silhouettes or symbolic figures \
     instead. Keep the image cohesive, visually clean, and emotionally expressive.";

const QUALITY_SUFFIX: &str =
    "High quality, cinematic composition, dreamy atmosphere, surreal aesthetic.";

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    quality: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: String,
}

/// OpenAI image API client
pub struct ImageClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
}

impl ImageClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key,
        }
    }

    /// Generate a dream image, routing by provider preference
    pub async fn generate(
        &self,
        prompt: &str,
        dream_text: &str,
        use_free: bool,
    ) -> Result<String, AiError> {
        if use_free {
            self.generate_free()
        } else {
            self.generate_paid(prompt, dream_text).await
        }
    }

    /// Free provider path: declared, routed, and always unavailable
    fn generate_free(&self) -> Result<String, AiError> {
        Err(AiError::Unavailable(
            "Free image generation is currently unavailable due to reliability issues with \
             free services. To save money, uncheck 'Generate image' when creating dreams. \
             You'll still get full AI interpretation (narrative, meaning, symbols, emotions) \
             without the image."
                .to_string(),
        ))
    }

    /// Paid path: DALL-E 3
    async fn generate_paid(&self, prompt: &str, dream_text: &str) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AiError::NotConfigured(
                "OPENAI_API_KEY not configured. Please set OPENAI_API_KEY in the environment \
                 or config file (required for image generation)."
                    .to_string(),
            )
        })?;

        let enhanced_prompt = build_image_prompt(prompt, dream_text);

        debug!(
            model = IMAGE_MODEL,
            prompt_chars = enhanced_prompt.chars().count(),
            "Querying OpenAI image API"
        );

        let request = ImageRequest {
            model: IMAGE_MODEL,
            prompt: &enhanced_prompt,
            size: IMAGE_SIZE,
            quality: "standard",
        };

        let response = self
            .http_client
            .post(OPENAI_IMAGE_URL)
            .bearer_auth(api_key)
            .json(&request)
            .timeout(IMAGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            return Err(AiError::Api("OpenAI Image", message));
        }

        let reply: ImageResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;

        reply
            .data
            .into_iter()
            .next()
            .map(|data| data.url)
            .ok_or_else(|| AiError::Parse("Image reply contained no data".to_string()))
    }
}

/// Combine artistic direction, scene prompt, and a grounding excerpt of the
/// original dream, bounded to the provider prompt limit
fn build_image_prompt(prompt: &str, dream_text: &str) -> String {
    let enhanced = if dream_text.is_empty() {
        format!(
            "{} Scene description: {}. {}",
            ARTISTIC_DIRECTION, prompt, QUALITY_SUFFIX
        )
    } else {
        let snippet = truncate_chars(dream_text, DREAM_SNIPPET_CHARS).trim();
        format!(
            "{} Scene description: {}. Include specific dream details: {}. {}",
            ARTISTIC_DIRECTION, prompt, snippet, QUALITY_SUFFIX
        )
    };

    if enhanced.chars().count() > MAX_PROMPT_CHARS {
        format!("{}...", truncate_chars(&enhanced, MAX_PROMPT_CHARS))
    } else {
        enhanced
    }
}
