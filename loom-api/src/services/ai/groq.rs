//! Groq chat-completions client
//!
//! All text generation goes through Groq's OpenAI-compatible chat endpoint
//! with the fast free-tier model. Structured operations request a strict
//! JSON object reply; the rewrite operation takes free-form prose.

use super::{
    truncate_chars, AiError, DreamAnalysis, DreamSummary, PatternReport, SymbolExplanation,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const GROQ_MODEL: &str = "llama-3.1-8b-instant";

/// Per-call timeout for single-dream operations
const CHAT_TIMEOUT: Duration = Duration::from_secs(60);
/// Pattern analysis covers up to 10 dreams in one prompt; give it longer
const PATTERNS_TIMEOUT: Duration = Duration::from_secs(90);

/// Most recent dreams included in a pattern analysis prompt
const PATTERN_DREAM_LIMIT: usize = 10;
/// Per-dream text excerpt length in pattern prompts
const PATTERN_TEXT_CHARS: usize = 200;

const INTERPRET_SYSTEM_PROMPT: &str = "\
You are a friendly, poetic dream interpreter.
Given a dream description, respond in JSON with keys:
- poetic_narrative: a short, beautiful retelling (3-6 sentences)
- meaning: simple explanation of what this dream might mean (5-8 sentences)
- symbols: a comma-separated list of key symbols and what they might represent
- emotions: 3-6 emotion words (e.g. fear, curiosity, hope)
- image_prompt: a detailed description focusing on the main visual elements, \
symbols, and atmosphere of the dream. Describe the key objects, settings, \
lighting, colors, and mood. This will be used to create a surreal, dream-like \
artistic image, so focus on the most evocative and symbolic elements (2-4 sentences).
Reply ONLY with JSON.";

const EXPLAIN_SYSTEM_PROMPT: &str = "\
You are a dream interpretation expert with knowledge of psychology, mythology, and cultural symbolism.
When given a dream symbol, provide a comprehensive explanation that includes:

1. General meaning (2-3 sentences)
2. Psychological interpretation (2-3 sentences)
3. Cultural/mythological associations (2-3 sentences)
4. What it might mean in personal context (2-3 sentences)

Return JSON with keys:
general_meaning, psychological, cultural, personal_context.

Be insightful, educational, and respectful of different interpretations.";

const PATTERNS_SYSTEM_PROMPT: &str = "\
You are a dream pattern analyst specializing in pattern recognition across multiple dreams.
Analyze the provided collection of dreams and identify:

1. Recurring themes or motifs that appear across multiple dreams
2. Emotional patterns and trends (how emotions evolve over time)
3. Common symbols and their frequency/patterns
4. Temporal patterns (how dreams change over time)
5. Personal insights and growth patterns
6. Recommendations for further exploration

Respond in JSON format with keys:
- recurring_themes: A detailed description of recurring themes or motifs across the dreams (3-5 sentences)
- emotional_patterns: Analysis of emotional patterns and trends (3-5 sentences)
- symbol_patterns: Analysis of common symbols and their patterns (3-5 sentences)
- temporal_insights: Insights about how dreams change over time (3-5 sentences)
- personal_growth: Personal insights and growth patterns observed (3-5 sentences)
- recommendations: Recommendations for further exploration and reflection (2-4 sentences)

Be insightful, supportive, and focus on patterns that could help the dreamer understand themselves better.";

/// Narrative style instruction, defaulting to poetic for unknown styles
fn style_instruction(style: &str) -> &'static str {
    match style.to_lowercase().as_str() {
        "horror" => {
            "Rewrite this dream as a horror scene. Make it dark, eerie, and suspenseful. \
             Keep the core symbols and emotions but transform them into a terrifying narrative."
        }
        "sci-fi" => {
            "Rewrite this dream as a science fiction story. Add futuristic elements, \
             technology, space, or alternate dimensions. Keep the core symbols but give \
             them a sci-fi twist."
        }
        "children" => {
            "Rewrite this dream as a gentle children's story. Use simple, warm language. \
             Make it magical and age-appropriate. Keep it 4-8 sentences."
        }
        "fantasy" => {
            "Rewrite this dream as a fantasy tale. Add magical elements, mythical \
             creatures, or enchanted settings. Make it feel like a fantasy adventure. \
             Keep it 4-8 sentences."
        }
        "fairy-tale" => {
            "Rewrite this dream as a fairy tale. Use magical elements, enchanted \
             settings, and fairy tale language. Make it whimsical and enchanting."
        }
        "myth" => {
            "Rewrite this dream as a mythological story. Use gods, heroes, ancient \
             settings, and epic language. Make it feel like an ancient legend."
        }
        "bedtime-story" => {
            "Rewrite this dream as a calming bedtime story. Make it gentle, peaceful, \
             and soothing. Use soft language and comforting imagery."
        }
        "noir" => {
            "Rewrite this dream as a film noir story. Use hard-boiled detective style, \
             shadows, mystery, and urban atmosphere. Keep it 4-8 sentences."
        }
        _ => {
            "Rewrite this dream as a beautiful poem in prose form. Use lyrical, flowing \
             language with metaphors and imagery. Keep it 4-8 sentences."
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Groq API client
pub struct GroqClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
}

impl GroqClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key,
        }
    }

    fn require_key(&self) -> Result<&str, AiError> {
        self.api_key.as_deref().ok_or_else(|| {
            AiError::NotConfigured(
                "GROQ_API_KEY not configured. Please set GROQ_API_KEY in the environment or \
                 config file."
                    .to_string(),
            )
        })
    }

    /// One chat-completion round trip, returning the reply content
    async fn chat(
        &self,
        system_prompt: &str,
        user_text: &str,
        temperature: Option<f32>,
        json_reply: bool,
        timeout: Duration,
    ) -> Result<String, AiError> {
        let api_key = self.require_key()?;

        let request = ChatRequest {
            model: GROQ_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_text,
                },
            ],
            temperature,
            response_format: json_reply.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        debug!(model = GROQ_MODEL, json_reply, "Querying Groq chat API");

        let response = self
            .http_client
            .post(GROQ_URL)
            .bearer_auth(api_key)
            .json(&request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = extract_api_error(response).await;
            return Err(AiError::Api("Groq", message));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))?;

        reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AiError::Parse("Reply contained no choices".to_string()))
    }

    /// Interpret a dream's raw text into structured analysis
    pub async fn interpret(&self, raw_text: &str) -> Result<DreamAnalysis, AiError> {
        let content = self
            .chat(INTERPRET_SYSTEM_PROMPT, raw_text, Some(0.8), true, CHAT_TIMEOUT)
            .await?;

        serde_json::from_str(&content)
            .map_err(|e| AiError::Parse(format!("Interpretation reply was not valid JSON: {}", e)))
    }

    /// Rewrite a dream in a narrative style; unknown styles fall back to poetic
    pub async fn rewrite(&self, raw_text: &str, style: &str) -> Result<String, AiError> {
        let system_prompt = format!(
            "You are a creative writer specializing in {} narratives.\n{}\n\
             Return ONLY the rewritten dream narrative, no explanations or meta-commentary.\n\
             Make it 3-5 sentences, vivid and engaging.",
            style,
            style_instruction(style)
        );

        let content = self
            .chat(&system_prompt, raw_text, Some(0.9), false, CHAT_TIMEOUT)
            .await?;
        Ok(content.trim().to_string())
    }

    /// Explain a single dream symbol
    pub async fn explain_symbol(&self, symbol: &str) -> Result<SymbolExplanation, AiError> {
        let user_text = format!("Explain the dream symbol: {}", symbol);
        let content = self
            .chat(EXPLAIN_SYSTEM_PROMPT, &user_text, None, true, CHAT_TIMEOUT)
            .await?;

        serde_json::from_str(&content)
            .map_err(|e| AiError::Parse(format!("Symbol reply was not valid JSON: {}", e)))
    }

    /// Analyze patterns across dreams; always returns all six report fields
    pub async fn analyze_patterns(
        &self,
        dreams: &[DreamSummary],
    ) -> Result<PatternReport, AiError> {
        let combined = combine_dream_summaries(dreams);
        let content = self
            .chat(PATTERNS_SYSTEM_PROMPT, &combined, Some(0.7), true, PATTERNS_TIMEOUT)
            .await?;

        // A reply that is not even a JSON object degrades to all-placeholder
        // fields: pattern analysis is advisory and should never 500 over a
        // malformed reply.
        let fields: Value = serde_json::from_str(&content).unwrap_or(Value::Null);
        Ok(report_from_fields(&fields))
    }
}

/// Build the combined pattern-analysis prompt from the most recent dreams
fn combine_dream_summaries(dreams: &[DreamSummary]) -> String {
    let summaries: Vec<String> = dreams
        .iter()
        .take(PATTERN_DREAM_LIMIT)
        .map(|dream| {
            let mut summary = format!(
                "Dream: {}\nText: {}\n",
                dream.title,
                truncate_chars(&dream.raw_text, PATTERN_TEXT_CHARS)
            );
            if let Some(symbols) = dream.symbols.as_deref().filter(|s| !s.is_empty()) {
                summary.push_str(&format!("Symbols: {}\n", symbols));
            }
            if let Some(emotions) = dream.emotions.as_deref().filter(|e| !e.is_empty()) {
                summary.push_str(&format!("Emotions: {}\n", emotions));
            }
            summary
        })
        .collect();

    summaries.join("\n\n---\n\n")
}

/// Assemble a report, substituting a placeholder for each absent field
fn report_from_fields(fields: &Value) -> PatternReport {
    let field = |name: &str| -> String {
        fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("Analysis for {} is not available.", name.replace('_', " "))
            })
    };

    PatternReport {
        recurring_themes: field("recurring_themes"),
        emotional_patterns: field("emotional_patterns"),
        symbol_patterns: field("symbol_patterns"),
        temporal_insights: field("temporal_insights"),
        personal_growth: field("personal_growth"),
        recommendations: field("recommendations"),
    }
}

/// Pull the provider's error message out of a non-success reply body
async fn extract_api_error(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap_or(Value::Null);
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
        .to_string()
}
