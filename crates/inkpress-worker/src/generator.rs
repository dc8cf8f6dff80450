//! Gemini client for article content generation.
//!
//! Turns a prompt/template request into a generated article draft with
//! optional media source references.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use inkpress_models::GenerationParams;

use crate::error::{WorkerError, WorkerResult};

/// Content generation collaborator.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate an article draft. Provider errors are transient and
    /// retried by the broker policy.
    async fn generate(&self, params: &GenerationParams) -> WorkerResult<GeneratedContent>;
}

/// Draft produced by the generator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratedContent {
    /// Article title
    pub title: String,
    /// Article body, markdown
    pub body: String,
    /// Source URLs for media assets; the first is the cover image
    #[serde(default)]
    pub media_sources: Vec<String>,
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// Gemini API client.
pub struct GeminiGenerator {
    api_key: String,
    base_url: String,
    client: Client,
}

impl GeminiGenerator {
    /// Create a new Gemini client.
    pub fn new() -> WorkerResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| WorkerError::job_failed("GEMINI_API_KEY not set"))?;

        let base_url = std::env::var("GEMINI_API_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());

        let timeout = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(120);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| WorkerError::job_failed(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url,
            client,
        })
    }

    /// Build the article prompt.
    fn build_prompt(&self, params: &GenerationParams) -> String {
        let template_line = match &params.template {
            Some(template) => format!("Follow the '{}' article template.\n", template),
            None => String::new(),
        };

        format!(
            r#"You are an experienced magazine writer. Write a complete article in {language}.
{template_line}
TOPIC:
{prompt}

IMPORTANT: You must strictly follow this output format.
Return ONLY a single JSON object with this schema:
{{
  "title": "Article title",
  "body": "Full article body in markdown",
  "media_sources": ["https://..."]
}}

Additional instructions:
- Return ONLY a single JSON object and nothing else.
- The body must be well-structured markdown with paragraphs.
- List media_sources only when the topic genuinely benefits from imagery; the first entry is used as the cover image.
"#,
            language = params.language,
            template_line = template_line,
            prompt = params.prompt,
        )
    }

    /// Call the Gemini API with one model.
    async fn call_api(&self, model: &str, prompt: &str) -> WorkerResult<GeneratedContent> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::generation_failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::generation_failed(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            WorkerError::generation_failed(format!("failed to parse response: {}", e))
        })?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| WorkerError::generation_failed("no content in response"))?;

        parse_content_json(text)
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    async fn generate(&self, params: &GenerationParams) -> WorkerResult<GeneratedContent> {
        let prompt = self.build_prompt(params);

        // Fallback chain, cheapest-first.
        let models = [
            "gemini-2.5-flash",
            "gemini-2.5-flash-lite",
            "gemini-2.5-pro",
        ];

        let mut last_error = None;

        for model in &models {
            info!("Attempting content generation with model: {}", model);
            match self.call_api(model, &prompt).await {
                Ok(content) => {
                    info!("Generated '{}' with {}", content.title, model);
                    return Ok(content);
                }
                Err(e) => {
                    warn!("Failed with model {}: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| WorkerError::generation_failed("all generation models failed")))
    }
}

/// Parse the model's JSON output, tolerating markdown code fences.
fn parse_content_json(text: &str) -> WorkerResult<GeneratedContent> {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);

    let content: GeneratedContent = serde_json::from_str(text.trim())
        .map_err(|e| WorkerError::generation_failed(format!("failed to parse draft JSON: {}", e)))?;

    if content.title.trim().is_empty() || content.body.trim().is_empty() {
        return Err(WorkerError::generation_failed(
            "generator returned an empty title or body",
        ));
    }

    Ok(content)
}
