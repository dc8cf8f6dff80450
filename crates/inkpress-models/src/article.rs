//! Article models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use crate::voice::VoiceConfig;

/// Unique identifier for an article.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ArticleId(pub String);

impl ArticleId {
    /// Generate a new random article ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ArticleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ArticleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ArticleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Content generation status.
///
/// The placeholder record is created as `Pending` by the API layer before
/// the generation job is enqueued; the worker owns every later transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Placeholder created, job not yet picked up
    #[default]
    Pending,
    /// A generation worker is producing content
    Processing,
    /// Generated fields are persisted
    Completed,
    /// Generation failed and the compensating delete also failed
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Narration status.
///
/// Absent (`None` on the article) until a narration job first touches the
/// record. Only meaningful once generation has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NarrationStatus {
    /// A narration worker is synthesizing audio
    Processing,
    /// Audio uploaded and referenced on the article
    Completed,
    /// Narration failed; generated content is left intact
    Failed,
}

impl NarrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrationStatus::Processing => "processing",
            NarrationStatus::Completed => "completed",
            NarrationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for NarrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters for content generation, supplied by the original request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct GenerationParams {
    /// Topic or full prompt for the generator
    #[validate(length(min = 1, max = 8192))]
    pub prompt: String,

    /// Named prompt template, when the request is template-based
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// BCP-47 language tag for the generated content
    #[serde(default = "default_language")]
    pub language: String,

    /// Voice configuration forwarded to the narration job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceConfig>,
}

fn default_language() -> String {
    "en-US".to_string()
}

impl GenerationParams {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            template: None,
            language: default_language(),
            voice: None,
        }
    }

    /// Set the prompt template.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Set the content language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the voice configuration.
    pub fn with_voice(mut self, voice: VoiceConfig) -> Self {
        self.voice = Some(voice);
        self
    }
}

/// An article record as stored by the record-store collaborator.
///
/// Carries two independent status fields: `generation_status` for the
/// content pipeline stage and `narration_status` for the audio stage.
/// `narration_status` must never be `Processing`/`Completed` while
/// `generation_status != Completed`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Article {
    /// Unique article ID
    pub id: ArticleId,

    /// URL slug
    pub slug: String,

    /// Author (owner) ID
    pub author_id: String,

    /// Article title
    #[serde(default)]
    pub title: String,

    /// Article body (markdown)
    #[serde(default)]
    pub body: String,

    /// Cover image URL (primary asset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,

    /// Additional gallery image URLs
    #[serde(default)]
    pub gallery_urls: Vec<String>,

    /// Narration audio URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// BCP-47 language tag
    #[serde(default = "default_language")]
    pub language: String,

    /// Content generation status
    #[serde(default)]
    pub generation_status: GenerationStatus,

    /// Narration status; absent until a narration job first runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration_status: Option<NarrationStatus>,

    /// Error message (generation fallback or narration failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Generation completion timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,

    /// Narration completion timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrated_at: Option<DateTime<Utc>>,
}

impl Article {
    /// Create a placeholder record, as the API layer does before enqueueing
    /// a generation job.
    pub fn placeholder(
        id: ArticleId,
        slug: impl Into<String>,
        author_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            slug: slug.into(),
            author_id: author_id.into(),
            title: String::new(),
            body: String::new(),
            cover_image_url: None,
            gallery_urls: Vec::new(),
            audio_url: None,
            language: default_language(),
            generation_status: GenerationStatus::Pending,
            narration_status: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            generated_at: None,
            narrated_at: None,
        }
    }

    /// Persist generated fields and mark generation completed.
    pub fn complete_generation(mut self, title: impl Into<String>, body: impl Into<String>) -> Self {
        self.title = title.into();
        self.body = body.into();
        self.generation_status = GenerationStatus::Completed;
        self.generated_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark generation failed. Fallback path only: the compensating delete
    /// is preferred and leaves no record behind.
    pub fn fail_generation(mut self, error: impl Into<String>) -> Self {
        self.generation_status = GenerationStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
        self
    }

    /// Mark narration completed with the uploaded audio URL.
    pub fn complete_narration(mut self, audio_url: impl Into<String>) -> Self {
        self.narration_status = Some(NarrationStatus::Completed);
        self.audio_url = Some(audio_url.into());
        self.narrated_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self
    }

    /// Mark narration failed. Generated content is never rolled back.
    pub fn fail_narration(mut self, error: impl Into<String>) -> Self {
        self.narration_status = Some(NarrationStatus::Failed);
        self.error_message = Some(error.into());
        self.updated_at = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_article_id_generation() {
        let id1 = ArticleId::new();
        let id2 = ArticleId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_placeholder_defaults() {
        let article = Article::placeholder(ArticleId::new(), "hello-world", "author_1");

        assert_eq!(article.generation_status, GenerationStatus::Pending);
        assert!(article.narration_status.is_none());
        assert!(article.title.is_empty());
        assert!(article.audio_url.is_none());
    }

    #[test]
    fn test_generation_then_narration_lifecycle() {
        let article = Article::placeholder(ArticleId::new(), "hello-world", "author_1")
            .complete_generation("A Title", "Some body text.");

        assert_eq!(article.generation_status, GenerationStatus::Completed);
        assert!(article.generated_at.is_some());

        let narrated = article.complete_narration("https://cdn.example.com/a.mp3");
        assert_eq!(narrated.narration_status, Some(NarrationStatus::Completed));
        assert_eq!(
            narrated.audio_url.as_deref(),
            Some("https://cdn.example.com/a.mp3")
        );
        // Generation fields are untouched by narration transitions.
        assert_eq!(narrated.generation_status, GenerationStatus::Completed);
    }

    #[test]
    fn test_narration_failure_keeps_generation() {
        let article = Article::placeholder(ArticleId::new(), "s", "a")
            .complete_generation("T", "B")
            .fail_narration("speech provider unreachable");

        assert_eq!(article.narration_status, Some(NarrationStatus::Failed));
        assert_eq!(article.generation_status, GenerationStatus::Completed);
        assert_eq!(article.title, "T");
    }

    #[test]
    fn test_generation_params_validation() {
        use validator::Validate;

        let ok = GenerationParams::new("Write about Rust");
        assert!(ok.validate().is_ok());

        let empty = GenerationParams::new("");
        assert!(empty.validate().is_err());
    }
}
