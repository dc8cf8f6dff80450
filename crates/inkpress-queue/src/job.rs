//! Job payload types for the queue.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use inkpress_models::{ArticleId, GenerationParams, JobId, QueueName, VoiceConfig};

/// Job to generate content for a placeholder article.
///
/// The API layer creates the placeholder record first, then enqueues this
/// job; the generation worker owns every later state transition and chains
/// into narration on success.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Placeholder article to fill in
    pub article_id: ArticleId,
    /// Requesting author
    pub author_id: String,
    /// Prompt/template parameters from the original request
    pub params: GenerationParams,
    /// Whether the request came from a named template
    #[serde(default)]
    pub is_template_based: bool,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Create a new generation job.
    pub fn new(
        article_id: ArticleId,
        author_id: impl Into<String>,
        params: GenerationParams,
    ) -> Self {
        let is_template_based = params.template.is_some();
        Self {
            job_id: JobId::new(),
            article_id,
            author_id: author_id.into(),
            params,
            is_template_based,
            created_at: Utc::now(),
        }
    }
}

/// Job to narrate a generated article.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NarrationJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Article the audio belongs to
    pub article_id: ArticleId,
    /// Raw generated text (may still contain markup)
    pub text: String,
    /// Voice configuration; provider defaults when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceConfig>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl NarrationJob {
    /// Create a new narration job.
    pub fn new(article_id: ArticleId, text: impl Into<String>) -> Self {
        Self {
            job_id: JobId::new(),
            article_id,
            text: text.into(),
            voice: None,
            created_at: Utc::now(),
        }
    }

    /// Set the voice configuration.
    pub fn with_voice(mut self, voice: VoiceConfig) -> Self {
        self.voice = Some(voice);
        self
    }
}

/// Job to send a transactional email.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct EmailJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Recipient address
    #[validate(email)]
    pub to: String,
    /// Subject line
    #[validate(length(min = 1))]
    pub subject: String,
    /// Plain-text body
    pub text: String,
    /// HTML body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl EmailJob {
    /// Create a new email job.
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
            html: None,
        }
    }

    /// Set the HTML body.
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }
}

/// Job to upload externally-sourced images for an article.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImageUploadJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Article the images belong to
    pub article_id: ArticleId,
    /// Source URLs to fetch and re-upload
    pub image_sources: Vec<String>,
    /// Destination prefix in the bucket
    pub upload_path: String,
}

impl ImageUploadJob {
    /// Create a new image upload job.
    pub fn new(
        article_id: ArticleId,
        image_sources: Vec<String>,
        upload_path: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            article_id,
            image_sources,
            upload_path: upload_path.into(),
        }
    }
}

/// Generic job wrapper for queue storage.
///
/// The tag doubles as the queue assignment: each variant is only ever
/// enqueued on (and consumed from) its own queue, and the worker registry
/// dispatches on this enum with an exhaustive match.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueJob {
    /// Stage machine: generate content, upload assets, chain narration
    Generation(GenerationJob),
    /// Chunked speech synthesis and audio upload
    Narration(NarrationJob),
    /// Outbound transactional email
    Email(EmailJob),
    /// Standalone gallery image upload
    ImageUpload(ImageUploadJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::Generation(j) => &j.job_id,
            QueueJob::Narration(j) => &j.job_id,
            QueueJob::Email(j) => &j.job_id,
            QueueJob::ImageUpload(j) => &j.job_id,
        }
    }

    /// The queue this payload belongs to.
    pub fn queue(&self) -> QueueName {
        match self {
            QueueJob::Generation(_) => QueueName::Generation,
            QueueJob::Narration(_) => QueueName::Narration,
            QueueJob::Email(_) => QueueName::Email,
            QueueJob::ImageUpload(_) => QueueName::ImageUpload,
        }
    }

    /// Returns the article_id if this job targets an article.
    pub fn article_id(&self) -> Option<&ArticleId> {
        match self {
            QueueJob::Generation(j) => Some(&j.article_id),
            QueueJob::Narration(j) => Some(&j.article_id),
            QueueJob::Email(_) => None,
            QueueJob::ImageUpload(j) => Some(&j.article_id),
        }
    }

    /// Validate the payload before execution. Malformed payloads fail the
    /// job immediately, without retries.
    pub fn validate_payload(&self) -> Result<(), String> {
        use validator::Validate;

        match self {
            QueueJob::Generation(j) => j.params.validate().map_err(|e| e.to_string()),
            QueueJob::Narration(j) => {
                if j.text.trim().is_empty() {
                    Err("narration text is empty".to_string())
                } else {
                    Ok(())
                }
            }
            QueueJob::Email(j) => j.validate().map_err(|e| e.to_string()),
            QueueJob::ImageUpload(j) => {
                if j.image_sources.is_empty() {
                    Err("no image sources".to_string())
                } else if j.upload_path.trim().is_empty() {
                    Err("empty upload path".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_job_generation_serde_roundtrip() {
        let job = GenerationJob::new(
            ArticleId::new(),
            "author_1",
            GenerationParams::new("Write about the history of movable type"),
        );

        let wrapper = QueueJob::Generation(job.clone());
        let json = serde_json::to_string(&wrapper).expect("serialize QueueJob");
        let decoded: QueueJob = serde_json::from_str(&json).expect("deserialize QueueJob");

        match decoded {
            QueueJob::Generation(j) => {
                assert_eq!(j.job_id, job.job_id);
                assert_eq!(j.article_id, job.article_id);
                assert_eq!(j.params.prompt, job.params.prompt);
                assert_eq!(j.created_at, job.created_at);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn queue_job_tag_matches_queue() {
        let narration = QueueJob::Narration(NarrationJob::new(ArticleId::new(), "text"));
        let json = serde_json::to_string(&narration).unwrap();
        assert!(json.contains("\"type\":\"narration\""));
        assert_eq!(narration.queue(), QueueName::Narration);
    }

    #[test]
    fn validation_rejects_malformed_payloads() {
        let empty_text = QueueJob::Narration(NarrationJob::new(ArticleId::new(), "   "));
        assert!(empty_text.validate_payload().is_err());

        let bad_email = QueueJob::Email(EmailJob::new("not-an-address", "Hi", "body"));
        assert!(bad_email.validate_payload().is_err());

        let ok = QueueJob::Email(EmailJob::new("reader@example.com", "Hi", "body"));
        assert!(ok.validate_payload().is_ok());
    }
}
