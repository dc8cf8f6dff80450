//! Narration worker: sanitize, chunk, synthesize, concatenate, persist.
//!
//! Chunks are synthesized strictly sequentially so that joining the audio
//! buffers in production order needs no re-ordering step. Any failure sets
//! `narration_status = failed` and never touches the already-successful
//! generation result.

use chrono::Utc;
use tracing::{error, info, warn};

use inkpress_models::{GenerationStatus, NarrationStatus, VoiceConfig};
use inkpress_queue::NarrationJob;

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::text;

/// Process one narration job.
pub async fn run(ctx: &WorkerContext, job: &NarrationJob) -> WorkerResult<()> {
    match synthesize_and_store(ctx, job).await {
        Ok(()) => Ok(()),
        Err(e) => {
            mark_failed(ctx, job, &e).await;
            Err(e)
        }
    }
}

async fn synthesize_and_store(ctx: &WorkerContext, job: &NarrationJob) -> WorkerResult<()> {
    let mut article = ctx
        .records
        .find_by_id(&job.article_id)
        .await?
        .ok_or_else(|| {
            WorkerError::validation(format!("article {} not found", job.article_id))
        })?;

    // Narration is only meaningful once generation has completed.
    if article.generation_status != GenerationStatus::Completed {
        return Err(WorkerError::validation(format!(
            "narration requested for article {} with generation_status {}",
            job.article_id, article.generation_status
        )));
    }

    article.narration_status = Some(NarrationStatus::Processing);
    article.updated_at = Utc::now();
    ctx.records.update(&article).await?;

    let voice = job
        .voice
        .clone()
        .unwrap_or_else(|| VoiceConfig::for_language(&article.language));

    let sanitized = text::sanitize(&job.text);
    if sanitized.is_empty() {
        return Err(WorkerError::validation(
            "narration text is empty after sanitization",
        ));
    }

    let chunks = text::chunk(&sanitized, ctx.config.speech_byte_limit);
    if chunks.len() > 1 && !voice.encoding.supports_byte_concat() {
        return Err(WorkerError::unsupported_encoding(format!(
            "{} audio cannot be byte-joined across {} chunks; a container-aware muxer is required",
            voice.encoding,
            chunks.len()
        )));
    }

    info!(
        "Synthesizing {} chunks ({} bytes of text) for article {}",
        chunks.len(),
        sanitized.len(),
        job.article_id
    );

    // Sequential, in chunk order: concatenation order equals production
    // order, no re-ordering step.
    let mut audio: Vec<u8> = Vec::new();
    for chunk in &chunks {
        let bytes = ctx.speech.synthesize(&chunk.text, &voice).await?;
        audio.extend_from_slice(&bytes);
    }

    let key = format!(
        "articles/{}/narration.{}",
        job.article_id,
        voice.encoding.extension()
    );
    ctx.storage
        .upload_bytes(audio, &key, voice.encoding.content_type())
        .await?;

    let article = article.complete_narration(ctx.storage.url(&key));
    ctx.records.update(&article).await?;
    ctx.invalidate_article(&article.id, &article.slug).await;

    info!("Narrated article {} ({} chunks)", job.article_id, chunks.len());
    Ok(())
}

/// Record the failure on the article. Generation success and narration
/// failure must coexist in the end state, so nothing is rolled back.
async fn mark_failed(ctx: &WorkerContext, job: &NarrationJob, cause: &WorkerError) {
    match ctx.records.find_by_id(&job.article_id).await {
        Ok(Some(article)) => {
            let slug = article.slug.clone();
            let failed = article.fail_narration(cause.to_string());
            match ctx.records.update(&failed).await {
                Ok(()) => ctx.invalidate_article(&job.article_id, &slug).await,
                Err(e) => error!(
                    "Failed to mark narration of article {} as failed: {}",
                    job.article_id, e
                ),
            }
        }
        Ok(None) => warn!(
            "Article {} disappeared before narration failure could be recorded",
            job.article_id
        ),
        Err(e) => error!(
            "Failed to fetch article {} while recording narration failure: {}",
            job.article_id, e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use inkpress_models::{Article, ArticleId, AudioEncoding};
    use inkpress_records::RecordStore;

    use crate::testutil::{FakeGenerator, FakeSpeech, Harness};

    async fn seed_generated(harness: &Harness, body: &str) -> ArticleId {
        let id = ArticleId::new();
        let article = Article::placeholder(id.clone(), "narrated-slug", "author_1")
            .complete_generation("A Title", body);
        harness.records.create(&article).await.unwrap();
        id
    }

    #[tokio::test]
    async fn long_text_is_chunked_synthesized_in_order_and_concatenated() {
        let harness = Harness::new();

        // ~10KB of sanitized text with clear sentence terminators.
        let sentence = "The pressroom hummed long after midnight as the forms were locked. ";
        let body: String = sentence.repeat(150);
        assert!(body.len() > 10_000);

        let article_id = seed_generated(&harness, &body).await;
        let job = NarrationJob::new(article_id.clone(), &body);

        run(&harness.ctx, &job).await.expect("narration succeeds");

        let calls = harness.speech.calls.lock().await;
        assert!(calls.len() >= 2, "expected multiple chunks, got {}", calls.len());
        for call in calls.iter() {
            assert!(call.len() <= 4500);
        }

        // Concatenated audio length equals the sum of per-chunk audio
        // lengths (the fake returns one byte per text byte), in order.
        let expected_len: usize = calls.iter().map(|c| c.len()).sum();
        let stored = harness
            .storage
            .object(&format!("articles/{}/narration.mp3", article_id))
            .await
            .expect("audio uploaded");
        assert_eq!(stored.data.len(), expected_len);
        assert_eq!(stored.content_type, "audio/mpeg");

        let article = harness
            .records
            .find_by_id(&article_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(article.narration_status, Some(NarrationStatus::Completed));
        assert!(article
            .audio_url
            .as_deref()
            .is_some_and(|url| url.ends_with("narration.mp3")));
        assert!(article.narrated_at.is_some());
    }

    #[tokio::test]
    async fn markup_is_stripped_before_synthesis() {
        let harness = Harness::new();
        let body = "# Heading\n\nSome <em>emphasized</em> prose with [a link](https://x).";
        let article_id = seed_generated(&harness, body).await;

        run(&harness.ctx, &NarrationJob::new(article_id, body))
            .await
            .expect("narration succeeds");

        let calls = harness.speech.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].contains('#'));
        assert!(!calls[0].contains('<'));
        assert!(calls[0].contains("a link"));
    }

    #[tokio::test]
    async fn synthesis_failure_marks_narration_failed_and_keeps_generation() {
        let harness = Harness::with_collaborators(
            Arc::new(FakeGenerator::with_body("unused")),
            Arc::new(FakeSpeech::failing()),
        );
        let body = "A perfectly generated body.";
        let article_id = seed_generated(&harness, body).await;

        let err = run(&harness.ctx, &NarrationJob::new(article_id.clone(), body))
            .await
            .expect_err("synthesis fails");
        assert!(err.is_retryable());

        let article = harness
            .records
            .find_by_id(&article_id)
            .await
            .unwrap()
            .expect("record still present");
        // Generated content is intact; only the narration status moved.
        assert_eq!(article.generation_status, GenerationStatus::Completed);
        assert_eq!(article.title, "A Title");
        assert_eq!(article.body, body);
        assert_eq!(article.narration_status, Some(NarrationStatus::Failed));
        assert!(article.audio_url.is_none());
    }

    #[tokio::test]
    async fn container_encoding_refuses_multi_chunk_concat() {
        let harness = Harness::new();
        let sentence = "Opus narration sounds lovely but pages do not concatenate. ";
        let body: String = sentence.repeat(150);
        let article_id = seed_generated(&harness, &body).await;

        let voice = VoiceConfig::default().with_encoding(AudioEncoding::OggOpus);
        let job = NarrationJob::new(article_id.clone(), &body).with_voice(voice);

        let err = run(&harness.ctx, &job).await.expect_err("must refuse");
        assert!(matches!(err, WorkerError::UnsupportedEncoding(_)));
        assert!(!err.is_retryable());

        // No audio was synthesized or uploaded.
        assert!(harness.speech.calls.lock().await.is_empty());
        assert_eq!(harness.storage.len().await, 0);
    }

    #[tokio::test]
    async fn container_encoding_is_fine_for_a_single_chunk() {
        let harness = Harness::new();
        let body = "Short enough for one request.";
        let article_id = seed_generated(&harness, body).await;

        let voice = VoiceConfig::default().with_encoding(AudioEncoding::OggOpus);
        run(
            &harness.ctx,
            &NarrationJob::new(article_id.clone(), body).with_voice(voice),
        )
        .await
        .expect("single chunk needs no concatenation");

        assert!(harness
            .storage
            .object(&format!("articles/{}/narration.ogg", article_id))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn narration_before_generation_completed_is_rejected() {
        let harness = Harness::new();
        let id = ArticleId::new();
        let placeholder = Article::placeholder(id.clone(), "slug", "author");
        harness.records.create(&placeholder).await.unwrap();

        let err = run(&harness.ctx, &NarrationJob::new(id.clone(), "text"))
            .await
            .expect_err("invariant violation");
        assert!(matches!(err, WorkerError::Validation(_)));

        // The invariant holds: narration_status never reaches processing
        // or completed while generation is incomplete.
        let article = harness.records.find_by_id(&id).await.unwrap().unwrap();
        assert_ne!(article.narration_status, Some(NarrationStatus::Processing));
        assert_ne!(article.narration_status, Some(NarrationStatus::Completed));
    }

    #[tokio::test]
    async fn markup_only_text_is_a_validation_error() {
        let harness = Harness::new();
        let body = "```\ncode only\n```";
        let article_id = seed_generated(&harness, "Real body.").await;

        let err = run(&harness.ctx, &NarrationJob::new(article_id, body))
            .await
            .expect_err("nothing to narrate");
        assert!(matches!(err, WorkerError::Validation(_)));
    }
}
