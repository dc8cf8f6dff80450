//! Generation worker stage machine.
//!
//! `Queued → Generating → UploadingAssets → Completed | Failed`. On any
//! failure the placeholder record is compensated away (deleted), falling
//! back to an explicit failed marker when the delete itself fails, and the
//! error is re-thrown so the broker retry policy applies to the whole
//! generation attempt. Retries regenerate from scratch; stages are not
//! resumable.

use chrono::Utc;
use tracing::{error, info, warn};

use inkpress_models::{GenerationStatus, VoiceConfig};
use inkpress_queue::{GenerationJob, NarrationJob, QueueJob};
use inkpress_storage::StorageError;

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};
use crate::generator::GeneratedContent;

/// Process one generation job.
pub async fn run(ctx: &WorkerContext, job: &GenerationJob) -> WorkerResult<()> {
    match run_stages(ctx, job).await {
        Ok(()) => Ok(()),
        Err(e) => {
            compensate(ctx, job, &e).await;
            Err(e)
        }
    }
}

async fn run_stages(ctx: &WorkerContext, job: &GenerationJob) -> WorkerResult<()> {
    let mut article = ctx
        .records
        .find_by_id(&job.article_id)
        .await?
        .ok_or_else(|| {
            WorkerError::validation(format!("placeholder article {} not found", job.article_id))
        })?;

    // Generating
    article.generation_status = GenerationStatus::Processing;
    article.updated_at = Utc::now();
    ctx.records.update(&article).await?;

    let content = ctx.generator.generate(&job.params).await?;

    // UploadingAssets
    let (cover_image_url, gallery_urls) = upload_assets(ctx, job, &content).await?;

    // Completed
    let mut article = article.complete_generation(&content.title, &content.body);
    article.language = job.params.language.clone();
    article.cover_image_url = cover_image_url;
    article.gallery_urls = gallery_urls;
    ctx.records.update(&article).await?;

    ctx.invalidate_article(&article.id, &article.slug).await;

    // Chain into narration with the voice from the original request.
    let voice = job
        .params
        .voice
        .clone()
        .unwrap_or_else(|| VoiceConfig::for_language(&job.params.language));
    let narration = NarrationJob::new(article.id.clone(), &content.body).with_voice(voice);
    ctx.dispatcher.dispatch(QueueJob::Narration(narration)).await?;

    info!("Generated article {} ('{}')", article.id, article.title);
    Ok(())
}

/// Upload generated media sources. Individual failures are warnings; only
/// a failure of the primary (cover) asset fails the job.
async fn upload_assets(
    ctx: &WorkerContext,
    job: &GenerationJob,
    content: &GeneratedContent,
) -> WorkerResult<(Option<String>, Vec<String>)> {
    if content.media_sources.is_empty() {
        return Ok((None, Vec::new()));
    }

    let prefix = format!("articles/{}/images", job.article_id);
    let report = ctx.uploader.upload_sources(&content.media_sources, &prefix).await;

    let primary = &content.media_sources[0];
    if !report.contains_source(primary) {
        let detail = report
            .failed
            .iter()
            .find(|f| &f.source_url == primary)
            .map(|f| f.error.clone())
            .unwrap_or_else(|| "upload failed".to_string());
        return Err(WorkerError::Storage(StorageError::upload_failed(format!(
            "primary asset {}: {}",
            primary, detail
        ))));
    }

    for failure in &report.failed {
        warn!(
            "Secondary asset upload failed for article {} ({}), continuing: {}",
            job.article_id, failure.source_url, failure.error
        );
    }

    let mut urls = report.uploaded_urls().into_iter();
    let cover = urls.next();
    Ok((cover, urls.collect()))
}

/// Compensating delete of the placeholder record.
///
/// Preferred outcome is record absence; when the delete itself fails, the
/// record is marked failed with the error so a stuck `processing` state is
/// never left behind.
async fn compensate(ctx: &WorkerContext, job: &GenerationJob, cause: &WorkerError) {
    warn!(
        "Generation job {} failed ({}), compensating placeholder {}",
        job.job_id, cause, job.article_id
    );

    // Remember the slug before the record disappears.
    let slug = ctx
        .records
        .find_by_id(&job.article_id)
        .await
        .ok()
        .flatten()
        .map(|a| a.slug);

    match ctx.records.delete(&job.article_id).await {
        Ok(()) => {
            if let Some(slug) = slug {
                ctx.invalidate_article(&job.article_id, &slug).await;
            }
            info!("Deleted placeholder article {}", job.article_id);
        }
        Err(delete_err) => {
            error!(
                "Compensating delete of article {} failed: {}",
                job.article_id, delete_err
            );

            match ctx.records.find_by_id(&job.article_id).await {
                Ok(Some(article)) => {
                    let slug = article.slug.clone();
                    let failed = article.fail_generation(cause.to_string());
                    match ctx.records.update(&failed).await {
                        Ok(()) => {
                            ctx.invalidate_article(&job.article_id, &slug).await;
                            warn!(
                                "Marked article {} generation as failed instead",
                                job.article_id
                            );
                        }
                        Err(update_err) => error!(
                            "Failed to mark article {} as failed: {}",
                            job.article_id, update_err
                        ),
                    }
                }
                Ok(None) => {}
                Err(fetch_err) => error!(
                    "Failed to re-fetch article {} during compensation: {}",
                    job.article_id, fetch_err
                ),
            }
        }
    }
}
