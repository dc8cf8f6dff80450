//! Image upload worker.
//!
//! Fetches externally-sourced images, re-uploads them into the bucket,
//! and appends them to the article gallery with the same partial-failure
//! tolerance as the generation worker's asset stage.

use chrono::Utc;
use tracing::{info, warn};

use inkpress_queue::ImageUploadJob;
use inkpress_storage::StorageError;

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};

/// Process one image upload job.
pub async fn run(ctx: &WorkerContext, job: &ImageUploadJob) -> WorkerResult<()> {
    let mut article = ctx
        .records
        .find_by_id(&job.article_id)
        .await?
        .ok_or_else(|| {
            WorkerError::validation(format!("article {} not found", job.article_id))
        })?;

    let report = ctx
        .uploader
        .upload_sources(&job.image_sources, &job.upload_path)
        .await;

    if report.uploaded.is_empty() {
        return Err(WorkerError::Storage(StorageError::upload_failed(format!(
            "all {} image uploads failed for article {}",
            job.image_sources.len(),
            job.article_id
        ))));
    }

    for failure in &report.failed {
        warn!(
            "Image upload failed for article {} ({}), continuing: {}",
            job.article_id, failure.source_url, failure.error
        );
    }

    article.gallery_urls.extend(report.uploaded_urls());
    article.updated_at = Utc::now();
    ctx.records.update(&article).await?;

    ctx.invalidate_article(&article.id, &article.slug).await;

    info!(
        "Uploaded {}/{} images for article {}",
        report.uploaded.len(),
        job.image_sources.len(),
        job.article_id
    );
    Ok(())
}
