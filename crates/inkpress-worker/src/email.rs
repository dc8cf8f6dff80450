//! Email worker and mail collaborator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use inkpress_queue::EmailJob;

use crate::context::WorkerContext;
use crate::error::{WorkerError, WorkerResult};

/// Outbound mail collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message. Provider errors are transient and retried by
    /// the broker policy.
    async fn send(&self, job: &EmailJob) -> WorkerResult<()>;
}

#[derive(Debug, Serialize)]
struct MailMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
}

/// HTTP JSON mail API client.
pub struct HttpMailer {
    api_key: String,
    base_url: String,
    from: String,
    client: Client,
}

impl HttpMailer {
    /// Create a new mailer client.
    pub fn new() -> WorkerResult<Self> {
        let api_key = std::env::var("MAIL_API_KEY")
            .map_err(|_| WorkerError::job_failed("MAIL_API_KEY not set"))?;
        let base_url = std::env::var("MAIL_API_URL")
            .map_err(|_| WorkerError::job_failed("MAIL_API_URL not set"))?;
        let from = std::env::var("MAIL_FROM")
            .unwrap_or_else(|_| "no-reply@inkpress.app".to_string());

        let timeout = std::env::var("MAIL_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .map_err(|e| WorkerError::job_failed(e.to_string()))?;

        Ok(Self {
            api_key,
            base_url,
            from,
            client,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, job: &EmailJob) -> WorkerResult<()> {
        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));

        let message = MailMessage {
            from: &self.from,
            to: &job.to,
            subject: &job.subject,
            text: &job.text,
            html: job.html.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await
            .map_err(|e| WorkerError::mail_failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::mail_failed(format!(
                "provider returned {}: {}",
                status, error_text
            )));
        }

        Ok(())
    }
}

/// Process one email job.
pub async fn run(ctx: &WorkerContext, job: &EmailJob) -> WorkerResult<()> {
    ctx.mailer.send(job).await?;
    info!("Sent email {} to {}", job.job_id, job.to);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mailer_for(server: &MockServer) -> HttpMailer {
        HttpMailer {
            api_key: "mail-key".to_string(),
            base_url: server.uri(),
            from: "no-reply@inkpress.app".to_string(),
            client: Client::new(),
        }
    }

    #[tokio::test]
    async fn posts_message_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("authorization", "Bearer mail-key"))
            .and(body_partial_json(serde_json::json!({
                "to": "reader@example.com",
                "subject": "Your article is live",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = mailer_for(&server);
        let job = EmailJob::new("reader@example.com", "Your article is live", "It shipped.");
        mailer.send(&job).await.expect("send ok");
    }

    #[tokio::test]
    async fn provider_errors_are_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mailer = mailer_for(&server);
        let job = EmailJob::new("reader@example.com", "Hi", "body");
        let err = mailer.send(&job).await.expect_err("should fail");
        assert!(matches!(err, WorkerError::Mail(_)));
        assert!(err.is_retryable());
    }
}
