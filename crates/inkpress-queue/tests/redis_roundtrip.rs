//! Broker integration tests. Run against a live Redis with
//! `cargo test -p inkpress-queue -- --ignored`.

use inkpress_models::{ArticleId, QueueName};
use inkpress_queue::{Broker, NarrationJob, QueueJob, QueueManager};

/// Test broker connection and queue initialization.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_broker_connection() {
    dotenvy::dotenv().ok();

    let manager = QueueManager::with_default_queues(Broker::from_env());
    manager.initialize().await.expect("Failed to initialize");
    assert!(manager.is_available());

    let queue = manager.queue(QueueName::Narration).expect("queue handle");
    let len = queue.len().await.expect("Failed to get queue length");
    println!("Narration queue length: {}", len);
}

/// Test job enqueue, consume, and complete cycle.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_job_enqueue_consume_complete() {
    dotenvy::dotenv().ok();

    let manager = QueueManager::with_default_queues(Broker::from_env());
    manager.initialize().await.expect("Failed to initialize");

    let job = NarrationJob::new(ArticleId::new(), "Integration test narration text.");
    let job_id = job.job_id.clone();

    let handle = manager
        .enqueue_narration(job)
        .await
        .expect("Failed to enqueue");
    println!("Enqueued job {} as message {}", job_id, handle.stream_id);

    let queue = manager.queue(QueueName::Narration).expect("queue handle");
    let jobs = queue
        .consume("test-consumer", 1000, 1)
        .await
        .expect("Failed to consume");

    assert_eq!(jobs.len(), 1);
    let (msg_id, consumed) = &jobs[0];
    assert_eq!(consumed.job_id(), &job_id);

    queue.complete(msg_id, consumed).await.expect("Failed to complete");
}

/// Test retry scheduling and dead-lettering after the attempt bound.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_retry_then_dlq() {
    dotenvy::dotenv().ok();

    let manager = QueueManager::with_default_queues(Broker::from_env());
    manager.initialize().await.expect("Failed to initialize");

    let job = NarrationJob::new(ArticleId::new(), "DLQ test text.");
    let job_id = job.job_id.clone();
    manager
        .enqueue_narration(job)
        .await
        .expect("Failed to enqueue");

    let queue = manager.queue(QueueName::Narration).expect("queue handle");
    let max = queue.max_attempts();

    let mut last_attempt = 0;
    for _ in 0..max {
        // Promote any parked retry first, then pull the delivery.
        queue.promote_due(10).await.expect("promote");
        let jobs = loop {
            let jobs = queue.consume("test-consumer", 1000, 1).await.expect("consume");
            if !jobs.is_empty() {
                break jobs;
            }
            queue.promote_due(10).await.expect("promote");
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        };

        let (msg_id, consumed) = &jobs[0];
        assert_eq!(consumed.job_id(), &job_id);

        last_attempt = queue
            .increment_attempts(consumed.job_id())
            .await
            .expect("increment");

        if last_attempt >= max {
            queue
                .dlq(msg_id, consumed, "simulated failure")
                .await
                .expect("dlq");
        } else {
            queue
                .schedule_retry(msg_id, consumed, last_attempt)
                .await
                .expect("schedule retry");
        }
    }

    // Attempt bound: the broker records no more than max_attempts runs.
    assert_eq!(last_attempt, max);
    assert!(queue.dlq_len().await.expect("dlq_len") >= 1);
}

/// Sanity-check that payloads survive the broker round trip intact.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_payload_roundtrip() {
    dotenvy::dotenv().ok();

    let manager = QueueManager::with_default_queues(Broker::from_env());
    manager.initialize().await.expect("Failed to initialize");

    let article_id = ArticleId::new();
    let job = NarrationJob::new(article_id.clone(), "Some text. More text!");
    manager
        .enqueue_narration(job)
        .await
        .expect("Failed to enqueue");

    let queue = manager.queue(QueueName::Narration).expect("queue handle");
    let jobs = queue
        .consume("test-consumer", 1000, 1)
        .await
        .expect("Failed to consume");
    let (msg_id, consumed) = &jobs[0];

    match consumed {
        QueueJob::Narration(n) => {
            assert_eq!(n.article_id, article_id);
            assert_eq!(n.text, "Some text. More text!");
        }
        other => panic!("unexpected variant: {other:?}"),
    }

    queue.complete(msg_id, consumed).await.expect("complete");
}
