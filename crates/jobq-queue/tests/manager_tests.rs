//! State machine tests for the queue manager over the in-memory store

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobq_queue::{
    Clock, JobState, ManualClock, MemoryStore, NewJob, QueueError, QueueManager, QueueSettings,
    ABANDONED_MESSAGE,
};

fn setup() -> (Arc<QueueManager>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let manager = QueueManager::with_clock(
        Arc::new(MemoryStore::new()),
        QueueSettings::default(),
        clock.clone(),
    );
    (Arc::new(manager), clock)
}

/// Enqueue and step the clock so created_at values are distinct.
async fn enqueue(manager: &QueueManager, clock: &ManualClock, job: NewJob) -> String {
    let id = manager.enqueue(job).await.unwrap();
    clock.advance(chrono::Duration::milliseconds(1));
    id
}

#[tokio::test]
async fn test_enqueue_defaults() {
    let (manager, _clock) = setup();
    let id = manager.enqueue(NewJob::new("echo hi")).await.unwrap();

    let job = manager.get(&id).await.unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.max_retries, 3);
    assert_eq!(job.priority, 0);
    assert_eq!(job.timeout_secs, Some(300));
    assert_eq!(job.run_at, job.created_at);
}

#[tokio::test]
async fn test_enqueue_validation() {
    let (manager, _clock) = setup();

    let err = manager.enqueue(NewJob::new("   ")).await.unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)));

    let err = manager
        .enqueue(NewJob::new("true").with_max_retries(-1))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)));

    // Nothing was created
    assert!(manager.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_enqueue_custom_id_and_duplicate() {
    let (manager, _clock) = setup();
    let id = manager
        .enqueue(NewJob::new("true").with_id("nightly-backup"))
        .await
        .unwrap();
    assert_eq!(id, "nightly-backup");

    let err = manager
        .enqueue(NewJob::new("true").with_id("nightly-backup"))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::AlreadyExists(_)));
}

#[tokio::test]
async fn test_timeout_must_fit_signed_seconds() {
    let (manager, _clock) = setup();
    let err = manager
        .enqueue(NewJob::new("true").with_timeout(Duration::from_secs(u64::MAX)))
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)));

    let id = manager
        .enqueue(NewJob::new("true").with_timeout(Duration::from_secs(i64::MAX as u64)))
        .await
        .unwrap();
    assert_eq!(
        manager.get(&id).await.unwrap().timeout_secs,
        Some(i64::MAX as u64)
    );
}

#[tokio::test]
async fn test_zero_timeout_means_unbounded() {
    let (manager, _clock) = setup();
    let id = manager
        .enqueue(NewJob::new("true").with_timeout(Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(manager.get(&id).await.unwrap().timeout_secs, None);
}

#[tokio::test]
async fn test_priority_ordering() {
    let (manager, clock) = setup();
    for priority in [1, 10, 5] {
        enqueue(&manager, &clock, NewJob::new("true").with_priority(priority)).await;
    }

    let now = clock.now();
    let mut order = Vec::new();
    while let Some(job) = manager.claim(now).await.unwrap() {
        order.push(job.priority);
    }
    assert_eq!(order, vec![10, 5, 1]);
}

#[tokio::test]
async fn test_fifo_within_priority() {
    let (manager, clock) = setup();
    let first = enqueue(&manager, &clock, NewJob::new("true")).await;
    let second = enqueue(&manager, &clock, NewJob::new("true")).await;

    let now = clock.now();
    assert_eq!(manager.claim(now).await.unwrap().unwrap().id, first);
    assert_eq!(manager.claim(now).await.unwrap().unwrap().id, second);
}

#[tokio::test]
async fn test_scheduled_job_not_claimed_early() {
    let (manager, clock) = setup();
    let run_at = clock.now() + chrono::Duration::seconds(60);
    let id = manager
        .enqueue(NewJob::new("true").with_run_at(run_at))
        .await
        .unwrap();

    assert!(manager.claim(run_at - chrono::Duration::seconds(1)).await.unwrap().is_none());

    let job = manager.claim(run_at).await.unwrap().expect("Should be due");
    assert_eq!(job.id, id);
}

#[tokio::test]
async fn test_complete_clears_error_and_is_not_repeatable() {
    let (manager, clock) = setup();
    let id = manager.enqueue(NewJob::new("true")).await.unwrap();

    manager.claim(clock.now()).await.unwrap().unwrap();
    manager.fail(&id, "first try broke", clock.now()).await.unwrap();

    let retry_at = manager.get(&id).await.unwrap().run_at;
    manager.claim(retry_at).await.unwrap().unwrap();

    let done = manager.complete(&id).await.unwrap();
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.error_message, None);
    assert!(done.completed_at.is_some());

    let err = manager.complete(&id).await.unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidState {
            expected: JobState::Processing,
            actual: JobState::Completed,
            ..
        }
    ));

    let stats = manager.stats().await.unwrap();
    assert_eq!(stats[&JobState::Completed], 1);
}

#[tokio::test]
async fn test_complete_unknown_job() {
    let (manager, _clock) = setup();
    let err = manager.complete("nope").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_fail_schedules_backoff() {
    let (manager, clock) = setup();
    let id = manager.enqueue(NewJob::new("false")).await.unwrap();

    let now = clock.now();
    let claimed = manager.claim(now).await.unwrap().unwrap();
    assert_eq!(claimed.attempts, 1);

    let failed = manager.fail(&id, "exit code 1", now).await.unwrap();
    assert_eq!(failed.state, JobState::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("exit code 1"));
    // base 2, one attempt consumed
    assert_eq!(failed.run_at, now + chrono::Duration::seconds(2));

    // Not eligible until the backoff elapses
    assert!(manager
        .claim(now + chrono::Duration::seconds(1))
        .await
        .unwrap()
        .is_none());
    let again = manager.claim(failed.run_at).await.unwrap().unwrap();
    assert_eq!(again.attempts, 2);
}

#[tokio::test]
async fn test_fail_requires_processing() {
    let (manager, clock) = setup();
    let id = manager.enqueue(NewJob::new("false")).await.unwrap();

    let err = manager.fail(&id, "nope", clock.now()).await.unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidState {
            actual: JobState::Pending,
            ..
        }
    ));
}

#[tokio::test]
async fn test_dlq_round_trip() {
    let (manager, clock) = setup();
    let id = manager
        .enqueue(NewJob::new("flaky").with_max_retries(2))
        .await
        .unwrap();

    let mut now = clock.now();
    let mut last_attempts = 0;
    for _ in 0..3 {
        let job = manager.claim(now).await.unwrap().expect("Should be claimable");
        assert!(job.attempts > last_attempts);
        assert!(job.attempts <= job.max_retries + 1);
        last_attempts = job.attempts;

        let failed = manager.fail(&id, "boom", now).await.unwrap();
        assert!(failed.run_at >= now);
        now = failed.run_at;
    }

    let dead = manager.get(&id).await.unwrap();
    assert_eq!(dead.state, JobState::Dead);
    assert_eq!(dead.attempts, 3);
    assert_eq!(dead.error_message.as_deref(), Some("boom"));
    assert!(manager.claim(now + chrono::Duration::days(365)).await.unwrap().is_none());

    let dlq = manager.list_dlq().await.unwrap();
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq[0].id, id);

    let revived = manager.dlq_retry(&id).await.unwrap();
    assert_eq!(revived.state, JobState::Pending);
    assert_eq!(revived.attempts, 0);
    assert_eq!(revived.error_message, None);

    let job = manager.claim(clock.now()).await.unwrap().unwrap();
    assert_eq!(job.attempts, 1);
    let done = manager.complete(&id).await.unwrap();
    assert_eq!(done.state, JobState::Completed);
}

#[tokio::test]
async fn test_dlq_retry_requires_dead() {
    let (manager, _clock) = setup();
    let id = manager.enqueue(NewJob::new("true")).await.unwrap();

    let err = manager.dlq_retry(&id).await.unwrap_err();
    assert!(matches!(
        err,
        QueueError::InvalidState {
            expected: JobState::Dead,
            actual: JobState::Pending,
            ..
        }
    ));
}

#[tokio::test]
async fn test_zero_retries_dies_on_first_failure() {
    let (manager, clock) = setup();
    let id = manager
        .enqueue(NewJob::new("false").with_max_retries(0))
        .await
        .unwrap();
    manager.claim(clock.now()).await.unwrap().unwrap();
    let job = manager.fail(&id, "exit code 1", clock.now()).await.unwrap();
    assert_eq!(job.state, JobState::Dead);
}

#[tokio::test]
async fn test_concurrent_claims_never_share_a_job() {
    let (manager, clock) = setup();
    for i in 0..50 {
        manager
            .enqueue(NewJob::new(format!("echo {}", i)))
            .await
            .unwrap();
    }
    let now = clock.now();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            let mut mine = Vec::new();
            while let Some(job) = manager.claim(now).await.unwrap() {
                mine.push(job.id);
                tokio::task::yield_now().await;
            }
            mine
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id), "job claimed twice");
        }
    }
    assert_eq!(seen.len(), 50);
}

#[tokio::test]
async fn test_recover_stale_processing() {
    let (manager, clock) = setup();
    let stuck = enqueue(&manager, &clock, NewJob::new("sleep 1000")).await;
    let fresh = enqueue(&manager, &clock, NewJob::new("sleep 1")).await;

    manager.claim(clock.now()).await.unwrap().unwrap();
    clock.advance(chrono::Duration::minutes(30));
    manager.claim(clock.now()).await.unwrap().unwrap();

    let recovered = manager
        .recover_stale(Duration::from_secs(600), clock.now())
        .await
        .unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].id, stuck);
    assert_eq!(recovered[0].state, JobState::Failed);
    assert_eq!(
        manager.get(&fresh).await.unwrap().state,
        JobState::Processing
    );
}

#[tokio::test]
async fn test_recover_stale_rejects_unrepresentable_age() {
    let (manager, clock) = setup();
    let err = manager
        .recover_stale(Duration::from_secs(9_000_000_000_000), clock.now())
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)));
}

#[tokio::test]
async fn test_reset_respects_retry_cap() {
    let (manager, clock) = setup();
    let id = manager
        .enqueue(NewJob::new("true").with_max_retries(0))
        .await
        .unwrap();
    manager.claim(clock.now()).await.unwrap().unwrap();

    let job = manager.reset(&id, clock.now()).await.unwrap();
    assert_eq!(job.state, JobState::Dead);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.error_message.as_deref(), Some(ABANDONED_MESSAGE));
    assert_eq!(ABANDONED_MESSAGE, "abandoned: worker did not report an outcome");
}

#[tokio::test]
async fn test_stats_and_metrics() {
    let (manager, clock) = setup();
    let a = enqueue(&manager, &clock, NewJob::new("true").with_priority(5)).await;
    enqueue(&manager, &clock, NewJob::new("true")).await;

    let stats = manager.stats().await.unwrap();
    assert_eq!(stats.len(), 5);
    assert_eq!(stats[&JobState::Pending], 2);
    assert_eq!(stats[&JobState::Dead], 0);

    manager.claim(clock.now()).await.unwrap().unwrap();
    manager
        .complete_with(
            &a,
            jobq_queue::Completion {
                stdout: "ok\n".into(),
                elapsed: Duration::from_millis(40),
            },
        )
        .await
        .unwrap();

    let job = manager.get(&a).await.unwrap();
    assert_eq!(job.output.as_deref(), Some("ok"));
    assert_eq!(job.execution_time_ms, Some(40));

    let metrics = manager.metrics().await.unwrap();
    assert_eq!(metrics.total, 2);
    assert_eq!(metrics.completed, 1);
    assert!((metrics.success_rate - 50.0).abs() < f64::EPSILON);
    assert_eq!(metrics.avg_execution_ms, Some(40.0));
    assert_eq!(metrics.jobs_last_24h, 2);
    assert_eq!(metrics.priority_distribution[&5], 1);
    assert_eq!(metrics.priority_distribution[&0], 1);
}
