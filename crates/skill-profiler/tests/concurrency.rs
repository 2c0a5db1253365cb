//! Scheduling under a paused clock: batches and items overlap, rounds do
//! not, and catalog loss cancels stalled siblings.

use std::sync::Arc;
use std::time::Duration;

use skill_catalog::fakes::{MemoryCandidateIndex, Scripted, ScriptedClassifier};
use skill_catalog::{CatalogEntry, ClassifyError, SkillLevel, SourceLocation, WorkItem};
use skill_profiler::{BatchStatus, Coordinator, ProfilerConfig, ProfilerContext, ProfilerError};
use tokio::time::Instant;

fn catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new("asyncio", SkillLevel::Advanced, "Async", "Concurrency", 80)
            .with_description("gather coroutine event loop"),
    ]
}

fn items(n: usize) -> Vec<WorkItem> {
    (0..n)
        .map(|i| {
            WorkItem::new(
                format!("i{i}"),
                "await asyncio.gather(*coroutines)",
                SourceLocation::new("worker/pool.py", i as u32, i as u32 + 3),
            )
        })
        .collect()
}

fn stalling(n: usize, delay: Duration) -> ScriptedClassifier {
    let classifier = ScriptedClassifier::matching_top_candidate(0.9);
    for i in 0..n {
        classifier.push(format!("i{i}"), [Scripted::Stall(delay)]);
    }
    classifier
}

fn coordinator(
    classifier: ScriptedClassifier,
    index: MemoryCandidateIndex,
    config: ProfilerConfig,
) -> (Coordinator, Arc<ScriptedClassifier>) {
    let classifier = Arc::new(classifier);
    let ctx = ProfilerContext::new(config, classifier.clone(), Arc::new(index)).unwrap();
    (Coordinator::new(ctx), classifier)
}

#[tokio::test(start_paused = true)]
async fn test_batches_and_items_run_concurrently() {
    let (coordinator, classifier) = coordinator(
        stalling(40, Duration::from_secs(10)),
        MemoryCandidateIndex::new(catalog()),
        ProfilerConfig::default(),
    );

    let start = Instant::now();
    let report = coordinator.run(items(40)).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report.batch_stats.total_batches, 4);
    assert_eq!(report.succeeded_item_count(), 40);
    assert_eq!(classifier.total_calls(), 40);
    // 40 sequential stalls would take 400s; 4 sequential batches 100s.
    assert!(elapsed >= Duration::from_secs(10), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(11), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_single_worker_still_overlaps_items_of_its_batch() {
    let config = ProfilerConfig {
        max_workers: 1,
        ..Default::default()
    };
    let (coordinator, _) = coordinator(
        stalling(25, Duration::from_secs(10)),
        MemoryCandidateIndex::new(catalog()),
        config,
    );

    let start = Instant::now();
    let report = coordinator.run(items(25)).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(report.batch_stats.total_batches, 1);
    assert_eq!(report.succeeded_item_count(), 25);
    assert!(elapsed < Duration::from_secs(11), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_retry_round_starts_after_previous_round_joins() {
    let transient = || Scripted::Fail(ClassifyError::Transient("503".into()));
    let classifier = ScriptedClassifier::matching_top_candidate(0.9)
        .script("i0", [transient(), Scripted::Stall(Duration::from_secs(5))])
        .script("i1", [transient(), Scripted::Stall(Duration::from_secs(5))])
        .script("i2", [Scripted::Stall(Duration::from_secs(10))])
        .script("i3", [Scripted::Stall(Duration::from_secs(10))])
        .script("i4", [Scripted::Stall(Duration::from_secs(10))]);
    let (coordinator, classifier) = coordinator(
        classifier,
        MemoryCandidateIndex::new(catalog()),
        ProfilerConfig::default(),
    );

    let start = Instant::now();
    let report = coordinator.run(items(5)).await.unwrap();
    let elapsed = start.elapsed();

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.retry_round, 1);
    assert_eq!(outcome.status, BatchStatus::Success);
    assert_eq!(outcome.succeeded_items.len(), 5);
    assert_eq!(classifier.calls("i0"), 2);
    assert_eq!(classifier.calls("i2"), 1);
    // Round 0 waits on the 10s stalls before the 5s retries begin.
    assert!(elapsed >= Duration::from_secs(15), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(16), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_catalog_loss_cancels_stalled_siblings() {
    let (coordinator, classifier) = coordinator(
        stalling(10, Duration::from_secs(30)),
        MemoryCandidateIndex::new(catalog()).fail_after(9),
        ProfilerConfig::default(),
    );

    let start = Instant::now();
    let err = coordinator.run(items(10)).await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(
        err,
        ProfilerError::CatalogUnavailable { batch_id: 0, .. }
    ));
    assert!(classifier.total_calls() <= 9);
    assert!(elapsed < Duration::from_secs(30), "{elapsed:?}");
}
