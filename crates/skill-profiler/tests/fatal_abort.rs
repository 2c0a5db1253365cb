//! Run-level failures: catalog loss, bad configuration and bad input.

use std::sync::Arc;

use skill_catalog::fakes::{MemoryCandidateIndex, Scripted, ScriptedClassifier};
use skill_catalog::{CatalogEntry, ClassifyError, SkillLevel, SourceLocation, WorkItem};
use skill_profiler::{
    ConfigError, Coordinator, MemoryResultSink, ProfilerConfig, ProfilerContext, ProfilerError,
};

fn catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new("asyncio", SkillLevel::Advanced, "Async", "Concurrency", 80)
            .with_description("gather coroutine event loop"),
        CatalogEntry::new("pytest", SkillLevel::Basic, "Testing", "Unit", 10)
            .with_description("fixture assert"),
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

struct Harness {
    classifier: Arc<ScriptedClassifier>,
    index: Arc<MemoryCandidateIndex>,
    sink: Arc<MemoryResultSink>,
}

impl Harness {
    fn new(classifier: ScriptedClassifier, index: MemoryCandidateIndex) -> Self {
        Self {
            classifier: Arc::new(classifier),
            index: Arc::new(index),
            sink: Arc::new(MemoryResultSink::new()),
        }
    }

    fn context(&self) -> ProfilerContext {
        ProfilerContext::new(
            ProfilerConfig::default(),
            self.classifier.clone(),
            self.index.clone(),
        )
        .unwrap()
        .with_sink(self.sink.clone())
    }
}

#[tokio::test]
async fn test_catalog_loss_in_first_round_aborts_without_persisting() {
    let harness = Harness::new(
        ScriptedClassifier::matching_top_candidate(0.9),
        MemoryCandidateIndex::new(catalog()).fail_after(15),
    );

    let err = Coordinator::new(harness.context())
        .run(items(20))
        .await
        .unwrap_err();

    match err {
        ProfilerError::CatalogUnavailable { reason, .. } => {
            assert!(reason.contains("failed after 15 lookups"));
        }
        other => panic!("expected CatalogUnavailable, got {other:?}"),
    }
    assert!(harness.sink.persisted().is_empty());
}

#[tokio::test]
async fn test_catalog_loss_during_retry_keeps_only_completed_rounds() {
    let transient = || Scripted::Fail(ClassifyError::Transient("503".into()));
    let harness = Harness::new(
        ScriptedClassifier::matching_top_candidate(0.9)
            .script("i1", [transient()])
            .script("i2", [transient()])
            .script("i3", [transient()]),
        MemoryCandidateIndex::new(catalog()).fail_after(10),
    );

    let err = Coordinator::new(harness.context())
        .run(items(10))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProfilerError::CatalogUnavailable { batch_id: 0, .. }
    ));
    // Round 0 joined and was persisted before the retry round started.
    assert_eq!(harness.sink.persisted(), vec![(0, 0)]);
}

#[tokio::test]
async fn test_switched_off_index_fails_before_any_classification() {
    let index = MemoryCandidateIndex::new(catalog());
    index.set_available(false);
    let harness = Harness::new(ScriptedClassifier::matching_top_candidate(0.9), index);

    let result = Coordinator::new(harness.context())
        .profile(items(12), &harness.index.stats())
        .await;

    let err = result.unwrap_err();
    assert!(err.to_string().contains("index switched off"));
    assert_eq!(harness.classifier.total_calls(), 0);
    assert!(harness.sink.persisted().is_empty());
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected_before_dispatch() {
    let harness = Harness::new(
        ScriptedClassifier::matching_top_candidate(0.9),
        MemoryCandidateIndex::new(catalog()),
    );
    let mut ctx = harness.context();
    ctx.config.target_batch_size = 0;

    let err = Coordinator::new(ctx).run(items(5)).await.unwrap_err();

    assert!(matches!(err, ProfilerError::Configuration(_)));
    assert_eq!(harness.index.lookups(), 0);
    assert_eq!(harness.classifier.total_calls(), 0);
}

#[tokio::test]
async fn test_duplicate_item_ids_are_rejected_before_dispatch() {
    let harness = Harness::new(
        ScriptedClassifier::matching_top_candidate(0.9),
        MemoryCandidateIndex::new(catalog()),
    );
    let mut batch = items(12);
    batch.push(WorkItem::new(
        "i3",
        "def test_gather(fixture): assert fixture",
        SourceLocation::new("tests/test_pool.py", 1, 4),
    ));

    let err = Coordinator::new(harness.context())
        .run(batch)
        .await
        .unwrap_err();

    match err {
        ProfilerError::DuplicateItemId { item_id } => assert_eq!(item_id, "i3"),
        other => panic!("expected DuplicateItemId, got {other:?}"),
    }
    assert_eq!(harness.index.lookups(), 0);
    assert_eq!(harness.classifier.total_calls(), 0);
    assert!(harness.sink.persisted().is_empty());
}

#[test]
fn test_context_refuses_invalid_configuration() {
    let config = ProfilerConfig {
        max_workers: 0,
        ..Default::default()
    };

    let err = ProfilerContext::new(
        config,
        Arc::new(ScriptedClassifier::new()),
        Arc::new(MemoryCandidateIndex::new(catalog())),
    )
    .unwrap_err();

    assert_eq!(
        err,
        ConfigError::NonPositive {
            field: "max_workers"
        }
    );
}
