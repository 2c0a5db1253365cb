//! Contract tests for the in-memory port fakes.

use std::time::Duration;

use skill_catalog::fakes::{judgement_for, MemoryCandidateIndex, Scripted, ScriptedClassifier};
use skill_catalog::{
    CandidateIndex, CatalogEntry, ClassificationResult, ClassifyError, Classifier, SkillLevel,
    SourceLocation, WorkItem,
};

fn catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new("asyncio", SkillLevel::Advanced, "Async", "Event loop", 50)
            .with_description("gather tasks on the event loop")
            .with_partitions(["Backend"]),
        CatalogEntry::new("FastAPI", SkillLevel::Intermediate, "Web", "Routing", 30)
            .with_description("router decorators and dependency injection")
            .with_partitions(["Backend"]),
        CatalogEntry::new("pandas", SkillLevel::Basic, "Data", "DataFrames", 10)
            .with_description("dataframe groupby")
            .with_partitions(["AI/ML"]),
    ]
}

fn item(id: &str, payload: &str) -> WorkItem {
    WorkItem::new(id, payload, SourceLocation::new("app/main.py", 1, 10))
}

#[tokio::test]
async fn test_index_ranks_by_token_overlap() {
    let index = MemoryCandidateIndex::new(catalog());

    let found = index
        .lookup(&item("i1", "df.groupby('user') on a pandas dataframe"), 2)
        .await
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].skill_name, "pandas");
    assert_eq!(index.lookups(), 1);
}

#[tokio::test]
async fn test_index_lookup_is_deterministic() {
    let index = MemoryCandidateIndex::new(catalog());
    let sample = item("i1", "await asyncio.gather(*tasks)");

    let first = index.lookup(&sample, 3).await.unwrap();
    let second = index.lookup(&sample, 3).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].skill_name, "asyncio");
}

#[tokio::test]
async fn test_index_switched_off_reports_unavailable() {
    let index = MemoryCandidateIndex::new(catalog());
    index.set_available(false);

    let err = index.lookup(&item("i1", "anything"), 3).await.unwrap_err();
    assert!(err.to_string().contains("unavailable"));

    index.set_available(true);
    assert!(index.lookup(&item("i1", "anything"), 3).await.is_ok());
}

#[tokio::test]
async fn test_index_fail_after_limit() {
    let index = MemoryCandidateIndex::new(catalog()).fail_after(2);
    let sample = item("i1", "asyncio");

    assert!(index.lookup(&sample, 1).await.is_ok());
    assert!(index.lookup(&sample, 1).await.is_ok());
    assert!(index.lookup(&sample, 1).await.is_err());
    assert_eq!(index.lookups(), 3);
}

#[tokio::test]
async fn test_index_stats_match_catalog() {
    let index = MemoryCandidateIndex::new(catalog());
    let stats = index.stats();

    assert_eq!(stats.total_skills, 3);
    assert_eq!(stats.partition_total("Backend"), 2);
    assert_eq!(stats.category_total("Data"), 1);
}

#[tokio::test]
async fn test_classifier_follows_script_then_fallback() {
    let entries = catalog();
    let scripted = ClassificationResult::empty().with_match(judgement_for(&entries[1], 0.9));
    let classifier = ScriptedClassifier::matching_top_candidate(0.7).script(
        "i1",
        [
            Scripted::Fail(ClassifyError::Transient("rate limited".to_string())),
            Scripted::Respond(scripted.clone()),
        ],
    );
    let sample = item("i1", "@router.get('/')");

    let first = classifier.classify(&sample, &entries, 0.5).await;
    assert!(matches!(first, Err(ClassifyError::Transient(_))));

    let second = classifier.classify(&sample, &entries, 0.5).await.unwrap();
    assert_eq!(second, scripted);

    let third = classifier.classify(&sample, &entries, 0.5).await.unwrap();
    assert_eq!(third.matches.len(), 1);
    assert_eq!(third.matches[0].skill_name, "asyncio");
    assert!((third.matches[0].confidence - 0.7).abs() < f64::EPSILON);

    assert_eq!(classifier.calls("i1"), 3);
    assert_eq!(classifier.calls("other"), 0);
}

#[tokio::test]
async fn test_classifier_default_fallback_is_empty() {
    let classifier = ScriptedClassifier::new();
    let result = classifier
        .classify(&item("i1", "x = 1"), &catalog(), 0.5)
        .await
        .unwrap();

    assert_eq!(result, ClassificationResult::empty());
    assert_eq!(classifier.total_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_classifier_stall_sleeps_before_answering() {
    let classifier = ScriptedClassifier::new()
        .script("slow", [Scripted::Stall(Duration::from_secs(30))]);
    let sample = item("slow", "x");
    let entries = catalog();

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        classifier.classify(&sample, &entries, 0.5),
    )
    .await;

    assert!(outcome.is_err(), "stall should outlast a short timeout");
}
