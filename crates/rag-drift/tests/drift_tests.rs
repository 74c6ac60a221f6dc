//! Drift harness against a real engine over the in-memory store.

use std::sync::Arc;

use rag_core::{DbType, Document, DriftConfig, EngineConfig};
use rag_drift::{junit_xml, Baseline, CaseStatus, DriftHarness, DriftSuite, TestCase};
use rag_engine::{HashingEmbedder, RetrievalEngine};
use rag_vectordb::{MemoryVectorStore, VectorStore};

fn engine() -> RetrievalEngine {
    let config = EngineConfig {
        db_type: DbType::Memory,
        embedding_dimension: 128,
        collection_name: "CustomerDocs_documents".into(),
        ..EngineConfig::default()
    };
    RetrievalEngine::new(
        config,
        Arc::new(HashingEmbedder::new(128)),
        Arc::new(MemoryVectorStore::new()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_no_results_case_on_empty_collection_passes() {
    let harness = DriftHarness::new(Arc::new(engine()), DriftConfig::default());
    let suite = DriftSuite::new(
        "CustomerDocs",
        vec![TestCase::new("no_results_handling_edge_case", "zzzz-nonexistent-term-9999")],
    );
    let report = harness.run(&suite).await;
    assert!(report.is_success());
    assert_eq!(report.cases[0].status, CaseStatus::Passed);
    assert_eq!(report.cases[0].reasons, ["correctly handled empty result"]);
}

#[tokio::test]
async fn test_suite_against_seeded_collection() {
    let engine = engine();
    engine
        .add_documents(&[
            Document::new("d1", "refund policy: 30 day returns"),
            Document::new("d2", "shipping takes 5 business days"),
        ])
        .await
        .unwrap();
    let harness = DriftHarness::new(Arc::new(engine), DriftConfig::default());

    let suite = DriftSuite::from_yaml_str(
        r#"
test_cases:
  - name: exact_refund
    input: "refund policy: 30 day returns"
    expected_similarity: 0.95
  - name: unrelated
    input: quantum chromodynamics lattice
    expected_similarity: 0.9
"#,
    )
    .unwrap();
    let report = harness.run(&suite).await;
    let exact = report.case("exact_refund").unwrap();
    assert_eq!(exact.status, CaseStatus::Passed);
    assert_eq!(exact.top_result_id.as_deref(), Some("d1"));
    assert_eq!(report.case("unrelated").unwrap().status, CaseStatus::Failed);
    assert_eq!((report.passed, report.failed, report.total), (1, 1, 2));
}

#[tokio::test]
async fn test_harness_only_reads() {
    let store = Arc::new(MemoryVectorStore::new());
    let engine = RetrievalEngine::new(
        EngineConfig { db_type: DbType::Memory, embedding_dimension: 32, ..EngineConfig::default() },
        Arc::new(HashingEmbedder::new(32)),
        store.clone(),
    )
    .unwrap();
    engine.add_documents(&[Document::new("a", "alpha text")]).await.unwrap();
    let engine = Arc::new(engine);
    let before = engine.get_stats().await.unwrap();

    let harness = DriftHarness::new(engine.clone(), DriftConfig::default());
    let suite = DriftSuite::new("s", vec![TestCase::new("a", "alpha text"), TestCase::new("b", "beta")]);
    harness.run(&suite).await;

    assert_eq!(engine.get_stats().await.unwrap(), before);
    assert_eq!(store.backend_name(), "memory");
}

#[tokio::test]
async fn test_baseline_roundtrip_detects_regression() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("baselines").join("drift_baseline.json");

    let engine = engine();
    engine.add_documents(&[Document::new("d1", "refund policy: 30 day returns")]).await.unwrap();
    let harness = DriftHarness::new(Arc::new(engine), DriftConfig::default());
    let suite = DriftSuite::new(
        "CustomerDocs",
        vec![TestCase::new("refund", "refund policy: 30 day returns").with_expected_similarity(0.0)],
    );

    let first = harness.run(&suite).await;
    Baseline::from_report(&first).save(&path).unwrap();

    // a baseline far above anything achievable simulates a regression
    let mut inflated = Baseline::load(&path).unwrap();
    inflated.similarities.insert("refund".into(), 2.0);

    let mut second = harness.run(&suite).await;
    assert_eq!(Baseline::load(&path).unwrap().compare(&mut second.clone(), 0.15), 0);
    assert_eq!(inflated.compare(&mut second, 0.15), 1);
    assert!(!second.is_success());

    let xml = junit_xml(&[first, second]);
    assert!(xml.contains("<failure message=\"drift delta"));
}
