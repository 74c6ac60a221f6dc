//! Runs a drift suite against a retriever and scores each case.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rag_core::{DriftConfig, SearchResult};
use rag_engine::RetrievalEngine;
use regex::Regex;
use tracing::{info, warn};

use crate::report::{CaseResult, CaseStatus, SuiteReport};
use crate::suite::{DriftSuite, TestCase};

/// Read-only search capability the harness depends on.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, top_k: usize, threshold: f32) -> rag_core::Result<Vec<SearchResult>>;
}

#[async_trait]
impl Retriever for RetrievalEngine {
    async fn search(&self, query: &str, top_k: usize, threshold: f32) -> rag_core::Result<Vec<SearchResult>> {
        RetrievalEngine::search(self, query, top_k, threshold).await
    }
}

pub struct DriftHarness {
    retriever: Arc<dyn Retriever>,
    config: DriftConfig,
}

impl DriftHarness {
    pub fn new(retriever: Arc<dyn Retriever>, config: DriftConfig) -> Self {
        Self { retriever, config }
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    /// Evaluate every case in declaration order. Retrieval errors become
    /// `ERROR` cases and the run continues.
    pub async fn run(&self, suite: &DriftSuite) -> SuiteReport {
        let started_at = Utc::now();
        let mut cases = Vec::with_capacity(suite.test_cases.len());
        for case in &suite.test_cases {
            let expected = suite.expected_for(case, self.config.default_expected_similarity);
            cases.push(self.evaluate(case, expected).await);
        }
        let report = SuiteReport::new(suite.name.clone(), started_at, cases);
        info!(
            suite = %report.suite,
            passed = report.passed,
            failed = report.failed,
            errored = report.errored,
            total = report.total,
            "drift suite finished"
        );
        report
    }

    async fn evaluate(&self, case: &TestCase, expected: f32) -> CaseResult {
        let mut result = CaseResult {
            name: case.name.clone(),
            input: case.input.clone(),
            status: CaseStatus::Passed,
            similarity: None,
            threshold: expected,
            top_result_id: None,
            reasons: Vec::new(),
        };

        // threshold 0.0: the case judges the top similarity itself
        let hits = match self.retriever.search(&case.input, self.config.top_k, 0.0).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(case = %case.name, error = %e, "drift case errored");
                result.status = CaseStatus::Error;
                result.reasons.push(e.to_string());
                return result;
            }
        };

        let Some(top) = hits.first() else {
            if case.is_no_results_case() {
                result.reasons.push("correctly handled empty result".into());
            } else {
                result.fail("no search results returned");
            }
            return result;
        };

        result.similarity = Some(top.similarity);
        result.top_result_id = Some(top.id.clone());
        if top.similarity < expected {
            result.fail(format!(
                "similarity {:.3} below expected {expected:.3} (gap {:.3})",
                top.similarity,
                expected - top.similarity
            ));
        }
        check_content(case, &hits, &mut result);
        result
    }
}

/// Keyword, phrase and format assertions over everything retrieved.
fn check_content(case: &TestCase, hits: &[SearchResult], result: &mut CaseResult) {
    let content = hits
        .iter()
        .map(|h| h.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase();

    for keyword in &case.required_keywords {
        if !contains_word(&content, &keyword.to_lowercase()) {
            result.fail(format!("missing required keyword: {keyword:?}"));
        }
    }
    for phrase in &case.forbidden_phrases {
        if content.contains(&phrase.to_lowercase()) {
            result.fail(format!("contains forbidden phrase: {phrase:?}"));
        }
    }
    let wants_markdown = case
        .expected_format
        .as_deref()
        .is_some_and(|f| f.eq_ignore_ascii_case("markdown"));
    if wants_markdown && !["#", "**", "-"].iter().any(|m| content.contains(m)) {
        result.fail("expected markdown-like content not found");
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    if word.is_empty() {
        return true;
    }
    Regex::new(&format!(r"\b{}\b", regex::escape(word))).is_ok_and(|rx| rx.is_match(haystack))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_core::{Metadata, RetrievalError};

    /// Answers every query with one fixed similarity, or fails for inputs
    /// starting with "fail".
    struct FixedRetriever(Option<f32>);

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn search(&self, query: &str, _top_k: usize, _threshold: f32) -> rag_core::Result<Vec<SearchResult>> {
            if query.starts_with("fail") {
                return Err(RetrievalError::StoreUnavailable("connection refused".into()));
            }
            Ok(self
                .0
                .map(|similarity| SearchResult {
                    id: "d1".into(),
                    content: "doc".into(),
                    metadata: Metadata::new(),
                    similarity,
                    distance: 1.0 - similarity,
                })
                .into_iter()
                .collect())
        }
    }

    fn harness(similarity: Option<f32>) -> DriftHarness {
        DriftHarness::new(Arc::new(FixedRetriever(similarity)), DriftConfig::default())
    }

    /// Returns two strong matches with the given contents.
    struct ContentRetriever(&'static [&'static str]);

    #[async_trait]
    impl Retriever for ContentRetriever {
        async fn search(&self, _query: &str, _top_k: usize, _threshold: f32) -> rag_core::Result<Vec<SearchResult>> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(i, content)| SearchResult {
                    id: format!("d{i}"),
                    content: content.to_string(),
                    metadata: Metadata::new(),
                    similarity: 0.9,
                    distance: 0.1,
                })
                .collect())
        }
    }

    fn content_harness(contents: &'static [&'static str]) -> DriftHarness {
        DriftHarness::new(Arc::new(ContentRetriever(contents)), DriftConfig::default())
    }

    const REFUND_DOCS: &[&str] = &["Refund policy: 30 day returns.", "Unused items ship back free."];

    #[tokio::test]
    async fn test_pass_and_gap() {
        let suite = DriftSuite::new(
            "s",
            vec![
                TestCase::new("easy", "q").with_expected_similarity(0.5),
                TestCase::new("hard", "q").with_expected_similarity(0.9),
            ],
        );
        let report = harness(Some(0.8)).run(&suite).await;
        assert_eq!(report.case("easy").unwrap().status, CaseStatus::Passed);
        assert_eq!(report.case("easy").unwrap().similarity, Some(0.8));
        assert_eq!(report.case("easy").unwrap().top_result_id.as_deref(), Some("d1"));
        let hard = report.case("hard").unwrap();
        assert_eq!(hard.status, CaseStatus::Failed);
        assert!(hard.reasons[0].contains("gap 0.100"));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_empty_results() {
        let suite = DriftSuite::new(
            "s",
            vec![
                TestCase::new("no_results_handling_edge_case", "zzzz-nonexistent-term-9999"),
                TestCase::new("explicit", "zzzz").expecting_no_results(),
                TestCase::new("regular", "zzzz"),
            ],
        );
        let report = harness(None).run(&suite).await;
        let edge = report.case("no_results_handling_edge_case").unwrap();
        assert_eq!(edge.status, CaseStatus::Passed);
        assert_eq!(edge.reasons, ["correctly handled empty result"]);
        assert_eq!(report.case("explicit").unwrap().status, CaseStatus::Passed);
        let regular = report.case("regular").unwrap();
        assert_eq!(regular.status, CaseStatus::Failed);
        assert_eq!(regular.reasons, ["no search results returned"]);
    }

    #[tokio::test]
    async fn test_errors_do_not_stop_the_suite() {
        let suite = DriftSuite::new(
            "s",
            vec![TestCase::new("first", "fail please"), TestCase::new("second", "fine")],
        );
        let report = harness(Some(0.95)).run(&suite).await;
        assert_eq!(report.cases[0].status, CaseStatus::Error);
        assert!(report.cases[0].reasons[0].contains("connection refused"));
        assert_eq!(report.cases[1].status, CaseStatus::Passed);
        assert_eq!((report.passed, report.errored, report.total), (1, 1, 2));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_required_keywords_match_whole_words() {
        let suite = DriftSuite::new(
            "s",
            vec![
                TestCase::new("present", "q").with_required_keywords(["REFUND", "30 day", "unused"]),
                TestCase::new("absent", "q").with_required_keywords(["refund", "warranty", "turn"]),
            ],
        );
        let report = content_harness(REFUND_DOCS).run(&suite).await;
        assert_eq!(report.case("present").unwrap().status, CaseStatus::Passed);
        let absent = report.case("absent").unwrap();
        assert_eq!(absent.status, CaseStatus::Failed);
        assert_eq!(
            absent.reasons,
            ["missing required keyword: \"warranty\"", "missing required keyword: \"turn\""]
        );
    }

    #[tokio::test]
    async fn test_forbidden_phrases() {
        let suite = DriftSuite::new(
            "s",
            vec![
                TestCase::new("clean", "q").with_forbidden_phrases(["no refunds"]),
                TestCase::new("dirty", "q").with_forbidden_phrases(["no refunds", "Unused Items"]),
            ],
        );
        let report = content_harness(REFUND_DOCS).run(&suite).await;
        assert_eq!(report.case("clean").unwrap().status, CaseStatus::Passed);
        let dirty = report.case("dirty").unwrap();
        assert_eq!(dirty.status, CaseStatus::Failed);
        assert_eq!(dirty.reasons, ["contains forbidden phrase: \"Unused Items\""]);
    }

    #[tokio::test]
    async fn test_markdown_format_check() {
        let suite = DriftSuite::new("s", vec![TestCase::new("md", "q").with_expected_format("Markdown")]);

        let plain = content_harness(&["plain sentence without markup"]).run(&suite).await;
        assert_eq!(plain.cases[0].status, CaseStatus::Failed);
        assert_eq!(plain.cases[0].reasons, ["expected markdown-like content not found"]);

        let heading = content_harness(&["## Refunds", "within thirty days"]).run(&suite).await;
        assert_eq!(heading.cases[0].status, CaseStatus::Passed);
    }

    #[tokio::test]
    async fn test_content_checks_skip_empty_results() {
        let suite = DriftSuite::new(
            "s",
            vec![TestCase::new("no_results_handling_case", "zzzz").with_required_keywords(["refund"])],
        );
        let report = harness(None).run(&suite).await;
        assert_eq!(report.cases[0].status, CaseStatus::Passed);
    }

    #[tokio::test]
    async fn test_suite_threshold_applies() {
        let mut suite = DriftSuite::new("s", vec![TestCase::new("a", "q")]);
        suite.drift_thresholds.similarity_threshold = Some(0.85);
        let report = harness(Some(0.8)).run(&suite).await;
        assert_eq!(report.cases[0].threshold, 0.85);
        assert_eq!(report.cases[0].status, CaseStatus::Failed);
    }
}
