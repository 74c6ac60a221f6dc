//! Drift test suites: named test queries with expected similarity floors,
//! loaded from YAML or JSON.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};

/// Case names containing this marker expect an empty result set.
const NO_RESULTS_MARKER: &str = "no_results_handling";

/// File name [`discover`] looks for under `<root>/tests`.
pub const SUITE_FILE_NAME: &str = "rag_drift_test.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub input: String,
    /// Falls back to the suite threshold, then to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_similarity: Option<f32>,
    #[serde(default)]
    pub expect_no_results: bool,
    /// Whole words that must appear in the retrieved content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_keywords: Vec<String>,
    /// Phrases that must not appear in the retrieved content.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbidden_phrases: Vec<String>,
    /// Only `markdown` is checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_format: Option<String>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            expected_similarity: None,
            expect_no_results: false,
            required_keywords: Vec::new(),
            forbidden_phrases: Vec::new(),
            expected_format: None,
        }
    }

    pub fn with_expected_similarity(mut self, expected: f32) -> Self {
        self.expected_similarity = Some(expected);
        self
    }

    pub fn expecting_no_results(mut self) -> Self {
        self.expect_no_results = true;
        self
    }

    pub fn with_required_keywords<S: Into<String>>(mut self, keywords: impl IntoIterator<Item = S>) -> Self {
        self.required_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_forbidden_phrases<S: Into<String>>(mut self, phrases: impl IntoIterator<Item = S>) -> Self {
        self.forbidden_phrases = phrases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expected_format(mut self, format: impl Into<String>) -> Self {
        self.expected_format = Some(format.into());
        self
    }

    /// Explicit flag, or the naming convention.
    pub fn is_no_results_case(&self) -> bool {
        self.expect_no_results || self.name.contains(NO_RESULTS_MARKER)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
}

/// An ordered list of test cases. Declaration order is evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftSuite {
    #[serde(default)]
    pub name: String,
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub drift_thresholds: DriftThresholds,
}

impl DriftSuite {
    pub fn new(name: impl Into<String>, test_cases: Vec<TestCase>) -> Self {
        Self {
            name: name.into(),
            test_cases,
            drift_thresholds: DriftThresholds::default(),
        }
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let suite: Self = serde_yaml::from_str(s).map_err(|e| DriftError::Parse {
            source_name: "yaml".into(),
            message: e.to_string(),
        })?;
        suite.validate()?;
        Ok(suite)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let suite: Self = serde_json::from_str(s).map_err(|e| DriftError::Parse {
            source_name: "json".into(),
            message: e.to_string(),
        })?;
        suite.validate()?;
        Ok(suite)
    }

    /// Load by extension: `.json` is JSON, anything else YAML. An unnamed
    /// suite takes its name from the parent directory, then the file stem.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        };
        let mut suite = parsed.map_err(|e| match e {
            DriftError::Parse { message, .. } => DriftError::Parse {
                source_name: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        if suite.name.is_empty() {
            suite.name = suite_name_from_path(path);
        }
        tracing::debug!(suite = %suite.name, cases = suite.test_cases.len(), path = %path.display(), "loaded drift suite");
        Ok(suite)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.test_cases.len());
        for case in &self.test_cases {
            if case.name.trim().is_empty() {
                return Err(DriftError::InvalidSuite("test case with empty name".into()));
            }
            if !seen.insert(case.name.as_str()) {
                return Err(DriftError::InvalidSuite(format!("duplicate test case name {:?}", case.name)));
            }
            if let Some(expected) = case.expected_similarity {
                if !(0.0..=1.0).contains(&expected) {
                    return Err(DriftError::InvalidSuite(format!(
                        "{}: expected_similarity {expected} outside [0, 1]",
                        case.name
                    )));
                }
            }
        }
        if let Some(t) = self.drift_thresholds.similarity_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(DriftError::InvalidSuite(format!("similarity_threshold {t} outside [0, 1]")));
            }
        }
        Ok(())
    }

    /// The floor a case is held to.
    pub fn expected_for(&self, case: &TestCase, default: f32) -> f32 {
        case.expected_similarity
            .or(self.drift_thresholds.similarity_threshold)
            .unwrap_or(default)
    }
}

/// Every `tests/**/rag_drift_test.yaml` under `root` (file name matched
/// case-insensitively), sorted by path. No `tests` directory means no suites.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    let tests = root.join("tests");
    let base = tests
        .to_str()
        .ok_or_else(|| DriftError::InvalidSuite(format!("suite directory is not UTF-8: {}", tests.display())))?;
    let pattern = format!("{}/**/*", glob::Pattern::escape(base));
    let entries = glob::glob(&pattern)
        .map_err(|e| DriftError::InvalidSuite(format!("suite pattern {pattern}: {e}")))?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry.map_err(glob::GlobError::into_error)?;
        let is_suite = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.eq_ignore_ascii_case(SUITE_FILE_NAME));
        if is_suite && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    tracing::debug!(root = %root.display(), suites = found.len(), "discovered drift suites");
    Ok(found)
}

/// Component a discovered suite belongs to: its parent directory name.
pub fn component_of(path: &Path) -> Option<&str> {
    path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str())
}

fn suite_name_from_path(path: &Path) -> String {
    // tests/<Component>/rag_drift_test.yaml
    path.parent()
        .and_then(|p| p.file_name())
        .or_else(|| path.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "drift".into())
}
