//! Suite reports: per-case outcomes, JSON output and JUnit XML for CI.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use rag_vectordb::store::FileStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaseStatus {
    Passed,
    Failed,
    Error,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub input: String,
    pub status: CaseStatus,
    /// Similarity of the top result, when there was one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    /// The floor the case was held to.
    pub threshold: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_result_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

impl CaseResult {
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.status == CaseStatus::Passed {
            self.status = CaseStatus::Failed;
        }
        self.reasons.push(reason.into());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub suite: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub total: usize,
    pub cases: Vec<CaseResult>,
}

impl SuiteReport {
    pub fn new(suite: impl Into<String>, started_at: DateTime<Utc>, cases: Vec<CaseResult>) -> Self {
        let mut report = Self {
            suite: suite.into(),
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            passed: 0,
            failed: 0,
            errored: 0,
            total: 0,
            cases,
        };
        report.recount();
        report
    }

    /// Recompute the tallies after case statuses change.
    pub fn recount(&mut self) {
        let count = |s: CaseStatus| self.cases.iter().filter(|c| c.status == s).count();
        self.passed = count(CaseStatus::Passed);
        self.failed = count(CaseStatus::Failed);
        self.errored = count(CaseStatus::Error);
        self.total = self.cases.len();
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }

    pub fn case(&self, name: &str) -> Option<&CaseResult> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.to_json_pretty()?.as_bytes())
    }

    /// `drift_<suite>.json` with the suite name reduced to a safe file name.
    pub fn file_name(&self) -> String {
        format!("drift_{}.json", sanitize_file_name(&self.suite))
    }
}

/// One `<testsuite>` per report; FAILED cases carry `<failure>`, ERROR cases
/// carry `<error>`.
pub fn junit_xml(reports: &[SuiteReport]) -> String {
    let tests: usize = reports.iter().map(|r| r.total).sum();
    let failures: usize = reports.iter().map(|r| r.failed).sum();
    let errors: usize = reports.iter().map(|r| r.errored).sum();

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(out, "<testsuites name=\"drift\" tests=\"{tests}\" failures=\"{failures}\" errors=\"{errors}\">");
    for report in reports {
        let _ = writeln!(
            out,
            "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" timestamp=\"{}\">",
            xml_escape(&report.suite),
            report.total,
            report.failed,
            report.errored,
            report.started_at.to_rfc3339()
        );
        for case in &report.cases {
            let open = format!(
                "    <testcase classname=\"{}\" name=\"{}\"",
                xml_escape(&report.suite),
                xml_escape(&case.name)
            );
            let message = xml_escape(&case.reasons.join("; "));
            match case.status {
                CaseStatus::Passed => {
                    let _ = writeln!(out, "{open}/>");
                }
                CaseStatus::Failed => {
                    let _ = writeln!(out, "{open}>\n      <failure message=\"{message}\"/>\n    </testcase>");
                }
                CaseStatus::Error => {
                    let _ = writeln!(out, "{open}>\n      <error message=\"{message}\"/>\n    </testcase>");
                }
            }
        }
        out.push_str("  </testsuite>\n");
    }
    out.push_str("</testsuites>\n");
    out
}

pub fn write_junit(path: &Path, reports: &[SuiteReport]) -> Result<()> {
    write_atomic(path, junit_xml(reports).as_bytes())
}

/// Replace `path` with `bytes` so readers never see a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("not a file path: {}", path.display())))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    FileStore::new(dir).put(name, bytes)?;
    Ok(())
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn sanitize_file_name(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "unknown".into()
    } else {
        cleaned
    }
}
