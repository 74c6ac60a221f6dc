//! Recorded per-case similarities, used to flag regressions between runs.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::report::{write_atomic, CaseStatus, SuiteReport};

/// Case name → top similarity from an accepted run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Baseline {
    pub similarities: BTreeMap<String, f32>,
}

impl Baseline {
    /// A missing file is an empty baseline; an unreadable one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &serde_json::to_vec_pretty(self)?)
    }

    /// Every case that produced a similarity, whatever its status.
    pub fn from_report(report: &SuiteReport) -> Self {
        let similarities = report
            .cases
            .iter()
            .filter_map(|c| c.similarity.map(|s| (c.name.clone(), s)))
            .collect();
        Self { similarities }
    }

    pub fn is_empty(&self) -> bool {
        self.similarities.is_empty()
    }

    /// Fail cases whose similarity dropped by more than `alert_threshold`
    /// below the recorded value. A case with a baseline but no result has
    /// dropped to zero. Returns the number of cases flagged.
    pub fn compare(&self, report: &mut SuiteReport, alert_threshold: f32) -> usize {
        let mut flagged = 0;
        for case in &mut report.cases {
            if case.status == CaseStatus::Error {
                continue;
            }
            let Some(&previous) = self.similarities.get(&case.name) else {
                continue;
            };
            let current = case.similarity.unwrap_or(0.0);
            let delta = previous - current;
            if delta > alert_threshold {
                case.fail(format!(
                    "drift delta {delta:.3} exceeds alert threshold {alert_threshold:.3} (baseline {previous:.3} -> current {current:.3})"
                ));
                flagged += 1;
            }
        }
        if flagged > 0 {
            report.recount();
            tracing::warn!(suite = %report.suite, flagged, "similarity drift against baseline");
        }
        flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CaseResult;
    use chrono::Utc;

    fn report(sims: &[(&str, Option<f32>)]) -> SuiteReport {
        let cases = sims
            .iter()
            .map(|(name, sim)| CaseResult {
                name: name.to_string(),
                input: "q".into(),
                status: CaseStatus::Passed,
                similarity: *sim,
                threshold: 0.0,
                top_result_id: None,
                reasons: vec![],
            })
            .collect();
        SuiteReport::new("docs", Utc::now(), cases)
    }

    #[test]
    fn test_compare_flags_large_drops_only() {
        let baseline = Baseline {
            similarities: [("a".to_string(), 0.9), ("b".to_string(), 0.9), ("c".to_string(), 0.5)].into(),
        };
        let mut r = report(&[("a", Some(0.8)), ("b", Some(0.6)), ("c", None), ("new", Some(0.1))]);
        assert_eq!(baseline.compare(&mut r, 0.15), 2);
        assert_eq!(r.case("a").unwrap().status, CaseStatus::Passed);
        assert_eq!(r.case("b").unwrap().status, CaseStatus::Failed);
        assert!(r.case("b").unwrap().reasons[0].contains("baseline 0.900"));
        assert_eq!(r.case("c").unwrap().status, CaseStatus::Failed);
        assert_eq!(r.case("new").unwrap().status, CaseStatus::Passed);
        assert_eq!(r.failed, 2);
        assert!(!r.is_success());
    }

    #[test]
    fn test_save_load_and_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("baselines").join("drift_baseline.json");
        assert!(Baseline::load(&path).unwrap().is_empty());

        let baseline = Baseline::from_report(&report(&[("a", Some(0.75)), ("b", None)]));
        assert_eq!(baseline.similarities.len(), 1);
        baseline.save(&path).unwrap();
        assert_eq!(Baseline::load(&path).unwrap(), baseline);

        std::fs::write(&path, b"{not json").unwrap();
        assert!(Baseline::load(&path).is_err());
    }

    #[test]
    fn test_interrupted_save_keeps_previous_baseline() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("drift_baseline.json");
        let old = Baseline::from_report(&report(&[("a", Some(0.9))]));
        old.save(&path).unwrap();

        // a crash mid-save leaves only the temp file behind
        let tmp = dir.path().join("drift_baseline.tmp");
        std::fs::write(&tmp, b"{\"a\": 0.").unwrap();
        assert_eq!(Baseline::load(&path).unwrap(), old);

        let new = Baseline::from_report(&report(&[("a", Some(0.4))]));
        new.save(&path).unwrap();
        assert_eq!(Baseline::load(&path).unwrap(), new);
        assert!(!tmp.exists());
    }
}
