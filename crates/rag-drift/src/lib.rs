//! Retrieval drift detection: test queries with expected similarity floors,
//! run against the engine, compared with recorded baselines, and reported as
//! JSON and JUnit XML.

pub mod baseline;
pub mod error;
pub mod harness;
pub mod report;
pub mod suite;

pub use baseline::Baseline;
pub use error::{DriftError, Result};
pub use harness::{DriftHarness, Retriever};
pub use report::{junit_xml, write_atomic, write_junit, CaseResult, CaseStatus, SuiteReport};
pub use suite::{DriftSuite, DriftThresholds, TestCase};
