//! `rag-drift`: run drift suites against the configured collection.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use rag_core::RagConfig;
use rag_drift::suite::{component_of, discover};
use rag_drift::{write_atomic, write_junit, Baseline, DriftHarness, DriftSuite, SuiteReport};
use rag_engine::RetrievalEngine;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rag-drift")]
#[command(version, about = "Semantic retrieval drift detection", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Suite file (YAML or JSON); repeat for several suites. Without it,
    /// suites are discovered as tests/<Component>/rag_drift_test.yaml
    #[arg(short, long)]
    suite: Vec<PathBuf>,

    /// Project root searched when no --suite is given
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Only run the discovered suite of this component
    #[arg(long)]
    component: Option<String>,

    /// Directory for JSON reports and JUnit output
    #[arg(short, long, default_value = "tests/reports")]
    out_dir: PathBuf,

    /// Baseline file; defaults to baselines/drift_baseline.json next to the suite
    #[arg(short, long)]
    baseline: Option<PathBuf>,

    /// Record this run as the new baseline instead of comparing against it
    #[arg(long)]
    update_baseline: bool,

    /// Also write junit-drift.xml
    #[arg(long)]
    junit: bool,

    /// Largest tolerated similarity drop against the baseline
    #[arg(long, env = "DRIFT_ALERT_THRESHOLD")]
    alert_threshold: Option<f32>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
}

fn baseline_path(cli: &Cli, suite_path: &Path) -> PathBuf {
    cli.baseline.clone().unwrap_or_else(|| {
        suite_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("baselines")
            .join("drift_baseline.json")
    })
}

/// Explicit `--suite` paths, else every discovered suite that passes the
/// component filter.
fn suite_paths(cli: &Cli) -> anyhow::Result<Vec<PathBuf>> {
    if !cli.suite.is_empty() {
        return Ok(cli.suite.clone());
    }
    let mut found = discover(&cli.root)
        .with_context(|| format!("discovering suites under {}", cli.root.display()))?;
    if let Some(ref wanted) = cli.component {
        found.retain(|p| component_of(p).is_some_and(|c| c.eq_ignore_ascii_case(wanted)));
    }
    if found.is_empty() {
        bail!(
            "no drift suites found (looking for {}/tests/**/rag_drift_test.yaml)",
            cli.root.display()
        );
    }
    Ok(found)
}

async fn run(cli: &Cli) -> anyhow::Result<bool> {
    let suites = suite_paths(cli)?;
    if cli.baseline.is_some() && suites.len() > 1 {
        bail!("--baseline applies to a single suite; omit it to use per-suite baselines");
    }
    let config = RagConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let alert_threshold = cli.alert_threshold.unwrap_or(config.drift.alert_threshold);

    let engine = RetrievalEngine::from_config(config.engine.clone()).context("building retrieval engine")?;
    let harness = DriftHarness::new(Arc::new(engine), config.drift.clone());

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;

    let mut reports: Vec<SuiteReport> = Vec::with_capacity(suites.len());
    for path in &suites {
        let suite = DriftSuite::load(path).with_context(|| format!("loading suite {}", path.display()))?;
        let mut report = harness.run(&suite).await;

        let baseline_file = baseline_path(cli, path);
        if cli.update_baseline {
            Baseline::from_report(&report).save(&baseline_file)?;
            info!(path = %baseline_file.display(), "baseline updated");
        } else {
            let baseline = Baseline::load(&baseline_file)
                .with_context(|| format!("loading baseline {}", baseline_file.display()))?;
            baseline.compare(&mut report, alert_threshold);
        }

        report.write_json(&cli.out_dir.join(report.file_name()))?;
        println!(
            "Drift: {:<16} passed={} failed={} errored={} total={}",
            report.suite, report.passed, report.failed, report.errored, report.total
        );
        reports.push(report);
    }

    let index = serde_json::to_vec_pretty(&reports)?;
    write_atomic(&cli.out_dir.join("drift_index.json"), &index)?;
    if cli.junit {
        write_junit(&cli.out_dir.join("junit-drift.xml"), &reports)?;
    }
    Ok(reports.iter().all(SuiteReport::is_success))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
