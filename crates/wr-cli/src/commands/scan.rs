//! Scan command: load both directories once and show the latest heat.

use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use wr_core::{Coordinator, IngestReport, Reconciliation};

use super::render::{format_heat, with_names};
use crate::Config;

#[derive(Debug, Serialize)]
struct ScanOutput {
    files: Vec<IngestReport>,
    latest: Option<Reconciliation>,
}

/// Counts and problem lines for the file reports.
pub fn format_reports(reports: &[IngestReport]) -> String {
    let mut start_lists = 0;
    let mut results = 0;
    let mut problems = Vec::new();
    for report in reports {
        let name = report.path().file_name().map_or_else(
            || report.path().display().to_string(),
            |n| n.to_string_lossy().into_owned(),
        );
        match report {
            IngestReport::StartList { warnings, .. } => {
                start_lists += 1;
                problems.extend(warnings.iter().map(|w| format!("{name}: {w}")));
            }
            IngestReport::Result { warnings, .. } => {
                results += 1;
                problems.extend(warnings.iter().map(|w| format!("{name}: {w}")));
            }
            IngestReport::Retrying { error, .. } | IngestReport::Failed { error, .. } => {
                problems.push(format!("{name}: {error}"));
            }
            IngestReport::Ignored { .. } => {}
        }
    }

    let mut output = format!("Loaded {start_lists} start lists and {results} results.\n");
    if !problems.is_empty() {
        output.push_str("Problems:\n");
        for problem in problems {
            output.push_str(&format!("- {problem}\n"));
        }
    }
    output
}

pub fn run<W: Write>(writer: &mut W, config: &Config, json: bool) -> Result<()> {
    let mut coordinator = Coordinator::new(
        &config.start_list_dir,
        &config.results_dir,
        config.retry_policy(),
    );
    let reports = coordinator.rescan(Instant::now());
    let latest = coordinator
        .store()
        .reconcile_latest(&config.reconcile_config())
        .map(|heat| with_names(heat, config.name_mode));

    if json {
        let output = ScanOutput {
            files: reports,
            latest,
        };
        let json = serde_json::to_string_pretty(&output).context("failed to serialize scan")?;
        writeln!(writer, "{json}")?;
        return Ok(());
    }

    write!(writer, "{}", format_reports(&reports))?;
    match latest {
        Some(heat) => {
            writeln!(writer)?;
            write!(writer, "{}", format_heat(&heat))?;
        }
        None => writeln!(writer, "No results yet.")?,
    }
    Ok(())
}
