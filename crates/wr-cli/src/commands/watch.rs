//! Watch command: poll the directories and print heats as results arrive.
//!
//! Polling stands in for a file system watcher: every tick rescans both
//! directories and re-attempts files whose retry is due.

use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use wr_core::{Coordinator, HeatKey, IngestReport};

use super::render::{format_heat, with_names};
use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config, interval: Duration, iterations: Option<u32>) -> Result<()> {
    let mut coordinator = Coordinator::new(
        &config.start_list_dir,
        &config.results_dir,
        config.retry_policy(),
    );
    let reconcile_config = config.reconcile_config();

    // Files already present are loaded quietly; only the latest heat shows.
    coordinator.rescan(Instant::now());
    if let Some(heat) = coordinator.store().reconcile_latest(&reconcile_config) {
        write!(writer, "{}", format_heat(&with_names(heat, config.name_mode)))?;
        writer.flush()?;
    }

    let mut polls = 0;
    while iterations.is_none_or(|limit| polls < limit) {
        thread::sleep(interval);
        polls += 1;
        poll(writer, &mut coordinator, config, Instant::now())?;
    }
    Ok(())
}

/// Ingests whatever changed and prints every heat it touched.
///
/// A new start list touches every heat of its event that already has a
/// result, so late start lists still put names on the board.
fn poll<W: Write>(writer: &mut W, coordinator: &mut Coordinator, config: &Config, now: Instant) -> Result<()> {
    let store = coordinator.store();
    let mut reports = coordinator.rescan(now);
    reports.extend(coordinator.retry_due(now));

    // A heat is shown once per poll, after every file in the poll is in.
    let mut changed: Vec<HeatKey> = Vec::new();
    for report in reports {
        match report {
            IngestReport::Result { key, .. } => {
                if !changed.contains(&key) {
                    changed.push(key);
                }
            }
            IngestReport::StartList { event, .. } => {
                tracing::debug!(%event, "start list updated");
                for key in store.heats_of(&event) {
                    if !changed.contains(&key) {
                        changed.push(key);
                    }
                }
            }
            IngestReport::Failed { path, error, .. } => {
                writeln!(writer, "Skipped {}: {error}", path.display())?;
            }
            IngestReport::Retrying { .. } | IngestReport::Ignored { .. } => {}
        }
    }

    let reconcile_config = config.reconcile_config();
    for key in changed {
        let heat = with_names(store.reconcile(&key, &reconcile_config), config.name_mode);
        writeln!(writer)?;
        write!(writer, "{}", format_heat(&heat))?;
    }
    writer.flush()?;
    Ok(())
}
