//! Export-events command: write the event list for the Dolphin software.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use wr_core::export::DOLPHIN_EVENTS_FILE;
use wr_core::{dolphin_events_csv, scan_start_lists};

use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config, output: Option<&Path>) -> Result<()> {
    let program = scan_start_lists(&config.start_list_dir).with_context(|| {
        format!("failed to read start lists from {}", config.start_list_dir.display())
    })?;
    if program.is_empty() {
        tracing::warn!(dir = ?config.start_list_dir, "no start lists found");
    }

    let bytes = dolphin_events_csv(&program).context("event names don't fit the console code page")?;
    let path = output.map_or_else(|| PathBuf::from(DOLPHIN_EVENTS_FILE), Path::to_path_buf);
    fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;

    writeln!(writer, "Wrote {} events to {}", program.len(), path.display())?;
    Ok(())
}
