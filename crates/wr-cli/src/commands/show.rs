//! Show command: print one reconciled heat.

use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result, bail};

use wr_core::{Coordinator, EventNumber, HeatKey};

use super::render::{format_heat, format_heat_json, with_names};
use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config, event: &str, heat: u32, json: bool) -> Result<()> {
    let event = EventNumber::new(event).with_context(|| format!("invalid event {event:?}"))?;
    let key = HeatKey::new(event, heat);

    let mut coordinator = Coordinator::new(
        &config.start_list_dir,
        &config.results_dir,
        config.retry_policy(),
    );
    coordinator.rescan(Instant::now());
    let store = coordinator.store();
    if store.start_list(&key.event).is_none() && store.result(&key).is_none() {
        bail!("no start list or result for {key}");
    }

    let reconciled = with_names(store.reconcile(&key, &config.reconcile_config()), config.name_mode);
    if json {
        writeln!(writer, "{}", format_heat_json(&reconciled)?)?;
    } else {
        write!(writer, "{}", format_heat(&reconciled))?;
    }
    Ok(())
}
