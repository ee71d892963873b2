//! Text rendering of reconciled heats, shared by the commands that show one.

use std::fmt::Write;

use anyhow::{Context, Result};

use wr_core::{FinalTime, NameMode, ReconciledRow, Reconciliation, SuppressReason};

const NAME_WIDTH: usize = 24;
const TEAM_WIDTH: usize = 12;
const TIME_WIDTH: usize = 8;

/// Rewrites every swimmer name in the configured display style.
#[must_use]
pub fn with_names(mut heat: Reconciliation, mode: NameMode) -> Reconciliation {
    for row in &mut heat.rows {
        for name in &mut row.names {
            *name = mode.arrange(name);
        }
    }
    heat
}

fn time_cell(row: &ReconciledRow) -> String {
    match row.final_time {
        FinalTime::Time(time) => time.to_string(),
        FinalTime::Suppressed(
            SuppressReason::NoResult | SuppressReason::Empty | SuppressReason::NoTimes,
        ) => String::new(),
        FinalTime::Suppressed(SuppressReason::Disqualified) => "DQ".to_string(),
        FinalTime::Suppressed(_) => "--".to_string(),
    }
}

fn place_cell(row: &ReconciledRow) -> String {
    if row.is_dq {
        return "DQ".to_string();
    }
    row.place.map(|place| place.to_string()).unwrap_or_default()
}

/// Fits a cell into its column, cutting long values.
fn fit(text: &str, width: usize) -> String {
    let cut: String = text.chars().take(width - 1).collect();
    format!("{cut:<width$}")
}

/// Formats one heat as a scoreboard-style table.
pub fn format_heat(heat: &Reconciliation) -> String {
    let mut output = String::new();

    let event = if heat.event.is_blank() {
        "?"
    } else {
        heat.event.as_str()
    };
    let heats = heat
        .heat_count
        .map(|count| format!(" of {count}"))
        .unwrap_or_default();
    match &heat.event_name {
        Some(name) => writeln!(output, "EVENT {event} HEAT {}{heats}: {name}", heat.heat).unwrap(),
        None => writeln!(output, "EVENT {event} HEAT {}{heats}", heat.heat).unwrap(),
    }
    writeln!(output, "────────────────────────────────────────────────────────").unwrap();

    for row in &heat.rows {
        let line = format!(
            "{:>4}  {}{}{:>TIME_WIDTH$}  {}",
            row.lane,
            fit(&row.names.join(" / "), NAME_WIDTH),
            fit(row.team.as_deref().unwrap_or_default(), TEAM_WIDTH),
            time_cell(row),
            place_cell(row),
        );
        writeln!(output, "{}", line.trim_end()).unwrap();
    }

    if !heat.warnings.is_empty() {
        writeln!(output).unwrap();
        writeln!(output, "Warnings:").unwrap();
        for warning in &heat.warnings {
            writeln!(output, "- {warning}").unwrap();
        }
    }

    output
}

pub fn format_heat_json(heat: &Reconciliation) -> Result<String> {
    serde_json::to_string_pretty(heat).context("failed to serialize heat")
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use wr_core::{
        DqMode, Event, EventNumber, HeatKey, RaceResult, RaceTime, ReconcileConfig, ResultFormat,
        Round, StartList, StartListEntry, reconcile,
    };

    use super::*;

    fn t(hundredths: i64) -> Option<RaceTime> {
        Some(RaceTime::from_hundredths(hundredths))
    }

    fn sample(dq_mode: DqMode) -> Reconciliation {
        let event = EventNumber::new("12").unwrap();
        let entry = |lane: u8, name: &str, team: &str| StartListEntry {
            event: event.clone(),
            heat: 2,
            lane,
            names: vec![name.to_string()],
            team: Some(team.to_string()),
        };
        let list = StartList {
            event: Event::new(event.clone(), "GIRLS 100 FREE", Round::All, 3, 1).unwrap(),
            entries: vec![
                entry(1, "Doe, Jane", "WAHOO"),
                entry(2, "Smith, Amy A", "SHARKS"),
                entry(3, "Brown, Kim", "WAHOO"),
                entry(4, "Lee, Sue", "DOLPHINS"),
            ],
        };
        let mut result = RaceResult::new(event.clone(), 2, ResultFormat::Generic);
        result.lanes[0].times = vec![t(6234), t(6235), t(6236)];
        result.lanes[1].times = vec![t(6110), t(6112)];
        result.lanes[1].is_dq = true;
        result.lanes[2].times = vec![t(6300), None, None];
        result.lanes[3].times = vec![t(6000), t(6100)];
        let config = ReconcileConfig {
            lane_count: 6,
            dq_mode,
            ..ReconcileConfig::default()
        };
        reconcile(&HeatKey::new(event, 2), Some(&list), Some(&result), &config)
    }

    #[test]
    fn heat_table_shows_times_places_and_warnings() {
        let output = format_heat(&with_names(sample(DqMode::ShowWithTime), NameMode::FirstLast));
        assert_snapshot!(output, @r"
        EVENT 12 HEAT 2 of 3: GIRLS 100 FREE
        ────────────────────────────────────────────────────────
           1  Jane Doe                WAHOO        1:02.35  1
           2  Amy Smith               SHARKS       1:01.11  DQ
           3  Kim Brown               WAHOO             --
           4  Sue Lee                 DOLPHINS          --
           5
           6

        Warnings:
        - lane 3: time withheld, 1 of 2 required times recorded
        - lane 4: time withheld, watches differ from the mean by 00.50
        ");
    }

    #[test]
    fn hidden_dq_times_read_dq() {
        let output = format_heat(&sample(DqMode::HideTime));
        let lane2 = output.lines().nth(3).unwrap();
        assert_eq!(lane2, "   2  Smith, Amy A            SHARKS            DQ  DQ");
    }

    #[test]
    fn json_keeps_machine_readable_fields() {
        let json = format_heat_json(&sample(DqMode::Ignore)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "12");
        assert_eq!(value["rows"][0]["final_time"]["time"], "1:02.35");
        assert_eq!(value["rows"][1]["place"], 1);
        assert_eq!(value["warnings"][0]["kind"], "suppressed_time");
    }
}
