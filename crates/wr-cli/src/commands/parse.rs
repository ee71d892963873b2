//! Parse command: read one file and print what the parser made of it.
//!
//! A diagnostic for checking a timing console's export before a meet.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use wr_core::parse::is_start_list;
use wr_core::{RaceResult, RaceTime, RecordWarning, StartList, read_result, read_start_list};

#[derive(Debug, Serialize)]
struct ParseOutput<'a, T> {
    value: &'a T,
    warnings: &'a [RecordWarning],
}

fn watches(times: &[Option<RaceTime>]) -> String {
    times
        .iter()
        .map(|time| time.map_or_else(|| "-".to_string(), |t| t.to_string()))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_result(result: &RaceResult) -> String {
    let mut output = String::new();
    let event = if result.event.is_blank() {
        "?"
    } else {
        result.event.as_str()
    };
    writeln!(output, "Format: {}", result.format).unwrap();
    writeln!(output, "Event {event}, heat {}, round {}", result.heat, result.round).unwrap();
    if let Some(meet) = &result.meet_id {
        writeln!(output, "Meet: {meet}").unwrap();
    }
    if let Some(race) = result.race {
        writeln!(output, "Race: {race}").unwrap();
    }
    if let Some(recorded_at) = result.recorded_at {
        writeln!(output, "Recorded: {}", recorded_at.format("%Y-%m-%d %H:%M")).unwrap();
    }
    for lane in &result.lanes {
        let mut line = format!("Lane {:>2}:", lane.lane);
        if !lane.times.is_empty() {
            write!(line, " {}", watches(&lane.times)).unwrap();
        }
        if lane.is_dq {
            line.push_str(" DQ");
        }
        if lane.is_empty {
            line.push_str(" EMPTY");
        }
        writeln!(output, "{line}").unwrap();
        for (index, split) in lane.splits.iter().enumerate() {
            writeln!(output, "  split {}: {}", index + 1, watches(split)).unwrap();
        }
    }
    output
}

pub fn format_start_list(list: &StartList) -> String {
    let mut output = String::new();
    writeln!(
        output,
        "Event {}: {} ({} heats)",
        list.event.number,
        list.event.name,
        list.heat_count()
    )
    .unwrap();
    for entry in &list.entries {
        let team = entry.team.as_deref().unwrap_or_default();
        writeln!(
            output,
            "Heat {} lane {:>2}: {} {team}",
            entry.heat,
            entry.lane,
            entry.names.join(" / ")
        )
        .unwrap();
    }
    output
}

fn format_warnings(warnings: &[RecordWarning]) -> String {
    let mut output = String::new();
    if !warnings.is_empty() {
        writeln!(output, "Warnings:").unwrap();
        for warning in warnings {
            writeln!(output, "- {warning}").unwrap();
        }
    }
    output
}

/// Text or JSON for one parsed file.
fn render<T: Serialize>(
    value: &T,
    warnings: &[RecordWarning],
    json: bool,
    format: impl FnOnce(&T) -> String,
) -> Result<String> {
    if json {
        let output = ParseOutput { value, warnings };
        let json = serde_json::to_string_pretty(&output).context("failed to serialize parse output")?;
        return Ok(json + "\n");
    }
    Ok(format(value) + &format_warnings(warnings))
}

pub fn run<W: Write>(writer: &mut W, file: &Path, json: bool) -> Result<()> {
    let context = || format!("failed to parse {}", file.display());
    let output = if is_start_list(file) {
        let parsed = read_start_list(file).with_context(context)?;
        render(&parsed.value, &parsed.warnings, json, format_start_list)?
    } else {
        let parsed = read_result(file).with_context(context)?;
        render(&parsed.value, &parsed.warnings, json, format_result)?
    };
    write!(writer, "{output}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn parse_prints_lanes_and_splits() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("race.xml");
        fs::write(
            &path,
            r#"<DolphinResult meet="008" race="4">
  <Event number="12" heat="3" round="Final"/>
  <Lane number="1"><Split><Watch>30.01</Watch><Watch>30.03</Watch></Split><Watch>1:02.34</Watch><Watch>1:02.36</Watch></Lane>
  <Lane number="2" dq="true"><Watch>1:05.00</Watch><Watch/></Lane>
  <Lane number="3" empty="true"/>
</DolphinResult>"#,
        )
        .unwrap();

        let mut output = Vec::new();
        run(&mut output, &path, false).unwrap();
        let output = String::from_utf8(output).unwrap();
        let output: Vec<&str> = output.lines().filter(|line| !line.starts_with("Recorded:")).collect();
        assert_snapshot!(output.join("\n"), @r"
        Format: dolphin_xml
        Event 12, heat 3, round Final
        Meet: 008
        Race: 4
        Lane  1: 1:02.34 1:02.36
          split 1: 30.01 30.03
        Lane  2: 1:05.00 - DQ
        Lane  3: EMPTY
        Lane  4:
        Lane  5:
        Lane  6:
        Lane  7:
        Lane  8:
        Lane  9:
        Lane 10:
        ");
    }

    #[test]
    fn parse_start_list_as_json() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("E005.scb");
        fs::write(&path, format!("#5 MIXED 200 RELAY\n{:<20}--WAHOO-A\n", "WAHOO")).unwrap();

        let mut output = Vec::new();
        run(&mut output, &path, true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["value"]["event"]["number"], "5");
        assert_eq!(value["value"]["entries"][0]["team"], "WAHOO-A");
        assert_eq!(value["warnings"][0]["line"], 0);
    }

    #[test]
    fn parse_reports_broken_files() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("008-001-001A-0001.do4");
        fs::write(&path, "not a dolphin file").unwrap();
        let err = run(&mut Vec::new(), &path, false).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
