//! Dolphin CSV export.
//!
//! Meet, event, heat, race and recording time live in the file name
//! (`008_Event_12_Heat_3_Race_4_7_12_2025_9_41.csv`); the body is a header
//! followed by `lane,t1..tn,final,empty,dq` rows.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use super::{content_lines, parse_watches, skipped};
use crate::error::{ParseError, Parsed, RecordWarning};
use crate::model::{EventNumber, MAX_LANES, NumberingMode, RaceResult};
use crate::parse::ResultFormat;

static FILE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+)_Event_(\w*)_Heat_(\d+)_Race_(\d+)_(\d+)_(\d+)_(\d+)_(\d+)_(\d+)\.csv$")
        .unwrap()
});

/// Lane, at least one watch, final, empty, dq.
const MIN_FIELDS: usize = 5;

struct FileNameInfo {
    meet_id: String,
    event: String,
    heat: u32,
    race: u32,
    recorded_at: Option<NaiveDateTime>,
}

fn parse_file_name(file: &str) -> Option<FileNameInfo> {
    let caps = FILE_NAME_RE.captures(file)?;
    let num = |i: usize| caps[i].parse::<u32>().ok();
    let recorded_at = NaiveDate::from_ymd_opt(i32::try_from(num(7)?).ok()?, num(5)?, num(6)?)
        .and_then(|date| date.and_hms_opt(num(8)?, num(9)?, 0));
    Some(FileNameInfo {
        meet_id: caps[1].to_string(),
        event: caps[2].to_string(),
        heat: num(3)?,
        race: num(4)?,
        recorded_at,
    })
}

fn is_true(field: &str) -> bool {
    field.trim().to_ascii_lowercase().starts_with("true")
}

pub(super) fn parse(file: &str, text: &str) -> Result<Parsed<RaceResult>, ParseError> {
    let mut warnings = Vec::new();

    let info = parse_file_name(file);
    let (event, heat) = match &info {
        Some(info) if info.heat >= 1 => {
            let event = EventNumber::new(info.event.as_str())
                .map_err(|e| ParseError::malformed(file, e.to_string()))?;
            if event.is_blank() {
                warnings.push(RecordWarning::new(0, "event number is blank"));
            }
            (event, info.heat)
        }
        _ => {
            warnings.push(RecordWarning::new(
                0,
                "file name does not identify the event and heat; assuming heat 1 of an unknown event",
            ));
            (EventNumber::blank(), 1)
        }
    };

    let lines = content_lines(text);
    let rows: Vec<(usize, &str)> = lines
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| (index + 1, *line))
        .collect();
    if lines.is_empty() {
        return Err(ParseError::malformed(file, "empty file"));
    }
    if rows.len() != usize::from(MAX_LANES) {
        return Err(ParseError::malformed(
            file,
            format!("expected {MAX_LANES} lane rows, found {}", rows.len()),
        ));
    }

    // The first row is the lowest lane, so it decides 0-9 vs 1-10.
    let numbering = if rows[0].1.trim_start().starts_with('0') {
        NumberingMode::ZeroBased
    } else {
        NumberingMode::OneBased
    };

    let mut result = RaceResult::new(event, heat, ResultFormat::DolphinCsv);
    result.numbering = numbering;
    if let Some(info) = info {
        result.meet_id = Some(info.meet_id);
        result.race = Some(info.race);
        result.recorded_at = info.recorded_at;
    }

    for (line, row) in rows {
        let fields: Vec<&str> = row.split(',').collect();
        if fields.len() < MIN_FIELDS {
            warnings.push(RecordWarning::new(
                line,
                format!("expected at least {MIN_FIELDS} fields, found {}", fields.len()),
            ));
            continue;
        }
        let Some(lane_no) = fields[0]
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|lane| numbering.to_canonical(lane))
        else {
            warnings.push(RecordWarning::new(line, format!("invalid lane {:?}", fields[0])));
            continue;
        };
        let (watches, flags) = fields[1..].split_at(fields.len() - 4);
        let times = match parse_watches(watches.iter().copied()) {
            Ok(times) => times,
            Err(err) => {
                warnings.push(skipped(line, &err));
                continue;
            }
        };
        // flags[0] is the console's own final time, recomputed downstream.
        if let Some(lane) = result.lane_mut(lane_no) {
            lane.times = times;
            lane.is_empty = is_true(flags[1]);
            lane.is_dq = is_true(flags[2]);
        }
    }

    Ok(Parsed::new(result, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::RaceTime;

    const NAME: &str = "008_Event_12_Heat_3_Race_4_7_12_2025_9_41.csv";

    fn body(first_lane: u32, overrides: &[(usize, &str)]) -> String {
        let mut rows: Vec<String> = (first_lane..first_lane + 10)
            .map(|lane| format!("{lane},,,,,False,False"))
            .collect();
        for &(index, row) in overrides {
            rows[index] = row.to_string();
        }
        format!("Lane,Timer A,Timer B,Timer C,Final,Empty,DQ\n{}\n\n", rows.join("\n"))
    }

    fn t(s: &str) -> Option<RaceTime> {
        Some(s.parse().unwrap())
    }

    #[test]
    fn reads_metadata_from_file_name() {
        let text = body(1, &[(0, "1,1:02.34,1:02.35,1:02.36,1:02.35,False,False")]);
        let parsed = parse(NAME, &text).unwrap();
        let result = parsed.value;
        assert!(parsed.warnings.is_empty());
        assert_eq!(result.meet_id.as_deref(), Some("008"));
        assert_eq!(result.event.as_str(), "12");
        assert_eq!(result.heat, 3);
        assert_eq!(result.race, Some(4));
        assert_eq!(
            result.recorded_at,
            NaiveDate::from_ymd_opt(2025, 7, 12).and_then(|d| d.and_hms_opt(9, 41, 0))
        );
        assert_eq!(
            result.lane(1).unwrap().times,
            [t("1:02.34"), t("1:02.35"), t("1:02.36")]
        );
    }

    #[test]
    fn empty_event_field_is_a_warning() {
        let text = body(1, &[]);
        let parsed = parse("008_Event__Heat_1_Race_9_7_12_2025_9_41.csv", &text).unwrap();
        assert!(parsed.value.event.is_blank());
        assert_eq!(parsed.value.heat, 1);
        assert_eq!(parsed.value.race, Some(9));
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn first_row_decides_numbering() {
        let text = body(0, &[(0, "0,25.88,,,25.88,False,False")]);
        let result = parse(NAME, &text).unwrap().value;
        assert_eq!(result.numbering, NumberingMode::ZeroBased);
        assert_eq!(result.lane(1).unwrap().times, [t("25.88"), None, None]);

        let text = body(1, &[(0, "1,25.88,,,25.88,False,False")]);
        let result = parse(NAME, &text).unwrap().value;
        assert_eq!(result.numbering, NumberingMode::OneBased);
        assert_eq!(result.lane(1).unwrap().times, [t("25.88"), None, None]);
    }

    #[test]
    fn reads_empty_and_dq_flags() {
        let text = body(
            1,
            &[
                (1, "2,30.00,30.01,,30.00,False,True"),
                (2, "3,,,,,True,False"),
            ],
        );
        let result = parse(NAME, &text).unwrap().value;
        assert!(result.lane(2).unwrap().is_dq);
        assert!(result.lane(3).unwrap().is_empty);
        assert!(!result.lane(1).unwrap().is_dq);
    }

    #[test]
    fn unrecognized_file_name_defaults_to_heat_one() {
        let parsed = parse("results.csv", &body(1, &[])).unwrap();
        assert_eq!(parsed.value.heat, 1);
        assert!(parsed.value.meet_id.is_none());
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn short_row_is_skipped() {
        let text = body(1, &[(4, "5,26.00")]);
        let parsed = parse(NAME, &text).unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line, 6);
    }

    #[test]
    fn wrong_row_count_fails() {
        let text = "Lane,Timer A,Timer B,Timer C,Final,Empty,DQ\n1,,,,,False,False\n";
        assert!(matches!(
            parse(NAME, text).unwrap_err(),
            ParseError::Malformed { .. }
        ));
    }
}
