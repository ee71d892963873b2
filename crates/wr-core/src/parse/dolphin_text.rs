//! Dolphin plain-text export.
//!
//! ```text
//! Meet: 008
//! Race: 4
//! Event: 12
//! Heat: 3
//! Round: Final
//! Numbering: 1-10
//! Lane 1: 1:02.34 1:02.35 1:02.36
//! Lane 2: DQ 1:05.00 - -
//! Lane 3: EMPTY
//! ```

use super::{parse_watch, skipped};
use crate::error::{ParseError, Parsed, RecordWarning};
use crate::model::{EventNumber, LaneResult, NumberingMode, RaceResult, Round};
use crate::parse::ResultFormat;
use crate::time::RaceTime;

#[derive(Default)]
struct Header {
    meet: Option<String>,
    race: Option<u32>,
    event: Option<EventNumber>,
    heat: Option<u32>,
    round: Option<Round>,
    numbering: Option<NumberingMode>,
}

struct LaneLine {
    line: usize,
    lane: u32,
    times: Vec<Option<RaceTime>>,
    is_dq: bool,
    is_empty: bool,
}

fn parse_lane_tokens(value: &str) -> Result<(Vec<Option<RaceTime>>, bool, bool), ParseError> {
    let mut times = Vec::new();
    let (mut is_dq, mut is_empty) = (false, false);
    for token in value.split_whitespace() {
        match token.to_ascii_uppercase().as_str() {
            "DQ" => is_dq = true,
            "EMPTY" => is_empty = true,
            "-" => times.push(None),
            _ => times.push(parse_watch(token)?),
        }
    }
    Ok((times, is_dq, is_empty))
}

pub(super) fn parse(file: &str, text: &str) -> Result<Parsed<RaceResult>, ParseError> {
    let mut header = Header::default();
    let mut lanes = Vec::new();
    let mut warnings = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else {
            warnings.push(RecordWarning::new(line, format!("unrecognized line {trimmed:?}")));
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        if let Some(lane) = key.strip_prefix("Lane").map(str::trim) {
            let Ok(lane) = lane.parse::<u32>() else {
                warnings.push(RecordWarning::new(line, format!("invalid lane {lane:?}")));
                continue;
            };
            match parse_lane_tokens(value) {
                Ok((times, is_dq, is_empty)) => lanes.push(LaneLine {
                    line,
                    lane,
                    times,
                    is_dq,
                    is_empty,
                }),
                Err(err) => warnings.push(skipped(line, &err)),
            }
            continue;
        }

        let bad_value = |what: &str| ParseError::malformed(file, format!("line {line}: invalid {what} {value:?}"));
        match key.to_ascii_lowercase().as_str() {
            "meet" => header.meet = Some(value.to_string()),
            "race" => header.race = Some(value.parse().map_err(|_| bad_value("race"))?),
            "event" => {
                header.event = Some(EventNumber::new(value).map_err(|_| bad_value("event"))?);
            }
            "heat" => header.heat = Some(value.parse().map_err(|_| bad_value("heat"))?),
            "round" => header.round = Some(value.parse().map_err(|_| bad_value("round"))?),
            "numbering" => {
                header.numbering = Some(value.parse().map_err(|_| bad_value("numbering"))?);
            }
            _ => warnings.push(RecordWarning::new(line, format!("unknown field {key:?}"))),
        }
    }

    let heat = header
        .heat
        .filter(|&h| h >= 1)
        .ok_or_else(|| ParseError::malformed(file, "missing heat"))?;
    let event = header.event.unwrap_or_else(|| {
        warnings.push(RecordWarning::new(0, "event number is blank"));
        EventNumber::blank()
    });

    let mut result = RaceResult::new(event, heat, ResultFormat::DolphinText);
    result.meet_id = header.meet;
    result.race = header.race;
    result.round = header.round.unwrap_or_default();
    // Unused lanes may be left out, so the lowest lane only decides when the
    // file doesn't say.
    result.numbering = header.numbering.unwrap_or_else(|| {
        NumberingMode::from_lowest_lane(lanes.iter().map(|l| l.lane).min().unwrap_or(1))
    });

    for entry in lanes {
        let Some(lane_no) = result.numbering.to_canonical(entry.lane) else {
            warnings.push(RecordWarning::new(entry.line, format!("lane {} out of range", entry.lane)));
            continue;
        };
        if let Some(lane) = result.lane_mut(lane_no) {
            *lane = LaneResult {
                lane: lane_no,
                times: entry.times,
                is_dq: entry.is_dq,
                is_empty: entry.is_empty,
                splits: Vec::new(),
            };
        }
    }

    Ok(Parsed::new(result, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Option<RaceTime> {
        Some(s.parse().unwrap())
    }

    const SAMPLE: &str = "\
Meet: 008
Race: 4
Event: 12
Heat: 3
Round: Final
Lane 1: 1:02.34 1:02.35 1:02.36
Lane 2: DQ 1:05.00 - -
Lane 3: EMPTY
";

    #[test]
    fn reads_header_and_lanes() {
        let parsed = parse("race.txt", SAMPLE).unwrap();
        let result = parsed.value;
        assert!(parsed.warnings.is_empty());
        assert_eq!(result.meet_id.as_deref(), Some("008"));
        assert_eq!(result.race, Some(4));
        assert_eq!(result.event.as_str(), "12");
        assert_eq!(result.heat, 3);
        assert_eq!(result.round, Round::Final);
        assert_eq!(
            result.lane(1).unwrap().times,
            [t("1:02.34"), t("1:02.35"), t("1:02.36")]
        );
        let lane2 = result.lane(2).unwrap();
        assert!(lane2.is_dq);
        assert_eq!(lane2.times, [t("1:05.00"), None, None]);
        assert!(result.lane(3).unwrap().is_empty);
        assert!(result.lane(4).unwrap().times.is_empty());
    }

    #[test]
    fn missing_event_is_blank_not_fatal() {
        let parsed = parse("race.txt", "Heat: 1\nLane 1: 25.00\n").unwrap();
        assert!(parsed.value.event.is_blank());
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn missing_heat_is_fatal() {
        assert!(matches!(
            parse("race.txt", "Event: 1\nLane 1: 25.00\n").unwrap_err(),
            ParseError::Malformed { .. }
        ));
    }

    #[test]
    fn lane_zero_switches_numbering() {
        let result = parse("race.txt", "Event: 1\nHeat: 1\nLane 0: 25.00\nLane 9: 26.00\n")
            .unwrap()
            .value;
        assert_eq!(result.numbering, NumberingMode::ZeroBased);
        assert_eq!(result.lane(1).unwrap().times, [t("25.00")]);
        assert_eq!(result.lane(10).unwrap().times, [t("26.00")]);
    }

    #[test]
    fn declared_numbering_wins_without_lane_zero() {
        let result = parse(
            "race.txt",
            "Event: 1\nHeat: 1\nNumbering: 0-9\nLane 1: 25.00\nLane 9: 26.00\n",
        )
        .unwrap()
        .value;
        assert_eq!(result.numbering, NumberingMode::ZeroBased);
        assert_eq!(result.lane(2).unwrap().times, [t("25.00")]);
        assert_eq!(result.lane(10).unwrap().times, [t("26.00")]);
        assert!(result.lane(1).unwrap().times.is_empty());
    }

    #[test]
    fn unknown_numbering_is_fatal() {
        assert!(parse("race.txt", "Heat: 1\nNumbering: 2-11\n").is_err());
    }

    #[test]
    fn bad_time_skips_the_lane() {
        let parsed = parse("race.txt", "Event: 1\nHeat: 1\nLane 1: 25.00 2x\nLane 2: 26.00\n").unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line, 3);
        assert!(parsed.value.lane(1).unwrap().times.is_empty());
        assert_eq!(parsed.value.lane(2).unwrap().times, [t("26.00")]);
    }
}
