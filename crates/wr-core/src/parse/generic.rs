//! The vendor-neutral generic result file (`.gen`, `.ge2`).
//!
//! Header `event;heat;num_splits;round;version;creator;creator_version`, then
//! twelve lane rows `place;split1..splitN;b1;b2;b3;r1;r2;r3;r4`. Only the first
//! ten rows are used; a place of `Q` marks a disqualification.

use std::sync::LazyLock;

use regex::Regex;

use super::{content_lines, parse_watch, parse_watches, skipped};
use crate::error::{ParseError, Parsed, RecordWarning};
use crate::model::{EventNumber, MAX_LANES, MAX_SPLITS, RaceResult, Round};
use crate::parse::ResultFormat;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w*);(\d+);(\d+);(\w);[^;]*;[^;]*;[^;]*$").unwrap());
static FILE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)-\d+(?:\w|-)\d+\w(\d+)\.ge[n2]$").unwrap());

const LANE_ROWS: usize = 12;
const BACKUP_WATCHES: usize = 3;
const REACTION_TIMES: usize = 4;

pub(super) fn parse(file: &str, text: &str) -> Result<Parsed<RaceResult>, ParseError> {
    let lines = content_lines(text);
    let (header, rows) = lines
        .split_first()
        .ok_or_else(|| ParseError::malformed(file, "empty file"))?;
    let caps = HEADER_RE
        .captures(header.trim())
        .ok_or_else(|| ParseError::malformed(file, format!("unrecognized header {header:?}")))?;

    let event = EventNumber::new(&caps[1]).map_err(|e| ParseError::malformed(file, e.to_string()))?;
    let heat: u32 = caps[2]
        .parse()
        .ok()
        .filter(|&h| h >= 1)
        .ok_or_else(|| ParseError::malformed(file, format!("invalid heat {:?}", &caps[2])))?;
    let split_count: usize = caps[3]
        .parse()
        .ok()
        .filter(|&n| n <= usize::from(MAX_SPLITS))
        .ok_or_else(|| ParseError::malformed(file, format!("invalid split count {:?}", &caps[3])))?;
    let round = match &caps[4] {
        "P" => Round::Prelim,
        "S" => Round::Semi,
        "A" => Round::All,
        _ => Round::Final,
    };

    if rows.len() != LANE_ROWS {
        return Err(ParseError::malformed(
            file,
            format!("expected {LANE_ROWS} lane rows, found {}", rows.len()),
        ));
    }

    let mut result = RaceResult::new(event, heat, ResultFormat::Generic);
    result.round = round;
    if let Some(caps) = FILE_NAME_RE.captures(file) {
        result.meet_id = Some(caps[1].to_string());
        result.race = caps[2].parse().ok();
    }

    let field_count = 1 + split_count + BACKUP_WATCHES + REACTION_TIMES;
    let mut warnings = Vec::new();
    for (index, row) in rows.iter().take(usize::from(MAX_LANES)).enumerate() {
        let line = index + 2;
        let fields: Vec<&str> = row.trim_end().split(';').collect();
        if fields.len() != field_count {
            warnings.push(RecordWarning::new(
                line,
                format!("expected {field_count} fields, found {}", fields.len()),
            ));
            continue;
        }
        let splits: Result<Vec<_>, _> = fields[1..=split_count]
            .iter()
            .map(|field| parse_watch(field).map(|time| vec![time]))
            .collect();
        let backups = &fields[split_count + 1..split_count + 1 + BACKUP_WATCHES];
        let parsed = splits.and_then(|splits| Ok((splits, parse_watches(backups.iter().copied())?)));
        let (splits, times) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                warnings.push(skipped(line, &err));
                continue;
            }
        };
        // Rows are in lane order; the file has no lane column.
        let Some(lane) = u8::try_from(index + 1).ok().and_then(|n| result.lane_mut(n)) else {
            continue;
        };
        lane.is_dq = fields[0].trim() == "Q";
        lane.splits = splits;
        lane.times = times;
    }

    Ok(Parsed::new(result, warnings))
}
