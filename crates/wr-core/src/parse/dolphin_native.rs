//! Dolphin native exports (`.do4` with splits, `.do3` final times only).
//!
//! ```text
//! 12;3;2;Final
//! Lane1;31.01;31.05;
//! Lane1;1:02.34;1:02.35;1:02.36
//! Lane2;;;
//! ...
//! F0A93C21
//! ```

use std::sync::LazyLock;

use regex::Regex;

use super::{content_lines, parse_watches, skipped};
use crate::error::{ParseError, Parsed, RecordWarning};
use crate::model::{EventNumber, MAX_LANES, MAX_SPLITS, NumberingMode, RaceResult, Round};
use crate::parse::ResultFormat;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w*);(\d+);(\d+);(\w+)$").unwrap());
static LANE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Lane(\d+)((?:;[^;]*)*)$").unwrap());
static FILE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)-\w*-\d+\w-(\d+)\.do[34]$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Layout {
    /// One row per lane per split, lane-major.
    WithSplits,
    /// One row per lane.
    FinalOnly,
}

/// All rows of one lane, final row last.
struct LaneGroup {
    line: usize,
    lane: u32,
    rows: Vec<(usize, String)>,
}

pub(super) fn parse(file: &str, text: &str, layout: Layout) -> Result<Parsed<RaceResult>, ParseError> {
    let lines = content_lines(text);
    let (header, body) = lines
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
    let round = Round::from_dolphin(&caps[4]);

    // The checksum is written last, so a file without one is still being written.
    let (_checksum, rows) = body
        .split_last()
        .filter(|(last, _)| !last.starts_with("Lane"))
        .ok_or_else(|| ParseError::malformed(file, "missing checksum line"))?;

    let rows_per_lane = match layout {
        Layout::WithSplits => split_count.max(1),
        Layout::FinalOnly => 1,
    };
    let expected = usize::from(MAX_LANES) * rows_per_lane;
    if rows.len() != expected {
        return Err(ParseError::malformed(
            file,
            format!("expected {expected} lane lines, found {}", rows.len()),
        ));
    }

    let mut warnings = Vec::new();
    // Rows are lane-major, so each chunk holds every row of one lane.
    let mut groups = Vec::with_capacity(usize::from(MAX_LANES));
    for (chunk_index, chunk) in rows.chunks(rows_per_lane).enumerate() {
        // +2: 1-based, after the header.
        let first_line = chunk_index * rows_per_lane + 2;
        match lane_group(first_line, chunk) {
            Ok(group) => groups.push(group),
            Err(warning) => warnings.push(warning),
        }
    }

    let numbering = NumberingMode::from_lowest_lane(groups.iter().map(|g| g.lane).min().unwrap_or(1));
    let mut result = RaceResult::new(event, heat, match layout {
        Layout::WithSplits => ResultFormat::Do4,
        Layout::FinalOnly => ResultFormat::Do3,
    });
    result.round = round;
    result.numbering = numbering;
    if let Some(caps) = FILE_NAME_RE.captures(file) {
        result.meet_id = Some(caps[1].to_string());
        result.race = caps[2].parse().ok();
    }

    for group in groups {
        let Some(lane_no) = numbering.to_canonical(group.lane) else {
            warnings.push(RecordWarning::new(group.line, format!("lane {} out of range", group.lane)));
            continue;
        };
        // A lane with any bad row stays unused; its last row is the final time.
        let rows: Result<Vec<_>, _> = group
            .rows
            .iter()
            .map(|(line, fields)| {
                parse_watches(fields.split(';').skip(1)).map_err(|err| skipped(*line, &err))
            })
            .collect();
        let splits = match rows {
            Ok(splits) => splits,
            Err(warning) => {
                warnings.push(warning);
                continue;
            }
        };
        if let Some(lane) = result.lane_mut(lane_no) {
            lane.times = splits.last().cloned().unwrap_or_default();
            if layout == Layout::WithSplits {
                lane.splits = splits;
            }
        }
    }

    Ok(Parsed::new(result, warnings))
}

/// Checks that every row of a lane chunk is a lane line for the same lane.
fn lane_group(first_line: usize, chunk: &[&str]) -> Result<LaneGroup, RecordWarning> {
    let mut group: Option<LaneGroup> = None;
    for (offset, row) in chunk.iter().enumerate() {
        let line = first_line + offset;
        let (lane, fields) = LANE_RE
            .captures(row.trim_end())
            .and_then(|caps| Some((caps[1].parse::<u32>().ok()?, caps[2].to_string())))
            .ok_or_else(|| RecordWarning::new(line, format!("unrecognized lane line {row:?}")))?;
        match group.as_mut() {
            None => {
                group = Some(LaneGroup {
                    line,
                    lane,
                    rows: vec![(line, fields)],
                });
            }
            Some(group) if group.lane == lane => group.rows.push((line, fields)),
            Some(group) => {
                return Err(RecordWarning::new(
                    line,
                    format!("lane {lane} row inside the rows of lane {}", group.lane),
                ));
            }
        }
    }
    group.ok_or_else(|| RecordWarning::new(first_line, "missing lane rows"))
}
