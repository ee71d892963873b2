//! CTS start lists (`E001.scb`).
//!
//! The first line is `#<event> <description>`. Each following line is one
//! lane, ten lanes per heat: a 20-character name, `--`, and a 16-character
//! team, space padded.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::Regex;

use super::{decode, file_identity, read_file};
use crate::error::{ParseError, Parsed, RecordWarning};
use crate::model::{Event, EventNumber, MAX_LANES, Round, StartList, StartListEntry};

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#(\w+)\s*(.*)$").unwrap());
static FILE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^E[0-9a-z]+\.scb$").unwrap());

const NAME_WIDTH: usize = 20;
const SEPARATOR: &str = "--";

/// True for files named like start lists: `E<event>.scb`.
pub fn is_start_list(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| FILE_NAME_RE.is_match(name))
}

/// Splits a lane row into name and team. `None` for a lane nobody swims in.
fn parse_row(row: &str) -> Result<Option<(String, Option<String>)>, String> {
    let row = row.trim_end();
    if row.trim().is_empty() {
        return Ok(None);
    }
    let split = row.char_indices().nth(NAME_WIDTH).map_or(row.len(), |(i, _)| i);
    let (name, rest) = row.split_at(split);
    let team = match rest.strip_prefix(SEPARATOR) {
        Some(team) => Some(team.trim()).filter(|t| !t.is_empty()).map(str::to_string),
        None if rest.is_empty() => None,
        None => return Err(format!("expected {SEPARATOR:?} after the name column in {row:?}")),
    };
    let name = name.trim();
    if name.is_empty() && team.is_none() {
        return Ok(None);
    }
    Ok(Some((name.to_string(), team)))
}

/// Parses a start list.
pub fn parse_start_list(file_name: &str, bytes: &[u8]) -> Result<Parsed<StartList>, ParseError> {
    let text = decode(file_name, bytes)?;
    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| ParseError::malformed(file_name, "empty file"))?;
    let caps = HEADER_RE
        .captures(header.trim())
        .ok_or_else(|| ParseError::malformed(file_name, format!("unrecognized header {header:?}")))?;
    let number = EventNumber::new(&caps[1]).map_err(|e| ParseError::malformed(file_name, e.to_string()))?;
    let name = Event::sanitize_name(&caps[2]);

    // Blank lines are real rows (lanes with no swimmer), so only the count
    // decides how many heats there are.
    let rows: Vec<&str> = lines.collect();
    let lanes_per_heat = usize::from(MAX_LANES);
    let heat_count = rows.len().div_ceil(lanes_per_heat);
    if heat_count == 0 {
        return Err(ParseError::malformed(file_name, "no heats"));
    }
    let mut warnings = Vec::new();
    if rows.len() % lanes_per_heat != 0 {
        warnings.push(RecordWarning::new(
            0,
            format!(
                "last heat has {} of {lanes_per_heat} lanes; the rest are empty",
                rows.len() % lanes_per_heat
            ),
        ));
    }

    let heat_count_u32 = u32::try_from(heat_count).unwrap_or(u32::MAX);
    let event = Event::new(number.clone(), name, Round::All, heat_count_u32, 1)
        .map_err(|e| ParseError::malformed(file_name, e.to_string()))?;

    let mut entries = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        // +2: 1-based, after the header.
        let line = index + 2;
        match parse_row(row) {
            Ok(None) => {}
            Ok(Some((name, team))) => {
                let (heat, lane) = (index / lanes_per_heat, index % lanes_per_heat);
                entries.push(StartListEntry {
                    event: number.clone(),
                    heat: u32::try_from(heat + 1).unwrap_or(u32::MAX),
                    lane: u8::try_from(lane + 1).unwrap_or(MAX_LANES),
                    names: if name.is_empty() { Vec::new() } else { vec![name] },
                    team,
                });
            }
            Err(reason) => warnings.push(RecordWarning::new(line, reason)),
        }
    }

    Ok(Parsed::new(StartList { event, entries }, warnings))
}

/// Reads one start list from disk.
pub fn read_start_list(path: &Path) -> Result<Parsed<StartList>, ParseError> {
    let (file_name, bytes, _) = read_file(path)?;
    parse_start_list(&file_name, &bytes)
}

/// Loads every start list in a directory, in parallel.
///
/// Unreadable or malformed files are logged and skipped. The result is
/// ordered by event number; when two files carry the same event, the one
/// whose name sorts last wins.
pub fn scan_start_lists(dir: &Path) -> Result<Vec<StartList>, ParseError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let io_err = |source| ParseError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_start_list(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let lists: Vec<StartList> = paths
        .par_iter()
        .filter_map(|path| match read_start_list(path) {
            Ok(parsed) => {
                for warning in &parsed.warnings {
                    tracing::warn!(file = %file_identity(path), %warning, "start list record skipped");
                }
                Some(parsed.value)
            }
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "skipping invalid start list");
                None
            }
        })
        .collect();

    let mut program: Vec<StartList> = Vec::with_capacity(lists.len());
    for list in lists {
        program.retain(|existing| existing.event.number != list.event.number);
        program.push(list);
    }
    program.sort_by(|a, b| a.event.number.cmp(&b.event.number));
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, team: &str) -> String {
        format!("{name:<20}--{team:<16}")
    }

    /// Every line newline-terminated, so trailing blank rows survive.
    fn file(lines: &[String], eol: &str) -> Vec<u8> {
        lines.iter().map(|line| format!("{line}{eol}")).collect::<String>().into_bytes()
    }

    fn heat(rows: &[(&str, &str)]) -> Vec<String> {
        let mut lines: Vec<String> = rows.iter().map(|(n, t)| row(n, t)).collect();
        lines.resize(10, String::new());
        lines
    }

    #[test]
    fn reads_heats_names_and_teams() {
        let mut lines = vec!["#1 GIRLS 10&U 50 FREE".to_string()];
        lines.extend(heat(&[("Doe, Jane", "WAHOO"), ("Smith, Amy A", "SHARKS")]));
        lines.extend(heat(&[("", ""), ("Brown, Kim", "WAHOO")]));
        let parsed = parse_start_list("E001.scb", &file(&lines, "\r\n")).unwrap();
        assert!(parsed.warnings.is_empty());

        let list = parsed.value;
        assert_eq!(list.event.number.as_str(), "1");
        assert_eq!(list.event.name, "GIRLS 10&U 50 FREE");
        assert_eq!(list.heat_count(), 2);
        let entry = list.entry(1, 2).unwrap();
        assert_eq!(entry.names, ["Smith, Amy A"]);
        assert_eq!(entry.team.as_deref(), Some("SHARKS"));
        assert!(list.entry(2, 1).is_none());
        assert_eq!(list.entry(2, 2).unwrap().names, ["Brown, Kim"]);
        assert_eq!(list.heat(1).count(), 2);
    }

    #[test]
    fn tolerates_short_rows_and_missing_team() {
        let mut lines = vec!["#12 BOYS 100 IM".to_string(), "Doe, John".to_string()];
        lines.push(format!("{:<20}--", "Roe, Rick"));
        lines.resize(11, String::new());
        let list = parse_start_list("E012.scb", &file(&lines, "\n")).unwrap().value;
        assert_eq!(list.entry(1, 1).unwrap().names, ["Doe, John"]);
        assert_eq!(list.entry(1, 1).unwrap().team, None);
        assert_eq!(list.entry(1, 2).unwrap().team, None);
    }

    #[test]
    fn relay_rows_carry_only_a_team() {
        let mut lines = vec!["#3 MIXED 10&U 100 FREE RELAY".to_string()];
        lines.extend(heat(&[("", "WAHOO-A")]));
        let list = parse_start_list("E003.scb", &file(&lines, "\n")).unwrap().value;
        let entry = list.entry(1, 1).unwrap();
        assert!(entry.names.is_empty());
        assert_eq!(entry.team.as_deref(), Some("WAHOO-A"));
    }

    #[test]
    fn partial_heat_is_padded_with_a_warning() {
        let mut lines = vec!["#4 GIRLS 200 FREE".to_string()];
        lines.extend(heat(&[("Doe, Jane", "WAHOO")]));
        lines.push(row("Late, Entry", "WAHOO"));
        let parsed = parse_start_list("E004.scb", &file(&lines, "\n")).unwrap();
        assert_eq!(parsed.value.heat_count(), 2);
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.value.entry(2, 1).unwrap().names, ["Late, Entry"]);
    }

    #[test]
    fn garbled_row_is_skipped() {
        let mut lines = vec!["#5 BOYS 50 BACK".to_string()];
        let mut rows = heat(&[("Doe, John", "WAHOO")]);
        rows[1] = "This row is far too long to be a name".to_string();
        lines.extend(rows);
        let parsed = parse_start_list("E005.scb", &file(&lines, "\n")).unwrap();
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line, 3);
        assert!(parsed.value.entry(1, 2).is_none());
    }

    #[test]
    fn bad_header_fails() {
        assert!(parse_start_list("E001.scb", b"GIRLS 50 FREE\n").is_err());
        assert!(parse_start_list("E001.scb", b"#1234567 TOO LONG\n").is_err());
        assert!(parse_start_list("E001.scb", b"#1 NO HEATS").is_err());
    }

    #[test]
    fn decodes_code_page_names() {
        let mut bytes = b"#1 GIRLS 50 FREE\n".to_vec();
        bytes.extend_from_slice(&[b'M', 0xFC, b'l', b'l', b'e', b'r']);
        let list = parse_start_list("E001.scb", &bytes).unwrap().value;
        assert_eq!(list.entry(1, 1).unwrap().names, ["Müller"]);
    }

    #[test]
    fn only_event_named_files_are_start_lists() {
        assert!(is_start_list(Path::new("lists/E001.scb")));
        assert!(is_start_list(Path::new("e12S.SCB")));
        assert!(!is_start_list(Path::new("roster.scb")));
        assert!(!is_start_list(Path::new("E.scb")));
        assert!(!is_start_list(Path::new("E001.scb.bak")));
        assert!(!is_start_list(Path::new("E001.txt")));
    }

    #[test]
    fn scans_a_directory_in_event_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("E010.scb"), "#10 BOYS 50 FLY\nA\n").unwrap();
        fs::write(dir.path().join("E002.scb"), "#2 GIRLS 50 FLY\nB\n").unwrap();
        fs::write(dir.path().join("E003.scb"), "not a start list").unwrap();
        fs::write(dir.path().join("notes.txt"), "#1 ignored\n").unwrap();
        fs::write(dir.path().join("roster.scb"), "#4 BOYS 50 FREE\nC\n").unwrap();

        let program = scan_start_lists(dir.path()).unwrap();
        let events: Vec<&str> = program.iter().map(|l| l.event.number.as_str()).collect();
        assert_eq!(events, ["2", "10"]);
        assert!(scan_start_lists(&dir.path().join("missing")).unwrap().is_empty());
    }
}
