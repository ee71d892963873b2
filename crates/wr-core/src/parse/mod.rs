//! Readers for start lists and timing-system result files.
//!
//! Every reader is a pure function of the file name and bytes. Text is decoded
//! with the console code page first; a damaged record is skipped and reported
//! as a [`RecordWarning`], while structural damage fails the whole file.

mod dolphin_csv;
mod dolphin_native;
mod dolphin_text;
mod dolphin_xml;
mod generic;
mod scb;

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;

use crate::codepage;
use crate::error::{ParseError, Parsed, RecordWarning};
use crate::model::RaceResult;
use crate::time::RaceTime;

pub use scb::{is_start_list, parse_start_list, read_start_list, scan_start_lists};

/// The result file formats the system understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    /// Dolphin native export with split rows (`.do4`).
    Do4,
    /// Dolphin native export, final times only (`.do3`).
    Do3,
    /// Dolphin CSV export.
    DolphinCsv,
    /// Dolphin plain-text export.
    DolphinText,
    /// Dolphin XML export.
    DolphinXml,
    /// The vendor-neutral generic result file (`.gen`, `.ge2`).
    Generic,
}

impl ResultFormat {
    pub const ALL: [Self; 6] = [
        Self::Do4,
        Self::Do3,
        Self::DolphinCsv,
        Self::DolphinText,
        Self::DolphinXml,
        Self::Generic,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Do4 => "do4",
            Self::Do3 => "do3",
            Self::DolphinCsv => "dolphin_csv",
            Self::DolphinText => "dolphin_text",
            Self::DolphinXml => "dolphin_xml",
            Self::Generic => "generic",
        }
    }

    /// Whether the format records disqualifications. Formats that don't
    /// always report `is_dq == false`.
    #[must_use]
    pub const fn carries_dq(self) -> bool {
        !matches!(self, Self::Do4 | Self::Do3)
    }

    #[must_use]
    pub const fn carries_splits(self) -> bool {
        matches!(self, Self::Do4 | Self::DolphinXml | Self::Generic)
    }

    /// Format implied by a file's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "do4" => Some(Self::Do4),
            "do3" => Some(Self::Do3),
            "csv" => Some(Self::DolphinCsv),
            "txt" => Some(Self::DolphinText),
            "xml" => Some(Self::DolphinXml),
            "gen" | "ge2" => Some(Self::Generic),
            _ => None,
        }
    }

    /// Guesses the format from decoded file contents.
    pub fn sniff(text: &str) -> Option<Self> {
        let first = text.lines().find(|line| !line.trim().is_empty())?.trim();
        if first.starts_with('<') {
            return Some(Self::DolphinXml);
        }
        if first.to_ascii_lowercase().starts_with("lane,") {
            return Some(Self::DolphinCsv);
        }
        let key = first.split_once(':').map(|(key, _)| key.trim().to_ascii_lowercase());
        if matches!(key.as_deref(), Some("meet" | "race" | "event" | "heat" | "round")) {
            return Some(Self::DolphinText);
        }
        match first.split(';').count() {
            7 => Some(Self::Generic),
            // A final-times-only native file reads the same as a one-split DO4.
            4 => Some(Self::Do4),
            _ => None,
        }
    }

    /// Parses a result file of this format.
    ///
    /// `file_name` identifies the file in errors and supplies metadata that
    /// some formats only carry in their names.
    pub fn parse(self, file_name: &str, bytes: &[u8]) -> Result<Parsed<RaceResult>, ParseError> {
        let text = decode(file_name, bytes)?;
        match self {
            Self::Do4 => dolphin_native::parse(file_name, &text, dolphin_native::Layout::WithSplits),
            Self::Do3 => dolphin_native::parse(file_name, &text, dolphin_native::Layout::FinalOnly),
            Self::DolphinCsv => dolphin_csv::parse(file_name, &text),
            Self::DolphinText => dolphin_text::parse(file_name, &text),
            Self::DolphinXml => dolphin_xml::parse(file_name, &text),
            Self::Generic => generic::parse(file_name, &text),
        }
    }

    /// Reads and parses a result file of this format from disk.
    ///
    /// Formats that don't record when the race was timed get the file's
    /// modification time instead.
    pub fn read(self, path: &Path) -> Result<Parsed<RaceResult>, ParseError> {
        let (file_name, bytes, modified) = read_file(path)?;
        self.parse_stamped(&file_name, &bytes, modified)
    }

    fn parse_stamped(
        self,
        file_name: &str,
        bytes: &[u8],
        modified: Option<NaiveDateTime>,
    ) -> Result<Parsed<RaceResult>, ParseError> {
        let mut parsed = self.parse(file_name, bytes)?;
        if parsed.value.recorded_at.is_none() {
            parsed.value.recorded_at = modified;
        }
        Ok(parsed)
    }
}

impl std::fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detects the format of a result file: extension first, then contents.
pub fn detect_format(path: &Path, bytes: &[u8]) -> Option<ResultFormat> {
    ResultFormat::from_path(path).or_else(|| {
        let text = codepage::decode(bytes).ok()?;
        ResultFormat::sniff(&text)
    })
}

/// Reads and parses a result file from disk, detecting its format.
pub fn read_result(path: &Path) -> Result<Parsed<RaceResult>, ParseError> {
    let (file_name, bytes, modified) = read_file(path)?;
    let format = detect_format(path, &bytes)
        .ok_or_else(|| ParseError::malformed(&file_name, "unrecognized result file format"))?;
    format.parse_stamped(&file_name, &bytes, modified)
}

pub(crate) fn read_file(path: &Path) -> Result<(String, Vec<u8>, Option<NaiveDateTime>), ParseError> {
    let io_err = |source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };
    let bytes = fs::read(path).map_err(io_err)?;
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .map(|mtime| DateTime::<Local>::from(mtime).naive_local());
    Ok((file_identity(path), bytes, modified))
}

/// The bare file name, used both in messages and for name-encoded metadata.
pub(crate) fn file_identity(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn decode(file_name: &str, bytes: &[u8]) -> Result<String, ParseError> {
    codepage::decode(bytes).map_err(|err| ParseError::Encoding {
        file: file_name.to_string(),
        offset: err.offset,
        byte: err.byte,
    })
}

/// Parses one watch field. Blank and zero both mean "not recorded".
fn parse_watch(field: &str) -> Result<Option<RaceTime>, ParseError> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    let time = RaceTime::parse(field)?;
    Ok(time.is_positive().then_some(time))
}

/// Parses a run of watch fields, failing on the first bad one.
fn parse_watches<'a>(
    fields: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<Option<RaceTime>>, ParseError> {
    fields.into_iter().map(parse_watch).collect()
}

/// Lines of a text file with trailing blank lines removed.
fn content_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines
}

fn skipped(line: usize, err: &ParseError) -> RecordWarning {
    RecordWarning::new(line, format!("record skipped: {err}"))
}
