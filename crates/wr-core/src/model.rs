//! Normalized meet data, independent of the file format it came from.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parse::ResultFormat;
use crate::time::RaceTime;

/// Number of lanes every parser reports, regardless of the pool.
pub const MAX_LANES: u8 = 10;

const MAX_EVENT_NUMBER_LEN: usize = 6;
const MAX_EVENT_NAME_LEN: usize = 25;
const MAX_HEATS: u8 = 99;
/// Most splits a timing console records per lane.
pub(crate) const MAX_SPLITS: u8 = 10;

/// Validation errors for model constructors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid event number {value:?}: expected up to 6 letters or digits")]
    EventNumber { value: String },

    #[error("invalid event name {value:?}: expected up to 25 letters, digits, spaces, '-' or '&'")]
    EventName { value: String },

    #[error("heat count must be between 1 and 99, got {value}")]
    HeatCount { value: u32 },

    #[error("split count must be between 0 and 10, got {value}")]
    SplitCount { value: u32 },

    #[error("invalid round: {value}")]
    Round { value: String },

    #[error("invalid lane numbering {value:?}: expected 0-9 or 1-10")]
    Numbering { value: String },
}

/// An alphanumeric event number such as `12`, `1S` or `10Z`.
///
/// An empty number stands for "event unknown", which happens when a timing
/// console was not told which event it was timing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventNumber(String);

impl EventNumber {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let normalized = value.trim().to_ascii_uppercase();
        if normalized.len() > MAX_EVENT_NUMBER_LEN
            || !normalized.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(ValidationError::EventNumber { value });
        }
        Ok(Self(normalized))
    }

    /// The unknown event.
    #[must_use]
    pub const fn blank() -> Self {
        Self(String::new())
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits `12S` into `(12, "S")`; `None` when the number isn't digits
    /// followed by letters.
    fn numeric_parts(&self) -> Option<(u64, &str)> {
        let split = self.0.find(|c: char| !c.is_ascii_digit()).unwrap_or(self.0.len());
        let (digits, letters) = self.0.split_at(split);
        if digits.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some((digits.parse().ok()?, letters))
    }
}

impl Ord for EventNumber {
    /// Numeric-aware: `2` < `10`, `1Z` < `10S`. Anything that isn't a number
    /// with an optional letter suffix sorts after, by plain string order.
    fn cmp(&self, other: &Self) -> Ordering {
        let by_parts = match (self.numeric_parts(), other.numeric_parts()) {
            (Some((a, a_suffix)), Some((b, b_suffix))) => {
                a.cmp(&b).then_with(|| a_suffix.cmp(b_suffix))
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_parts.then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for EventNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<String> for EventNumber {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventNumber> for String {
    fn from(number: EventNumber) -> Self {
        number.0
    }
}

impl fmt::Display for EventNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which round of an event a heat belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Round {
    #[default]
    All,
    Prelim,
    Semi,
    Final,
}

impl Round {
    /// Single-letter code used by event exports and generic result files.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::All => "A",
            Self::Prelim => "P",
            Self::Semi => "S",
            Self::Final => "F",
        }
    }

    /// Spelling used in the Dolphin native header.
    #[must_use]
    pub const fn dolphin_name(self) -> &'static str {
        match self {
            Self::Prelim => "Prelim",
            Self::Final => "Final",
            Self::All | Self::Semi => "A",
        }
    }

    /// Dolphin spells out `Prelim` and `Final`; everything else is "all".
    pub(crate) fn from_dolphin(text: &str) -> Self {
        match text {
            "Prelim" => Self::Prelim,
            "Final" => Self::Final,
            _ => Self::All,
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::All => "All",
            Self::Prelim => "Prelim",
            Self::Semi => "Semi",
            Self::Final => "Final",
        };
        f.write_str(s)
    }
}

impl FromStr for Round {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "all" => Ok(Self::All),
            "p" | "prelim" => Ok(Self::Prelim),
            "s" | "semi" => Ok(Self::Semi),
            "f" | "final" => Ok(Self::Final),
            _ => Err(ValidationError::Round {
                value: s.to_string(),
            }),
        }
    }
}

/// An event as configured on the timing console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub number: EventNumber,
    pub name: String,
    pub round: Round,
    pub heat_count: u8,
    pub split_count: u8,
}

impl Event {
    pub fn new(
        number: EventNumber,
        name: impl Into<String>,
        round: Round,
        heat_count: u32,
        split_count: u32,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.chars().count() > MAX_EVENT_NAME_LEN || !name.chars().all(is_event_name_char) {
            return Err(ValidationError::EventName { value: name });
        }
        let heat_count = u8::try_from(heat_count)
            .ok()
            .filter(|n| (1..=MAX_HEATS).contains(n))
            .ok_or(ValidationError::HeatCount { value: heat_count })?;
        let split_count = u8::try_from(split_count)
            .ok()
            .filter(|n| *n <= MAX_SPLITS)
            .ok_or(ValidationError::SplitCount { value: split_count })?;
        Ok(Self {
            number,
            name,
            round,
            heat_count,
            split_count,
        })
    }

    /// Reduces a free-form description to something the console accepts.
    ///
    /// ```
    /// use wr_core::Event;
    /// assert_eq!(Event::sanitize_name("Girls 10&U 50 Free (SCY)"), "Girls 10&U 50 Free SCY");
    /// ```
    #[must_use]
    pub fn sanitize_name(description: &str) -> String {
        let kept: String = description
            .chars()
            .filter(|&c| is_event_name_char(c))
            .collect();
        let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(MAX_EVENT_NAME_LEN).collect::<String>().trim_end().to_string()
    }
}

fn is_event_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ' ' | '-' | '&')
}

/// One lane row of a start list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartListEntry {
    pub event: EventNumber,
    pub heat: u32,
    /// Canonical (1-based) lane number.
    pub lane: u8,
    /// One name for individual events, several for relays.
    pub names: Vec<String>,
    pub team: Option<String>,
}

/// All heats of one event, as exported by the meet software.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartList {
    pub event: Event,
    pub entries: Vec<StartListEntry>,
}

impl StartList {
    pub fn entry(&self, heat: u32, lane: u8) -> Option<&StartListEntry> {
        self.entries
            .iter()
            .find(|entry| entry.heat == heat && entry.lane == lane)
    }

    pub fn heat(&self, heat: u32) -> impl Iterator<Item = &StartListEntry> {
        self.entries.iter().filter(move |entry| entry.heat == heat)
    }

    pub const fn heat_count(&self) -> u8 {
        self.event.heat_count
    }
}

/// How a source numbers its lanes. The rest of the system is 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingMode {
    /// Lanes 0-9.
    ZeroBased,
    /// Lanes 1-10.
    #[default]
    OneBased,
}

impl NumberingMode {
    /// Detects the mode from the lowest lane number a file mentions.
    #[must_use]
    pub const fn from_lowest_lane(lowest: u32) -> Self {
        if lowest == 0 {
            Self::ZeroBased
        } else {
            Self::OneBased
        }
    }

    /// Label used in result files and text dumps.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ZeroBased => "0-9",
            Self::OneBased => "1-10",
        }
    }

    /// Amount added to a source lane number to get the canonical one.
    #[must_use]
    pub const fn offset(self) -> u8 {
        match self {
            Self::ZeroBased => 1,
            Self::OneBased => 0,
        }
    }

    /// Canonical lane for a source lane, if it is in range.
    #[must_use]
    pub fn to_canonical(self, source: u32) -> Option<u8> {
        let lane = u8::try_from(source).ok()?.checked_add(self.offset())?;
        (1..=MAX_LANES).contains(&lane).then_some(lane)
    }

    /// Lane number as the source file spelled it.
    #[must_use]
    pub const fn to_source(self, canonical: u8) -> u8 {
        canonical - self.offset()
    }
}

impl FromStr for NumberingMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0-9" | "0" => Ok(Self::ZeroBased),
            "1-10" | "1" => Ok(Self::OneBased),
            _ => Err(ValidationError::Numbering {
                value: s.to_string(),
            }),
        }
    }
}

/// The timing data for one lane of one race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaneResult {
    /// Canonical (1-based) lane number.
    pub lane: u8,
    /// Raw watch readings; `None` is a watch that reported nothing.
    pub times: Vec<Option<RaceTime>>,
    pub is_dq: bool,
    pub is_empty: bool,
    /// Watch readings at each split, final split last. Empty when the format
    /// has no split data.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub splits: Vec<Vec<Option<RaceTime>>>,
}

impl LaneResult {
    /// A lane with nothing recorded.
    #[must_use]
    pub const fn unused(lane: u8) -> Self {
        Self {
            lane,
            times: Vec::new(),
            is_dq: false,
            is_empty: false,
            splits: Vec::new(),
        }
    }

    /// Watch readings that actually hold a time.
    pub fn recorded_times(&self) -> impl Iterator<Item = RaceTime> + '_ {
        self.times.iter().flatten().copied().filter(|t| t.is_positive())
    }

    /// Same readings and flags; trailing unreported watches don't count.
    fn same_outcome(&self, other: &Self) -> bool {
        fn trimmed(times: &[Option<RaceTime>]) -> &[Option<RaceTime>] {
            let end = times.iter().rposition(Option::is_some).map_or(0, |i| i + 1);
            &times[..end]
        }
        self.lane == other.lane
            && self.is_dq == other.is_dq
            && self.is_empty == other.is_empty
            && trimmed(&self.times) == trimmed(&other.times)
    }
}

/// Identifies a heat within a meet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HeatKey {
    pub event: EventNumber,
    pub heat: u32,
}

impl HeatKey {
    pub const fn new(event: EventNumber, heat: u32) -> Self {
        Self { event, heat }
    }
}

impl fmt::Display for HeatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let event = if self.event.is_blank() {
            "?"
        } else {
            self.event.as_str()
        };
        write!(f, "event {event} heat {}", self.heat)
    }
}

/// The results of one race, as read from one timing file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RaceResult {
    pub meet_id: Option<String>,
    pub race: Option<u32>,
    pub event: EventNumber,
    pub heat: u32,
    pub round: Round,
    pub format: ResultFormat,
    pub numbering: NumberingMode,
    pub recorded_at: Option<NaiveDateTime>,
    /// Always [`MAX_LANES`] entries, lane 1 first.
    pub lanes: Vec<LaneResult>,
}

impl RaceResult {
    /// An empty result for a heat; every lane unused.
    pub fn new(event: EventNumber, heat: u32, format: ResultFormat) -> Self {
        Self {
            meet_id: None,
            race: None,
            event,
            heat,
            round: Round::default(),
            format,
            numbering: NumberingMode::default(),
            recorded_at: None,
            lanes: (1..=MAX_LANES).map(LaneResult::unused).collect(),
        }
    }

    pub fn key(&self) -> HeatKey {
        HeatKey::new(self.event.clone(), self.heat)
    }

    /// Lane by canonical number.
    pub fn lane(&self, lane: u8) -> Option<&LaneResult> {
        self.lanes.iter().find(|l| l.lane == lane)
    }

    pub(crate) fn lane_mut(&mut self, lane: u8) -> Option<&mut LaneResult> {
        self.lanes.iter_mut().find(|l| l.lane == lane)
    }

    /// True when both describe the same race outcome, ignoring which file
    /// format it came from, split data and the recording timestamp.
    pub fn same_outcome(&self, other: &Self) -> bool {
        self.meet_id == other.meet_id
            && self.race == other.race
            && self.event == other.event
            && self.heat == other.heat
            && self.round == other.round
            && self.lanes.len() == other.lanes.len()
            && self
                .lanes
                .iter()
                .zip(&other.lanes)
                .all(|(a, b)| a.same_outcome(b))
    }

    #[must_use]
    pub fn without_splits(&self) -> Self {
        let mut copy = self.clone();
        for lane in &mut copy.lanes {
            lane.splits.clear();
        }
        copy
    }
}
