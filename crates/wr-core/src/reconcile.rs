//! Reconciliation of start lists with race results.
//!
//! For one heat, joins the start-list entries with the lane results and
//! computes a single final time per lane from the redundant watch readings.
//!
//! # Algorithm Summary
//!
//! 1. Empty lanes show nothing, regardless of stray watches or entries.
//! 2. Too few recorded watches withholds the time.
//! 3. The final time is the mean of the recorded watches, truncated to the
//!    hundredth.
//! 4. If any watch is further than the threshold from the mean, the time is
//!    withheld.
//! 5. Places 1-3 go to the lanes with a shown, unpenalized time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{EventNumber, HeatKey, LaneResult, MAX_LANES, RaceResult, StartList};
use crate::time::RaceTime;

/// Smallest pool the scoreboard supports.
pub const MIN_LANES: u8 = 6;

/// Places beyond this are not reported.
const PLACES_SHOWN: u8 = 3;

/// How disqualifications affect the displayed result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DqMode {
    /// Treat the lane as clean.
    #[default]
    Ignore,
    /// Show the time, but the lane gets no place.
    ShowWithTime,
    /// Withhold the time.
    HideTime,
}

impl DqMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::ShowWithTime => "show_with_time",
            Self::HideTime => "hide_time",
        }
    }
}

impl fmt::Display for DqMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown DQ mode: {0}")]
pub struct UnknownDqMode(pub String);

impl FromStr for DqMode {
    type Err = UnknownDqMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ignore" => Ok(Self::Ignore),
            "show_with_time" => Ok(Self::ShowWithTime),
            "hide_time" => Ok(Self::HideTime),
            _ => Err(UnknownDqMode(s.to_string())),
        }
    }
}

/// Invalid reconciliation settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("lane count must be between {MIN_LANES} and {MAX_LANES}, got {0}")]
    LaneCount(u8),

    #[error("minimum times per lane must be at least 1")]
    MinTimes,

    #[error("time threshold must not be negative, got {0}")]
    Threshold(RaceTime),
}

/// Settings for turning watch readings into final times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Lanes shown on the scoreboard, 6-10.
    /// Default: 10.
    pub lane_count: u8,

    /// Fewer recorded watches than this withholds the time.
    /// Default: 2.
    pub min_times: usize,

    /// Largest allowed distance of any watch from the mean.
    /// Default: 0.30s.
    pub time_threshold: RaceTime,

    pub dq_mode: DqMode,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            lane_count: MAX_LANES,
            min_times: 2,
            time_threshold: RaceTime::from_hundredths(30),
            dq_mode: DqMode::default(),
        }
    }
}

impl ReconcileConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_LANES..=MAX_LANES).contains(&self.lane_count) {
            return Err(ConfigError::LaneCount(self.lane_count));
        }
        if self.min_times == 0 {
            return Err(ConfigError::MinTimes);
        }
        if self.time_threshold < RaceTime::ZERO {
            return Err(ConfigError::Threshold(self.time_threshold));
        }
        Ok(())
    }
}

/// Why a lane shows a placeholder instead of a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SuppressReason {
    /// No result file for the heat yet.
    NoResult,
    /// The lane was marked empty.
    Empty,
    /// No watch recorded a time.
    NoTimes,
    TooFewTimes { recorded: usize, required: usize },
    /// The watches disagree by more than the threshold.
    Spread { deviation: RaceTime },
    /// Disqualified, and the DQ mode hides the time.
    Disqualified,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoResult => f.write_str("no result yet"),
            Self::Empty => f.write_str("lane empty"),
            Self::NoTimes => f.write_str("no times recorded"),
            Self::TooFewTimes { recorded, required } => {
                write!(f, "{recorded} of {required} required times recorded")
            }
            Self::Spread { deviation } => write!(f, "watches differ from the mean by {deviation}"),
            Self::Disqualified => f.write_str("disqualified"),
        }
    }
}

/// A lane's displayed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalTime {
    Time(RaceTime),
    Suppressed(SuppressReason),
}

impl FinalTime {
    #[must_use]
    pub const fn time(self) -> Option<RaceTime> {
        match self {
            Self::Time(time) => Some(time),
            Self::Suppressed(_) => None,
        }
    }
}

/// One scoreboard line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledRow {
    pub lane: u8,
    pub names: Vec<String>,
    pub team: Option<String>,
    pub final_time: FinalTime,
    /// 1-3, or `None` for everyone else.
    pub place: Option<u8>,
    /// Whether the lane shows as disqualified under `dq_mode`.
    pub is_dq: bool,
    pub dq_mode: DqMode,
}

/// Non-fatal observations made while reconciling a heat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileWarning {
    /// A result exists for a heat no start list describes.
    NoMatchingStartList { event: EventNumber, heat: u32 },
    /// A lane had watch times but they were withheld.
    SuppressedTime { lane: u8, reason: SuppressReason },
}

impl fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingStartList { event, heat } => {
                write!(f, "no start list for {}", HeatKey::new(event.clone(), *heat))
            }
            Self::SuppressedTime { lane, reason } => write!(f, "lane {lane}: time withheld, {reason}"),
        }
    }
}

/// A reconciled heat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub event: EventNumber,
    pub heat: u32,
    /// From the start list, when there is one.
    pub event_name: Option<String>,
    pub heat_count: Option<u8>,
    pub rows: Vec<ReconciledRow>,
    pub warnings: Vec<ReconcileWarning>,
}

/// Final time for one lane, before places are assigned.
fn lane_time(lane: &LaneResult, config: &ReconcileConfig) -> FinalTime {
    if lane.is_empty {
        return FinalTime::Suppressed(SuppressReason::Empty);
    }
    if lane.is_dq && config.dq_mode == DqMode::HideTime {
        return FinalTime::Suppressed(SuppressReason::Disqualified);
    }

    let times: Vec<RaceTime> = lane.recorded_times().collect();
    if times.is_empty() {
        return FinalTime::Suppressed(SuppressReason::NoTimes);
    }
    if times.len() < config.min_times {
        return FinalTime::Suppressed(SuppressReason::TooFewTimes {
            recorded: times.len(),
            required: config.min_times,
        });
    }
    let Some(mean) = RaceTime::mean(&times) else {
        return FinalTime::Suppressed(SuppressReason::NoTimes);
    };
    let deviation = times
        .iter()
        .map(|t| t.abs_diff(mean))
        .max()
        .unwrap_or(RaceTime::ZERO);
    if deviation > config.time_threshold {
        return FinalTime::Suppressed(SuppressReason::Spread { deviation });
    }
    FinalTime::Time(mean)
}

/// Place = 1 + number of strictly faster lanes; ties share a place.
fn assign_places(rows: &mut [ReconciledRow]) {
    let placed: Vec<RaceTime> = rows
        .iter()
        .filter(|row| !row.is_dq)
        .filter_map(|row| row.final_time.time())
        .collect();
    for row in rows.iter_mut().filter(|row| !row.is_dq) {
        let Some(time) = row.final_time.time() else {
            continue;
        };
        let faster = placed.iter().filter(|&&other| other < time).count();
        row.place = u8::try_from(faster + 1).ok().filter(|&p| p <= PLACES_SHOWN);
    }
}

/// Reconciles one heat.
///
/// Never fails: lanes without data produce placeholder rows. Exactly
/// `config.lane_count` rows are returned, lane 1 first.
pub fn reconcile(
    key: &HeatKey,
    start_list: Option<&StartList>,
    result: Option<&RaceResult>,
    config: &ReconcileConfig,
) -> Reconciliation {
    let mut warnings = Vec::new();
    let has_heat = start_list.is_some_and(|list| key.heat <= u32::from(list.heat_count()));
    if result.is_some() && !has_heat {
        warnings.push(ReconcileWarning::NoMatchingStartList {
            event: key.event.clone(),
            heat: key.heat,
        });
    }

    let lane_count = config.lane_count.clamp(1, MAX_LANES);
    let mut rows: Vec<ReconciledRow> = (1..=lane_count)
        .map(|lane_no| {
            let entry = start_list.and_then(|list| list.entry(key.heat, lane_no));
            let lane = result.and_then(|r| r.lane(lane_no));
            let (final_time, is_dq) = match (result, lane) {
                (None, _) => (FinalTime::Suppressed(SuppressReason::NoResult), false),
                (Some(_), None) => (FinalTime::Suppressed(SuppressReason::NoTimes), false),
                (Some(_), Some(lane)) => (
                    lane_time(lane, config),
                    lane.is_dq && !lane.is_empty && config.dq_mode != DqMode::Ignore,
                ),
            };
            if let FinalTime::Suppressed(reason @ (SuppressReason::TooFewTimes { .. } | SuppressReason::Spread { .. })) =
                final_time
            {
                warnings.push(ReconcileWarning::SuppressedTime { lane: lane_no, reason });
            }

            let empty = lane.is_some_and(|l| l.is_empty);
            let (names, team) = match entry {
                Some(entry) if !empty => (entry.names.clone(), entry.team.clone()),
                _ => (Vec::new(), None),
            };
            ReconciledRow {
                lane: lane_no,
                names,
                team,
                final_time,
                place: None,
                is_dq,
                dq_mode: config.dq_mode,
            }
        })
        .collect();
    assign_places(&mut rows);

    for warning in &warnings {
        tracing::debug!(heat = %key, %warning, "reconciliation warning");
    }

    Reconciliation {
        event: key.event.clone(),
        heat: key.heat,
        event_name: start_list.map(|list| list.event.name.clone()),
        heat_count: start_list.map(StartList::heat_count),
        rows,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Event, Round, StartListEntry};
    use crate::parse::ResultFormat;

    fn t(s: &str) -> RaceTime {
        s.parse().unwrap()
    }

    fn ev(s: &str) -> EventNumber {
        EventNumber::new(s).unwrap()
    }

    fn result_with(lanes: &[(u8, &[&str])]) -> RaceResult {
        let mut result = RaceResult::new(ev("12"), 3, ResultFormat::DolphinCsv);
        for &(lane, times) in lanes {
            result.lanes[usize::from(lane - 1)].times = times.iter().map(|s| Some(t(s))).collect();
        }
        result
    }

    fn start_list(entries: &[(u8, &str)]) -> StartList {
        StartList {
            event: Event::new(ev("12"), "GIRLS 100 FREE", Round::All, 3, 1).unwrap(),
            entries: entries
                .iter()
                .map(|&(lane, name)| StartListEntry {
                    event: ev("12"),
                    heat: 3,
                    lane,
                    names: vec![name.to_string()],
                    team: Some("WAHOO".to_string()),
                })
                .collect(),
        }
    }

    fn config(min_times: usize) -> ReconcileConfig {
        ReconcileConfig {
            min_times,
            ..ReconcileConfig::default()
        }
    }

    fn key() -> HeatKey {
        HeatKey::new(ev("12"), 3)
    }

    #[test]
    fn scoreboard_example_heat() {
        let mut result = result_with(&[
            (1, &["1:02.34", "1:02.35", "1:02.36"]),
            (2, &["1:05.00"]),
            (3, &["1:01.00"]),
        ]);
        result.lanes[2].is_empty = true;
        let list = start_list(&[(1, "Doe, Jane"), (3, "Roe, Rita")]);
        let cfg = ReconcileConfig {
            lane_count: 6,
            ..config(2)
        };

        let heat = reconcile(&key(), Some(&list), Some(&result), &cfg);
        assert_eq!(heat.rows.len(), 6);
        assert_eq!(heat.event_name.as_deref(), Some("GIRLS 100 FREE"));

        let lane1 = &heat.rows[0];
        assert_eq!(lane1.final_time, FinalTime::Time(t("1:02.35")));
        assert_eq!(lane1.place, Some(1));
        assert_eq!(lane1.names, ["Doe, Jane"]);

        let lane2 = &heat.rows[1];
        assert_eq!(
            lane2.final_time,
            FinalTime::Suppressed(SuppressReason::TooFewTimes {
                recorded: 1,
                required: 2
            })
        );
        assert_eq!(lane2.place, None);
        assert!(lane2.names.is_empty());

        let lane3 = &heat.rows[2];
        assert_eq!(lane3.final_time, FinalTime::Suppressed(SuppressReason::Empty));
        assert_eq!(lane3.place, None);
        assert!(lane3.names.is_empty());
        assert_eq!(lane3.team, None);

        assert_eq!(
            heat.warnings,
            [ReconcileWarning::SuppressedTime {
                lane: 2,
                reason: SuppressReason::TooFewTimes {
                    recorded: 1,
                    required: 2
                }
            }]
        );
    }

    #[test]
    fn start_list_without_result_still_shows_names() {
        let list = start_list(&[(4, "Jane Doe")]);
        let heat = reconcile(&key(), Some(&list), None, &config(1));
        assert!(heat.warnings.is_empty());
        let lane4 = &heat.rows[3];
        assert_eq!(lane4.names, ["Jane Doe"]);
        assert_eq!(lane4.final_time, FinalTime::Suppressed(SuppressReason::NoResult));
        assert!(heat.rows.iter().all(|row| row.place.is_none()));
    }

    #[test]
    fn result_without_start_list_warns_and_keeps_rows() {
        let result = result_with(&[(1, &["30.00"])]);
        let heat = reconcile(&key(), None, Some(&result), &config(1));
        assert_eq!(heat.rows.len(), 10);
        assert_eq!(heat.rows[0].final_time, FinalTime::Time(t("30.00")));
        assert!(heat.rows[0].names.is_empty());
        assert_eq!(
            heat.warnings,
            [ReconcileWarning::NoMatchingStartList {
                event: ev("12"),
                heat: 3
            }]
        );
    }

    #[test]
    fn spread_over_threshold_is_withheld_regardless_of_count() {
        let result = result_with(&[(1, &["30.00", "30.00", "30.70"])]);
        let heat = reconcile(&key(), None, Some(&result), &config(1));
        assert!(matches!(
            heat.rows[0].final_time,
            FinalTime::Suppressed(SuppressReason::Spread { .. })
        ));
    }

    #[test]
    fn spread_at_threshold_is_shown() {
        // Mean 30.30; both watches are exactly 0.30 away.
        let result = result_with(&[(1, &["30.00", "30.60"])]);
        let heat = reconcile(&key(), None, Some(&result), &config(1));
        assert_eq!(heat.rows[0].final_time, FinalTime::Time(t("30.30")));
    }

    #[test]
    fn final_time_is_the_truncated_mean_in_any_order() {
        let watches = ["52.87", "52.91", "52.88"];
        let mut reversed = watches;
        reversed.reverse();
        let a = reconcile(&key(), None, Some(&result_with(&[(1, &watches)])), &config(1));
        let b = reconcile(&key(), None, Some(&result_with(&[(1, &reversed)])), &config(1));
        assert_eq!(a.rows[0].final_time, FinalTime::Time(t("52.88")));
        assert_eq!(a.rows[0].final_time, b.rows[0].final_time);
    }

    #[test]
    fn zero_and_missing_watches_do_not_count() {
        let mut result = result_with(&[]);
        result.lanes[0].times = vec![Some(RaceTime::ZERO), None, Some(t("31.00"))];
        let heat = reconcile(&key(), None, Some(&result), &config(2));
        assert_eq!(
            heat.rows[0].final_time,
            FinalTime::Suppressed(SuppressReason::TooFewTimes {
                recorded: 1,
                required: 2
            })
        );
        assert_eq!(
            heat.rows[1].final_time,
            FinalTime::Suppressed(SuppressReason::NoTimes)
        );
    }

    #[test]
    fn ties_share_a_place_and_only_three_are_placed() {
        let result = result_with(&[
            (1, &["30.00"]),
            (2, &["29.00"]),
            (3, &["30.00"]),
            (4, &["31.00"]),
            (5, &["28.00"]),
        ]);
        let heat = reconcile(&key(), None, Some(&result), &config(1));
        let places: Vec<Option<u8>> = heat.rows[..5].iter().map(|r| r.place).collect();
        assert_eq!(places, [Some(3), Some(2), Some(3), None, Some(1)]);
    }

    #[test]
    fn dq_modes() {
        let mut result = result_with(&[(1, &["28.00"]), (2, &["29.00"])]);
        result.lanes[0].is_dq = true;

        let mode = |dq_mode| ReconcileConfig {
            dq_mode,
            ..config(1)
        };

        let ignore = reconcile(&key(), None, Some(&result), &mode(DqMode::Ignore));
        assert_eq!(ignore.rows[0].place, Some(1));
        assert!(!ignore.rows[0].is_dq);

        let show = reconcile(&key(), None, Some(&result), &mode(DqMode::ShowWithTime));
        assert_eq!(show.rows[0].final_time, FinalTime::Time(t("28.00")));
        assert!(show.rows[0].is_dq);
        assert_eq!(show.rows[0].place, None);
        assert_eq!(show.rows[1].place, Some(1));

        let hide = reconcile(&key(), None, Some(&result), &mode(DqMode::HideTime));
        assert_eq!(
            hide.rows[0].final_time,
            FinalTime::Suppressed(SuppressReason::Disqualified)
        );
        assert_eq!(hide.rows[1].place, Some(1));
    }

    #[test]
    fn config_validation() {
        assert!(ReconcileConfig::default().validate().is_ok());
        let bad_lanes = ReconcileConfig {
            lane_count: 5,
            ..ReconcileConfig::default()
        };
        assert_eq!(bad_lanes.validate(), Err(ConfigError::LaneCount(5)));
        assert_eq!(config(0).validate(), Err(ConfigError::MinTimes));
    }

    #[test]
    fn dq_mode_parses_config_spellings() {
        assert_eq!("show-with-time".parse::<DqMode>().unwrap(), DqMode::ShowWithTime);
        assert_eq!("HIDE_TIME".parse::<DqMode>().unwrap(), DqMode::HideTime);
        assert!("sometimes".parse::<DqMode>().is_err());
    }
}
