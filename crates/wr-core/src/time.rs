//! Fixed-point race times.
//!
//! Times are counted in whole hundredths of a second so that sums, spreads and
//! averages of watch readings are exact. Conversion to and from text happens
//! only at the edges (file parsing and display).

use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

const HUNDREDTHS_PER_SECOND: i64 = 100;
const HUNDREDTHS_PER_MINUTE: i64 = 60 * HUNDREDTHS_PER_SECOND;

/// Largest displayable time, `99:59.99`.
const DISPLAY_CAP: i64 = 100 * HUNDREDTHS_PER_MINUTE - 1;

/// Longest run of digits accepted for a single time component.
const MAX_COMPONENT_DIGITS: usize = 9;

/// A race time in hundredths of a second.
///
/// "No time recorded" is expressed as `Option<RaceTime>::None`, which keeps it
/// distinct from a recorded time of zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RaceTime(i64);

impl RaceTime {
    /// A time of zero.
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    #[must_use]
    pub const fn from_seconds(seconds: i64) -> Self {
        Self(seconds * HUNDREDTHS_PER_SECOND)
    }

    #[must_use]
    pub const fn hundredths(self) -> i64 {
        self.0
    }

    /// True for times strictly greater than zero.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Absolute difference between two times.
    #[must_use]
    pub const fn abs_diff(self, other: Self) -> Self {
        Self((self.0 - other.0).abs())
    }

    /// Arithmetic mean of the given times.
    ///
    /// The summed hundredths are divided by the count with truncation toward
    /// zero, so `10.25` and `10.00` average to `10.12`. Returns `None` for an
    /// empty slice.
    #[must_use]
    pub fn mean(times: &[Self]) -> Option<Self> {
        let count = i64::try_from(times.len()).ok().filter(|&n| n > 0)?;
        let sum: i64 = times.iter().map(|t| t.0).sum();
        Some(Self(sum / count))
    }

    /// Parses `SS`, `SS.H`, `SS.HH`, `M:SS.HH` or `MM:SS.HH`.
    ///
    /// Fractional digits past the hundredths are truncated.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidTimeFormat(text.to_string());
        let trimmed = text.trim();

        let (minutes, rest) = match trimmed.split_once(':') {
            Some((minutes, rest)) => (Some(parse_digits(minutes).ok_or_else(invalid)?), rest),
            None => (None, trimmed),
        };

        let (whole, fraction) = match rest.split_once('.') {
            Some((_, "")) => return Err(invalid()),
            Some((whole, fraction)) => (whole, fraction),
            None => (rest, ""),
        };
        let seconds = parse_digits(whole).ok_or_else(invalid)?;
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let mut digits = fraction.bytes().map(|b| i64::from(b - b'0'));
        let hundredths = digits.next().unwrap_or(0) * 10 + digits.next().unwrap_or(0);

        if minutes.is_some() && seconds >= 60 {
            return Err(invalid());
        }

        let total = minutes
            .unwrap_or(0)
            .checked_mul(HUNDREDTHS_PER_MINUTE)
            .and_then(|m| m.checked_add(seconds.checked_mul(HUNDREDTHS_PER_SECOND)?))
            .and_then(|t| t.checked_add(hundredths))
            .ok_or_else(invalid)?;
        Ok(Self(total))
    }
}

fn parse_digits(text: &str) -> Option<i64> {
    if text.is_empty()
        || text.len() > MAX_COMPONENT_DIGITS
        || !text.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    text.parse().ok()
}

impl FromStr for RaceTime {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RaceTime {
    /// `SS.HH` below one minute, `M:SS.HH` above, capped at `99:59.99`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            f.write_str("-")?;
        }
        let total = self.0.abs().min(DISPLAY_CAP);
        let minutes = total / HUNDREDTHS_PER_MINUTE;
        let seconds = (total % HUNDREDTHS_PER_MINUTE) / HUNDREDTHS_PER_SECOND;
        let hundredths = total % HUNDREDTHS_PER_SECOND;
        if minutes == 0 {
            write!(f, "{seconds:02}.{hundredths:02}")
        } else {
            write!(f, "{minutes}:{seconds:02}.{hundredths:02}")
        }
    }
}

impl Add for RaceTime {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for RaceTime {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Serialize for RaceTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Wire forms accepted when deserializing a time.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTime {
    Text(String),
    Seconds(f64),
}

impl<'de> Deserialize<'de> for RaceTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTime::deserialize(deserializer)? {
            RawTime::Text(text) => text.parse().map_err(serde::de::Error::custom),
            RawTime::Seconds(seconds) => {
                if !seconds.is_finite() || seconds < 0.0 || seconds > 1.0e9 {
                    return Err(serde::de::Error::custom(format!(
                        "time out of range: {seconds}"
                    )));
                }
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "range checked above; rounded once at the config boundary"
                )]
                let hundredths = (seconds * 100.0).round() as i64;
                Ok(Self(hundredths))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> RaceTime {
        s.parse().unwrap()
    }

    #[test]
    fn parses_seconds_only() {
        assert_eq!(t("23.45").hundredths(), 2345);
        assert_eq!(t("9.8").hundredths(), 980);
        assert_eq!(t("50").hundredths(), 5000);
        assert_eq!(t("00.01").hundredths(), 1);
    }

    #[test]
    fn parses_minutes_and_seconds() {
        assert_eq!(t("1:23.45").hundredths(), 8345);
        assert_eq!(t("30:00.00").hundredths(), 180_000);
        assert_eq!(t("99:59.99").hundredths(), 599_999);
    }

    #[test]
    fn truncates_extra_fraction_digits() {
        assert_eq!(t("10.987"), t("10.98"));
        assert_eq!(t("99.999"), t("99.99"));
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["", " ", "abc", "1:2:3", "1.2.3", "-1.00", "+1.00", "1:75.00", "12.", ".5", "1,5"] {
            let err = RaceTime::parse(bad).unwrap_err();
            assert!(
                matches!(err, ParseError::InvalidTimeFormat(_)),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn formats_like_a_scoreboard() {
        assert_eq!(RaceTime::ZERO.to_string(), "00.00");
        assert_eq!(t("0.01").to_string(), "00.01");
        assert_eq!(t("15.2").to_string(), "15.20");
        assert_eq!(t("120").to_string(), "2:00.00");
        assert_eq!(t("1800").to_string(), "30:00.00");
        assert_eq!(t("9000").to_string(), "99:59.99");
    }

    #[test]
    fn minute_strings_round_trip() {
        for minutes in 1..=99 {
            for (seconds, hundredths) in [(0, 0), (2, 35), (9, 9), (30, 1), (59, 99)] {
                let text = format!("{minutes}:{seconds:02}.{hundredths:02}");
                assert_eq!(t(&text).to_string(), text);
            }
        }
    }

    #[test]
    fn arithmetic_is_exact() {
        // 0.1 + 0.2 is the classic float trap.
        assert_eq!(t("0.10") + t("0.20"), t("0.30"));
        assert_eq!(t("1:02.36") - t("1:02.34"), t("0.02"));
        assert_eq!(t("25.00").abs_diff(t("25.30")), t("0.30"));
    }

    #[test]
    fn mean_truncates_toward_zero() {
        assert_eq!(RaceTime::mean(&[t("10.25"), t("10.00")]), Some(t("10.12")));
        assert_eq!(
            RaceTime::mean(&[t("1:02.34"), t("1:02.35"), t("1:02.36")]),
            Some(t("1:02.35"))
        );
        assert_eq!(RaceTime::mean(&[t("30.00"), t("30.01"), t("30.01")]), Some(t("30.00")));
        assert_eq!(RaceTime::mean(&[]), None);
    }

    #[test]
    fn mean_is_order_independent() {
        let times = [t("52.87"), t("53.38"), t("53.91"), t("53.02")];
        let mut reversed = times;
        reversed.reverse();
        assert_eq!(RaceTime::mean(&times), RaceTime::mean(&reversed));
    }

    #[test]
    fn serde_uses_display_form() {
        let json = serde_json::to_string(&t("1:02.35")).unwrap();
        assert_eq!(json, r#""1:02.35""#);
        let parsed: RaceTime = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, t("1:02.35"));
    }

    #[test]
    fn deserializes_fractional_seconds_once() {
        let parsed: RaceTime = serde_json::from_str("0.3").unwrap();
        assert_eq!(parsed, t("0.30"));
        assert!(serde_json::from_str::<RaceTime>("-1.0").is_err());
    }
}
