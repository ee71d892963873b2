//! Display formatting for swimmer names.
//!
//! Start lists spell names `Last, First M`. Scoreboards often have room for
//! less, so every mode also has a chain of progressively shorter variants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMode {
    /// As written in the start list.
    #[default]
    Verbatim,
    /// `First`
    First,
    /// `First Last`
    FirstLast,
    /// `First L`
    FirstLastInitial,
    /// `Last, First`
    LastFirst,
    /// `Last, F`
    LastFirstInitial,
    /// `Last`
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown name mode: {0}")]
pub struct UnknownNameMode(pub String);

struct NameParts<'a> {
    last: &'a str,
    first: &'a str,
}

impl<'a> NameParts<'a> {
    /// `None` unless the name has both a last and a first part.
    fn split(name: &'a str) -> Option<Self> {
        let (last, rest) = name.split_once(',')?;
        let last = last.trim();
        let first = rest.split_whitespace().next()?;
        (!last.is_empty()).then_some(Self { last, first })
    }
}

fn initial(part: &str) -> &str {
    part.char_indices().nth(1).map_or(part, |(end, _)| &part[..end])
}

impl NameMode {
    pub const ALL: [Self; 7] = [
        Self::Verbatim,
        Self::First,
        Self::FirstLast,
        Self::FirstLastInitial,
        Self::LastFirst,
        Self::LastFirstInitial,
        Self::Last,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verbatim => "verbatim",
            Self::First => "first",
            Self::FirstLast => "first_last",
            Self::FirstLastInitial => "first_last_initial",
            Self::LastFirst => "last_first",
            Self::LastFirstInitial => "last_first_initial",
            Self::Last => "last",
        }
    }

    /// The next shorter mode, or `None` when only truncation is left.
    const fn shorter(self) -> Option<Self> {
        match self {
            Self::Verbatim => Some(Self::LastFirst),
            Self::LastFirst => Some(Self::LastFirstInitial),
            Self::LastFirstInitial => Some(Self::Last),
            Self::FirstLast => Some(Self::FirstLastInitial),
            Self::FirstLastInitial => Some(Self::First),
            Self::First | Self::Last => None,
        }
    }

    /// Formats a start-list name.
    ///
    /// Names that aren't `Last, First` come back trimmed but otherwise as is.
    #[must_use]
    pub fn arrange(self, name: &str) -> String {
        let Some(parts) = NameParts::split(name) else {
            return name.trim().to_string();
        };
        let NameParts { last, first } = parts;
        match self {
            Self::Verbatim => name.trim().to_string(),
            Self::First => first.to_string(),
            Self::FirstLast => format!("{first} {last}"),
            Self::FirstLastInitial => format!("{first} {}", initial(last)),
            Self::LastFirst => format!("{last}, {first}"),
            Self::LastFirstInitial => format!("{last}, {}", initial(first)),
            Self::Last => last.to_string(),
        }
    }

    /// The name in this mode followed by ever shorter alternatives, ending
    /// with the empty string.
    ///
    /// ```
    /// use wr_core::NameMode;
    /// assert_eq!(
    ///     NameMode::FirstLast.variants("Last, First M"),
    ///     ["First Last", "First L", "First", "Firs", "Fir", "Fi", "F", ""]
    /// );
    /// ```
    #[must_use]
    pub fn variants(self, name: &str) -> Vec<String> {
        let mut variants = vec![self.arrange(name)];
        let mut mode = self;
        while let Some(next) = mode.shorter() {
            variants.push(next.arrange(name));
            mode = next;
        }
        let mut tail = mode.arrange(name);
        while tail.pop().is_some() {
            variants.push(tail.clone());
        }
        variants
    }
}

impl fmt::Display for NameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NameMode {
    type Err = UnknownNameMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| UnknownNameMode(s.to_string()))
    }
}
