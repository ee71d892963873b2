//! Ingestion of start-list and result files into the [`ResultStore`].
//!
//! The coordinator doesn't watch the file system itself. The caller passes
//! in change notifications (or asks for a full rescan) together with the
//! current time, which keeps the retry schedule testable.
//!
//! A file that fails to parse may simply still be being written, so a
//! failure is retried with exponential backoff. After the configured number
//! of attempts the file is reported as failed and left alone until it
//! changes again.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use serde::Serialize;

use crate::error::{ParseError, RecordWarning};
use crate::model::{EventNumber, HeatKey};
use crate::parse::{self, ResultFormat, read_start_list};
use crate::store::ResultStore;

/// How often and how quickly failed files are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before a file is reported as failed, including the first.
    /// Default: 5.
    pub max_attempts: u32,

    /// Wait after the first failure; doubles with each further failure.
    /// Default: 500ms.
    pub base_delay: Duration,

    /// Upper bound on the wait between attempts.
    /// Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait after the given (1-based) failed attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// What a file in one of the watched directories holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    StartList,
    Result(ResultFormat),
}

/// Outcome of processing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestReport {
    StartList {
        path: PathBuf,
        event: EventNumber,
        warnings: Vec<RecordWarning>,
    },
    Result {
        path: PathBuf,
        key: HeatKey,
        warnings: Vec<RecordWarning>,
    },
    /// The file failed to parse and will be tried again.
    Retrying {
        path: PathBuf,
        attempt: u32,
        #[serde(with = "duration_ms")]
        retry_in: Duration,
        error: String,
    },
    /// The file failed on every attempt.
    Failed {
        path: PathBuf,
        attempts: u32,
        error: String,
    },
    /// Not a start list or result file.
    Ignored { path: PathBuf },
}

impl IngestReport {
    pub fn path(&self) -> &Path {
        match self {
            Self::StartList { path, .. }
            | Self::Result { path, .. }
            | Self::Retrying { path, .. }
            | Self::Failed { path, .. }
            | Self::Ignored { path } => path,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u128(duration.as_millis())
    }
}

/// File identity for change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        meta.is_file().then(|| Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

#[derive(Debug)]
enum FileState {
    /// Parsed, stored or ignored.
    Done(Fingerprint),
    Pending {
        fingerprint: Fingerprint,
        attempts: u32,
        next_attempt: Instant,
    },
    Failed(Fingerprint),
}

impl FileState {
    const fn fingerprint(&self) -> &Fingerprint {
        match self {
            Self::Done(fingerprint) | Self::Failed(fingerprint) | Self::Pending { fingerprint, .. } => fingerprint,
        }
    }
}

/// Classifies a file by extension, falling back to its contents.
///
/// Dolphin CSV files are only picked up when their name carries the event,
/// heat and race, which keeps the exported event list out.
pub fn classify(path: &Path) -> Option<FileKind> {
    if parse::is_start_list(path) {
        return Some(FileKind::StartList);
    }
    match ResultFormat::from_path(path) {
        Some(ResultFormat::DolphinCsv) => {
            let name = parse::file_identity(path).to_ascii_lowercase();
            ["event", "heat", "race"]
                .iter()
                .all(|part| name.contains(part))
                .then_some(FileKind::Result(ResultFormat::DolphinCsv))
        }
        Some(format) => Some(FileKind::Result(format)),
        None => {
            let bytes = fs::read(path).ok()?;
            parse::detect_format(path, &bytes).map(FileKind::Result)
        }
    }
}

/// Feeds changed files through the parsers into a shared [`ResultStore`].
#[derive(Debug)]
pub struct Coordinator {
    start_list_dir: PathBuf,
    results_dir: PathBuf,
    policy: RetryPolicy,
    store: Arc<ResultStore>,
    files: HashMap<PathBuf, FileState>,
}

impl Coordinator {
    pub fn new(start_list_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>, policy: RetryPolicy) -> Self {
        Self {
            start_list_dir: start_list_dir.into(),
            results_dir: results_dir.into(),
            policy,
            store: Arc::new(ResultStore::new()),
            files: HashMap::new(),
        }
    }

    /// The store this coordinator writes into.
    pub fn store(&self) -> Arc<ResultStore> {
        Arc::clone(&self.store)
    }

    /// Handles a change notification for one file.
    ///
    /// Returns `None` when there is nothing to do: the file is unchanged,
    /// gone, or waiting out its backoff.
    pub fn notify(&mut self, path: &Path, now: Instant) -> Option<IngestReport> {
        let Some(fingerprint) = Fingerprint::of(path) else {
            if self.files.remove(path).is_some() {
                tracing::debug!(path = ?path, "file removed");
            }
            return None;
        };

        let attempts = match self.files.get(path) {
            Some(state) if state.fingerprint() != &fingerprint => 0,
            Some(FileState::Pending {
                attempts, next_attempt, ..
            }) => {
                if *next_attempt > now {
                    return None;
                }
                *attempts
            }
            Some(FileState::Done(_) | FileState::Failed(_)) => return None,
            None => 0,
        };
        Some(self.process(path, fingerprint, attempts, now))
    }

    /// Lists both directories and processes every new or changed file,
    /// oldest first.
    pub fn rescan(&mut self, now: Instant) -> Vec<IngestReport> {
        let mut found: Vec<(Option<SystemTime>, PathBuf)> = Vec::new();
        let mut dirs = vec![self.start_list_dir.clone()];
        if self.results_dir != self.start_list_dir {
            dirs.push(self.results_dir.clone());
        }
        for dir in dirs {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(dir = ?dir, error = %e, "cannot list directory");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if let Some(fingerprint) = Fingerprint::of(&path) {
                    found.push((fingerprint.modified, path));
                }
            }
        }
        found.sort();

        // Forget files that disappeared.
        self.files.retain(|path, _| found.iter().any(|(_, p)| p == path));

        found
            .into_iter()
            .filter_map(|(_, path)| self.notify(&path, now))
            .collect()
    }

    /// Re-attempts files whose backoff has expired.
    pub fn retry_due(&mut self, now: Instant) -> Vec<IngestReport> {
        let mut due: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|(_, state)| matches!(state, FileState::Pending { next_attempt, .. } if *next_attempt <= now))
            .map(|(path, _)| path.clone())
            .collect();
        due.sort();
        due.into_iter().filter_map(|path| self.notify(&path, now)).collect()
    }

    /// When the next retry is due, if any file is waiting for one.
    pub fn next_retry(&self) -> Option<Instant> {
        self.files
            .values()
            .filter_map(|state| match state {
                FileState::Pending { next_attempt, .. } => Some(*next_attempt),
                _ => None,
            })
            .min()
    }

    fn process(&mut self, path: &Path, fingerprint: Fingerprint, prior_attempts: u32, now: Instant) -> IngestReport {
        let Some(kind) = classify(path) else {
            tracing::debug!(path = ?path, "ignoring unrecognized file");
            self.files.insert(path.to_path_buf(), FileState::Done(fingerprint));
            return IngestReport::Ignored {
                path: path.to_path_buf(),
            };
        };

        tracing::debug!(path = ?path, kind = ?kind, attempt = prior_attempts + 1, "parsing");
        match self.ingest(path, kind) {
            Ok(report) => {
                self.files.insert(path.to_path_buf(), FileState::Done(fingerprint));
                report
            }
            Err(err) => {
                let attempts = prior_attempts + 1;
                let error = err.to_string();
                if attempts >= self.policy.max_attempts {
                    tracing::warn!(path = ?path, attempts, error = %error, "giving up on file");
                    self.files.insert(path.to_path_buf(), FileState::Failed(fingerprint));
                    IngestReport::Failed {
                        path: path.to_path_buf(),
                        attempts,
                        error,
                    }
                } else {
                    let retry_in = self.policy.delay(attempts);
                    tracing::debug!(path = ?path, attempts, error = %error, ?retry_in, "parse failed, will retry");
                    self.files.insert(
                        path.to_path_buf(),
                        FileState::Pending {
                            fingerprint,
                            attempts,
                            next_attempt: now + retry_in,
                        },
                    );
                    IngestReport::Retrying {
                        path: path.to_path_buf(),
                        attempt: attempts,
                        retry_in,
                        error,
                    }
                }
            }
        }
    }

    fn ingest(&self, path: &Path, kind: FileKind) -> Result<IngestReport, ParseError> {
        let parsed = match kind {
            FileKind::StartList => {
                let parsed = read_start_list(path)?;
                let event = parsed.value.event.number.clone();
                tracing::info!(path = ?path, event = %event, heats = parsed.value.heat_count(), "loaded start list");
                self.store.put_start_list(parsed.value);
                return Ok(IngestReport::StartList {
                    path: path.to_path_buf(),
                    event,
                    warnings: log_warnings(path, parsed.warnings),
                });
            }
            FileKind::Result(format) => format.read(path)?,
        };
        let key = parsed.value.key();
        tracing::info!(path = ?path, heat = %key, format = %parsed.value.format, "ingested result");
        self.store.put_result(parsed.value);
        Ok(IngestReport::Result {
            path: path.to_path_buf(),
            key,
            warnings: log_warnings(path, parsed.warnings),
        })
    }
}

fn log_warnings(path: &Path, warnings: Vec<RecordWarning>) -> Vec<RecordWarning> {
    for warning in &warnings {
        tracing::warn!(path = ?path, %warning, "record skipped");
    }
    warnings
}
