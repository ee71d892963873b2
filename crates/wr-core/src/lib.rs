//! Core logic for Wahoo! Results.
//!
//! This crate contains:
//! - Parsers for CTS start lists and the Dolphin and generic result formats
//! - Reconciliation of raw watch times into one official time per lane
//! - A shared store of the latest start lists and results
//! - Ingestion with retry of files that are still being written
//! - The event list export for the Dolphin software

pub mod codepage;
mod error;
pub mod export;
pub mod ingest;
mod model;
mod names;
pub mod parse;
pub mod reconcile;
mod store;
mod time;

pub use error::{ParseError, Parsed, RecordWarning};
pub use export::dolphin_events_csv;
pub use ingest::{Coordinator, FileKind, IngestReport, RetryPolicy};
pub use model::{
    Event, EventNumber, HeatKey, LaneResult, MAX_LANES, NumberingMode, RaceResult, Round,
    StartList, StartListEntry, ValidationError,
};
pub use names::{NameMode, UnknownNameMode};
pub use parse::{ResultFormat, read_result, read_start_list, scan_start_lists};
pub use reconcile::{
    DqMode, FinalTime, ReconcileConfig, ReconcileWarning, ReconciledRow, Reconciliation,
    SuppressReason, reconcile,
};
pub use store::ResultStore;
pub use time::RaceTime;
