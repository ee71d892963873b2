//! CLI subcommand implementations.

pub mod export_events;
pub mod parse;
pub mod render;
pub mod scan;
pub mod show;
pub mod watch;
