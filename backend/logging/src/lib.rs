//! Console interception and telemetry for capforge sessions.
//!
//! Stdout belongs to session output; everything here writes to stderr or to
//! NDJSON telemetry files.

pub mod console;
pub mod telemetry;

pub use console::{intercept_console, ConsoleGuard};
pub use telemetry::{Telemetry, TelemetryEvent};
