//! capforge session runtime.
//!
//! Runs one non-interactive conversation to completion: streams agent output
//! as raw text or line-delimited JSON records, and forwards requested tool
//! calls to the executor strictly in arrival order.

pub mod capture_hint;
pub mod driver;
pub mod notes;
pub mod output;
pub mod replay;

pub use driver::{SessionDriver, SessionOutcome};
pub use output::{OutputMode, OutputSink};
pub use replay::ReplayClient;
