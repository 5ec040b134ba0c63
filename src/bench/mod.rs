//! Bench Module
//!
//! The benchmark harness: a driver for single runs and a suite that strings
//! runs together.
//!
//! ## Responsibilities
//! - Batch files from the walker into store transactions
//! - Count files, bytes, directories, errors and transactions per run
//! - Stamp timing on every exit path
//! - Keep runs from overlapping and publish results as they finish

mod driver;
mod result;
mod suite;

pub use driver::BenchmarkDriver;
pub use result::{format_bytes, BenchmarkKind, BenchmarkResult, RunOutcome};
pub use suite::{BenchmarkSuite, SuiteEntry, SuiteEvent, SuitePlan, SuiteReport, WriteMode};
