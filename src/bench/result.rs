//! Benchmark result records

use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{BenchError, Result};
use crate::store::Implementation;

/// What a benchmark run measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BenchmarkKind {
    /// Traversal and file reads only, no store I/O
    WalkOnly,
    Write,
    Read,
}

impl fmt::Display for BenchmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchmarkKind::WalkOnly => f.write_str("walk-only"),
            BenchmarkKind::Write => f.write_str("write"),
            BenchmarkKind::Read => f.write_str("read"),
        }
    }
}

/// Counters and timing for one benchmark run
///
/// Created with `started_at` stamped, mutated by the driver while the run is
/// in progress, and finalized by `finish` on every exit path.
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub kind: BenchmarkKind,

    /// `None` for runs that never touch a store
    pub implementation: Option<Implementation>,

    pub started_at: Instant,

    /// Set by `finish`
    pub finished_at: Option<Instant>,

    /// `finished_at - started_at` once finished
    pub duration: Duration,

    /// Files processed successfully
    pub file_count: u64,

    /// Bytes of the files counted in `file_count`
    pub total_size: u64,

    /// Files or directories that failed (reads: failed runs)
    pub error_count: u64,

    /// Directories visited
    pub dir_count: u64,

    /// Store transactions committed (write) or opened (read)
    pub transactions: u64,
}

impl BenchmarkResult {
    pub fn start(kind: BenchmarkKind, implementation: Option<Implementation>) -> Self {
        Self {
            kind,
            implementation,
            started_at: Instant::now(),
            finished_at: None,
            duration: Duration::ZERO,
            file_count: 0,
            total_size: 0,
            error_count: 0,
            dir_count: 0,
            transactions: 0,
        }
    }

    /// Stamp the end time. Idempotent: a second call keeps the first stamp.
    pub fn finish(&mut self) {
        if self.finished_at.is_some() {
            return;
        }
        let now = Instant::now();
        self.finished_at = Some(now);
        self.duration = now.saturating_duration_since(self.started_at);
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Average time per processed file
    pub fn average_per_file(&self) -> Option<Duration> {
        if self.file_count == 0 {
            return None;
        }
        Some(self.duration.div_f64(self.file_count as f64))
    }

    /// Bytes per second over the whole run
    pub fn throughput(&self) -> Option<f64> {
        let secs = self.duration.as_secs_f64();
        (secs > 0.0).then(|| self.total_size as f64 / secs)
    }

    /// e.g. "write (raw)" or "walk-only"
    pub fn label(&self) -> String {
        match self.implementation {
            Some(implementation) => format!("{} ({})", self.kind, implementation),
            None => self.kind.to_string(),
        }
    }
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} files, {} dirs, {} in {:.2} ms",
            self.label(),
            self.file_count,
            self.dir_count,
            format_bytes(self.total_size),
            self.duration.as_secs_f64() * 1000.0
        )?;
        if let Some(avg) = self.average_per_file() {
            write!(f, " ({:.3} ms/file)", avg.as_secs_f64() * 1000.0)?;
        }
        write!(f, ", {} errors", self.error_count)
    }
}

/// The finalized result of a run plus the error that ended it, if any
#[derive(Debug)]
pub struct RunOutcome {
    pub result: BenchmarkResult,
    pub error: Option<BenchError>,
}

impl RunOutcome {
    /// Finalize `result` and pair it with the run's status
    pub(crate) fn finalize(mut result: BenchmarkResult, status: Result<()>) -> Self {
        result.finish();
        Self {
            result,
            error: status.err(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<BenchmarkResult> {
        match self.error {
            None => Ok(self.result),
            Some(e) => Err(e),
        }
    }
}

/// Human-readable byte count, 1024-based
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
