//! Benchmark Suite
//!
//! Runs a sequence of benchmarks, one at a time, publishing each result as
//! soon as it is final.
//!
//! ```text
//!   walk-only ─► [ for each implementation:                        ]
//!                [   (fresh? destroy) ─► open ─► write ─► read      ]
//!                [   ─► close ─► destroy   (best effort, logged)    ]
//! ```
//!
//! A failed benchmark is logged and reported; the suite moves on. Failing
//! to open a store ends the session.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::Sender;

use crate::config::Config;
use crate::error::{BenchError, Result};
use crate::store::{new_store, FileStore, Implementation};
use crate::walker::{FsNode, TreeSource};

use super::driver::BenchmarkDriver;
use super::result::{BenchmarkKind, BenchmarkResult, RunOutcome};

/// Whether the write benchmark starts from an empty store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Destroy the store before writing: every put is an insert
    #[default]
    Fresh,
    /// Keep whatever a previous session left: same-named files overwrite
    Overwrite,
}

/// What a suite run should do
#[derive(Debug, Clone)]
pub struct SuitePlan {
    pub include_walk_only: bool,
    pub implementations: Vec<Implementation>,
    pub write_mode: WriteMode,
    /// Leave the stores on disk after the session
    pub keep_stores: bool,
}

impl Default for SuitePlan {
    fn default() -> Self {
        Self {
            include_walk_only: true,
            implementations: Implementation::ALL.to_vec(),
            write_mode: WriteMode::Fresh,
            keep_stores: false,
        }
    }
}

/// One finished benchmark
#[derive(Debug, Clone)]
pub struct SuiteEntry {
    pub result: BenchmarkResult,
    /// Why the run ended early, if it did
    pub error: Option<String>,
}

/// Progress notifications, in order
#[derive(Debug, Clone)]
pub enum SuiteEvent {
    Started {
        kind: BenchmarkKind,
        implementation: Option<Implementation>,
    },
    Finished(SuiteEntry),
    Completed,
}

/// Everything a suite run produced
#[derive(Debug, Default, Clone)]
pub struct SuiteReport {
    pub entries: Vec<SuiteEntry>,
}

impl SuiteReport {
    pub fn result(&self, kind: BenchmarkKind, implementation: Option<Implementation>) -> Option<&BenchmarkResult> {
        self.entries
            .iter()
            .map(|e| &e.result)
            .find(|r| r.kind == kind && r.implementation == implementation)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SuiteEntry> {
        self.entries.iter().filter(|e| e.error.is_some())
    }
}

/// Runs benchmark suites; at most one run at a time
pub struct BenchmarkSuite {
    config: Config,
    running: AtomicBool,
}

impl BenchmarkSuite {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run `plan` over `roots`, sending progress to `events`
    ///
    /// Returns `RunInProgress` if another run holds the suite. A closed
    /// event channel does not stop the run.
    pub fn run(
        &self,
        source: &dyn TreeSource,
        roots: &[FsNode],
        plan: &SuitePlan,
        events: &Sender<SuiteEvent>,
    ) -> Result<SuiteReport> {
        let _guard = RunGuard::acquire(&self.running)?;
        self.config.validate()?;

        let driver = BenchmarkDriver::new(source);
        let mut report = SuiteReport::default();

        if plan.include_walk_only {
            publish(events, SuiteEvent::Started {
                kind: BenchmarkKind::WalkOnly,
                implementation: None,
            });
            record(&mut report, events, driver.walk_only(roots));
        }

        for &implementation in &plan.implementations {
            let mut store = new_store(implementation, &self.config);
            let session = Self::run_store(&driver, roots, store.as_mut(), plan, &mut report, events);
            Self::teardown(store.as_mut(), plan.keep_stores);

            if let Err(e) = session {
                tracing::error!(%implementation, "store session aborted: {}", e);
                publish(events, SuiteEvent::Completed);
                return Err(e);
            }
        }

        publish(events, SuiteEvent::Completed);
        Ok(report)
    }

    /// Open, write, read. Only an open failure is returned.
    fn run_store(
        driver: &BenchmarkDriver<'_>,
        roots: &[FsNode],
        store: &mut dyn FileStore,
        plan: &SuitePlan,
        report: &mut SuiteReport,
        events: &Sender<SuiteEvent>,
    ) -> Result<()> {
        let implementation = Some(store.implementation());

        if plan.write_mode == WriteMode::Fresh {
            if let Err(e) = store.destroy() {
                tracing::warn!(?implementation, "could not clear store before write: {}", e);
            }
        }
        store.open()?;

        publish(events, SuiteEvent::Started {
            kind: BenchmarkKind::Write,
            implementation,
        });
        record(report, events, driver.write(roots, store));

        publish(events, SuiteEvent::Started {
            kind: BenchmarkKind::Read,
            implementation,
        });
        record(report, events, driver.read(store));

        Ok(())
    }

    /// Close and (unless kept) destroy; failures are logged, never raised
    fn teardown(store: &mut dyn FileStore, keep: bool) {
        let implementation = store.implementation();
        if let Err(e) = store.close() {
            tracing::warn!(%implementation, "close failed: {}", e);
        }
        if !keep {
            if let Err(e) = store.destroy() {
                tracing::warn!(%implementation, "destroy failed: {}", e);
            }
        }
    }
}

fn record(report: &mut SuiteReport, events: &Sender<SuiteEvent>, outcome: RunOutcome) {
    let RunOutcome { result, error } = outcome;
    let error = error.map(|e| {
        tracing::error!(benchmark = %result.label(), "benchmark failed: {}", e);
        e.to_string()
    });
    tracing::info!("{}", result);

    let entry = SuiteEntry { result, error };
    publish(events, SuiteEvent::Finished(entry.clone()));
    report.entries.push(entry);
}

fn publish(events: &Sender<SuiteEvent>, event: SuiteEvent) {
    if events.send(event).is_err() {
        tracing::debug!("suite event dropped: receiver gone");
    }
}

/// Holds the "run in progress" flag for the duration of a run
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BenchError::RunInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
