//! # filebench
//!
//! Benchmarks ingesting a directory tree into a persistent key-value store:
//! - Walks the tree breadth-first with per-node error isolation
//! - Writes files in fixed-size, strictly durable transactions
//! - Reads them back in chunked read transactions
//! - Compares a raw transactional adapter with a typed wrapper, both over
//!   the same WAL + SSTable engine
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 BenchmarkSuite / Driver                      │
//! │        (walk-only, write, read; one run at a time)           │
//! └──────────┬──────────────────────────────┬───────────────────┘
//!            │                              │
//!            ▼                              ▼
//!   ┌─────────────────┐          ┌─────────────────────┐
//!   │   TreeWalker    │          │   FileStore trait   │
//!   │ (FIFO, paged)   │          │  Raw  │  Wrapped    │
//!   └─────────────────┘          └───────┬─────┬───────┘
//!                                        │     ▼
//!                                        │  Database
//!                                        ▼     │
//!                                ┌─────────────▼───────┐
//!                                │       Engine        │
//!                                │ WAL │ MemTable │ SST│
//!                                └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;

pub mod walker;
pub mod store;
pub mod bench;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BenchError, Result};
pub use config::Config;
pub use engine::Engine;
pub use store::{FileStore, Implementation, StoredRecord};
pub use bench::{BenchmarkDriver, BenchmarkResult, BenchmarkSuite};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of filebench
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
