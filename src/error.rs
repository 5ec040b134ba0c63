//! Error types for filebench
//!
//! Provides a unified error type for the engine, the store adapters and the
//! benchmark harness.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using BenchError
pub type Result<T> = std::result::Result<T, BenchError>;

/// Unified error type for filebench operations
#[derive(Debug, Error)]
pub enum BenchError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    #[error("Store is closed: {0}")]
    StoreClosed(String),

    #[error("Schema error: {0}")]
    Schema(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Traversal Errors
    // -------------------------------------------------------------------------
    #[error("Traversal error at {path}: {reason}")]
    Traversal { path: PathBuf, reason: String },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("A benchmark run is already in progress")]
    RunInProgress,
}

impl From<bincode::Error> for BenchError {
    fn from(err: bincode::Error) -> Self {
        BenchError::Serialization(err.to_string())
    }
}
