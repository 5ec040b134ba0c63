//! Walker Module
//!
//! Turns a set of tree roots into a flat, lazily expanding traversal.
//!
//! ## Responsibilities
//! - Explicit FIFO queue seeded with the roots
//! - Drain paginated directory listings until an empty page
//! - Isolate listing failures per directory
//!
//! ```text
//!   roots ──► [ queue ] ──pop──► File ──────────► WalkEvent::File
//!                ▲                Directory ──┬─► WalkEvent::Directory
//!                │                            │
//!                └──────── children ◄─────────┘   (or WalkEvent::Failed)
//! ```
//!
//! File contents are not read here; the consumer calls `TreeSource::read`
//! so a failing read is isolated to that one file.

mod local;
mod memory;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{BenchError, Result};

pub use local::LocalTree;
pub use memory::MemoryTree;

// =============================================================================
// Tree Nodes
// =============================================================================

/// A file within a tree source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub name: String,
    pub path: PathBuf,
}

/// A directory within a tree source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirNode {
    pub name: String,
    pub path: PathBuf,
}

/// Either a file or a directory, never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsNode {
    File(FileNode),
    Directory(DirNode),
}

impl FsNode {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        FsNode::File(FileNode {
            name: node_name(&path),
            path,
        })
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        FsNode::Directory(DirNode {
            name: node_name(&path),
            path,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            FsNode::File(f) => &f.name,
            FsNode::Directory(d) => &d.name,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            FsNode::File(f) => &f.path,
            FsNode::Directory(d) => &d.path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FsNode::File(_))
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FsNode::Directory(_))
    }
}

fn node_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

// =============================================================================
// Tree Sources
// =============================================================================

/// A paginated directory listing
///
/// `next_page` returns an empty page once the listing is exhausted.
pub trait DirListing {
    fn next_page(&mut self) -> Result<Vec<FsNode>>;
}

/// Where tree nodes come from: the local filesystem, memory, ...
pub trait TreeSource {
    /// Start listing a directory's children
    fn open_dir(&self, dir: &DirNode) -> Result<Box<dyn DirListing + '_>>;

    /// Materialize a file's bytes
    fn read(&self, file: &FileNode) -> Result<Bytes>;
}

// =============================================================================
// Traversal
// =============================================================================

/// One step of a walk
#[derive(Debug)]
pub enum WalkEvent {
    /// A file ready to be read by the consumer
    File(FileNode),

    /// A directory was listed; its children are queued
    Directory { node: DirNode, children: usize },

    /// A directory could not be listed; none of its children are queued
    Failed { path: PathBuf, error: BenchError },
}

/// Counters accumulated by a walk
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    pub files: u64,
    pub dirs: u64,
    pub errors: u64,
}

/// Breadth-first (FIFO) traversal over a `TreeSource`
///
/// One node is fully processed, listing included, before the next is popped.
pub struct TreeWalker<'a> {
    source: &'a dyn TreeSource,
    queue: VecDeque<FsNode>,
    stats: WalkStats,
}

impl<'a> TreeWalker<'a> {
    pub fn new(source: &'a dyn TreeSource, roots: impl IntoIterator<Item = FsNode>) -> Self {
        Self {
            source,
            queue: roots.into_iter().collect(),
            stats: WalkStats::default(),
        }
    }

    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    /// Nodes discovered but not yet visited
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drain every page of a directory listing
    fn list_all(&self, dir: &DirNode) -> Result<Vec<FsNode>> {
        let mut listing = self.source.open_dir(dir)?;
        let mut children = Vec::new();
        loop {
            let page = listing.next_page()?;
            if page.is_empty() {
                return Ok(children);
            }
            children.extend(page);
        }
    }
}

impl<'a> Iterator for TreeWalker<'a> {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        let node = self.queue.pop_front()?;

        match node {
            FsNode::File(file) => {
                self.stats.files += 1;
                Some(WalkEvent::File(file))
            }
            FsNode::Directory(dir) => {
                self.stats.dirs += 1;
                match self.list_all(&dir) {
                    Ok(children) => {
                        let count = children.len();
                        self.queue.extend(children);
                        Some(WalkEvent::Directory {
                            node: dir,
                            children: count,
                        })
                    }
                    Err(error) => {
                        self.stats.errors += 1;
                        tracing::warn!(path = %dir.path.display(), %error, "directory listing failed");
                        Some(WalkEvent::Failed {
                            path: dir.path,
                            error,
                        })
                    }
                }
            }
        }
    }
}
