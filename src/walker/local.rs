//! Local filesystem tree source

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{BenchError, Result};

use super::{DirListing, DirNode, FileNode, FsNode, TreeSource};

/// Reads trees from the local filesystem, listing directories in pages
#[derive(Debug, Clone)]
pub struct LocalTree {
    page_size: usize,
}

impl LocalTree {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Build a root node for a path given on the command line
    ///
    /// A symlinked root is followed; links below it are not. Anything that
    /// is neither a file nor a directory is rejected.
    pub fn root(path: impl AsRef<Path>) -> Result<FsNode> {
        let path = path.as_ref();
        let meta = fs::metadata(path).map_err(|e| traversal(path, e))?;
        if meta.is_dir() {
            Ok(FsNode::directory(path))
        } else if meta.is_file() {
            Ok(FsNode::file(path))
        } else {
            Err(BenchError::Traversal {
                path: path.to_path_buf(),
                reason: "not a regular file or directory".to_string(),
            })
        }
    }
}

impl Default for LocalTree {
    fn default() -> Self {
        Self::new(100)
    }
}

impl TreeSource for LocalTree {
    fn open_dir(&self, dir: &DirNode) -> Result<Box<dyn DirListing + '_>> {
        let entries = fs::read_dir(&dir.path).map_err(|e| traversal(&dir.path, e))?;
        Ok(Box::new(LocalListing {
            dir: dir.path.clone(),
            entries,
            page_size: self.page_size,
        }))
    }

    fn read(&self, file: &FileNode) -> Result<Bytes> {
        Ok(Bytes::from(fs::read(&file.path)?))
    }
}

struct LocalListing {
    dir: PathBuf,
    entries: fs::ReadDir,
    page_size: usize,
}

impl DirListing for LocalListing {
    /// Symlinks inside the tree are skipped, never followed. An entry whose
    /// type cannot be determined is handed out as a file so that its read
    /// fails on its own instead of failing the page.
    fn next_page(&mut self) -> Result<Vec<FsNode>> {
        let mut page = Vec::with_capacity(self.page_size);

        while page.len() < self.page_size {
            let Some(entry) = self.entries.next() else {
                break;
            };
            let entry = entry.map_err(|e| traversal(&self.dir, e))?;
            let path = entry.path();

            match entry.file_type() {
                Ok(kind) if kind.is_symlink() => {
                    tracing::debug!(path = %path.display(), "skipping symlink");
                }
                Ok(kind) if kind.is_dir() => page.push(FsNode::directory(path)),
                Ok(kind) if kind.is_file() => page.push(FsNode::file(path)),
                Ok(_) => {
                    tracing::debug!(path = %path.display(), "skipping special file");
                }
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "cannot stat entry");
                    page.push(FsNode::file(path));
                }
            }
        }

        Ok(page)
    }
}

fn traversal(path: &Path, err: std::io::Error) -> BenchError {
    BenchError::Traversal {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
