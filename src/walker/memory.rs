//! In-memory tree source
//!
//! Builds trees from relative paths and can inject listing and read
//! failures, either permanently or for a limited number of attempts.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{BenchError, Result};

use super::{DirListing, DirNode, FileNode, FsNode, TreeSource};

#[derive(Debug, Clone)]
enum MemNode {
    File(Bytes),
    Directory,
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    /// Attempts left to fail; `None` fails forever
    remaining: Option<u32>,
    /// Listing page at which the fault fires (0 = when opening)
    page: usize,
}

impl Fault {
    /// Consume one attempt; true if this attempt fails
    fn fire(&mut self) -> bool {
        match &mut self.remaining {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

/// A tree held entirely in memory
#[derive(Debug)]
pub struct MemoryTree {
    nodes: BTreeMap<PathBuf, MemNode>,
    page_size: usize,
    listing_faults: Mutex<HashMap<PathBuf, Fault>>,
    read_faults: Mutex<HashMap<PathBuf, Fault>>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            page_size: 16,
            listing_faults: Mutex::new(HashMap::new()),
            read_faults: Mutex::new(HashMap::new()),
        }
    }

    /// Children returned per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add a file, creating missing parent directories
    pub fn add_file(&mut self, path: impl AsRef<Path>, data: impl Into<Bytes>) -> &mut Self {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.nodes.insert(path.to_path_buf(), MemNode::File(data.into()));
        self
    }

    /// Add an (possibly empty) directory and its ancestors
    pub fn add_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.nodes
                .entry(ancestor.to_path_buf())
                .or_insert(MemNode::Directory);
        }
        self
    }

    /// Every listing of `path` fails
    pub fn fail_listing(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.insert_fault(true, path, None, 0)
    }

    /// The next `times` listings of `path` fail, later ones succeed
    pub fn fail_listing_times(&mut self, path: impl AsRef<Path>, times: u32) -> &mut Self {
        self.insert_fault(true, path, Some(times), 0)
    }

    /// Listings of `path` fail when asked for page `page` (1-based)
    pub fn fail_listing_at_page(&mut self, path: impl AsRef<Path>, page: usize) -> &mut Self {
        self.insert_fault(true, path, None, page)
    }

    /// Every read of the file at `path` fails
    pub fn fail_read(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.insert_fault(false, path, None, 0)
    }

    fn insert_fault(
        &mut self,
        listing: bool,
        path: impl AsRef<Path>,
        remaining: Option<u32>,
        page: usize,
    ) -> &mut Self {
        let faults = if listing {
            self.listing_faults.get_mut()
        } else {
            self.read_faults.get_mut()
        };
        faults.insert(path.as_ref().to_path_buf(), Fault { remaining, page });
        self
    }

    /// Node at `path`, if any
    pub fn node(&self, path: impl AsRef<Path>) -> Option<FsNode> {
        let path = path.as_ref();
        self.nodes.get(path).map(|n| to_fs_node(path, n))
    }

    /// Top-level nodes, as if the whole tree had been dropped at once
    pub fn roots(&self) -> Vec<FsNode> {
        self.children_of(Path::new(""))
    }

    pub fn file_count(&self) -> usize {
        self.nodes.values().filter(|n| matches!(n, MemNode::File(_))).count()
    }

    pub fn dir_count(&self) -> usize {
        self.nodes.values().filter(|n| matches!(n, MemNode::Directory)).count()
    }

    /// Sum of all file sizes
    pub fn total_size(&self) -> u64 {
        self.nodes
            .values()
            .map(|n| match n {
                MemNode::File(data) => data.len() as u64,
                MemNode::Directory => 0,
            })
            .sum()
    }

    fn children_of(&self, dir: &Path) -> Vec<FsNode> {
        self.nodes
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .map(|(path, node)| to_fs_node(path, node))
            .collect()
    }

    fn check_fault(faults: &Mutex<HashMap<PathBuf, Fault>>, path: &Path, page: usize) -> Result<()> {
        let fires = match faults.lock().get_mut(path) {
            Some(fault) => fault.page == page && fault.fire(),
            None => false,
        };
        if fires {
            return Err(BenchError::Traversal {
                path: path.to_path_buf(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl TreeSource for MemoryTree {
    fn open_dir(&self, dir: &DirNode) -> Result<Box<dyn DirListing + '_>> {
        match self.nodes.get(&dir.path) {
            Some(MemNode::Directory) => {}
            _ => {
                return Err(BenchError::Traversal {
                    path: dir.path.clone(),
                    reason: "no such directory".to_string(),
                })
            }
        }
        Self::check_fault(&self.listing_faults, &dir.path, 0)?;

        Ok(Box::new(MemoryListing {
            tree: self,
            dir: dir.path.clone(),
            children: self.children_of(&dir.path),
            served: 0,
            pages: 0,
        }))
    }

    fn read(&self, file: &FileNode) -> Result<Bytes> {
        Self::check_fault(&self.read_faults, &file.path, 0)?;
        match self.nodes.get(&file.path) {
            Some(MemNode::File(data)) => Ok(data.clone()),
            _ => Err(BenchError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {}", file.path.display()),
            ))),
        }
    }
}

struct MemoryListing<'a> {
    tree: &'a MemoryTree,
    dir: PathBuf,
    children: Vec<FsNode>,
    served: usize,
    pages: usize,
}

impl DirListing for MemoryListing<'_> {
    fn next_page(&mut self) -> Result<Vec<FsNode>> {
        self.pages += 1;
        MemoryTree::check_fault(&self.tree.listing_faults, &self.dir, self.pages)?;

        let end = (self.served + self.tree.page_size).min(self.children.len());
        let page = self.children[self.served..end].to_vec();
        self.served = end;
        Ok(page)
    }
}

fn to_fs_node(path: &Path, node: &MemNode) -> FsNode {
    match node {
        MemNode::File(_) => FsNode::file(path),
        MemNode::Directory => FsNode::directory(path),
    }
}
