//! Local tree arena
//!
//! The scanner produces a [`LocalTree`]: a flat arena of [`LocalNode`]s
//! addressed by [`LocalNodeId`]. Parent and child relations are stored as
//! ids, never as references, so the tree can be mutated (checksums, folder
//! bindings) without aliasing concerns.
//!
//! ## Ordering
//!
//! `directories()` and `files()` list nodes in insertion order. A node can
//! only be inserted below a parent that already exists, so every directory
//! appears in `directories()` strictly before any of its descendants. The
//! folder-mapping stage relies on this.

use std::ops::Index;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::errors::DomainError;
use super::newtypes::{Checksum, RemoteId};

/// Index of a node inside a [`LocalTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalNodeId(usize);

impl LocalNodeId {
    /// Position of the node in the arena
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Remote folder a local directory has been mapped to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderBinding {
    /// The directory exists remotely under this id
    Remote(RemoteId),
    /// The directory is missing remotely and would be created (dry run)
    Planned,
}

impl FolderBinding {
    /// Remote id, if the folder exists remotely
    #[must_use]
    pub fn remote_id(&self) -> Option<&RemoteId> {
        match self {
            Self::Remote(id) => Some(id),
            Self::Planned => None,
        }
    }
}

/// A file, directory or symlink found by the scanner
#[derive(Debug, Clone)]
pub struct LocalNode {
    /// Base name of the entry
    pub name: String,
    /// Absolute path of the entry
    pub path: PathBuf,
    /// Size in bytes as reported by `lstat`
    pub size: u64,
    /// Last modification time
    pub modified: Option<DateTime<Utc>>,
    /// Last access time
    pub accessed: Option<DateTime<Utc>>,
    /// Inode status change time (`ctime`)
    pub changed: Option<DateTime<Utc>>,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// Whether the entry is a symbolic link (never followed)
    pub is_symlink: bool,
    /// MD5 of the content, set by the hasher for files
    pub checksum: Option<Checksum>,
    /// Remote folder this directory maps to, set during folder mapping
    pub binding: Option<FolderBinding>,
    parent: Option<LocalNodeId>,
    children: Vec<LocalNodeId>,
}

impl LocalNode {
    /// Create a directory node
    #[must_use]
    pub fn directory(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(name.into(), path.into(), 0, true, false)
    }

    /// Create a regular file node
    #[must_use]
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self::new(name.into(), path.into(), size, false, false)
    }

    /// Create a symlink leaf node
    #[must_use]
    pub fn symlink(name: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self::new(name.into(), path.into(), size, false, true)
    }

    fn new(name: String, path: PathBuf, size: u64, is_directory: bool, is_symlink: bool) -> Self {
        Self {
            name,
            path,
            size,
            modified: None,
            accessed: None,
            changed: None,
            is_directory,
            is_symlink,
            checksum: None,
            binding: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Attach timestamps read from the filesystem
    #[must_use]
    pub fn with_times(
        mut self,
        modified: Option<DateTime<Utc>>,
        accessed: Option<DateTime<Utc>>,
        changed: Option<DateTime<Utc>>,
    ) -> Self {
        self.modified = modified;
        self.accessed = accessed;
        self.changed = changed;
        self
    }

    /// Parent directory, `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<LocalNodeId> {
        self.parent
    }

    /// Children of a directory, in insertion order
    #[must_use]
    pub fn children(&self) -> &[LocalNodeId] {
        &self.children
    }

    /// Whether this is the scan root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Whether the node is a regular file (candidate for upload)
    #[must_use]
    pub fn is_file(&self) -> bool {
        !self.is_directory && !self.is_symlink
    }
}

/// In-memory representation of a scanned filesystem subtree
#[derive(Debug, Clone)]
pub struct LocalTree {
    nodes: Vec<LocalNode>,
    files: Vec<LocalNodeId>,
    directories: Vec<LocalNodeId>,
    total_size: u64,
}

impl LocalTree {
    /// Create a tree holding only its root node
    #[must_use]
    pub fn new(mut root: LocalNode) -> Self {
        root.parent = None;
        root.children.clear();

        let mut tree = Self {
            nodes: Vec::new(),
            files: Vec::new(),
            directories: Vec::new(),
            total_size: 0,
        };
        tree.insert(root);
        tree
    }

    fn insert(&mut self, node: LocalNode) -> LocalNodeId {
        let id = LocalNodeId(self.nodes.len());
        if node.is_directory {
            self.directories.push(id);
        } else if node.is_file() {
            self.total_size += node.size;
            self.files.push(id);
        }
        self.nodes.push(node);
        id
    }

    /// Insert `node` as the last child of `parent`
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if `parent` is unknown or is
    /// not a directory
    pub fn add_child(
        &mut self,
        parent: LocalNodeId,
        mut node: LocalNode,
    ) -> Result<LocalNodeId, DomainError> {
        match self.nodes.get(parent.0) {
            Some(p) if p.is_directory => {}
            Some(p) => {
                return Err(DomainError::ValidationFailed(format!(
                    "cannot add a child below non-directory {}",
                    p.path.display()
                )))
            }
            None => {
                return Err(DomainError::ValidationFailed(format!(
                    "unknown parent node {}",
                    parent.0
                )))
            }
        }

        node.parent = Some(parent);
        node.children.clear();
        let id = self.insert(node);
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    /// Id of the root node
    #[must_use]
    pub fn root(&self) -> LocalNodeId {
        LocalNodeId(0)
    }

    /// Look up a node by id
    #[must_use]
    pub fn get(&self, id: LocalNodeId) -> Option<&LocalNode> {
        self.nodes.get(id.0)
    }

    /// Mutable lookup of a node by id
    pub fn get_mut(&mut self, id: LocalNodeId) -> Option<&mut LocalNode> {
        self.nodes.get_mut(id.0)
    }

    /// Regular files, in scan order
    #[must_use]
    pub fn files(&self) -> &[LocalNodeId] {
        &self.files
    }

    /// Directories (root included), parents before descendants
    #[must_use]
    pub fn directories(&self) -> &[LocalNodeId] {
        &self.directories
    }

    /// Total size of all regular files in bytes
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of nodes of any kind
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds only its root
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Folder binding of the directory containing `id`
    #[must_use]
    pub fn parent_binding(&self, id: LocalNodeId) -> Option<&FolderBinding> {
        self.get(id)
            .and_then(LocalNode::parent)
            .and_then(|p| self.get(p))
            .and_then(|p| p.binding.as_ref())
    }

    /// Keep only the files for which `keep` returns true
    ///
    /// Dropped files stay in the arena (the tree shape is unchanged) but no
    /// longer appear in [`files`](Self::files). Returns the number removed.
    pub fn retain_files<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&LocalNode) -> bool,
    {
        let before = self.files.len();
        let nodes = &self.nodes;
        self.files.retain(|id| keep(&nodes[id.0]));
        before - self.files.len()
    }

    /// Path of `id` relative to the scan root
    #[must_use]
    pub fn relative_path(&self, id: LocalNodeId) -> Option<&Path> {
        let root = &self.nodes.first()?.path;
        self.get(id).and_then(|n| n.path.strip_prefix(root).ok())
    }

    /// Check the structural invariants of the arena
    ///
    /// - exactly one node (the first) has no parent
    /// - every parent/child reference points inside the arena and is mirrored
    /// - no node is its own ancestor
    ///
    /// # Errors
    /// Returns the first violated invariant
    pub fn validate(&self) -> Result<(), DomainError> {
        let roots = self.nodes.iter().filter(|n| n.parent.is_none()).count();
        match roots {
            0 => return Err(DomainError::MissingRoot),
            1 if self.nodes[0].parent.is_none() => {}
            1 => return Err(DomainError::MissingRoot),
            count => return Err(DomainError::MultipleRoots { count }),
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                let mirrored = self
                    .nodes
                    .get(parent.0)
                    .map(|p| p.children.contains(&LocalNodeId(index)))
                    .unwrap_or(false);
                if !mirrored {
                    return Err(DomainError::DanglingReference {
                        node: node.path.display().to_string(),
                        target: parent.0.to_string(),
                    });
                }
            }

            let mut hops = 0;
            let mut cursor = node.parent;
            while let Some(current) = cursor {
                if current.0 == index || hops > self.nodes.len() {
                    return Err(DomainError::Cycle(node.path.display().to_string()));
                }
                hops += 1;
                cursor = self.nodes.get(current.0).and_then(|n| n.parent);
            }
        }

        Ok(())
    }
}

impl Index<LocalNodeId> for LocalTree {
    type Output = LocalNode;

    fn index(&self, id: LocalNodeId) -> &Self::Output {
        &self.nodes[id.0]
    }
}
