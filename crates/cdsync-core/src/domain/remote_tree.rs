//! Remote nodes and the remote folder tree
//!
//! The remote store reports a flat list of nodes, each carrying the ids of
//! its parents. [`RemoteTree::build`] joins those ids into parent/child
//! links held in an arena, designates the single root and rejects listings
//! that contain cycles.

use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::names::names_match;
use super::newtypes::{Checksum, RemoteId};

/// Kind of a remote node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteKind {
    /// A folder that can hold other nodes
    Folder,
    /// A file with content
    File,
}

impl RemoteKind {
    /// Wire representation (`FOLDER` / `FILE`)
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "FOLDER",
            Self::File => "FILE",
        }
    }
}

impl Display for RemoteKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("FOLDER") {
            Ok(Self::Folder)
        } else if s.eq_ignore_ascii_case("FILE") {
            Ok(Self::File)
        } else {
            Err(DomainError::InvalidKind(s.to_string()))
        }
    }
}

/// Backend-held metadata record for a folder or file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Opaque backend identifier
    pub id: RemoteId,
    /// Node name (empty for the root)
    pub name: String,
    /// Folder or file
    pub kind: RemoteKind,
    /// Ids of the containing folders (the backend allows several)
    pub parents: Vec<RemoteId>,
    /// Content checksum (files only)
    pub checksum: Option<Checksum>,
    /// Content size in bytes (files only)
    pub size: Option<u64>,
    /// Whether the backend flags this node as the drive root
    pub is_root: bool,
}

impl RemoteNode {
    /// Create a folder node
    #[must_use]
    pub fn folder(id: RemoteId, name: impl Into<String>, parents: Vec<RemoteId>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: RemoteKind::Folder,
            parents,
            checksum: None,
            size: None,
            is_root: false,
        }
    }

    /// Create a file node
    #[must_use]
    pub fn file(
        id: RemoteId,
        name: impl Into<String>,
        parents: Vec<RemoteId>,
        checksum: Option<Checksum>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind: RemoteKind::File,
            parents,
            checksum,
            size: None,
            is_root: false,
        }
    }

    /// Mark the node as the drive root
    #[must_use]
    pub fn into_root(mut self) -> Self {
        self.is_root = true;
        self
    }

    /// Whether `parent` is one of this node's parents
    #[must_use]
    pub fn has_parent(&self, parent: &RemoteId) -> bool {
        self.parents.iter().any(|p| p == parent)
    }
}

/// Folder listing with parent/child links and a designated root
#[derive(Debug, Clone)]
pub struct RemoteTree {
    nodes: Vec<RemoteNode>,
    index: HashMap<RemoteId, usize>,
    parent_links: Vec<Vec<usize>>,
    child_links: Vec<Vec<usize>>,
    root: usize,
}

impl RemoteTree {
    /// Link a flat listing into a tree
    ///
    /// Parent ids that are not part of the listing are kept on the node but
    /// produce no link.
    ///
    /// # Errors
    /// - `DomainError::ValidationFailed` if an id appears twice
    /// - `DomainError::MissingRoot` / `MultipleRoots` unless exactly one node is flagged root
    /// - `DomainError::Cycle` if some node is its own ancestor
    pub fn build(nodes: Vec<RemoteNode>) -> Result<Self, DomainError> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), position).is_some() {
                return Err(DomainError::ValidationFailed(format!(
                    "duplicate remote id {}",
                    node.id
                )));
            }
        }

        let mut parent_links = vec![Vec::new(); nodes.len()];
        let mut child_links = vec![Vec::new(); nodes.len()];
        for (position, node) in nodes.iter().enumerate() {
            for parent in &node.parents {
                if let Some(&p) = index.get(parent) {
                    parent_links[position].push(p);
                    child_links[p].push(position);
                }
            }
        }

        let roots: Vec<usize> = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_root)
            .map(|(i, _)| i)
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(DomainError::MissingRoot),
            [single] => *single,
            many => return Err(DomainError::MultipleRoots { count: many.len() }),
        };

        let tree = Self {
            nodes,
            index,
            parent_links,
            child_links,
            root,
        };
        tree.check_acyclic()?;
        Ok(tree)
    }

    /// Kahn's algorithm over parent -> child links; any node left unvisited
    /// sits on a cycle.
    fn check_acyclic(&self) -> Result<(), DomainError> {
        let mut pending: Vec<usize> = self.parent_links.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(i, _)| i)
            .collect();

        let mut visited = 0;
        while let Some(current) = queue.pop_front() {
            visited += 1;
            for &child in &self.child_links[current] {
                pending[child] -= 1;
                if pending[child] == 0 {
                    queue.push_back(child);
                }
            }
        }

        if visited == self.nodes.len() {
            return Ok(());
        }

        let offender = pending
            .iter()
            .position(|degree| *degree > 0)
            .map(|i| self.nodes[i].id.to_string())
            .unwrap_or_default();
        Err(DomainError::Cycle(offender))
    }

    /// The unique root node
    #[must_use]
    pub fn root(&self) -> &RemoteNode {
        &self.nodes[self.root]
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty (never true for a built tree)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node by id
    #[must_use]
    pub fn get(&self, id: &RemoteId) -> Option<&RemoteNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Nodes listing `id` among their parents
    pub fn children<'a>(&'a self, id: &RemoteId) -> impl Iterator<Item = &'a RemoteNode> + 'a {
        let links = self
            .index
            .get(id)
            .map(|&i| self.child_links[i].as_slice())
            .unwrap_or(&[]);
        links.iter().map(move |&c| &self.nodes[c])
    }

    /// Parents of `id` that are part of the listing
    pub fn parents<'a>(&'a self, id: &RemoteId) -> impl Iterator<Item = &'a RemoteNode> + 'a {
        let links = self
            .index
            .get(id)
            .map(|&i| self.parent_links[i].as_slice())
            .unwrap_or(&[]);
        links.iter().map(move |&p| &self.nodes[p])
    }

    /// Find a child of `parent` whose name matches `name` case-insensitively
    #[must_use]
    pub fn find_child(&self, parent: &RemoteId, name: &str) -> Option<&RemoteNode> {
        self.children(parent).find(|n| names_match(&n.name, name))
    }

    /// Add a node created after the listing was fetched
    ///
    /// The node is linked below every listed parent. A new node has no
    /// children yet, so no cycle can be introduced.
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` if the id is already present
    pub fn insert(&mut self, mut node: RemoteNode) -> Result<(), DomainError> {
        if self.index.contains_key(&node.id) {
            return Err(DomainError::ValidationFailed(format!(
                "duplicate remote id {}",
                node.id
            )));
        }

        node.is_root = false;
        let position = self.nodes.len();
        let parents: Vec<usize> = node
            .parents
            .iter()
            .filter_map(|p| self.index.get(p).copied())
            .collect();
        for &p in &parents {
            self.child_links[p].push(position);
        }
        self.index.insert(node.id.clone(), position);
        self.parent_links.push(parents);
        self.child_links.push(Vec::new());
        self.nodes.push(node);
        Ok(())
    }
}
