use std::collections::HashMap;

use super::paths::join_path;
use super::trie::NodeKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub name: String,
    pub kind: NodeKind,
}

/// One level of a live directory listing.
#[allow(async_fn_in_trait)]
pub trait DirectoryListing {
    type Error;

    async fn list(&self, path: &str) -> Result<Vec<ListedEntry>, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
    pub path: String,
    pub directories: Vec<DirectoryNode>,
    pub files: Vec<String>,
    pub contains_files: bool,
}

impl DirectoryNode {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            directories: Vec::new(),
            files: Vec::new(),
            contains_files: false,
        }
    }

    /// Sets `contains_files` on this node and every descendant, children
    /// first, and returns the flag of this node.
    pub fn annotate(&mut self) -> bool {
        let mut contains = !self.files.is_empty();
        for child in &mut self.directories {
            contains = child.annotate() || contains;
        }
        self.contains_files = contains;
        contains
    }

    /// Shallowest descendants without files anywhere below them. This node
    /// is never part of the result. Requires [`DirectoryNode::annotate`].
    pub fn collect_fileless(&self) -> Vec<String> {
        let mut out = Vec::new();
        for child in &self.directories {
            if child.contains_files {
                out.extend(child.collect_fileless());
            } else {
                out.push(child.path.clone());
            }
        }
        out
    }
}

/// Lists `root` level by level and assembles the directory tree.
pub async fn fetch_structure<L: DirectoryListing>(
    listing: &L,
    root: &str,
) -> Result<DirectoryNode, L::Error> {
    let mut levels: HashMap<String, Vec<ListedEntry>> = HashMap::new();
    let mut pending = vec![root.to_string()];
    while let Some(path) = pending.pop() {
        let entries = listing.list(&path).await?;
        for entry in &entries {
            if entry.kind == NodeKind::Directory {
                pending.push(join_path(&path, &entry.name));
            }
        }
        levels.insert(path, entries);
    }
    Ok(assemble(root.to_string(), &mut levels))
}

fn assemble(path: String, levels: &mut HashMap<String, Vec<ListedEntry>>) -> DirectoryNode {
    let entries = levels.remove(&path).unwrap_or_default();
    let mut node = DirectoryNode::new(path);
    for entry in entries {
        let child = join_path(&node.path, &entry.name);
        match entry.kind {
            NodeKind::Directory => node.directories.push(assemble(child, levels)),
            NodeKind::File => node.files.push(child),
        }
    }
    node
}

/// Directories below `root` that can be removed because they hold no files.
pub async fn plan_prune<L: DirectoryListing>(
    listing: &L,
    root: &str,
) -> Result<Vec<String>, L::Error> {
    let mut tree = fetch_structure(listing, root).await?;
    tree.annotate();
    Ok(tree.collect_fileless())
}
