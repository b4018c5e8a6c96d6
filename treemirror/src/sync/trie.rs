use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrieError {
    #[error("invalid node kind: {0}")]
    InvalidKind(String),
    #[error("path has no segments: {0:?}")]
    EmptyPath(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Directory => "directory",
            NodeKind::File => "file",
        }
    }

    pub fn parse(value: &str) -> Result<Self, TrieError> {
        match value {
            "directory" => Ok(NodeKind::Directory),
            "file" => Ok(NodeKind::File),
            other => Err(TrieError::InvalidKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrieNode<D> {
    children: BTreeMap<String, TrieNode<D>>,
    kind: Option<NodeKind>,
    data: Option<D>,
}

impl<D> TrieNode<D> {
    fn empty() -> Self {
        Self {
            children: BTreeMap::new(),
            kind: None,
            data: None,
        }
    }

    pub fn kind(&self) -> Option<NodeKind> {
        self.kind
    }

    pub fn data(&self) -> Option<&D> {
        self.data.as_ref()
    }

    pub fn child(&self, name: &str) -> Option<&TrieNode<D>> {
        self.children.get(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &TrieNode<D>)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    fn set_data_subtree(&mut self, data: &Option<D>)
    where
        D: Clone,
    {
        self.data = data.clone();
        for child in self.children.values_mut() {
            child.set_data_subtree(data);
        }
    }
}

/// Result of [`PathTrie::find`]. A routing node created only to reach a
/// deeper insertion is `found` with neither kind nor data.
#[derive(Debug, PartialEq)]
pub struct Lookup<'a, D> {
    pub found: bool,
    pub kind: Option<NodeKind>,
    pub data: Option<&'a D>,
}

impl<D> Lookup<'_, D> {
    fn missing() -> Self {
        Self {
            found: false,
            kind: None,
            data: None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct TrieEntry<'a, D> {
    pub path: String,
    pub kind: Option<NodeKind>,
    pub data: Option<&'a D>,
}

/// Prefix tree over `/`-separated paths.
///
/// Serializes as a flat sequence of `{path, kind, data}` records in
/// depth-first order, so the encoded nesting does not grow with path depth.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTrie<D> {
    root: TrieNode<D>,
}

impl<D> Default for PathTrie<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> PathTrie<D> {
    pub fn new() -> Self {
        Self {
            root: TrieNode::empty(),
        }
    }

    /// Inserts `path`, creating untyped intermediate nodes as needed, and
    /// overwrites kind and data on the terminal node.
    pub fn insert(&mut self, path: &str, kind: NodeKind, data: Option<D>) -> Result<(), TrieError> {
        if segments(path).next().is_none() {
            return Err(TrieError::EmptyPath(path.to_string()));
        }
        let node = self.node_or_insert(path);
        node.kind = Some(kind);
        node.data = data;
        Ok(())
    }

    pub fn find(&self, path: &str) -> Lookup<'_, D> {
        match self.get_node(path) {
            Some(node) => Lookup {
                found: true,
                kind: node.kind,
                data: node.data.as_ref(),
            },
            None => Lookup::missing(),
        }
    }

    fn node_or_insert(&mut self, path: &str) -> &mut TrieNode<D> {
        let mut node = &mut self.root;
        for segment in segments(path) {
            node = node
                .children
                .entry(segment.to_string())
                .or_insert_with(TrieNode::empty);
        }
        node
    }

    pub fn get_node(&self, path: &str) -> Option<&TrieNode<D>> {
        let mut node = &self.root;
        for segment in segments(path) {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    pub fn get_node_mut(&mut self, path: &str) -> Option<&mut TrieNode<D>> {
        let mut node = &mut self.root;
        for segment in segments(path) {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }

    /// Sets `data` on the node at `path` and on every node below it,
    /// whatever their kind. Returns `false` when `path` is unknown.
    pub fn set_data_recursive(&mut self, path: &str, data: Option<D>) -> bool
    where
        D: Clone,
    {
        match self.get_node_mut(path) {
            Some(node) => {
                node.set_data_subtree(&data);
                true
            }
            None => false,
        }
    }

    /// Detaches the node at `path` together with its subtree.
    pub fn remove(&mut self, path: &str) -> bool {
        let parts: Vec<&str> = segments(path).collect();
        let Some((last, parents)) = parts.split_last() else {
            return false;
        };
        let mut node = &mut self.root;
        for segment in parents {
            node = match node.children.get_mut(*segment) {
                Some(child) => child,
                None => return false,
            };
        }
        node.children.remove(*last).is_some()
    }

    /// Depth-first traversal starting at (and including) `start`. Children
    /// are visited in segment order. An unknown `start` yields nothing.
    pub fn iter(&self, start: &str) -> TrieIter<'_, D> {
        let stack = match self.get_node(start) {
            Some(node) => vec![(canonical_path(start), node)],
            None => Vec::new(),
        };
        TrieIter { stack }
    }

    /// Number of nodes that carry a kind.
    pub fn len(&self) -> usize {
        self.iter("").filter(|entry| entry.kind.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Serialize)]
struct RecordRef<'a, D> {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<NodeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a D>,
}

#[derive(Deserialize)]
struct Record<D> {
    path: String,
    kind: Option<NodeKind>,
    data: Option<D>,
}

impl<D: Serialize> Serialize for PathTrie<D> {
    /// Writes every node carrying a kind or data, plus bare leaves, so that
    /// decoding rebuilds the same tree.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut records = Vec::new();
        let mut stack = vec![("/".to_string(), &self.root)];
        while let Some((path, node)) = stack.pop() {
            for (name, child) in node.children.iter().rev() {
                stack.push((join(&path, name), child));
            }
            let is_root = std::ptr::eq(node, &self.root);
            let bare_leaf = node.children.is_empty() && !is_root;
            if node.kind.is_some() || node.data.is_some() || bare_leaf {
                records.push(RecordRef {
                    path,
                    kind: node.kind,
                    data: node.data.as_ref(),
                });
            }
        }
        serializer.collect_seq(records)
    }
}

impl<'de, D: Deserialize<'de>> Deserialize<'de> for PathTrie<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> Result<Self, De::Error> {
        let records = Vec::<Record<D>>::deserialize(deserializer)?;
        let mut trie = PathTrie::new();
        for record in records {
            let node = trie.node_or_insert(&record.path);
            node.kind = record.kind;
            node.data = record.data;
        }
        Ok(trie)
    }
}

pub struct TrieIter<'a, D> {
    stack: Vec<(String, &'a TrieNode<D>)>,
}

impl<'a, D> Iterator for TrieIter<'a, D> {
    type Item = TrieEntry<'a, D>;

    fn next(&mut self) -> Option<Self::Item> {
        let (path, node) = self.stack.pop()?;
        for (name, child) in node.children.iter().rev() {
            self.stack.push((join(&path, name), child));
        }
        Some(TrieEntry {
            path,
            kind: node.kind,
            data: node.data.as_ref(),
        })
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn canonical_path(path: &str) -> String {
    let joined = segments(path).collect::<Vec<_>>().join("/");
    format!("/{joined}")
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
#[path = "trie_tests.rs"]
mod tests;
