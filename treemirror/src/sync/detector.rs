use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::scanner::{LocalTree, ScanError};
use super::stamp::Stamp;
use super::trie::{NodeKind, PathTrie, TrieError};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),
    #[error("trie error: {0}")]
    Trie(#[from] TrieError),
    #[error("path {path} is not inside {top}")]
    OutsideTop { path: String, top: String },
    #[error("path is not tracked: {0}")]
    UnknownPath(String),
}

/// Last submission of a path: when it happened and, for files sent in a
/// batch, the task that carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMark {
    pub stamped_at: Stamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

pub type SyncTrie = PathTrie<TransferMark>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferPlan {
    /// Empty directories that file transfers alone would never create.
    pub directories: BTreeSet<String>,
    pub files: BTreeSet<String>,
}

impl TransferPlan {
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

pub struct ChangeDetector {
    top_dir: String,
    trie: SyncTrie,
}

impl ChangeDetector {
    pub fn new(top_dir: &str) -> Result<Self, DetectorError> {
        Self::from_trie(top_dir, SyncTrie::new())
    }

    /// Wraps a previously persisted trie, seeding the top directory if the
    /// trie does not know it yet.
    pub fn from_trie(top_dir: &str, mut trie: SyncTrie) -> Result<Self, DetectorError> {
        let top_dir = normalize_top(top_dir);
        if top_dir != "/" && trie.find(&top_dir).kind.is_none() {
            trie.insert(&top_dir, NodeKind::Directory, None)?;
        }
        Ok(Self { top_dir, trie })
    }

    pub fn top_dir(&self) -> &str {
        &self.top_dir
    }

    pub fn trie(&self) -> &SyncTrie {
        &self.trie
    }

    pub fn into_trie(self) -> SyncTrie {
        self.trie
    }

    /// Inserts every scanned path the trie does not know yet, unstamped.
    /// Known entries are left alone. Returns the number of new paths.
    pub fn reconcile_new_paths<T: LocalTree>(&mut self, tree: &T) -> Result<usize, DetectorError> {
        let mut added = 0;
        for entry in tree.walk(&self.top_dir) {
            let entry = entry?;
            if !self.trie.find(&entry.path).found {
                self.trie.insert(&entry.path, entry.kind, None)?;
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn compute_transfer_plan<T: LocalTree>(
        &self,
        tree: &T,
    ) -> Result<TransferPlan, DetectorError> {
        let mut plan = TransferPlan::default();
        for entry in self.trie.iter("") {
            let Some(kind) = entry.kind else {
                continue;
            };
            match kind {
                NodeKind::Directory => {
                    if entry.data.is_some() || !self.contains(&entry.path) {
                        continue;
                    }
                    if let Some(probe) = tree.probe(&entry.path)?
                        && probe.kind == NodeKind::Directory
                        && probe.is_empty
                    {
                        plan.directories.insert(entry.path);
                    }
                }
                NodeKind::File => {
                    let Some(probe) = tree.probe(&entry.path)? else {
                        continue;
                    };
                    if probe.kind != NodeKind::File {
                        continue;
                    }
                    let stale = match entry.data {
                        None => true,
                        Some(mark) => mark.stamped_at < probe.modified,
                    };
                    if stale {
                        plan.files.insert(entry.path);
                    }
                }
            }
        }
        Ok(plan)
    }

    /// Those of `paths` whose file on disk changed after its stamp, or that
    /// were never stamped. Their confirmed transfer carried older content.
    pub fn modified_since_stamp<'p, T, I>(
        &self,
        tree: &T,
        paths: I,
    ) -> Result<BTreeSet<String>, DetectorError>
    where
        T: LocalTree,
        I: IntoIterator<Item = &'p String>,
    {
        let mut modified = BTreeSet::new();
        for path in paths {
            let Some(probe) = tree.probe(path)? else {
                continue;
            };
            let newer = match self.trie.find(path).data {
                Some(mark) => mark.stamped_at < probe.modified,
                None => true,
            };
            if newer {
                modified.insert(path.clone());
            }
        }
        Ok(modified)
    }

    pub fn mark_transferred<'p, I>(
        &mut self,
        paths: I,
        kind: NodeKind,
        stamp: &Stamp,
        task_id: Option<&str>,
    ) -> Result<(), DetectorError>
    where
        I: IntoIterator<Item = &'p String>,
    {
        for path in paths {
            let mark = TransferMark {
                stamped_at: stamp.clone(),
                task_id: task_id.map(str::to_string),
            };
            self.trie.insert(path, kind, Some(mark))?;
        }
        Ok(())
    }

    /// Overrides the stamp of `path` and everything below it, e.g. to skip
    /// old files or to force a retransfer.
    pub fn reset_stamps(&mut self, path: &str, stamp: &Stamp) -> Result<(), DetectorError> {
        let path = normalize_top(path);
        if !self.contains(&path) {
            return Err(DetectorError::OutsideTop {
                path,
                top: self.top_dir.clone(),
            });
        }
        if self.trie.find(&path).kind.is_none() {
            return Err(DetectorError::UnknownPath(path));
        }
        let mark = TransferMark {
            stamped_at: stamp.clone(),
            task_id: None,
        };
        self.trie.set_data_recursive(&path, Some(mark));
        Ok(())
    }

    pub fn forget(&mut self, path: &str) -> bool {
        self.trie.remove(path)
    }

    fn contains(&self, path: &str) -> bool {
        if self.top_dir == "/" {
            return true;
        }
        path == self.top_dir
            || path
                .strip_prefix(&self.top_dir)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

fn normalize_top(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
