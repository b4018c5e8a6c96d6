use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use transfer_api::TaskStatus;

use super::detector::SyncTrie;
use super::trie::NodeKind;

/// Source of task statuses, usually the remote transfer service.
#[allow(async_fn_in_trait)]
pub trait TaskStatusLookup {
    type Error;

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, Self::Error>;
}

/// Decides which source files may be deleted: a file is deletable only
/// once the task that carried it reports `SUCCEEDED`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionTracker {
    files: BTreeMap<String, String>,
    active_tasks: Vec<String>,
}

impl DeletionTracker {
    pub fn new(files: BTreeMap<String, String>, active_tasks: Vec<String>) -> Self {
        Self {
            files,
            active_tasks,
        }
    }

    /// Tracks every file node whose last submission recorded a task.
    pub fn from_trie(trie: &SyncTrie, active_tasks: Vec<String>) -> Self {
        let files = trie
            .iter("")
            .filter(|entry| entry.kind == Some(NodeKind::File))
            .filter_map(|entry| {
                let task_id = entry.data?.task_id.clone()?;
                Some((entry.path, task_id))
            })
            .collect();
        Self::new(files, active_tasks)
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn active_tasks(&self) -> &[String] {
        &self.active_tasks
    }

    pub fn into_active_tasks(self) -> Vec<String> {
        self.active_tasks
    }

    pub fn record_submission<'p, I>(&mut self, paths: I, task_id: &str)
    where
        I: IntoIterator<Item = &'p String>,
    {
        for path in paths {
            self.files.insert(path.clone(), task_id.to_string());
        }
        if !self.active_tasks.iter().any(|id| id == task_id) {
            self.active_tasks.push(task_id.to_string());
        }
    }

    /// Drops tracked paths that no longer exist at the source. Returns them
    /// so the caller can forget them too; they are never deleted.
    pub fn prune_vanished(&mut self, live_paths: &HashSet<String>) -> Vec<String> {
        let vanished: Vec<String> = self
            .files
            .keys()
            .filter(|path| !live_paths.contains(*path))
            .cloned()
            .collect();
        for path in &vanished {
            self.files.remove(path);
        }
        vanished
    }

    /// Paths whose task has succeeded. Each distinct task is queried at
    /// most once per call.
    pub async fn collect_deletable<L: TaskStatusLookup>(
        &self,
        lookup: &L,
    ) -> Result<BTreeSet<String>, L::Error> {
        let mut statuses: HashMap<&str, bool> = HashMap::new();
        let mut deletable = BTreeSet::new();
        for (path, task_id) in &self.files {
            let succeeded = match statuses.get(task_id.as_str()) {
                Some(succeeded) => *succeeded,
                None => {
                    let succeeded = lookup.task_status(task_id).await? == TaskStatus::Succeeded;
                    statuses.insert(task_id.as_str(), succeeded);
                    succeeded
                }
            };
            if succeeded {
                deletable.insert(path.clone());
            }
        }
        Ok(deletable)
    }

    /// Keeps only the outstanding tasks that are still `ACTIVE` and returns
    /// them.
    pub async fn reap_completed_tasks<L: TaskStatusLookup>(
        &mut self,
        lookup: &L,
    ) -> Result<Vec<String>, L::Error> {
        let mut remaining = Vec::with_capacity(self.active_tasks.len());
        for task_id in &self.active_tasks {
            if lookup.task_status(task_id).await? == TaskStatus::Active {
                remaining.push(task_id.clone());
            }
        }
        self.active_tasks = remaining.clone();
        Ok(remaining)
    }

    pub fn forget<'p, I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = &'p String>,
    {
        for path in paths {
            self.files.remove(path);
        }
    }
}
