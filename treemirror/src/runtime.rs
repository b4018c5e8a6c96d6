use std::collections::HashSet;

use anyhow::Context;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use transfer_api::{MkdirOutcome, TaskStatus, TransferClient};

use crate::config::MirrorConfig;
use crate::remote::RemoteSession;
use crate::sync::detector::ChangeDetector;
use crate::sync::paths::{ancestors_below, remap};
use crate::sync::pruner::plan_prune;
use crate::sync::scanner::{DiskTree, LocalTree};
use crate::sync::stamp::Stamp;
use crate::sync::store::{MirrorState, StateStore};
use crate::sync::tracker::DeletionTracker;
use crate::sync::trie::NodeKind;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub new_paths: usize,
    pub directories_created: usize,
    pub files_submitted: usize,
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub vanished: usize,
    /// Confirmed files held back because they changed after their transfer.
    pub held_back: usize,
    pub files_deleted: usize,
    pub delete_task: Option<String>,
    pub delete_status: Option<TaskStatus>,
    pub directories_pruned: usize,
    pub prune_task: Option<String>,
    pub outstanding_tasks: usize,
}

pub struct MirrorRuntime {
    config: MirrorConfig,
    store: StateStore,
    remote: RemoteSession,
}

impl MirrorRuntime {
    pub fn new(config: MirrorConfig, store: StateStore, remote: RemoteSession) -> Self {
        Self {
            config,
            store,
            remote,
        }
    }

    pub async fn bootstrap(config: MirrorConfig) -> anyhow::Result<Self> {
        let token = config.require_token()?.to_string();
        let client = match config.api_url.as_deref() {
            Some(url) => TransferClient::with_base_url(url, token),
            None => TransferClient::new(token),
        }
        .context("failed to build transfer client")?;
        let store = open_store(&config).await?;
        let remote = RemoteSession::new(client, &config.src_endpoint, &config.dst_endpoint);
        Ok(Self::new(config, store, remote))
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Submits whatever changed since the last run.
    pub async fn run_transfer(&self) -> anyhow::Result<TransferReport> {
        let mut state = self.store.load().await.context("failed to load state")?;
        let mut detector =
            ChangeDetector::from_trie(&self.config.src_dir, std::mem::take(&mut state.trie))?;
        let outcome = self
            .transfer_body(&mut detector, &mut state.active_tasks)
            .await;
        state.trie = detector.into_trie();
        finish(&self.store, &state, outcome).await
    }

    /// Deletes confirmed source files, then prunes directories left without
    /// files.
    pub async fn run_delete(&self) -> anyhow::Result<DeleteReport> {
        let mut state = self.store.load().await.context("failed to load state")?;
        let mut detector =
            ChangeDetector::from_trie(&self.config.src_dir, std::mem::take(&mut state.trie))?;
        let outcome = self
            .delete_files(&mut detector, &mut state.active_tasks)
            .await;
        state.trie = detector.into_trie();
        let mut report = finish(&self.store, &state, outcome).await?;

        if let Some(task_id) = report.delete_task.as_deref() {
            let waited = self
                .remote
                .wait_for_task(
                    task_id,
                    self.config.delete_wait,
                    self.config.delete_poll_interval,
                )
                .await;
            match waited {
                Ok(status) if status.is_terminal() => {
                    info!(task_id, ?status, "delete task finished");
                    report.delete_status = Some(status);
                }
                Ok(status) => {
                    warn!(task_id, ?status, "delete task still running, pruning anyway");
                    report.delete_status = Some(status);
                }
                Err(err) => {
                    warn!(task_id, error = %err, "polling delete task failed, pruning anyway");
                }
            }
        }

        let mut detector =
            ChangeDetector::from_trie(&self.config.src_dir, std::mem::take(&mut state.trie))?;
        let outcome = self.prune_directories(&mut detector, &mut report).await;
        state.trie = detector.into_trie();
        finish(&self.store, &state, outcome).await?;
        Ok(report)
    }

    async fn transfer_body(
        &self,
        detector: &mut ChangeDetector,
        active_tasks: &mut Vec<String>,
    ) -> anyhow::Result<TransferReport> {
        let started = OffsetDateTime::now_utc();
        let stamp = Stamp::from_datetime(started);
        let mut report = TransferReport {
            new_paths: detector
                .reconcile_new_paths(&DiskTree)
                .context("failed to scan source tree")?,
            ..TransferReport::default()
        };
        let plan = detector
            .compute_transfer_plan(&DiskTree)
            .context("failed to compute transfer plan")?;
        info!(
            new_paths = report.new_paths,
            directories = plan.directories.len(),
            files = plan.files.len(),
            "transfer plan computed"
        );

        let mut ensured = HashSet::new();
        for dir in &plan.directories {
            for ancestor in ancestors_below(dir, detector.top_dir()) {
                if ensured.insert(ancestor.clone()) {
                    self.make_destination_dir(&ancestor).await?;
                }
            }
            self.make_destination_dir(dir).await?;
            detector.mark_transferred([dir], NodeKind::Directory, &stamp, None)?;
            report.directories_created += 1;
        }

        if plan.files.is_empty() {
            return Ok(report);
        }
        let items = plan
            .files
            .iter()
            .map(|path| Ok((path.clone(), self.destination_for(path)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let task_id = self
            .remote
            .submit_transfer(items, started)
            .await
            .context("failed to submit transfer")?;
        detector.mark_transferred(&plan.files, NodeKind::File, &stamp, Some(&task_id))?;
        if !active_tasks.contains(&task_id) {
            active_tasks.push(task_id.clone());
        }
        info!(task_id = %task_id, files = plan.files.len(), "transfer submitted");
        report.files_submitted = plan.files.len();
        report.task_id = Some(task_id);
        Ok(report)
    }

    async fn delete_files(
        &self,
        detector: &mut ChangeDetector,
        active_tasks: &mut Vec<String>,
    ) -> anyhow::Result<DeleteReport> {
        let started = OffsetDateTime::now_utc();
        let mut tracker = DeletionTracker::from_trie(detector.trie(), active_tasks.clone());

        let mut live = HashSet::new();
        for entry in DiskTree.walk(detector.top_dir()) {
            let entry = entry.context("failed to scan source tree")?;
            if entry.kind == NodeKind::File {
                live.insert(entry.path);
            }
        }
        let vanished = tracker.prune_vanished(&live);
        for path in &vanished {
            warn!(path = %path, "tracked file vanished before deletion");
            detector.forget(path);
        }
        let mut report = DeleteReport {
            vanished: vanished.len(),
            ..DeleteReport::default()
        };

        let mut deletable = tracker
            .collect_deletable(&self.remote)
            .await
            .context("failed to query transfer tasks")?;
        let held_back = detector
            .modified_since_stamp(&DiskTree, &deletable)
            .context("failed to check source files")?;
        for path in &held_back {
            warn!(path = %path, "file changed after its transfer, keeping it");
            deletable.remove(path);
        }
        report.held_back = held_back.len();
        if deletable.is_empty() {
            info!(tracked = tracker.files().len(), "no confirmed files to delete");
        } else {
            let task_id = self
                .remote
                .submit_source_delete(&deletable, started)
                .await
                .context("failed to submit source delete")?;
            tracker.forget(&deletable);
            for path in &deletable {
                detector.forget(path);
            }
            info!(task_id = %task_id, files = deletable.len(), "source delete submitted");
            report.files_deleted = deletable.len();
            report.delete_task = Some(task_id);
        }

        let outstanding = tracker
            .reap_completed_tasks(&self.remote)
            .await
            .context("failed to reap transfer tasks")?;
        info!(outstanding = outstanding.len(), "transfer tasks reaped");
        report.outstanding_tasks = outstanding.len();
        *active_tasks = tracker.into_active_tasks();
        Ok(report)
    }

    async fn prune_directories(
        &self,
        detector: &mut ChangeDetector,
        report: &mut DeleteReport,
    ) -> anyhow::Result<()> {
        let started = OffsetDateTime::now_utc();
        let fileless = plan_prune(&self.remote, detector.top_dir())
            .await
            .context("failed to list source tree")?;
        if fileless.is_empty() {
            info!("no empty directories to prune");
            return Ok(());
        }
        let task_id = self
            .remote
            .submit_source_delete(&fileless, started)
            .await
            .context("failed to submit directory prune")?;
        for path in &fileless {
            debug!(path = %path, "pruning directory");
            detector.forget(path);
        }
        info!(task_id = %task_id, directories = fileless.len(), "directory prune submitted");
        report.directories_pruned = fileless.len();
        report.prune_task = Some(task_id);
        Ok(())
    }

    /// Creates the destination counterpart of source directory `dir`.
    async fn make_destination_dir(&self, dir: &str) -> anyhow::Result<()> {
        let target = self.destination_for(dir)?;
        let outcome = self
            .remote
            .make_destination_dir(&target)
            .await
            .with_context(|| format!("failed to create {target}"))?;
        match outcome {
            MkdirOutcome::Created => debug!(path = %target, "directory created"),
            MkdirOutcome::AlreadyExists => debug!(path = %target, "directory already exists"),
        }
        Ok(())
    }

    fn destination_for(&self, path: &str) -> anyhow::Result<String> {
        remap(path, &self.config.src_dir, &self.config.dst_dir)
            .with_context(|| format!("{path} is outside {}", self.config.src_dir))
    }
}

/// Overrides stamps below `path` (the source top directory by default).
/// Paths not tracked yet are picked up from disk first. Returns the number
/// of newly discovered paths.
pub async fn run_set_time(
    config: &MirrorConfig,
    store: &StateStore,
    path: Option<&str>,
    stamp: &Stamp,
) -> anyhow::Result<usize> {
    let mut state = store.load().await.context("failed to load state")?;
    let mut detector = ChangeDetector::from_trie(&config.src_dir, std::mem::take(&mut state.trie))?;
    let outcome = set_time_body(&mut detector, path, stamp);
    state.trie = detector.into_trie();
    finish(store, &state, outcome).await
}

fn set_time_body(
    detector: &mut ChangeDetector,
    path: Option<&str>,
    stamp: &Stamp,
) -> anyhow::Result<usize> {
    let added = detector
        .reconcile_new_paths(&DiskTree)
        .context("failed to scan source tree")?;
    let target = path.unwrap_or(detector.top_dir()).to_string();
    detector
        .reset_stamps(&target, stamp)
        .with_context(|| format!("failed to reset stamps below {target}"))?;
    info!(path = %target, stamp = %stamp, new_paths = added, "stamps reset");
    Ok(added)
}

pub async fn open_store(config: &MirrorConfig) -> anyhow::Result<StateStore> {
    StateStore::open(&config.state_path)
        .await
        .with_context(|| format!("failed to open state at {:?}", config.state_path))
}

/// Saves `state` whatever `outcome` is. The run error wins over a save error.
async fn finish<T>(
    store: &StateStore,
    state: &MirrorState,
    outcome: anyhow::Result<T>,
) -> anyhow::Result<T> {
    let saved = store.save(state).await.context("failed to save state");
    match (outcome, saved) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(save_err)) => Err(save_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(save_err)) => {
            warn!(error = %format!("{save_err:#}"), "state save failed after run error");
            Err(err)
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
