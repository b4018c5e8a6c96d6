use std::time::Duration;

use time::OffsetDateTime;
use transfer_api::{
    DeleteRequest, EntryType, MkdirOutcome, SYNC_LEVEL_CHECKSUM, TaskKind, TaskStatus,
    TransferClient, TransferError, TransferRequest, task_label,
};

use crate::sync::pruner::{DirectoryListing, ListedEntry};
use crate::sync::tracker::TaskStatusLookup;
use crate::sync::trie::NodeKind;

/// A transfer client bound to the source and destination endpoints.
#[derive(Clone)]
pub struct RemoteSession {
    client: TransferClient,
    src_endpoint: String,
    dst_endpoint: String,
}

impl RemoteSession {
    pub fn new(
        client: TransferClient,
        src_endpoint: impl Into<String>,
        dst_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            src_endpoint: src_endpoint.into(),
            dst_endpoint: dst_endpoint.into(),
        }
    }

    pub async fn make_destination_dir(&self, path: &str) -> Result<MkdirOutcome, TransferError> {
        self.client.make_directory(&self.dst_endpoint, path).await
    }

    /// Submits one checksum-verified, encrypted batch of
    /// `(source, destination)` pairs and returns the task id.
    pub async fn submit_transfer<I>(
        &self,
        items: I,
        at: OffsetDateTime,
    ) -> Result<String, TransferError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let submission_id = self.client.submission_id().await?;
        let mut request =
            TransferRequest::new(submission_id, &self.src_endpoint, &self.dst_endpoint)
                .with_label(task_label(TaskKind::Transfer, at))
                .with_sync_level(SYNC_LEVEL_CHECKSUM)
                .encrypted();
        for (source, destination) in items {
            request.add_item(source, destination);
        }
        Ok(self.client.submit_transfer(&request).await?.task_id)
    }

    /// Submits one recursive delete of `paths` on the source endpoint.
    pub async fn submit_source_delete<'p, I>(
        &self,
        paths: I,
        at: OffsetDateTime,
    ) -> Result<String, TransferError>
    where
        I: IntoIterator<Item = &'p String>,
    {
        let submission_id = self.client.submission_id().await?;
        let mut request = DeleteRequest::new(submission_id, &self.src_endpoint)
            .with_label(task_label(TaskKind::Delete, at));
        for path in paths {
            request.add_item(path.as_str());
        }
        Ok(self.client.submit_delete(&request).await?.task_id)
    }

    /// Polls `task_id` every `interval` until it reaches a terminal status
    /// or `timeout` elapses. Returns the last status seen.
    pub async fn wait_for_task(
        &self,
        task_id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<TaskStatus, TransferError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.client.get_task(task_id).await?.status;
            if status.is_terminal() {
                return Ok(status);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(status);
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
    }
}

impl TaskStatusLookup for RemoteSession {
    type Error = TransferError;

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus, Self::Error> {
        Ok(self.client.get_task(task_id).await?.status)
    }
}

/// Lists the source endpoint. Links and unknown entry types count as files
/// so that a directory holding one is never pruned.
impl DirectoryListing for RemoteSession {
    type Error = TransferError;

    async fn list(&self, path: &str) -> Result<Vec<ListedEntry>, Self::Error> {
        let entries = self.client.list_directory(&self.src_endpoint, path).await?;
        Ok(entries
            .into_iter()
            .map(|entry| ListedEntry {
                kind: match entry.entry_type {
                    EntryType::Dir => NodeKind::Directory,
                    EntryType::File | EntryType::Link | EntryType::Other => NodeKind::File,
                },
                name: entry.name,
            })
            .collect())
    }
}
