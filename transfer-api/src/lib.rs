mod client;
mod labels;

pub use client::{
    ApiErrorClass, DeleteItem, DeleteRequest, DirEntry, EntryType, MkdirOutcome,
    SYNC_LEVEL_CHECKSUM, TaskInfo, TaskStatus, TaskSubmission, TransferClient, TransferError,
    TransferItem, TransferRequest,
};
pub use labels::{TaskKind, task_label};
