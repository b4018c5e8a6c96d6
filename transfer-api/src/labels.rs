use time::OffsetDateTime;
use time::macros::format_description;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Transfer,
    Delete,
}

impl TaskKind {
    fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Transfer => "TRANSFER",
            TaskKind::Delete => "DELETE",
        }
    }
}

/// Label attached to automatically submitted tasks, e.g.
/// `AUTO_TRANSFER_2024-03-01_0930`.
pub fn task_label(kind: TaskKind, at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]_[hour][minute]");
    let when = at.format(format).unwrap_or_default();
    format!("AUTO_{}_{when}", kind.as_str())
}
