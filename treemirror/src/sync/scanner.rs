use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use super::stamp::Stamp;
use super::trie::NodeKind;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("path is not valid UTF-8: {0:?}")]
    NonUtf8(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub path: String,
    pub kind: NodeKind,
}

/// What the filesystem currently holds at a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub kind: NodeKind,
    pub modified: Stamp,
    /// Only meaningful for directories.
    pub is_empty: bool,
}

/// Read-only view of a local tree.
pub trait LocalTree {
    /// Lazily walks everything below `root`, depth first, excluding `root`.
    fn walk<'a>(
        &'a self,
        root: &str,
    ) -> Box<dyn Iterator<Item = Result<ScanEntry, ScanError>> + 'a>;

    /// `Ok(None)` when nothing exists at `path`.
    fn probe(&self, path: &str) -> Result<Option<Probe>, ScanError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiskTree;

impl LocalTree for DiskTree {
    fn walk<'a>(
        &'a self,
        root: &str,
    ) -> Box<dyn Iterator<Item = Result<ScanEntry, ScanError>> + 'a> {
        let entries = WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => return Some(Err(ScanError::Walk(err))),
                };
                let file_type = entry.file_type();
                let kind = if file_type.is_dir() {
                    NodeKind::Directory
                } else if file_type.is_file() || links_to_file(entry.path()) {
                    NodeKind::File
                } else {
                    return None;
                };
                Some(path_string(entry.path()).map(|path| ScanEntry { path, kind }))
            });
        Box::new(entries)
    }

    fn probe(&self, path: &str) -> Result<Option<Probe>, ScanError> {
        let mut metadata = match std::fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(path, source)),
        };
        if metadata.is_symlink() {
            match std::fs::metadata(path) {
                Ok(target) if target.is_file() => metadata = target,
                Ok(_) => return Ok(None),
                Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(source) => return Err(io_error(path, source)),
            }
        }
        let kind = if metadata.is_dir() {
            NodeKind::Directory
        } else if metadata.is_file() {
            NodeKind::File
        } else {
            return Ok(None);
        };
        let modified = metadata
            .modified()
            .map(Stamp::from_system_time)
            .map_err(|source| io_error(path, source))?;
        let is_empty = match kind {
            NodeKind::Directory => std::fs::read_dir(path)
                .map_err(|source| io_error(path, source))?
                .next()
                .is_none(),
            NodeKind::File => false,
        };
        Ok(Some(Probe {
            kind,
            modified,
            is_empty,
        }))
    }
}

/// Links to regular files are read as files. Links to directories are never
/// descended into and dangling links are skipped.
fn links_to_file(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|metadata| metadata.is_file())
}

fn path_string(path: &Path) -> Result<String, ScanError> {
    path.to_str()
        .map(|value| value.replace('\\', "/"))
        .ok_or_else(|| ScanError::NonUtf8(path.to_path_buf()))
}

fn io_error(path: &str, source: io::Error) -> ScanError {
    ScanError::Io {
        path: path.to_string(),
        source,
    }
}
