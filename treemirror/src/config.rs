use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::sync::store::{StoreError, default_state_path};

const DEFAULT_DELETE_WAIT_SECS: u64 = 180;
const DEFAULT_DELETE_POLL_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} must be an absolute path, got {value:?}")]
    NotAbsolute { name: &'static str, value: String },
    #[error("source directory {0:?} does not exist or is not a directory")]
    SourceMissing(PathBuf),
    #[error("cannot create state directory {path:?}: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("state path: {0}")]
    StatePath(#[from] StoreError),
}

#[derive(Clone, Debug)]
pub struct MirrorConfig {
    pub src_dir: String,
    pub dst_dir: String,
    pub src_endpoint: String,
    pub dst_endpoint: String,
    pub token: Option<String>,
    pub api_url: Option<String>,
    pub state_path: PathBuf,
    pub delete_wait: Duration,
    pub delete_poll_interval: Duration,
}

impl MirrorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let state_path = match optional("TREEMIRROR_STATE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_state_path()?,
        };

        Ok(Self {
            src_dir: required("TREEMIRROR_SRC_DIR")?,
            dst_dir: required("TREEMIRROR_DST_DIR")?,
            src_endpoint: required("TREEMIRROR_SRC_ENDPOINT")?,
            dst_endpoint: required("TREEMIRROR_DST_ENDPOINT")?,
            token: optional("TREEMIRROR_TOKEN"),
            api_url: optional("TREEMIRROR_API_URL"),
            state_path,
            delete_wait: Duration::from_secs(read_u64(
                &lookup,
                "TREEMIRROR_DELETE_WAIT_SECS",
                DEFAULT_DELETE_WAIT_SECS,
            )),
            delete_poll_interval: Duration::from_secs(read_u64(
                &lookup,
                "TREEMIRROR_DELETE_POLL_SECS",
                DEFAULT_DELETE_POLL_SECS,
            )),
        })
    }

    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token
            .as_deref()
            .ok_or(ConfigError::Missing("TREEMIRROR_TOKEN"))
    }

    /// Checks what can be checked without talking to the transfer service.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_absolute("TREEMIRROR_SRC_DIR", &self.src_dir)?;
        ensure_absolute("TREEMIRROR_DST_DIR", &self.dst_dir)?;
        let src = Path::new(&self.src_dir);
        if !src.is_dir() {
            return Err(ConfigError::SourceMissing(src.to_path_buf()));
        }
        if self.src_endpoint.is_empty() {
            return Err(ConfigError::Missing("TREEMIRROR_SRC_ENDPOINT"));
        }
        if self.dst_endpoint.is_empty() {
            return Err(ConfigError::Missing("TREEMIRROR_DST_ENDPOINT"));
        }
        if let Some(parent) = self.state_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::StateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

fn ensure_absolute(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::NotAbsolute {
            name,
            value: value.to_string(),
        })
    }
}

fn read_u64<F>(lookup: &F, name: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
