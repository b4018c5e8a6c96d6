use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://transfer.api.globus.org";
const API_PREFIX: &str = "/v0.10";
const MKDIR_EXISTS_CODE: &str = "ExternalError.MkdirFailed.Exists";

/// Checksum-verified sync level understood by the transfer service.
pub const SYNC_LEVEL_CHECKSUM: u8 = 3;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Clone)]
pub struct TransferClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl TransferClient {
    pub fn new(token: impl Into<String>) -> Result<Self, TransferError> {
        Self::with_base_url(DEFAULT_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, TransferError> {
        Ok(Self {
            http: Client::new(),
            base_url: Url::parse(base_url)?,
            token: token.into(),
        })
    }

    /// Lists the immediate entries of `path` on `endpoint_id`.
    pub async fn list_directory(
        &self,
        endpoint_id: &str,
        path: &str,
    ) -> Result<Vec<DirEntry>, TransferError> {
        let mut url = self.endpoint(&format!("/operation/endpoint/{endpoint_id}/ls"))?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let listing: DirListing = Self::handle_response(response).await?;
        Ok(listing.data)
    }

    /// Creates `path` on `endpoint_id`. An already existing directory is
    /// reported as [`MkdirOutcome::AlreadyExists`] rather than an error.
    pub async fn make_directory(
        &self,
        endpoint_id: &str,
        path: &str,
    ) -> Result<MkdirOutcome, TransferError> {
        let url = self.endpoint(&format!("/operation/endpoint/{endpoint_id}/mkdir"))?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(&MkdirRequest {
                data_type: "mkdir",
                path,
            })
            .send()
            .await?;
        if response.status().is_success() {
            return Ok(MkdirOutcome::Created);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if api_error_code(&body).as_deref() == Some(MKDIR_EXISTS_CODE) {
            return Ok(MkdirOutcome::AlreadyExists);
        }
        Err(TransferError::Api { status, body })
    }

    pub async fn submission_id(&self) -> Result<String, TransferError> {
        let url = self.endpoint("/submission_id")?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let id: SubmissionId = Self::handle_response(response).await?;
        Ok(id.value)
    }

    pub async fn submit_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TaskSubmission, TransferError> {
        let url = self.endpoint("/transfer")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn submit_delete(
        &self,
        request: &DeleteRequest,
    ) -> Result<TaskSubmission, TransferError> {
        let url = self.endpoint("/delete")?;
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .json(request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<TaskInfo, TransferError> {
        let url = self.endpoint(&format!("/task/{task_id}"))?;
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransferError> {
        Ok(self.base_url.join(&format!("{API_PREFIX}{path}"))?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TransferError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(TransferError::Api { status, body })
        }
    }
}

impl TransferError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            TransferError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }
}

fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_EARLY
        )
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

fn api_error_code(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        code: Option<String>,
    }
    serde_json::from_str::<ErrorBody>(body).ok()?.code
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MkdirOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Dir,
    File,
    #[serde(rename = "invalid_symlink")]
    Link,
    /// Any type this client does not know yet.
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct DirListing {
    #[serde(rename = "DATA", default)]
    data: Vec<DirEntry>,
}

#[derive(Debug, Serialize)]
struct MkdirRequest<'a> {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmissionId {
    value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    pub submission_id: String,
    pub source_endpoint: String,
    pub destination_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_level: Option<u8>,
    pub encrypt_data: bool,
    #[serde(rename = "DATA")]
    pub items: Vec<TransferItem>,
}

impl TransferRequest {
    pub fn new(
        submission_id: impl Into<String>,
        source_endpoint: impl Into<String>,
        destination_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            data_type: "transfer",
            submission_id: submission_id.into(),
            source_endpoint: source_endpoint.into(),
            destination_endpoint: destination_endpoint.into(),
            label: None,
            sync_level: None,
            encrypt_data: false,
            items: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_sync_level(mut self, level: u8) -> Self {
        self.sync_level = Some(level);
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.encrypt_data = true;
        self
    }

    pub fn add_item(&mut self, source_path: impl Into<String>, destination_path: impl Into<String>) {
        self.items.push(TransferItem {
            data_type: "transfer_item",
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            recursive: false,
        });
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferItem {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    pub source_path: String,
    pub destination_path: String,
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteRequest {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    pub submission_id: String,
    pub endpoint: String,
    pub recursive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "DATA")]
    pub items: Vec<DeleteItem>,
}

impl DeleteRequest {
    pub fn new(submission_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            data_type: "delete",
            submission_id: submission_id.into(),
            endpoint: endpoint.into(),
            recursive: true,
            label: None,
            items: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn add_item(&mut self, path: impl Into<String>) {
        self.items.push(DeleteItem {
            data_type: "delete_item",
            path: path.into(),
        });
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteItem {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TaskSubmission {
    pub task_id: String,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Active,
    Inactive,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskInfo {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub label: Option<String>,
}
