use serde_json::json;
use transfer_api::{
    ApiErrorClass, DeleteRequest, EntryType, MkdirOutcome, SYNC_LEVEL_CHECKSUM, TaskStatus,
    TransferClient, TransferError, TransferRequest,
};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn list_directory_includes_bearer_header_and_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v0.10/operation/endpoint/src-ep/ls"))
        .and(query_param("path", "/data/Hello World"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "DATA_TYPE": "file_list",
            "path": "/data/Hello World/",
            "DATA": [
                {"DATA_TYPE": "file", "name": "a.txt", "type": "file", "size": 12},
                {"DATA_TYPE": "file", "name": "sub", "type": "dir"},
                {"DATA_TYPE": "file", "name": "dangling", "type": "invalid_symlink"},
                {"DATA_TYPE": "file", "name": "pipe", "type": "fifo"}
            ]
        })))
        .mount(&server)
        .await;

    let client = TransferClient::with_base_url(&server.uri(), "test-token").unwrap();
    let entries = client
        .list_directory("src-ep", "/data/Hello World")
        .await
        .unwrap();

    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].name, "a.txt");
    assert_eq!(entries[0].entry_type, EntryType::File);
    assert_eq!(entries[0].size, Some(12));
    assert_eq!(entries[1].entry_type, EntryType::Dir);
    assert_eq!(entries[2].entry_type, EntryType::Link);
    assert_eq!(entries[3].entry_type, EntryType::Other);
}

#[tokio::test]
async fn list_directory_tolerates_missing_data() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v0.10/operation/endpoint/src-ep/ls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "DATA_TYPE": "file_list"
        })))
        .mount(&server)
        .await;

    let client = TransferClient::with_base_url(&server.uri(), "test-token").unwrap();
    let entries = client.list_directory("src-ep", "/empty").await.unwrap();

    assert!(entries.is_empty());
}

#[tokio::test]
async fn make_directory_posts_mkdir_document() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v0.10/operation/endpoint/dst-ep/mkdir"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "DATA_TYPE": "mkdir",
            "path": "/archive/new"
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "code": "DirectoryCreated",
            "message": "The directory was created successfully"
        })))
        .mount(&server)
        .await;

    let client = TransferClient::with_base_url(&server.uri(), "test-token").unwrap();
    let outcome = client
        .make_directory("dst-ep", "/archive/new")
        .await
        .unwrap();

    assert_eq!(outcome, MkdirOutcome::Created);
}

#[tokio::test]
async fn make_directory_treats_existing_directory_as_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v0.10/operation/endpoint/dst-ep/mkdir"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({
            "code": "ExternalError.MkdirFailed.Exists",
            "message": "Path already exists"
        })))
        .mount(&server)
        .await;

    let client = TransferClient::with_base_url(&server.uri(), "test-token").unwrap();
    let outcome = client
        .make_directory("dst-ep", "/archive/old")
        .await
        .unwrap();

    assert_eq!(outcome, MkdirOutcome::AlreadyExists);
}

#[tokio::test]
async fn make_directory_reports_other_failures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v0.10/operation/endpoint/dst-ep/mkdir"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({
            "code": "ExternalError.MkdirFailed.PermissionDenied",
            "message": "Permission denied"
        })))
        .mount(&server)
        .await;

    let client = TransferClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client
        .make_directory("dst-ep", "/root-owned")
        .await
        .unwrap_err();

    assert!(matches!(err, TransferError::Api { .. }));
    assert_eq!(err.classification(), Some(ApiErrorClass::Transient));
}

#[tokio::test]
async fn submission_id_returns_value() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v0.10/submission_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "DATA_TYPE": "submission_id",
            "value": "sub-123"
        })))
        .mount(&server)
        .await;

    let client = TransferClient::with_base_url(&server.uri(), "test-token").unwrap();
    assert_eq!(client.submission_id().await.unwrap(), "sub-123");
}

#[tokio::test]
async fn submit_transfer_sends_items_and_returns_task() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v0.10/transfer"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "DATA_TYPE": "transfer",
            "submission_id": "sub-1",
            "source_endpoint": "src-ep",
            "destination_endpoint": "dst-ep",
            "label": "AUTO_TRANSFER_2024-01-01_0000",
            "sync_level": 3,
            "encrypt_data": true,
            "DATA": [{
                "DATA_TYPE": "transfer_item",
                "source_path": "/data/a.txt",
                "destination_path": "/archive/a.txt",
                "recursive": false
            }]
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "DATA_TYPE": "transfer_result",
            "code": "Accepted",
            "task_id": "task-1",
            "submission_id": "sub-1"
        })))
        .mount(&server)
        .await;

    let mut request = TransferRequest::new("sub-1", "src-ep", "dst-ep")
        .with_label("AUTO_TRANSFER_2024-01-01_0000")
        .with_sync_level(SYNC_LEVEL_CHECKSUM)
        .encrypted();
    request.add_item("/data/a.txt", "/archive/a.txt");

    let client = TransferClient::with_base_url(&server.uri(), "test-token").unwrap();
    let submission = client.submit_transfer(&request).await.unwrap();

    assert_eq!(submission.task_id, "task-1");
}

#[tokio::test]
async fn submit_delete_is_recursive() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v0.10/delete"))
        .and(body_partial_json(json!({
            "DATA_TYPE": "delete",
            "endpoint": "src-ep",
            "recursive": true,
            "DATA": [
                {"DATA_TYPE": "delete_item", "path": "/data/a.txt"},
                {"DATA_TYPE": "delete_item", "path": "/data/b.txt"}
            ]
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "task_id": "task-del"
        })))
        .mount(&server)
        .await;

    let mut request = DeleteRequest::new("sub-2", "src-ep").with_label("AUTO_DELETE_x");
    request.add_item("/data/a.txt");
    request.add_item("/data/b.txt");

    let client = TransferClient::with_base_url(&server.uri(), "test-token").unwrap();
    let submission = client.submit_delete(&request).await.unwrap();

    assert_eq!(submission.task_id, "task-del");
}

#[tokio::test]
async fn get_task_parses_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v0.10/task/task-1"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "DATA_TYPE": "task",
            "task_id": "task-1",
            "status": "SUCCEEDED",
            "label": "AUTO_TRANSFER_2024-01-01_0000"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v0.10/task/task-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_id": "task-2",
            "status": "PAUSED_BY_ADMIN"
        })))
        .mount(&server)
        .await;

    let client = TransferClient::with_base_url(&server.uri(), "test-token").unwrap();
    let done = client.get_task("task-1").await.unwrap();
    let odd = client.get_task("task-2").await.unwrap();

    assert_eq!(done.status, TaskStatus::Succeeded);
    assert!(done.status.is_terminal());
    assert_eq!(odd.status, TaskStatus::Unknown);
    assert!(!odd.status.is_terminal());
}

#[tokio::test]
async fn unauthorized_is_classified_as_auth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v0.10/task/task-1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .mount(&server)
        .await;

    let client = TransferClient::with_base_url(&server.uri(), "stale").unwrap();
    let err = client.get_task("task-1").await.unwrap_err();

    assert_eq!(err.classification(), Some(ApiErrorClass::Auth));
    assert!(!err.is_retryable());
}
