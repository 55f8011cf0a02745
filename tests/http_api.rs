//! `HttpApi` against a local mock server.

use mockito::{Matcher, Server};
use pdftranslate_client::download::{self, DownloadOutcome};
use pdftranslate_client::{
    ClientConfig, ClientError, FileId, HttpApi, TaskId, TaskState, TranslateApi,
    TranslationConfig, UploadedFile, Variant,
};
use serde_json::json;
use std::io::Write;

fn api_for(server: &Server) -> HttpApi {
    let config = ClientConfig::builder()
        .base_url(server.url())
        .build()
        .unwrap();
    HttpApi::new(&config).unwrap()
}

#[tokio::test]
async fn health_is_parsed() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/health")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"healthy","active_tasks":2,"completed_tasks":7}"#)
        .create_async()
        .await;

    let health = api_for(&server).health().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_tasks, 2);
    assert_eq!(health.completed_tasks, 7);
    mock.assert_async().await;
}

#[tokio::test]
async fn services_with_readonly_fields() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/services")
        .with_status(200)
        .with_body(
            json!([{
                "name": "gpt-4o-mini",
                "fields": [
                    {"name": "model_name", "description": "模型名称 (GPT-4o Mini)", "type": "str",
                     "default": "gpt-4o-mini", "required": true, "is_password": false, "readonly": true},
                    {"name": "env_status", "description": "环境变量状态", "type": "dict",
                     "default": {"OPENAI_API_KEY": true}, "required": false,
                     "is_password": false, "readonly": true}
                ]
            }])
            .to_string(),
        )
        .create_async()
        .await;

    let services = api_for(&server).services().await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].fields.len(), 2);
    assert!(services[0].fields.iter().all(|f| f.readonly));
}

#[tokio::test]
async fn upload_sends_multipart_file_field() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/files/upload")
        .match_header(
            "content-type",
            Matcher::Regex("^multipart/form-data; boundary=".into()),
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#"name="file"; filename="doc.pdf""#.into()),
            Matcher::Regex("application/pdf".into()),
            Matcher::Regex("%PDF-1.7 test".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"file_id":"F1","filename":"doc.pdf","size":13}"#)
        .expect(1)
        .create_async()
        .await;

    let file = UploadedFile::from_bytes("doc.pdf", &b"%PDF-1.7 test"[..]);
    let handle = api_for(&server).upload(&file).await.unwrap();
    assert_eq!(handle.file_id, FileId("F1".into()));
    assert_eq!(handle.size, 13);
    mock.assert_async().await;
}

#[tokio::test]
async fn upload_streams_file_from_disk() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/files/upload")
        .match_body(Matcher::Regex("%PDF-1.4 on disk".into()))
        .with_status(200)
        .with_body(r#"{"file_id":"F9","filename":"paper.pdf","size":16}"#)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paper.pdf");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"%PDF-1.4 on disk")
        .unwrap();

    let file = UploadedFile::from_path(&path).unwrap();
    let handle = api_for(&server).upload(&file).await.unwrap();
    assert_eq!(handle.file_id, FileId("F9".into()));
    mock.assert_async().await;
}

#[tokio::test]
async fn translate_posts_file_id_and_config() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/translate")
        .match_body(Matcher::PartialJson(json!({
            "file_id": "F1",
            "config": {
                "service": "gpt-4o-mini",
                "lang_from": "English",
                "lang_to": "Simplified Chinese",
                "page_range": "All",
                "page_input": null
            }
        })))
        .with_status(200)
        .with_body(r#"{"task_id":"T1","status":"started"}"#)
        .create_async()
        .await;

    let started = api_for(&server)
        .start_translation(&FileId("F1".into()), &TranslationConfig::default())
        .await
        .unwrap();
    assert_eq!(started.task_id, TaskId("T1".into()));
    assert_eq!(started.status, "started");
    mock.assert_async().await;
}

#[tokio::test]
async fn status_snapshot_is_parsed() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/task/T1/status")
        .with_status(200)
        .with_body(
            json!({
                "status": "running",
                "progress": 45.5,
                "stage": "Translate Paragraphs",
                "part_index": 1,
                "total_parts": 2,
                "error": null,
                "result": null
            })
            .to_string(),
        )
        .create_async()
        .await;

    let s = api_for(&server)
        .task_status(&TaskId("T1".into()))
        .await
        .unwrap();
    assert_eq!(s.status, TaskState::Running);
    assert_eq!(s.progress, 45.5);
    assert_eq!(s.total_parts, Some(2));
}

#[tokio::test]
async fn completed_status_without_storage_is_parsed() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/task/T1/status")
        .with_status(200)
        .with_body(
            json!({
                "status": "completed",
                "progress": 100,
                "stage": "Translation complete",
                "error": null,
                "result": {
                    "mono_pdf_path": "pdf2zh_files/T1/doc.zh.mono.pdf",
                    "dual_pdf_path": null,
                    "total_seconds": 12.0,
                    "storage": null
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let s = api_for(&server)
        .task_status(&TaskId("T1".into()))
        .await
        .unwrap();
    assert_eq!(s.status, TaskState::Completed);
    let result = s.result.unwrap();
    assert!(result.storage.is_empty());
    assert!(result.has(Variant::Mono));
    assert!(!result.has(Variant::Dual));
}

#[tokio::test]
async fn error_detail_becomes_message() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/task/missing/status")
        .with_status(404)
        .with_body(r#"{"detail":"Task not found"}"#)
        .create_async()
        .await;

    let err = api_for(&server)
        .task_status(&TaskId("missing".into()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Task not found");
}

#[tokio::test]
async fn error_without_detail_uses_generic_message() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/task/T1/cancel")
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    let err = api_for(&server)
        .cancel_task(&TaskId("T1".into()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Request failed with HTTP 502");
}

#[tokio::test]
async fn malformed_success_body_is_invalid_response() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/languages")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let err = api_for(&server).languages().await.unwrap_err();
    assert!(
        matches!(err, ClientError::InvalidResponse { ref operation, .. } if operation == "languages"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let config = ClientConfig::builder()
        .base_url("http://127.0.0.1:1")
        .build()
        .unwrap();
    let err = HttpApi::new(&config).unwrap().health().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }), "got {err:?}");
}

#[tokio::test]
async fn cleanup_uses_delete() {
    let mut server = Server::new_async().await;
    let task = server
        .mock("DELETE", "/api/task/T1")
        .with_status(200)
        .with_body(r#"{"status":"cleaned"}"#)
        .create_async()
        .await;
    let file = server
        .mock("DELETE", "/api/files/F1")
        .with_status(200)
        .with_body(r#"{"status":"cleaned","message":"File deleted"}"#)
        .create_async()
        .await;

    let api = api_for(&server);
    assert_eq!(api.cleanup_task(&TaskId("T1".into())).await.unwrap().status, "cleaned");
    let ack = api.cleanup_file(&FileId("F1".into())).await.unwrap();
    assert_eq!(ack.message.as_deref(), Some("File deleted"));
    task.assert_async().await;
    file.assert_async().await;
}

#[tokio::test]
async fn download_all_reports_missing_variant_as_not_generated() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/task/T1/download/mono")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body(b"%PDF-mono".as_slice())
        .create_async()
        .await;
    server
        .mock("GET", "/api/task/T1/download/dual")
        .with_status(404)
        .with_body(r#"{"detail":"File not found"}"#)
        .create_async()
        .await;

    let api = api_for(&server);
    let dir = tempfile::tempdir().unwrap();
    let outcomes = download::download_all(&api, &TaskId("T1".into()), None, dir.path(), true)
        .await
        .unwrap();

    let mono = dir.path().join("translated_mono_T1.pdf");
    assert_eq!(
        outcomes,
        vec![
            (Variant::Mono, DownloadOutcome::Saved(mono.clone())),
            (Variant::Dual, DownloadOutcome::NotGenerated),
        ]
    );
    assert_eq!(std::fs::read(mono).unwrap(), b"%PDF-mono");
}
