//! reqwest implementation of [`TranslateApi`].
//!
//! One shared `reqwest::Client`; timeouts are applied per request so that the
//! upload and download limits can differ from ordinary JSON calls.
//!
//! Non-2xx responses are turned into [`ClientError::Request`] carrying the
//! server's `detail` field when the body has one. Nothing is retried.

use super::{
    FileHandle, FileId, HealthStatus, LanguageInfo, ServiceDescriptor, StatusAck, TaskId,
    TaskSnapshot, TaskStarted, TranslateApi, TranslateRequest, Variant,
};
use crate::config::ClientConfig;
use crate::error::{ClientError, ValidationError};
use crate::translation::TranslationConfig;
use crate::upload::{FileSource, UploadedFile};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// HTTP client for the translation server.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    config: ClientConfig,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(concat!("pdftranslate-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    /// Send a request and fail on any non-2xx status.
    async fn send(
        &self,
        operation: &str,
        request: RequestBuilder,
        timeout_secs: u64,
    ) -> Result<Response, ClientError> {
        let response = request
            .timeout(Duration::from_secs(timeout_secs))
            .send()
            .await
            .map_err(|e| transport_error(operation, timeout_secs, e))?;

        let status = response.status();
        debug!("{} → HTTP {}", operation, status.as_u16());
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        Err(ClientError::from_status(status.as_u16(), error_detail(&body)))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
        timeout_secs: u64,
    ) -> Result<T, ClientError> {
        let response = self.send(operation, request, timeout_secs).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(operation, timeout_secs, e))?;
        serde_json::from_slice(&body).map_err(|e| ClientError::InvalidResponse {
            operation: operation.to_string(),
            detail: e.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<T, ClientError> {
        let request = self.client.get(self.url(path));
        self.send_json(operation, request, self.config.request_timeout_secs)
            .await
    }

    async fn get_bytes(&self, operation: &str, url: &str) -> Result<Bytes, ClientError> {
        let secs = self.config.download_timeout_secs;
        let response = self.send(operation, self.client.get(url), secs).await?;
        response
            .bytes()
            .await
            .map_err(|e| transport_error(operation, secs, e))
    }

    async fn file_part(&self, file: &UploadedFile) -> Result<Part, ClientError> {
        let part = match &file.source {
            FileSource::Bytes(bytes) => Part::bytes(bytes.to_vec()),
            FileSource::Path(path) => {
                let f = tokio::fs::File::open(path).await.map_err(|e| {
                    ValidationError::FileUnreadable {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Part::stream_with_length(Body::wrap_stream(ReaderStream::new(f)), file.size)
            }
        };
        part.file_name(file.filename.clone())
            .mime_str("application/pdf")
            .map_err(|e| ClientError::Internal(e.to_string()))
    }
}

#[async_trait]
impl TranslateApi for HttpApi {
    async fn languages(&self) -> Result<Vec<LanguageInfo>, ClientError> {
        self.get_json("languages", "/api/languages").await
    }

    async fn services(&self) -> Result<Vec<ServiceDescriptor>, ClientError> {
        self.get_json("services", "/api/services").await
    }

    async fn upload(&self, file: &UploadedFile) -> Result<FileHandle, ClientError> {
        let form = Form::new().part("file", self.file_part(file).await?);
        let request = self.client.post(self.url("/api/files/upload")).multipart(form);
        self.send_json("upload", request, self.config.upload_timeout_secs)
            .await
    }

    async fn start_translation(
        &self,
        file_id: &FileId,
        config: &TranslationConfig,
    ) -> Result<TaskStarted, ClientError> {
        let body = TranslateRequest { file_id, config };
        let request = self.client.post(self.url("/api/translate")).json(&body);
        self.send_json("translate", request, self.config.request_timeout_secs)
            .await
    }

    async fn task_status(&self, task_id: &TaskId) -> Result<TaskSnapshot, ClientError> {
        self.get_json("status", &format!("/api/task/{task_id}/status"))
            .await
    }

    async fn cancel_task(&self, task_id: &TaskId) -> Result<StatusAck, ClientError> {
        let request = self
            .client
            .post(self.url(&format!("/api/task/{task_id}/cancel")));
        self.send_json("cancel", request, self.config.request_timeout_secs)
            .await
    }

    async fn download(&self, task_id: &TaskId, variant: Variant) -> Result<Bytes, ClientError> {
        let url = self.url(&format!("/api/task/{task_id}/download/{variant}"));
        self.get_bytes("download", &url).await
    }

    async fn fetch_url(&self, url: &str) -> Result<Bytes, ClientError> {
        self.get_bytes("storage download", url).await
    }

    async fn cleanup_task(&self, task_id: &TaskId) -> Result<StatusAck, ClientError> {
        let request = self.client.delete(self.url(&format!("/api/task/{task_id}")));
        self.send_json("cleanup task", request, self.config.request_timeout_secs)
            .await
    }

    async fn cleanup_file(&self, file_id: &FileId) -> Result<StatusAck, ClientError> {
        let request = self.client.delete(self.url(&format!("/api/files/{file_id}")));
        self.send_json("cleanup file", request, self.config.request_timeout_secs)
            .await
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.get_json("health", "/api/health").await
    }
}

fn transport_error(operation: &str, secs: u64, e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout {
            operation: operation.to_string(),
            secs,
        }
    } else {
        ClientError::Transport {
            operation: operation.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Extract the `detail` field of an error body. Non-string details (e.g.
/// validation error lists) are returned as compact JSON.
fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
