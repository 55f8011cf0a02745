//! The HTTP contract of the translation server.
//!
//! Wire types mirror the JSON bodies of each endpoint; [`TranslateApi`] is
//! the seam between the orchestration logic (controller, poller, download)
//! and the transport. [`http::HttpApi`] is the production implementation;
//! tests substitute an in-memory fake.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | languages | `GET /api/languages` |
//! | services  | `GET /api/services` |
//! | upload    | `POST /api/files/upload` |
//! | translate | `POST /api/translate` |
//! | status    | `GET /api/task/{id}/status` |
//! | cancel    | `POST /api/task/{id}/cancel` |
//! | download  | `GET /api/task/{id}/download/{mono\|dual}` |
//! | cleanup   | `DELETE /api/task/{id}`, `DELETE /api/files/{id}` |
//! | health    | `GET /api/health` |

pub mod http;

use crate::error::ClientError;
use crate::translation::TranslationConfig;
use crate::upload::UploadedFile;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Identifiers ──────────────────────────────────────────────────────────

/// Server-issued identifier of an uploaded PDF.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

/// Server-issued identifier of a translation task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Catalogue ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub display_name: String,
    pub code: String,
}

/// One configurable field of a translation engine, as the server describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Primitive type tag: `str`, `int`, `float`, `bool`, `dict`, …
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub default: serde_json::Value,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub is_password: bool,
    #[serde(default)]
    pub readonly: bool,
}

fn default_field_type() -> String {
    "str".to_string()
}

/// A translation engine and its configurable fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

// ── Upload / submit ──────────────────────────────────────────────────────

/// Response of `POST /api/files/upload`; the session's file handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub file_id: FileId,
    pub filename: String,
    pub size: u64,
}

/// Body of `POST /api/translate`.
#[derive(Debug, Clone, Serialize)]
pub struct TranslateRequest<'a> {
    pub file_id: &'a FileId,
    pub config: &'a TranslationConfig,
}

/// Response of `POST /api/translate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStarted {
    pub task_id: TaskId,
    #[serde(default)]
    pub status: String,
}

// ── Task status ──────────────────────────────────────────────────────────

/// Task state as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Running,
    Completed,
    Error,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Running)
    }
}

/// Response of `GET /api/task/{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub status: TaskState,
    /// Overall progress, 0–100.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub part_index: Option<u32>,
    #[serde(default)]
    pub total_parts: Option<u32>,
    #[serde(default)]
    pub stage_current: Option<u32>,
    #[serde(default)]
    pub stage_total: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<TaskResult>,
}

impl TaskSnapshot {
    /// A bare `running` snapshot at the given progress.
    pub fn running(progress: f64) -> Self {
        Self {
            status: TaskState::Running,
            progress,
            stage: None,
            part_index: None,
            total_parts: None,
            stage_current: None,
            stage_total: None,
            error: None,
            result: None,
        }
    }
}

/// Output variant of a translated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Target language only.
    Mono,
    /// Side-by-side bilingual.
    Dual,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Mono, Variant::Dual];

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Mono => "mono",
            Variant::Dual => "dual",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object-storage location of one output variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDescriptor {
    pub access_url: String,
    #[serde(default)]
    pub file_hash: Option<String>,
    #[serde(default)]
    pub storage_key: Option<String>,
    #[serde(default)]
    pub access_expires_at: Option<i64>,
}

/// Result record of a completed task.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub mono_pdf_path: Option<String>,
    #[serde(default)]
    pub dual_pdf_path: Option<String>,
    #[serde(default)]
    pub total_seconds: Option<f64>,
    /// Variants uploaded to object storage. The server sends `null` (or a
    /// `null` entry) when storage is disabled; both decode as absent.
    #[serde(default, deserialize_with = "storage_entries")]
    pub storage: BTreeMap<Variant, StorageDescriptor>,
}

fn storage_entries<'de, D>(de: D) -> Result<BTreeMap<Variant, StorageDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<Variant, Option<StorageDescriptor>>> = Option::deserialize(de)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(variant, entry)| entry.map(|d| (variant, d)))
        .collect())
}

impl TaskResult {
    /// `true` when the server produced this variant.
    pub fn has(&self, variant: Variant) -> bool {
        let path = match variant {
            Variant::Mono => &self.mono_pdf_path,
            Variant::Dual => &self.dual_pdf_path,
        };
        path.as_deref().is_some_and(|p| !p.is_empty()) || self.storage.contains_key(&variant)
    }

    /// Direct object-storage URL for this variant, if uploaded.
    pub fn storage_url(&self, variant: Variant) -> Option<&str> {
        self.storage
            .get(&variant)
            .map(|s| s.access_url.as_str())
            .filter(|u| !u.is_empty())
    }
}

// ── Housekeeping ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub active_tasks: u64,
    #[serde(default)]
    pub completed_tasks: u64,
}

/// Response of the cancel and cleanup endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAck {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

// ── The seam ─────────────────────────────────────────────────────────────

/// Every request the client makes, one method per endpoint.
///
/// Implementations must be `Send + Sync`: the status poller and the
/// fire-and-forget cancel call run on spawned tasks that share the API
/// behind an `Arc`.
#[async_trait]
pub trait TranslateApi: Send + Sync {
    async fn languages(&self) -> Result<Vec<LanguageInfo>, ClientError>;

    async fn services(&self) -> Result<Vec<ServiceDescriptor>, ClientError>;

    /// Upload a validated file. Exactly one request per call.
    async fn upload(&self, file: &UploadedFile) -> Result<FileHandle, ClientError>;

    async fn start_translation(
        &self,
        file_id: &FileId,
        config: &TranslationConfig,
    ) -> Result<TaskStarted, ClientError>;

    async fn task_status(&self, task_id: &TaskId) -> Result<TaskSnapshot, ClientError>;

    async fn cancel_task(&self, task_id: &TaskId) -> Result<StatusAck, ClientError>;

    /// Download a result through the API server.
    async fn download(&self, task_id: &TaskId, variant: Variant) -> Result<Bytes, ClientError>;

    /// Fetch a result directly from its object-storage URL.
    async fn fetch_url(&self, url: &str) -> Result<Bytes, ClientError>;

    async fn cleanup_task(&self, task_id: &TaskId) -> Result<StatusAck, ClientError>;

    async fn cleanup_file(&self, file_id: &FileId) -> Result<StatusAck, ClientError>;

    async fn health(&self) -> Result<HealthStatus, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_with_optional_counters() {
        let s: TaskSnapshot = serde_json::from_value(json!({
            "status": "running",
            "progress": 45,
            "stage": "Translate Paragraphs",
            "part_index": 1,
            "total_parts": 3,
            "stage_current": 12,
            "stage_total": 40,
            "error": null,
            "result": null
        }))
        .unwrap();
        assert_eq!(s.status, TaskState::Running);
        assert_eq!(s.progress, 45.0);
        assert_eq!(s.total_parts, Some(3));
        assert!(!s.status.is_terminal());
    }

    #[test]
    fn null_storage_decodes_as_absent() {
        let s: TaskSnapshot = serde_json::from_value(json!({
            "status": "completed",
            "progress": 100,
            "result": {
                "mono_pdf_path": "/out/doc.mono.pdf",
                "dual_pdf_path": null,
                "total_seconds": 3.0,
                "storage": null
            }
        }))
        .unwrap();
        let result = s.result.unwrap();
        assert!(result.storage.is_empty());
        assert!(result.has(Variant::Mono));
        assert!(!result.has(Variant::Dual));

        let r: TaskResult = serde_json::from_value(json!({
            "storage": {
                "mono": null,
                "dual": {"access_url": "https://bucket/dual.pdf"}
            }
        }))
        .unwrap();
        assert_eq!(r.storage.len(), 1);
        assert_eq!(r.storage_url(Variant::Dual), Some("https://bucket/dual.pdf"));
        assert_eq!(r.storage_url(Variant::Mono), None);
    }

    #[test]
    fn completed_result_with_storage() {
        let s: TaskSnapshot = serde_json::from_value(json!({
            "status": "completed",
            "progress": 100,
            "stage": "Translation complete",
            "result": {
                "mono_pdf_path": "pdf2zh_files/T1/doc.zh.mono.pdf",
                "dual_pdf_path": null,
                "total_seconds": 23.5,
                "storage": {
                    "mono": {
                        "access_url": "https://cdn.example.com/doc_ab12cd34.pdf",
                        "file_hash": "ab12cd34",
                        "storage_key": "pdf/doc_ab12cd34.pdf"
                    }
                }
            }
        }))
        .unwrap();
        let r = s.result.unwrap();
        assert!(r.has(Variant::Mono));
        assert!(!r.has(Variant::Dual));
        assert_eq!(
            r.storage_url(Variant::Mono),
            Some("https://cdn.example.com/doc_ab12cd34.pdf")
        );
        assert_eq!(r.storage_url(Variant::Dual), None);
    }

    #[test]
    fn field_descriptor_defaults() {
        let f: FieldDescriptor = serde_json::from_value(json!({"name": "api_key"})).unwrap();
        assert_eq!(f.field_type, "str");
        assert!(!f.readonly);
        assert!(f.default.is_null());
    }

    #[test]
    fn translate_request_shape() {
        let file_id = FileId("F1".into());
        let config = TranslationConfig::default();
        let v = serde_json::to_value(TranslateRequest {
            file_id: &file_id,
            config: &config,
        })
        .unwrap();
        assert_eq!(v["file_id"], "F1");
        assert_eq!(v["config"]["service"], "gpt-4o-mini");
    }
}
