//! # pdftranslate-client
//!
//! Client for a PDF translation server: upload a PDF, configure the
//! translation engine, start a task, follow its progress, cancel it and
//! download the translated documents.
//!
//! ## Why this crate?
//!
//! The server exposes a small REST API, but using it correctly is a state
//! machine, not a sequence of calls: uploads must be validated before they
//! are sent, only one task may be live per session, status polls must never
//! overlap, a late poll response must never move progress backwards, and a
//! terminal state must be applied exactly once. This crate owns that state
//! machine so front-ends only render it.
//!
//! ## Workflow
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Upload     validate (.pdf, ≤ 100 MiB) → POST /api/files/upload
//!  ├─ 2. Configure  service form built from GET /api/services
//!  ├─ 3. Translate  POST /api/translate → task id
//!  ├─ 4. Poll       GET /api/task/{id}/status every second, one at a time
//!  ├─ 5. Cancel     local state first, POST /api/task/{id}/cancel in background
//!  └─ 6. Download   storage URL when available, else the API endpoint
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdftranslate_client::{ClientConfig, HttpApi, TranslationConfig, TranslationController, UploadedFile};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let api = Arc::new(HttpApi::new(&config)?);
//!     let mut controller = TranslationController::new(api, config);
//!
//!     controller.select_file(UploadedFile::from_path("paper.pdf")?).await?;
//!     controller.start_translation(TranslationConfig::default()).await?;
//!     let result = controller.wait().await?;
//!     eprintln!("done in {:?}s", result.total_seconds);
//!
//!     controller.download_all(std::path::Path::new(".")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftranslate` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdftranslate-client = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod api;
pub mod config;
pub mod controller;
pub mod download;
pub mod error;
pub mod form;
pub mod poller;
pub mod presenter;
pub mod progress;
pub mod session;
pub mod translation;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use api::http::HttpApi;
pub use api::{
    FieldDescriptor, FileHandle, FileId, HealthStatus, LanguageInfo, ServiceDescriptor,
    StatusAck, StorageDescriptor, TaskId, TaskResult, TaskSnapshot, TaskStarted, TaskState,
    TranslateApi, Variant,
};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use controller::{CancelAck, TranslationController};
pub use download::DownloadOutcome;
pub use error::{ClientError, PollError, ValidationError};
pub use form::{build_form, collect_values, FieldKind, FormField, FormModel};
pub use poller::{PollEvent, PollHandle, SnapshotStream};
pub use presenter::{BannerKind, Presenter, ViewModel};
pub use progress::{NoopProgressCallback, ProgressCallback, TaskProgressCallback};
pub use session::{Applied, DiscardReason, Phase, SessionState, TaskOutcome};
pub use translation::{PageRange, PrimitiveValue, TranslationConfig, WatermarkMode};
pub use upload::{submit_upload, UploadedFile};
