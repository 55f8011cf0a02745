//! Error types for the pdftranslate-client library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * [`ValidationError`]: **Local.** The action was rejected before any
//!   network request was issued (wrong extension, oversized file, no file
//!   handle yet, bad page range). Always wrapped in
//!   [`ClientError::Validation`].
//!
//! * [`ClientError`]: **Fatal for the current action.** The server rejected
//!   a request, the connection failed, or the task reached a failed or
//!   cancelled terminal state.
//!
//! * [`PollError`]: **Non-fatal.** A single status-poll tick failed. The
//!   poller logs it and waits for the next tick; it is never propagated to
//!   callers and never alters the displayed progress.

use std::path::PathBuf;
use thiserror::Error;

/// Local validation failures. None of these ever reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    // ── File selection ────────────────────────────────────────────────────
    /// The selected file does not carry a `.pdf` extension.
    #[error("Only PDF files are supported: '{filename}'")]
    NotAPdf { filename: String },

    /// The selected file exceeds the upload limit.
    #[error("File is too large: {size} bytes (limit is {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    /// The file could not be opened or its size could not be read.
    #[error("Cannot read '{path}': {reason}")]
    FileUnreadable { path: PathBuf, reason: String },

    // ── Session preconditions ─────────────────────────────────────────────
    /// Translation was requested before an upload produced a file handle.
    #[error("No uploaded file: upload a PDF before starting a translation")]
    NoFileHandle,

    /// Cancel, download or cleanup was requested without a task.
    #[error("No translation task")]
    NoActiveTask,

    // ── Translation options ───────────────────────────────────────────────
    /// `page_range` is `Range` but no explicit page string was given.
    #[error("Page range 'Range' requires an explicit page list (e.g. \"1,3,5-7\")")]
    MissingPageInput,

    /// A page string was supplied for a non-`Range` selector.
    #[error("Explicit pages are only accepted with page range 'Range'")]
    UnexpectedPageInput,

    /// The explicit page string does not look like `1,3,5-7`.
    #[error("Invalid page list '{input}': expected pages like \"1,3,5-7\"")]
    InvalidPageInput { input: String },

    /// Both mono and dual outputs are disabled.
    #[error("Both mono and dual outputs are disabled; nothing would be produced")]
    NoOutputSelected,

    // ── Service form ──────────────────────────────────────────────────────
    /// The requested service is not in the server's service list.
    #[error("Unknown translation service '{name}'")]
    UnknownService { name: String },

    /// A required engine field has no value.
    #[error("Field '{field}' is required")]
    MissingField { field: String },

    /// A value could not be parsed for the field's kind.
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidFieldValue { field: String, reason: String },

    /// Read-only fields are informational and cannot be edited.
    #[error("Field '{field}' is read-only")]
    ReadOnlyField { field: String },

    /// The form has no field with this name.
    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    // ── Results ───────────────────────────────────────────────────────────
    /// The completed task did not produce this output variant.
    #[error("The {variant} output is not available for this task")]
    OutputUnavailable { variant: String },
}

/// All fatal errors returned by the pdftranslate-client library.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally; no request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Remote errors ─────────────────────────────────────────────────────
    /// The server answered with a non-2xx status.
    ///
    /// `message` is the server-supplied `detail` when present, otherwise a
    /// generic fallback.
    #[error("{message}")]
    Request { status: u16, message: String },

    /// The request never produced a response (DNS, connection refused, TLS).
    #[error("{operation} failed: {reason}\nCheck that the API server is reachable.")]
    Transport { operation: String, reason: String },

    /// The request timed out.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// A 2xx response body could not be decoded.
    #[error("Unexpected response from {operation}: {detail}")]
    InvalidResponse { operation: String, detail: String },

    // ── Task outcomes ─────────────────────────────────────────────────────
    /// The server reported `status == "error"`.
    #[error("Translation failed: {message}")]
    TaskFailed { task_id: String, message: String },

    /// The task was cancelled by the user or the server.
    #[error("Translation {task_id} was cancelled")]
    TaskCancelled { task_id: String },

    // ── Local state ───────────────────────────────────────────────────────
    /// The action is not allowed in the controller's current phase.
    #[error("Cannot {action} while {state}")]
    InvalidState { action: String, state: String },

    /// Could not create or write a downloaded file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Build a [`ClientError::Request`] from a status code and the optional
    /// server-supplied `detail`.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let message = detail
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Request failed with HTTP {status}"));
        ClientError::Request { status, message }
    }

    /// `true` when the error was raised locally, before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    /// HTTP status of a server rejection, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A single failed status-poll tick.
#[derive(Debug, Clone, Error)]
#[error("Status poll #{seq} for task {task_id} failed: {detail}")]
pub struct PollError {
    pub task_id: String,
    pub seq: u64,
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_uses_server_detail() {
        let e = ClientError::from_status(400, Some("Only PDF files are supported".into()));
        assert_eq!(e.to_string(), "Only PDF files are supported");
        assert_eq!(e.status(), Some(400));
    }

    #[test]
    fn request_error_falls_back_to_generic_message() {
        let e = ClientError::from_status(502, None);
        assert_eq!(e.to_string(), "Request failed with HTTP 502");

        let blank = ClientError::from_status(500, Some("  ".into()));
        assert_eq!(blank.to_string(), "Request failed with HTTP 500");
    }

    #[test]
    fn validation_errors_are_flagged() {
        let e: ClientError = ValidationError::NoFileHandle.into();
        assert!(e.is_validation());
        assert!(!ClientError::Internal("x".into()).is_validation());
    }

    #[test]
    fn too_large_display() {
        let e = ValidationError::FileTooLarge {
            size: 200,
            limit: 100,
        };
        assert!(e.to_string().contains("200 bytes"));
        assert!(e.to_string().contains("100 bytes"));
    }

    #[test]
    fn poll_error_display() {
        let e = PollError {
            task_id: "T1".into(),
            seq: 7,
            detail: "connection reset".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("#7"), "got: {msg}");
        assert!(msg.contains("T1"));
    }
}
