//! Progress-callback trait for task lifecycle events.
//!
//! Inject an [`Arc<dyn TaskProgressCallback>`] via
//! [`crate::controller::TranslationController::with_progress_callback`] to
//! receive events as the controller uploads, submits and polls.
//!
//! The callback is the only push-style integration point: a terminal
//! progress bar, a log sink or a GUI can all hang off it without the library
//! knowing how the host renders anything.
//!
//! # Example
//!
//! ```rust
//! use pdftranslate_client::{TaskProgressCallback, TaskSnapshot};
//! use std::sync::{Arc, Mutex};
//!
//! struct LastProgress(Mutex<f64>);
//!
//! impl TaskProgressCallback for LastProgress {
//!     fn on_progress(&self, snapshot: &TaskSnapshot) {
//!         *self.0.lock().unwrap() = snapshot.progress;
//!     }
//! }
//!
//! let cb: Arc<dyn TaskProgressCallback> = Arc::new(LastProgress(Mutex::new(0.0)));
//! cb.on_progress(&TaskSnapshot::running(42.0));
//! ```

use crate::api::{FileHandle, TaskId, TaskSnapshot};
use crate::session::TaskOutcome;
use std::sync::Arc;

/// Called by the controller as the workflow advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`.
pub trait TaskProgressCallback: Send + Sync {
    /// Called once the server accepted the upload.
    fn on_upload_complete(&self, handle: &FileHandle) {
        let _ = handle;
    }

    /// Called when the server acknowledged the translation request.
    fn on_task_started(&self, task_id: &TaskId) {
        let _ = task_id;
    }

    /// Called for every applied (non-stale) status snapshot, including the
    /// terminal one.
    fn on_progress(&self, snapshot: &TaskSnapshot) {
        let _ = snapshot;
    }

    /// Called exactly once per task when it reaches a terminal state.
    fn on_task_finished(&self, task_id: &TaskId, outcome: &TaskOutcome) {
        let _ = (task_id, outcome);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TaskProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in the controller.
pub type ProgressCallback = Arc<dyn TaskProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FileId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        uploads: AtomicUsize,
        progress: AtomicUsize,
        finished: AtomicUsize,
    }

    impl TaskProgressCallback for Counting {
        fn on_upload_complete(&self, _handle: &FileHandle) {
            self.uploads.fetch_add(1, Ordering::SeqCst);
        }

        fn on_progress(&self, _snapshot: &TaskSnapshot) {
            self.progress.fetch_add(1, Ordering::SeqCst);
        }

        fn on_task_finished(&self, _task_id: &TaskId, _outcome: &TaskOutcome) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_task_started(&TaskId("T1".into()));
        cb.on_progress(&TaskSnapshot::running(1.0));
        cb.on_task_finished(&TaskId("T1".into()), &TaskOutcome::Cancelled);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let cb = Counting::default();
        cb.on_upload_complete(&FileHandle {
            file_id: FileId("F1".into()),
            filename: "doc.pdf".into(),
            size: 1,
        });
        cb.on_progress(&TaskSnapshot::running(10.0));
        cb.on_progress(&TaskSnapshot::running(20.0));
        cb.on_task_finished(&TaskId("T1".into()), &TaskOutcome::Cancelled);

        assert_eq!(cb.uploads.load(Ordering::SeqCst), 1);
        assert_eq!(cb.progress.load(Ordering::SeqCst), 2);
        assert_eq!(cb.finished.load(Ordering::SeqCst), 1);
    }
}
