//! Session state: the single owner of the current file handle and task.
//!
//! One [`SessionState`] lives inside the controller and is handed by
//! reference to the upload step; the presenter only reads it. Its lifecycle
//! is `init → active → reset`: [`SessionState::new`] starts empty, an upload
//! makes it active, and [`SessionState::reset`] returns it to the initial
//! state.
//!
//! ## Ordering of poll responses
//!
//! Every started task gets a fresh *generation*; every poll request within a
//! generation gets a strictly increasing *sequence number*. A snapshot is
//! applied only when it belongs to the current generation, is newer than the
//! last applied one and no terminal state has been reached. Everything else
//! is discarded, so a delayed response can never regress progress and a
//! terminal transition happens exactly once.

use crate::api::{FileHandle, FileId, TaskId, TaskResult, TaskSnapshot, TaskState};
use crate::upload::UploadedFile;
use std::fmt;
use tracing::debug;

/// Message used when the server reports an error without text.
pub const GENERIC_FAILURE: &str = "Translation failed";

/// Where the controller is in the upload → translate workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Uploading,
    ReadyToTranslate,
    Submitting,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed | Phase::Cancelled)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Uploading => "uploading",
            Phase::ReadyToTranslate => "ready to translate",
            Phase::Submitting => "submitting",
            Phase::Running => "running",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
            Phase::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// How a task ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed(TaskResult),
    Failed { message: String },
    Cancelled,
}

/// Name and size of the selected file, kept for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub filename: String,
    pub size: u64,
}

impl From<&UploadedFile> for SelectedFile {
    fn from(f: &UploadedFile) -> Self {
        Self {
            filename: f.filename.clone(),
            size: f.size,
        }
    }
}

/// Why a poll snapshot was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Belongs to an earlier task or a stopped poller.
    Superseded,
    /// Older than (or equal to) the last applied snapshot.
    OutOfOrder,
    /// The task already reached a terminal state.
    AfterTerminal,
}

/// Result of offering a snapshot to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Progress,
    Terminal(TaskOutcome),
    Discarded(DiscardReason),
}

#[derive(Debug)]
pub struct SessionState {
    phase: Phase,
    selected: Option<SelectedFile>,
    file: Option<FileHandle>,
    task: Option<TaskId>,
    snapshot: Option<TaskSnapshot>,
    outcome: Option<TaskOutcome>,
    generation: u64,
    last_seq: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            selected: None,
            file: None,
            task: None,
            snapshot: None,
            outcome: None,
            generation: 0,
            last_seq: 0,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    pub fn file_handle(&self) -> Option<&FileHandle> {
        self.file.as_ref()
    }

    pub fn task_id(&self) -> Option<&TaskId> {
        self.task.as_ref()
    }

    /// Latest applied status snapshot of the current task.
    pub fn snapshot(&self) -> Option<&TaskSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn outcome(&self) -> Option<&TaskOutcome> {
        self.outcome.as_ref()
    }

    /// Generation of the current task's poller.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ── Upload ───────────────────────────────────────────────────────────

    /// `Idle | ReadyToTranslate | terminal → Uploading`.
    pub(crate) fn begin_upload(&mut self, file: &UploadedFile) {
        self.selected = Some(file.into());
        self.phase = Phase::Uploading;
    }

    /// `Uploading → ReadyToTranslate`. Replaces any previous handle.
    pub(crate) fn store_file_handle(&mut self, file: UploadedFile, handle: FileHandle) {
        if let Some(old) = self.file.replace(handle) {
            debug!("Discarding previous file handle {}", old.file_id);
        }
        self.selected = Some((&file).into());
        self.clear_task();
        self.phase = Phase::ReadyToTranslate;
    }

    /// `Uploading → Idle`.
    pub(crate) fn upload_failed(&mut self) {
        self.selected = None;
        self.file = None;
        self.clear_task();
        self.phase = Phase::Idle;
    }

    // ── Translation ──────────────────────────────────────────────────────

    /// `ReadyToTranslate → Submitting`; returns the file id to submit.
    pub(crate) fn begin_submit(&mut self) -> Option<FileId> {
        let file_id = self.file.as_ref()?.file_id.clone();
        self.phase = Phase::Submitting;
        Some(file_id)
    }

    /// `Submitting → ReadyToTranslate`.
    pub(crate) fn submit_failed(&mut self) {
        self.phase = Phase::ReadyToTranslate;
    }

    /// `Submitting → Running`; returns the generation for the new poller.
    pub(crate) fn task_started(&mut self, task_id: TaskId) -> u64 {
        self.generation += 1;
        self.last_seq = 0;
        self.task = Some(task_id);
        self.snapshot = Some(TaskSnapshot::running(0.0));
        self.outcome = None;
        self.phase = Phase::Running;
        self.generation
    }

    /// Offer a poll snapshot. See the module docs for the ordering rules.
    pub fn apply_snapshot(&mut self, generation: u64, seq: u64, snapshot: TaskSnapshot) -> Applied {
        if generation != self.generation {
            return Applied::Discarded(DiscardReason::Superseded);
        }
        if self.phase != Phase::Running {
            return Applied::Discarded(DiscardReason::AfterTerminal);
        }
        if seq <= self.last_seq {
            return Applied::Discarded(DiscardReason::OutOfOrder);
        }
        self.last_seq = seq;

        let outcome = match snapshot.status {
            TaskState::Running => None,
            TaskState::Completed => Some((
                Phase::Completed,
                TaskOutcome::Completed(snapshot.result.clone().unwrap_or_default()),
            )),
            TaskState::Error => Some((
                Phase::Failed,
                TaskOutcome::Failed {
                    message: snapshot
                        .error
                        .clone()
                        .filter(|e| !e.trim().is_empty())
                        .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
                },
            )),
            TaskState::Cancelled => Some((Phase::Cancelled, TaskOutcome::Cancelled)),
        };
        self.snapshot = Some(snapshot);

        match outcome {
            None => Applied::Progress,
            Some((phase, outcome)) => {
                self.phase = phase;
                self.outcome = Some(outcome.clone());
                Applied::Terminal(outcome)
            }
        }
    }

    /// `Running → Cancelled`, without waiting for the server.
    ///
    /// Returns `false` when there was nothing to cancel.
    pub(crate) fn mark_cancelled(&mut self) -> bool {
        if self.phase != Phase::Running {
            return false;
        }
        self.phase = Phase::Cancelled;
        self.outcome = Some(TaskOutcome::Cancelled);
        true
    }

    // ── Reset ────────────────────────────────────────────────────────────

    /// Forget the task but keep the uploaded file: `→ ReadyToTranslate`.
    pub(crate) fn reset_task(&mut self) {
        self.clear_task();
        self.phase = if self.file.is_some() {
            Phase::ReadyToTranslate
        } else {
            Phase::Idle
        };
    }

    /// Forget everything: `→ Idle`.
    pub fn reset(&mut self) {
        self.selected = None;
        self.file = None;
        self.clear_task();
        self.phase = Phase::Idle;
    }

    fn clear_task(&mut self) {
        // Bumping the generation orphans any in-flight poll responses.
        self.generation += 1;
        self.last_seq = 0;
        self.task = None;
        self.snapshot = None;
        self.outcome = None;
    }
}
