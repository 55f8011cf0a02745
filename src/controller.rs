//! Translation controller: the upload → configure → translate → poll →
//! cancel → download state machine.
//!
//! The controller owns the [`SessionState`], the current [`PollHandle`] and
//! the [`Presenter`]. Every user action is a method; every failure raises
//! exactly one error banner and is returned to the caller.
//!
//! ```text
//!  Idle ──select_file──▶ Uploading ──ok──▶ ReadyToTranslate ──start──▶ Submitting
//!   ▲                        │ err                                        │ ok
//!   └────────────────────────┘                                            ▼
//!                            Completed / Failed / Cancelled ◀──poll── Running
//! ```
//!
//! Status polling runs on a background task; the controller consumes its
//! events through [`TranslationController::next_event`] (or
//! [`TranslationController::wait`]) and applies them to the session, which
//! discards stale or post-terminal snapshots.

use crate::api::{
    FileHandle, ServiceDescriptor, StatusAck, TaskId, TaskResult, TranslateApi, Variant,
};
use crate::config::ClientConfig;
use crate::download::{self, DownloadOutcome};
use crate::error::{ClientError, ValidationError};
use crate::form::{build_form, FormModel};
use crate::poller::{self, PollEvent, PollHandle};
use crate::presenter::{Presenter, ViewModel};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::session::{Applied, Phase, SessionState, TaskOutcome};
use crate::translation::TranslationConfig;
use crate::upload::{self, UploadedFile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pending server confirmation of a cancel request.
///
/// The session is already `Cancelled` when this is returned. Awaiting
/// [`CancelAck::confirmed`] is optional; dropping it leaves the request
/// running in the background.
#[derive(Debug)]
pub struct CancelAck {
    task_id: TaskId,
    handle: JoinHandle<Result<StatusAck, ClientError>>,
}

impl CancelAck {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Wait for the server's answer to the cancel request.
    pub async fn confirmed(self) -> Result<StatusAck, ClientError> {
        self.handle
            .await
            .map_err(|e| ClientError::Internal(format!("cancel request task failed: {e}")))?
    }
}

pub struct TranslationController {
    api: Arc<dyn TranslateApi>,
    config: ClientConfig,
    session: SessionState,
    presenter: Presenter,
    poller: Option<PollHandle>,
    services: Vec<ServiceDescriptor>,
    form: Option<FormModel>,
    progress: ProgressCallback,
}

impl TranslationController {
    pub fn new(api: Arc<dyn TranslateApi>, config: ClientConfig) -> Self {
        Self {
            presenter: Presenter::new(&config),
            api,
            config,
            session: SessionState::new(),
            poller: None,
            services: Vec::new(),
            form: None,
            progress: Arc::new(NoopProgressCallback),
        }
    }

    /// Receive lifecycle events (upload, start, progress, finish).
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = callback;
        self
    }

    // ── Read access ──────────────────────────────────────────────────────

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<dyn TranslateApi> {
        &self.api
    }

    /// Current view model.
    pub fn view(&self) -> ViewModel {
        self.presenter.render(&self.session, self.form.as_ref())
    }

    /// `true` while a status poller is attached to the current task.
    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_stopped())
    }

    // ── Service form ─────────────────────────────────────────────────────

    /// Fetch the service catalogue from the server.
    pub async fn load_services(&mut self) -> Result<&[ServiceDescriptor], ClientError> {
        match self.api.services().await {
            Ok(services) => {
                debug!("Loaded {} translation services", services.len());
                self.services = services;
                Ok(&self.services)
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    /// Switch to `name` and build a fresh form for it. Values entered for a
    /// previous service are discarded.
    pub fn select_service(&mut self, name: &str) -> Result<&mut FormModel, ClientError> {
        let Some(service) = self.services.iter().find(|s| s.name == name) else {
            return self.fail(
                ValidationError::UnknownService {
                    name: name.to_string(),
                }
                .into(),
            );
        };
        debug!("Selected service '{}' ({} fields)", name, service.fields.len());
        Ok(self.form.insert(build_form(service)))
    }

    pub fn form(&self) -> Option<&FormModel> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut FormModel> {
        self.form.as_mut()
    }

    // ── Upload ───────────────────────────────────────────────────────────

    /// Select a file and upload it.
    ///
    /// A file that fails local validation leaves the session untouched and
    /// issues no request. A failed upload returns the session to `Idle`.
    pub async fn select_file(&mut self, file: UploadedFile) -> Result<FileHandle, ClientError> {
        let phase = self.session.phase();
        if matches!(phase, Phase::Uploading | Phase::Submitting | Phase::Running) {
            return self.fail(invalid_state("upload a file", phase));
        }
        if let Err(e) = file.validate(self.config.max_upload_bytes) {
            return self.fail(e.into());
        }

        self.stop_polling();
        self.session.begin_upload(&file);
        let max = self.config.max_upload_bytes;
        match upload::submit_upload(self.api.as_ref(), &mut self.session, file, max).await {
            Ok(handle) => {
                self.presenter
                    .success(format!("Uploaded {}", handle.filename));
                self.progress.on_upload_complete(&handle);
                Ok(handle)
            }
            Err(e) => {
                self.session.upload_failed();
                self.fail(e)
            }
        }
    }

    // ── Translation ──────────────────────────────────────────────────────

    /// Submit the uploaded file for translation and start polling.
    ///
    /// Values of the current service form are merged into
    /// `config.engine_settings`, and the form's service overrides
    /// `config.service`.
    pub async fn start_translation(
        &mut self,
        mut config: TranslationConfig,
    ) -> Result<TaskId, ClientError> {
        let phase = self.session.phase();
        if matches!(phase, Phase::Uploading | Phase::Submitting | Phase::Running) {
            return self.fail(invalid_state("start a translation", phase));
        }
        if self.session.file_handle().is_none() {
            return self.fail(ValidationError::NoFileHandle.into());
        }

        if let Some(form) = &self.form {
            if let Err(e) = form.validate() {
                return self.fail(e.into());
            }
            config.service = form.service.clone();
            config.engine_settings.extend(form.collect_values());
        }
        if let Err(e) = config.validate() {
            return self.fail(e.into());
        }

        if phase.is_terminal() {
            self.session.reset_task();
        }
        let Some(file_id) = self.session.begin_submit() else {
            return self.fail(ValidationError::NoFileHandle.into());
        };

        let started = match self.api.start_translation(&file_id, &config).await {
            Ok(started) => started,
            Err(e) => {
                self.session.submit_failed();
                return self.fail(e);
            }
        };

        let task_id = started.task_id;
        info!(
            "Started translation task {} for file {} ({} → {}, {})",
            task_id, file_id, config.lang_from, config.lang_to, config.service
        );

        self.stop_polling();
        let generation = self.session.task_started(task_id.clone());
        self.poller = Some(poller::spawn(
            Arc::clone(&self.api),
            task_id.clone(),
            generation,
            self.config.poll_interval,
        ));
        self.progress.on_task_started(&task_id);
        Ok(task_id)
    }

    /// Wait for the next poll event and apply it. `None` when no poller is
    /// attached or it has ended.
    pub async fn next_event(&mut self) -> Option<Applied> {
        let event = self.poller.as_mut()?.next_event().await;
        match event {
            Some(event) => Some(self.apply_event(event)),
            None => {
                self.poller = None;
                None
            }
        }
    }

    /// Offer one poll event to the session and react to the result.
    pub fn apply_event(&mut self, event: PollEvent) -> Applied {
        let PollEvent {
            task_id,
            generation,
            seq,
            snapshot,
        } = event;
        let applied = self.session.apply_snapshot(generation, seq, snapshot);

        match &applied {
            Applied::Progress => {
                if let Some(s) = self.session.snapshot() {
                    debug!(
                        "Task {} #{}: {:.0}% {}",
                        task_id,
                        seq,
                        s.progress,
                        s.stage.as_deref().unwrap_or("")
                    );
                    self.progress.on_progress(s);
                }
            }
            Applied::Terminal(outcome) => {
                if let Some(s) = self.session.snapshot() {
                    self.progress.on_progress(s);
                }
                self.stop_polling();
                match outcome {
                    TaskOutcome::Completed(result) => {
                        info!(
                            "Task {} completed in {:.2}s",
                            task_id,
                            result.total_seconds.unwrap_or_default()
                        );
                        self.presenter.success("Translation completed");
                    }
                    TaskOutcome::Failed { message } => {
                        info!("Task {} failed: {}", task_id, message);
                        self.presenter.error(message.clone());
                    }
                    TaskOutcome::Cancelled => {
                        info!("Task {} was cancelled by the server", task_id);
                        self.presenter.info("Translation cancelled");
                    }
                }
                self.progress.on_task_finished(&task_id, outcome);
            }
            Applied::Discarded(reason) => {
                debug!("Discarded snapshot #{} of task {}: {:?}", seq, task_id, reason);
            }
        }
        applied
    }

    /// Drive polling until the current task reaches a terminal state.
    ///
    /// Returns the result record on completion, [`ClientError::TaskFailed`]
    /// or [`ClientError::TaskCancelled`] otherwise.
    pub async fn wait(&mut self) -> Result<TaskResult, ClientError> {
        let Some(task_id) = self.session.task_id().cloned() else {
            return self.fail(ValidationError::NoActiveTask.into());
        };
        while !self.session.phase().is_terminal() {
            if self.next_event().await.is_none() {
                break;
            }
        }
        match self.session.outcome() {
            Some(TaskOutcome::Completed(result)) => Ok(result.clone()),
            Some(TaskOutcome::Failed { message }) => Err(ClientError::TaskFailed {
                task_id: task_id.0,
                message: message.clone(),
            }),
            Some(TaskOutcome::Cancelled) => Err(ClientError::TaskCancelled { task_id: task_id.0 }),
            None => self.fail(ClientError::Internal(format!(
                "status polling for task {task_id} ended before a terminal state"
            ))),
        }
    }

    // ── Cancel ───────────────────────────────────────────────────────────

    /// Cancel the running task.
    ///
    /// Polling stops and the session becomes `Cancelled` immediately; the
    /// cancel request is sent in the background. A failed cancel request is
    /// logged and does not change local state.
    pub fn cancel(&mut self) -> Result<CancelAck, ClientError> {
        let Some(task_id) = self.session.task_id().cloned() else {
            return self.fail(ValidationError::NoActiveTask.into());
        };
        let phase = self.session.phase();
        if phase != Phase::Running {
            return self.fail(invalid_state("cancel", phase));
        }

        self.stop_polling();
        self.session.mark_cancelled();
        self.presenter.info("Translation cancelled");
        self.progress
            .on_task_finished(&task_id, &TaskOutcome::Cancelled);
        info!("Cancelled task {}", task_id);

        let api = Arc::clone(&self.api);
        let id = task_id.clone();
        let handle = tokio::spawn(async move {
            let result = api.cancel_task(&id).await;
            if let Err(e) = &result {
                warn!("Cancel request for task {} failed: {}", id, e);
            }
            result
        });
        Ok(CancelAck { task_id, handle })
    }

    // ── Reset ────────────────────────────────────────────────────────────

    /// Forget the current task but keep the uploaded file.
    pub fn reset_task(&mut self) {
        self.stop_polling();
        self.session.reset_task();
    }

    /// Remove the selected file and any task: back to `Idle`.
    pub fn reset(&mut self) {
        self.stop_polling();
        self.session.reset();
    }

    /// Release the task and file on the server, then reset locally.
    ///
    /// Both deletes are attempted; the first failure is returned after the
    /// local reset.
    pub async fn cleanup(&mut self) -> Result<(), ClientError> {
        self.stop_polling();
        let mut first_error = None;

        if let Some(task_id) = self.session.task_id().cloned() {
            if let Err(e) = self.api.cleanup_task(&task_id).await {
                warn!("Cleanup of task {} failed: {}", task_id, e);
                first_error.get_or_insert(e);
            }
        }
        if let Some(file_id) = self.session.file_handle().map(|h| h.file_id.clone()) {
            if let Err(e) = self.api.cleanup_file(&file_id).await {
                warn!("Cleanup of file {} failed: {}", file_id, e);
                first_error.get_or_insert(e);
            }
        }

        self.session.reset();
        match first_error {
            Some(e) => self.fail(e),
            None => Ok(()),
        }
    }

    // ── Download ─────────────────────────────────────────────────────────

    /// Save one variant of the completed task into `dir`.
    pub async fn download(&mut self, variant: Variant, dir: &Path) -> Result<PathBuf, ClientError> {
        let (task_id, result) = self.completed_task()?;
        let prefer = self.config.prefer_storage_download;
        match download::download_to_dir(self.api.as_ref(), &task_id, Some(&result), variant, dir, prefer)
            .await
        {
            Ok(path) => Ok(path),
            Err(e) => self.fail(e),
        }
    }

    /// Save every generated variant of the completed task into `dir`.
    pub async fn download_all(
        &mut self,
        dir: &Path,
    ) -> Result<Vec<(Variant, DownloadOutcome)>, ClientError> {
        let (task_id, result) = self.completed_task()?;
        let prefer = self.config.prefer_storage_download;
        match download::download_all(self.api.as_ref(), &task_id, Some(&result), dir, prefer).await {
            Ok(outcomes) => Ok(outcomes),
            Err(e) => self.fail(e),
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn completed_task(&mut self) -> Result<(TaskId, TaskResult), ClientError> {
        let Some(task_id) = self.session.task_id().cloned() else {
            return self.fail(ValidationError::NoActiveTask.into());
        };
        if let Some(TaskOutcome::Completed(result)) = self.session.outcome() {
            return Ok((task_id, result.clone()));
        }
        let phase = self.session.phase();
        self.fail(invalid_state("download results", phase))
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
            debug!("Stopped poller for task {}", poller.task_id());
        }
    }

    /// Raise an error banner and return `e`.
    fn fail<T>(&mut self, e: ClientError) -> Result<T, ClientError> {
        self.presenter.error(e.to_string());
        Err(e)
    }
}

impl Drop for TranslationController {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

fn invalid_state(action: &str, phase: Phase) -> ClientError {
    ClientError::InvalidState {
        action: action.to_string(),
        state: phase.to_string(),
    }
}
