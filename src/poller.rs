//! Status poller: a cancellable background probe of one task's status.
//!
//! [`spawn`] starts a Tokio task that requests `GET /api/task/{id}/status`
//! at a fixed interval and forwards each snapshot, tagged with a sequence
//! number, over a channel. The returned [`PollHandle`] owns the task:
//! stopping or dropping it cancels the loop.
//!
//! Ticks are strictly sequential. The next request is issued only after the
//! previous one returned, and ticks missed while a request was in flight are
//! skipped rather than bunched up, so there is never more than one status
//! request in flight per task.
//!
//! A failed tick is logged as a [`PollError`] and otherwise ignored: no
//! counter, no backoff, no event. The loop ends on its own after forwarding
//! a terminal snapshot.

use crate::api::{TaskId, TaskSnapshot, TranslateApi};
use crate::error::PollError;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// One status response, in request order.
#[derive(Debug, Clone)]
pub struct PollEvent {
    pub task_id: TaskId,
    /// Session generation this poller was started for.
    pub generation: u64,
    /// 1-based request sequence number within the generation.
    pub seq: u64,
    pub snapshot: TaskSnapshot,
}

/// Handle to a running poller. Dropping it stops the loop.
pub struct PollHandle {
    task_id: TaskId,
    generation: u64,
    cancel: CancellationToken,
    events: mpsc::Receiver<PollEvent>,
    join: JoinHandle<()>,
    _guard: DropGuard,
}

impl PollHandle {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Signal the loop to stop. Any request in flight is abandoned and its
    /// response is never forwarded.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.join.is_finished()
    }

    /// Wait for the next snapshot. `None` once the loop has ended and every
    /// forwarded event has been received.
    pub async fn next_event(&mut self) -> Option<PollEvent> {
        self.events.recv().await
    }

    /// Consume the handle as a stream of snapshots. Dropping the stream
    /// stops the poller.
    pub fn into_stream(self) -> SnapshotStream {
        SnapshotStream {
            inner: ReceiverStream::new(self.events),
            _guard: self._guard,
        }
    }
}

/// Snapshots of one task until it reaches a terminal state.
pub struct SnapshotStream {
    inner: ReceiverStream<PollEvent>,
    _guard: DropGuard,
}

impl Stream for SnapshotStream {
    type Item = TaskSnapshot;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner)
            .poll_next(cx)
            .map(|event| event.map(|e| e.snapshot))
    }
}

/// Start polling `task_id` every `interval`.
pub fn spawn(
    api: Arc<dyn TranslateApi>,
    task_id: TaskId,
    generation: u64,
    interval: Duration,
) -> PollHandle {
    let cancel = CancellationToken::new();
    let (tx, rx) = mpsc::channel(16);

    let join = tokio::spawn(run(
        api,
        task_id.clone(),
        generation,
        interval,
        cancel.clone(),
        tx,
    ));

    PollHandle {
        task_id,
        generation,
        _guard: cancel.clone().drop_guard(),
        cancel,
        events: rx,
        join,
    }
}

async fn run(
    api: Arc<dyn TranslateApi>,
    task_id: TaskId,
    generation: u64,
    interval: Duration,
    cancel: CancellationToken,
    tx: mpsc::Sender<PollEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut seq = 0u64;

    debug!("Poller started for task {} (generation {})", task_id, generation);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        seq += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            r = api.task_status(&task_id) => r,
        };

        match result {
            Ok(snapshot) => {
                let terminal = snapshot.status.is_terminal();
                let event = PollEvent {
                    task_id: task_id.clone(),
                    generation,
                    seq,
                    snapshot,
                };
                let delivered = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => false,
                    r = tx.send(event) => r.is_ok(),
                };
                if !delivered || terminal {
                    break;
                }
            }
            Err(e) => {
                let err = PollError {
                    task_id: task_id.0.clone(),
                    seq,
                    detail: e.to_string(),
                };
                warn!("{}", err);
            }
        }
    }

    debug!("Poller for task {} stopped after {} requests", task_id, seq);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::*;
    use crate::error::ClientError;
    use crate::translation::TranslationConfig;
    use crate::upload::UploadedFile;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of status responses.
    struct Scripted {
        script: Mutex<VecDeque<Result<TaskSnapshot, ClientError>>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<TaskSnapshot, ClientError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl TranslateApi for Scripted {
        async fn languages(&self) -> Result<Vec<LanguageInfo>, ClientError> {
            unreachable!()
        }
        async fn services(&self) -> Result<Vec<ServiceDescriptor>, ClientError> {
            unreachable!()
        }
        async fn upload(&self, _: &UploadedFile) -> Result<FileHandle, ClientError> {
            unreachable!()
        }
        async fn start_translation(
            &self,
            _: &FileId,
            _: &TranslationConfig,
        ) -> Result<TaskStarted, ClientError> {
            unreachable!()
        }
        async fn task_status(&self, _: &TaskId) -> Result<TaskSnapshot, ClientError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(TaskSnapshot::running(0.0)))
        }
        async fn cancel_task(&self, _: &TaskId) -> Result<StatusAck, ClientError> {
            unreachable!()
        }
        async fn download(&self, _: &TaskId, _: Variant) -> Result<Bytes, ClientError> {
            unreachable!()
        }
        async fn fetch_url(&self, _: &str) -> Result<Bytes, ClientError> {
            unreachable!()
        }
        async fn cleanup_task(&self, _: &TaskId) -> Result<StatusAck, ClientError> {
            unreachable!()
        }
        async fn cleanup_file(&self, _: &FileId) -> Result<StatusAck, ClientError> {
            unreachable!()
        }
        async fn health(&self) -> Result<HealthStatus, ClientError> {
            unreachable!()
        }
    }

    fn completed() -> TaskSnapshot {
        TaskSnapshot {
            status: TaskState::Completed,
            ..TaskSnapshot::running(100.0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_skipped() {
        let api = Scripted::new(vec![
            Ok(TaskSnapshot::running(10.0)),
            Err(ClientError::Transport {
                operation: "status".into(),
                reason: "connection reset".into(),
            }),
            Ok(completed()),
        ]);
        let mut handle = spawn(api, TaskId("T1".into()), 1, Duration::from_secs(1));

        let first = handle.next_event().await.unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(first.snapshot.progress, 10.0);

        // Seq 2 failed silently; seq 3 carries the terminal snapshot.
        let second = handle.next_event().await.unwrap();
        assert_eq!(second.seq, 3);
        assert_eq!(second.snapshot.status, TaskState::Completed);

        assert!(handle.next_event().await.is_none(), "loop ends after terminal");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_loop() {
        let api = Scripted::new(vec![]);
        let mut handle = spawn(api, TaskId("T1".into()), 1, Duration::from_secs(1));
        assert!(handle.next_event().await.is_some());
        handle.stop();
        assert!(handle.is_stopped());
        // Drain whatever was already buffered; then the channel closes.
        while handle.next_event().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn stream_yields_until_terminal() {
        use futures::StreamExt;

        let api = Scripted::new(vec![
            Ok(TaskSnapshot::running(20.0)),
            Ok(TaskSnapshot::running(60.0)),
            Ok(completed()),
        ]);
        let handle = spawn(api, TaskId("T9".into()), 1, Duration::from_millis(250));
        let progress: Vec<f64> = handle.into_stream().map(|s| s.progress).collect().await;
        assert_eq!(progress, vec![20.0, 60.0, 100.0]);
    }
}
