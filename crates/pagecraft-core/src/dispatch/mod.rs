//! Dispatch layer.
//!
//! A [`Dispatcher`] owns at most one execution unit: an operation worker
//! reached over channels plus a router thread that matches responses to
//! outstanding requests by correlation id. The unit is started on the
//! first submit and replaced when it dies.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use flume::{Receiver, RecvError};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::config::WorkerConfig;
use crate::error::DispatchError;
use crate::ops::{SplitMode, WatermarkOptions};
use crate::worker::{
    Artifact, CorrelationId, Operation, OperationRequest, OperationResponse, OperationWorker,
    ProgressEvent, WorkerChannels,
};

/// Starts an execution unit serving the given channels.
///
/// The unit must drop its ends of the response and progress channels when
/// it stops, whether it exits or crashes.
pub trait Spawn: Send + Sync + 'static {
    fn spawn(&self, channels: WorkerChannels) -> Result<(), DispatchError>;
}

impl<F> Spawn for F
where
    F: Fn(WorkerChannels) -> Result<(), DispatchError> + Send + Sync + 'static,
{
    fn spawn(&self, channels: WorkerChannels) -> Result<(), DispatchError> {
        self(channels)
    }
}

/// Runs an [`OperationWorker`] on a named OS thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadSpawner {
    config: WorkerConfig,
}

impl ThreadSpawner {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }
}

impl Spawn for ThreadSpawner {
    fn spawn(&self, channels: WorkerChannels) -> Result<(), DispatchError> {
        let worker = OperationWorker::new(&self.config);
        std::thread::Builder::new()
            .name("pagecraft-worker".to_string())
            .spawn(move || worker.run(channels))
            .map(|_| ())
            .map_err(|e| DispatchError::Spawn(e.to_string()))
    }
}

type Reply = oneshot::Sender<Result<Artifact, DispatchError>>;
type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Outstanding requests of one unit.
#[derive(Default)]
struct Pending {
    entries: HashMap<CorrelationId, Reply>,
    alive: bool,
}

fn lock(pending: &Mutex<Pending>) -> std::sync::MutexGuard<'_, Pending> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Unit {
    requests: flume::Sender<OperationRequest>,
    /// Second handle on the request queue, used to discard the backlog.
    backlog: Receiver<OperationRequest>,
    pending: Arc<Mutex<Pending>>,
}

impl Unit {
    fn is_alive(&self) -> bool {
        lock(&self.pending).alive
    }
}

enum Routed {
    Response(Result<OperationResponse, RecvError>),
    Progress(Result<ProgressEvent, RecvError>),
}

fn route(
    responses: Receiver<OperationResponse>,
    progress: Receiver<ProgressEvent>,
    pending: Arc<Mutex<Pending>>,
    callback: Option<ProgressCallback>,
) {
    let mut progress_open = true;

    loop {
        let routed = if progress_open {
            flume::Selector::new()
                .recv(&responses, Routed::Response)
                .recv(&progress, Routed::Progress)
                .wait()
        } else {
            Routed::Response(responses.recv())
        };

        match routed {
            Routed::Response(Ok(response)) => {
                let reply = lock(&pending).entries.remove(&response.id);
                match reply {
                    Some(reply) => {
                        trace!("Routing response for {}", response.id);
                        let _ = reply.send(response.outcome.map_err(DispatchError::Failed));
                    }
                    None => trace!("Dropping unmatched response {}", response.id),
                }
            }
            // Only reported once the channel is empty and every sender is gone.
            Routed::Response(Err(RecvError::Disconnected)) => break,
            Routed::Progress(Ok(event)) => {
                // Events of a torn-down unit are not reported.
                if let Some(callback) = callback.as_ref().filter(|_| lock(&pending).alive) {
                    callback(event);
                }
            }
            Routed::Progress(Err(RecvError::Disconnected)) => progress_open = false,
        }
    }

    let mut pending = lock(&pending);
    pending.alive = false;
    if pending.entries.is_empty() {
        debug!("Operation worker exited");
    } else {
        warn!(
            "Operation worker died with {} pending requests",
            pending.entries.len()
        );
    }
    for (_, reply) in pending.entries.drain() {
        let _ = reply.send(Err(DispatchError::WorkerUnavailable));
    }
}

/// A submitted request. Resolves to the worker's artifact or error.
///
/// Dropping it does not cancel the work.
#[must_use = "a pending task does nothing unless awaited"]
pub struct PendingTask {
    id: CorrelationId,
    rx: oneshot::Receiver<Result<Artifact, DispatchError>>,
}

impl PendingTask {
    pub fn id(&self) -> CorrelationId {
        self.id
    }
}

impl Future for PendingTask {
    type Output = Result<Artifact, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The entry was discarded without an answer: the dispatcher shut down.
            Poll::Ready(Err(_)) => Poll::Ready(Err(DispatchError::Terminated)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Sends page operations to an isolated worker and hands back futures.
pub struct Dispatcher<S: Spawn = ThreadSpawner> {
    spawner: S,
    unit: Mutex<Option<Unit>>,
    next_id: AtomicU64,
    progress: Option<ProgressCallback>,
}

impl Dispatcher<ThreadSpawner> {
    /// Create a dispatcher whose worker runs on its own thread.
    pub fn new(config: WorkerConfig) -> Self {
        Self::with_spawner(ThreadSpawner::new(config))
    }
}

impl<S: Spawn> Dispatcher<S> {
    pub fn with_spawner(spawner: S) -> Self {
        Self {
            spawner,
            unit: Mutex::new(None),
            next_id: AtomicU64::new(1),
            progress: None,
        }
    }

    /// Receive progress events of long-running operations.
    pub fn with_progress(mut self, callback: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    fn start_unit(&self) -> Result<Unit, DispatchError> {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let (progress_tx, progress_rx) = flume::unbounded();

        self.spawner.spawn(WorkerChannels {
            requests: request_rx.clone(),
            responses: response_tx,
            progress: progress_tx,
        })?;

        let pending = Arc::new(Mutex::new(Pending {
            entries: HashMap::new(),
            alive: true,
        }));
        let router_pending = Arc::clone(&pending);
        let callback = self.progress.clone();
        std::thread::Builder::new()
            .name("pagecraft-router".to_string())
            .spawn(move || route(response_rx, progress_rx, router_pending, callback))
            .map_err(|e| DispatchError::Spawn(e.to_string()))?;

        debug!("Started operation worker");
        Ok(Unit {
            requests: request_tx,
            backlog: request_rx,
            pending,
        })
    }

    /// Send an operation to the worker, starting one if needed.
    pub fn submit(&self, operation: Operation) -> Result<PendingTask, DispatchError> {
        let mut slot = self.unit.lock().unwrap_or_else(PoisonError::into_inner);
        let unit = match slot.take() {
            Some(unit) if unit.is_alive() => unit,
            _ => self.start_unit()?,
        };
        let unit = slot.insert(unit);

        let id = CorrelationId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (reply, rx) = oneshot::channel();
        {
            let mut pending = lock(&unit.pending);
            if !pending.alive {
                return Err(DispatchError::WorkerUnavailable);
            }
            pending.entries.insert(id, reply);
        }

        let kind = operation.kind();
        if unit.requests.send(OperationRequest { id, operation }).is_err() {
            lock(&unit.pending).entries.remove(&id);
            return Err(DispatchError::WorkerUnavailable);
        }
        trace!("{} {} submitted", id, kind);

        Ok(PendingTask { id, rx })
    }

    /// Submit an operation and wait for its result.
    pub async fn execute(&self, operation: Operation) -> Result<Artifact, DispatchError> {
        self.submit(operation)?.await
    }

    /// Stop the worker and fail outstanding tasks with `Terminated`.
    ///
    /// The worker finishes the request it is running, then exits. Queued
    /// requests are discarded and no further progress is reported.
    pub fn shutdown(&self) {
        let unit = self.unit.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(unit) = unit {
            {
                let mut pending = lock(&unit.pending);
                pending.alive = false;
                if !pending.entries.is_empty() {
                    debug!("Discarding {} pending requests", pending.entries.len());
                }
                pending.entries.clear();
            }
            let discarded = unit.backlog.drain().count();
            if discarded > 0 {
                trace!("Dropped {} queued requests", discarded);
            }
            // Dropping the last request sender ends the worker loop.
        }
    }

    /// Requests sent but not yet answered.
    pub fn pending_count(&self) -> usize {
        self.unit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|unit| lock(&unit.pending).entries.len())
            .unwrap_or(0)
    }

    /// Whether a live execution unit exists.
    pub fn is_running(&self) -> bool {
        self.unit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(Unit::is_alive)
    }

    pub async fn merge(&self, documents: Vec<Vec<u8>>) -> Result<Vec<u8>, DispatchError> {
        single(self.execute(Operation::Merge { documents }).await?)
    }

    pub async fn extract(&self, document: Vec<u8>, pages: Vec<u32>) -> Result<Vec<u8>, DispatchError> {
        single(self.execute(Operation::Extract { document, pages }).await?)
    }

    pub async fn reorder(&self, document: Vec<u8>, order: Vec<u32>) -> Result<Vec<u8>, DispatchError> {
        single(self.execute(Operation::Reorder { document, order }).await?)
    }

    pub async fn delete(&self, document: Vec<u8>, pages: Vec<u32>) -> Result<Vec<u8>, DispatchError> {
        single(self.execute(Operation::Delete { document, pages }).await?)
    }

    pub async fn rotate(&self, document: Vec<u8>, pages: Vec<u32>, degrees: i32) -> Result<Vec<u8>, DispatchError> {
        single(self.execute(Operation::Rotate { document, pages, degrees }).await?)
    }

    pub async fn split(&self, document: Vec<u8>, mode: SplitMode) -> Result<Vec<Vec<u8>>, DispatchError> {
        Ok(self.execute(Operation::Split { document, mode }).await?.into_documents())
    }

    pub async fn watermark(&self, document: Vec<u8>, options: WatermarkOptions) -> Result<Vec<u8>, DispatchError> {
        single(self.execute(Operation::Watermark { document, options }).await?)
    }
}

impl<S: Spawn> Drop for Dispatcher<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn single(artifact: Artifact) -> Result<Vec<u8>, DispatchError> {
    match artifact {
        Artifact::Document(data) => Ok(data),
        Artifact::Documents(parts) => Err(DispatchError::Failed(format!(
            "expected one document, got {}",
            parts.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{page_labels, sample_pdf};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn extract_op(pages: Vec<u32>) -> Operation {
        Operation::Extract {
            document: sample_pdf("x", 3),
            pages,
        }
    }

    #[tokio::test]
    async fn test_merge_through_real_worker() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let dispatcher = Dispatcher::new(WorkerConfig::default())
            .with_progress(move |event| sink.lock().unwrap().push(event.percent));

        let merged = dispatcher
            .merge(vec![sample_pdf("a", 1), sample_pdf("b", 2)])
            .await
            .unwrap();
        assert_eq!(page_labels(&merged), vec!["a p1", "b p1", "b p2"]);
        assert!(dispatcher.is_running());
        assert_eq!(dispatcher.pending_count(), 0);

        // progress is routed independently of the response
        for _ in 0..200 {
            if events.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*events.lock().unwrap(), vec![50.0, 100.0]);
    }

    #[tokio::test]
    async fn test_failures_reach_the_caller() {
        let dispatcher = Dispatcher::new(WorkerConfig::default());
        let err = dispatcher
            .rotate(sample_pdf("r", 1), vec![1], 30)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Failed(msg) if msg.contains("invalid rotation")));

        // the worker survives a failed request
        let out = dispatcher.extract(sample_pdf("r", 2), vec![2]).await.unwrap();
        assert_eq!(page_labels(&out), vec!["r p2"]);
    }

    #[tokio::test]
    async fn test_watermark_through_real_worker() {
        let dispatcher = Dispatcher::new(WorkerConfig::default());
        let out = dispatcher
            .watermark(sample_pdf("w", 2), WatermarkOptions::new("SAMPLE"))
            .await
            .unwrap();
        assert_eq!(page_labels(&out), vec!["w p1", "w p2"]);

        let err = dispatcher
            .watermark(sample_pdf("w", 1), WatermarkOptions { opacity: 2.0, ..WatermarkOptions::new("x") })
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Failed(msg) if msg.contains("invalid watermark")));
    }

    #[tokio::test]
    async fn test_out_of_order_responses_reach_their_callers() {
        let dispatcher = Dispatcher::with_spawner(|channels: WorkerChannels| {
            std::thread::spawn(move || {
                let requests: Vec<OperationRequest> = channels.requests.iter().take(3).collect();
                let _ = channels.responses.send(OperationResponse {
                    id: CorrelationId::new(999),
                    outcome: Ok(Artifact::Document(vec![])),
                });
                for request in requests.into_iter().rev() {
                    let _ = channels.responses.send(OperationResponse {
                        id: request.id,
                        outcome: Ok(Artifact::Document(request.id.0.to_le_bytes().to_vec())),
                    });
                }
                for _ in channels.requests.iter() {}
            });
            Ok(())
        });

        let tasks: Vec<PendingTask> = (0..3)
            .map(|_| dispatcher.submit(extract_op(vec![1])).unwrap())
            .collect();
        let ids: Vec<u64> = tasks.iter().map(|t| t.id().0).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        for task in tasks {
            let id = task.id().0;
            let Artifact::Document(data) = task.await.unwrap() else {
                panic!("expected a document");
            };
            assert_eq!(data, id.to_le_bytes().to_vec());
        }
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_crash_rejects_pending_and_next_submit_respawns() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&spawned);
        let dispatcher = Dispatcher::with_spawner(move |channels: WorkerChannels| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                // dies after taking two requests, answering none
                std::thread::spawn(move || {
                    let _taken: Vec<_> = channels.requests.iter().take(2).collect();
                });
                Ok(())
            } else {
                ThreadSpawner::default().spawn(channels)
            }
        });

        let first = dispatcher.submit(extract_op(vec![1])).unwrap();
        let second = dispatcher.submit(extract_op(vec![2])).unwrap();
        assert_eq!(first.await, Err(DispatchError::WorkerUnavailable));
        assert_eq!(second.await, Err(DispatchError::WorkerUnavailable));
        assert!(!dispatcher.is_running());

        let Artifact::Document(data) = dispatcher.execute(extract_op(vec![3, 1])).await.unwrap() else {
            panic!("expected a document");
        };
        assert_eq!(page_labels(&data), vec!["x p3", "x p1"]);
        assert_eq!(spawned.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_shutdown_terminates_pending() {
        let dispatcher = Dispatcher::with_spawner(|channels: WorkerChannels| {
            std::thread::spawn(move || for _ in channels.requests.iter() {});
            Ok(())
        });

        let task = dispatcher.submit(extract_op(vec![1])).unwrap();
        assert_eq!(dispatcher.pending_count(), 1);

        dispatcher.shutdown();
        assert_eq!(task.await, Err(DispatchError::Terminated));
        assert_eq!(dispatcher.pending_count(), 0);
        assert!(!dispatcher.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_discards_queued_requests() {
        let (gate_tx, gate_rx) = flume::unbounded::<()>();
        let (done_tx, done_rx) = flume::unbounded::<()>();
        let handled = Arc::new(AtomicUsize::new(0));
        let reported = Arc::new(AtomicUsize::new(0));

        let worker_handled = Arc::clone(&handled);
        let sink = Arc::clone(&reported);
        let dispatcher = Dispatcher::with_spawner(move |channels: WorkerChannels| {
            let gate = gate_rx.clone();
            let done = done_tx.clone();
            let handled = Arc::clone(&worker_handled);
            std::thread::spawn(move || {
                for request in channels.requests.iter() {
                    let _ = gate.recv();
                    handled.fetch_add(1, Ordering::SeqCst);
                    let _ = channels.progress.send(ProgressEvent {
                        kind: request.operation.kind(),
                        percent: 100.0,
                    });
                    let _ = channels.responses.send(OperationResponse {
                        id: request.id,
                        outcome: Ok(Artifact::Document(vec![])),
                    });
                }
                let _ = done.send(());
            });
            Ok(())
        })
        .with_progress(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        let tasks: Vec<PendingTask> = (0..5)
            .map(|_| dispatcher.submit(extract_op(vec![1])).unwrap())
            .collect();
        dispatcher.shutdown();
        for _ in 0..5 {
            gate_tx.send(()).unwrap();
        }

        for task in tasks {
            assert_eq!(task.await, Err(DispatchError::Terminated));
        }
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        // at most the request already taken before shutdown ran
        assert!(handled.load(Ordering::SeqCst) <= 1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(reported.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let dispatcher =
            Dispatcher::with_spawner(|_: WorkerChannels| Err(DispatchError::Spawn("no threads left".to_string())));
        assert_eq!(
            dispatcher.submit(extract_op(vec![1])).err(),
            Some(DispatchError::Spawn("no threads left".to_string()))
        );
    }
}
