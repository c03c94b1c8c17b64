//! Thumbnail service - runs a thumbnail worker on its own thread.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, Sender};
use pagecraft_render::TargetSize;
use tracing::debug;

use super::worker::{ThumbnailJob, ThumbnailRequest, ThumbnailResponse, ThumbnailWorker};
use crate::config::ThumbnailConfig;
use crate::Result;

/// Owns the thumbnail worker thread and its channels.
///
/// Responses arrive in request order; callers either poll or block.
pub struct ThumbnailService {
    request_tx: Option<Sender<ThumbnailRequest>>,
    response_rx: Receiver<ThumbnailResponse>,
    handle: Option<JoinHandle<()>>,
}

impl ThumbnailService {
    /// Start a service with a worker built from `config`.
    pub fn new(config: &ThumbnailConfig) -> Result<Self> {
        Self::with_worker(ThumbnailWorker::new(config)?)
    }

    /// Start a service around an existing worker.
    pub fn with_worker(mut worker: ThumbnailWorker) -> Result<Self> {
        let (request_tx, request_rx) = flume::unbounded::<ThumbnailRequest>();
        let (response_tx, response_rx) = flume::unbounded();

        let handle = std::thread::Builder::new()
            .name("pagecraft-thumbnails".to_string())
            .spawn(move || {
                for request in request_rx.iter() {
                    if response_tx.send(worker.handle(request)).is_err() {
                        break;
                    }
                }
                debug!("Thumbnail worker stopped");
            })?;

        Ok(Self {
            request_tx: Some(request_tx),
            response_rx,
            handle: Some(handle),
        })
    }

    /// Queue a request. Returns `false` once the worker is gone.
    pub fn request(&self, request: ThumbnailRequest) -> bool {
        self.request_tx
            .as_ref()
            .is_some_and(|tx| tx.send(request).is_ok())
    }

    pub fn generate(&self, job: ThumbnailJob) -> bool {
        self.request(ThumbnailRequest::Generate(job))
    }

    pub fn generate_batch(&self, document_id: &str, data: Arc<[u8]>, start: u32, end: u32, size: TargetSize) -> bool {
        self.request(ThumbnailRequest::GenerateBatch {
            document_id: document_id.to_string(),
            data,
            start,
            end,
            size,
        })
    }

    pub fn clear_cache(&self) -> bool {
        self.request(ThumbnailRequest::ClearCache)
    }

    pub fn get_stats(&self) -> bool {
        self.request(ThumbnailRequest::GetStats)
    }

    /// Collect every response that is ready, without blocking.
    pub fn poll_responses(&self) -> Vec<ThumbnailResponse> {
        let mut responses = vec![];
        while let Ok(response) = self.response_rx.try_recv() {
            responses.push(response);
        }
        responses
    }

    /// Block until the next response. `None` once the worker is gone.
    pub fn recv(&self) -> Option<ThumbnailResponse> {
        self.response_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ThumbnailResponse> {
        self.response_rx.recv_timeout(timeout).ok()
    }

    /// Get the response receiver for async usage
    #[must_use]
    pub fn response_receiver(&self) -> &Receiver<ThumbnailResponse> {
        &self.response_rx
    }

    /// Stop the worker after it finishes queued requests.
    pub fn shutdown(&mut self) {
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ThumbnailService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
