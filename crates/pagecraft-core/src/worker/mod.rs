//! Operation worker.
//!
//! Runs one request at a time against freshly loaded documents and answers
//! with the produced bytes or the failure message. Nothing is kept between
//! requests.

mod message;

pub use message::{
    Artifact, CorrelationId, Operation, OperationKind, OperationRequest, OperationResponse,
    ProgressEvent,
};

#[cfg(feature = "native")]
use flume::{Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::config::WorkerConfig;
use crate::document::Result;
use crate::error::DocumentError;
use crate::ops::{self, ReorderPolicy, SaveOptions, SplitMode};

/// Lifecycle of a single request inside the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Validating,
    Executing,
    Responding,
    Done,
    Failed,
}

/// Channels connecting a worker to its dispatcher.
///
/// Dropping the worker's ends of `responses` and `progress` is how the
/// dispatcher notices that the worker is gone.
#[cfg(feature = "native")]
#[derive(Debug)]
pub struct WorkerChannels {
    pub requests: Receiver<OperationRequest>,
    pub responses: Sender<OperationResponse>,
    pub progress: Sender<ProgressEvent>,
}

/// Executes page operations.
#[derive(Debug, Clone, Default)]
pub struct OperationWorker {
    reorder_policy: ReorderPolicy,
    save: SaveOptions,
}

impl OperationWorker {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            reorder_policy: config.reorder_policy,
            save: config.save_options(),
        }
    }

    /// Handle one request. Never fails: errors become failed responses.
    pub fn handle(&self, request: OperationRequest, progress: &mut dyn FnMut(ProgressEvent)) -> OperationResponse {
        let OperationRequest { id, operation } = request;
        let kind = operation.kind();
        trace!("{} {}: {:?} ({} input bytes)", id, kind, RequestPhase::Received, operation.input_len());

        let outcome = self.execute(id, operation, progress);

        trace!("{} {}: {:?}", id, kind, RequestPhase::Responding);
        let outcome = match outcome {
            Ok(artifact) => {
                trace!("{} {}: {:?}", id, kind, RequestPhase::Done);
                debug!("{} {} completed ({} bytes)", id, kind, artifact.byte_len());
                Ok(artifact)
            }
            Err(e) => {
                trace!("{} {}: {:?}", id, kind, RequestPhase::Failed);
                warn!("{} {} failed: {}", id, kind, e);
                Err(e.to_string())
            }
        };

        OperationResponse { id, outcome }
    }

    fn execute(&self, id: CorrelationId, operation: Operation, progress: &mut dyn FnMut(ProgressEvent)) -> Result<Artifact> {
        let kind = operation.kind();
        trace!("{} {}: {:?}", id, kind, RequestPhase::Validating);
        validate(&operation)?;

        trace!("{} {}: {:?}", id, kind, RequestPhase::Executing);
        let save = self.save;
        let artifact = match operation {
            Operation::Merge { documents } => Artifact::Document(ops::merge(&documents, save, |percent| {
                progress(ProgressEvent { kind, percent })
            })?),
            Operation::Extract { document, pages } => Artifact::Document(ops::extract(&document, &pages, save)?),
            Operation::Rotate { document, pages, degrees } => {
                Artifact::Document(ops::rotate(&document, &pages, degrees, save)?)
            }
            Operation::Reorder { document, order } => {
                Artifact::Document(ops::reorder(&document, &order, self.reorder_policy, save)?)
            }
            Operation::Delete { document, pages } => Artifact::Document(ops::delete(&document, &pages, save)?),
            Operation::Split { document, mode } => Artifact::Documents(ops::split(&document, &mode, save)?),
            Operation::Watermark { document, options } => {
                Artifact::Document(ops::watermark(&document, &options, save)?)
            }
        };
        Ok(artifact)
    }

    /// Serve requests until the request channel closes.
    #[cfg(feature = "native")]
    pub fn run(self, channels: WorkerChannels) {
        let WorkerChannels {
            requests,
            responses,
            progress,
        } = channels;
        debug!("Operation worker started");

        for request in requests.iter() {
            let response = self.handle(request, &mut |event| {
                let _ = progress.send(event);
            });
            if responses.send(response).is_err() {
                debug!("Response channel closed");
                break;
            }
        }

        debug!("Operation worker stopped");
    }
}

/// Checks that need no document.
fn validate(operation: &Operation) -> Result<()> {
    match operation {
        Operation::Rotate { degrees, .. } if degrees % 90 != 0 => Err(DocumentError::InvalidRotation(*degrees)),
        Operation::Split {
            mode: SplitMode::Every(0),
            ..
        } => Err(DocumentError::InvalidSplit("part size must be at least 1".to_string())),
        Operation::Watermark { options, .. } => options.validate(),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::WatermarkOptions;
    use crate::testing::{page_labels, sample_pdf};
    use pretty_assertions::assert_eq;

    fn request(id: u64, operation: Operation) -> OperationRequest {
        OperationRequest {
            id: CorrelationId::new(id),
            operation,
        }
    }

    #[test]
    fn test_merge_reports_progress() {
        let worker = OperationWorker::default();
        let mut events = Vec::new();
        let response = worker.handle(
            request(
                1,
                Operation::Merge {
                    documents: vec![sample_pdf("a", 1), sample_pdf("b", 1)],
                },
            ),
            &mut |event| events.push(event),
        );

        assert_eq!(response.id, CorrelationId::new(1));
        let Ok(Artifact::Document(data)) = response.outcome else {
            panic!("merge failed");
        };
        assert_eq!(page_labels(&data), vec!["a p1", "b p1"]);
        assert_eq!(
            events,
            vec![
                ProgressEvent { kind: OperationKind::Merge, percent: 50.0 },
                ProgressEvent { kind: OperationKind::Merge, percent: 100.0 },
            ]
        );
    }

    #[test]
    fn test_errors_become_failed_responses() {
        let worker = OperationWorker::default();
        let response = worker.handle(
            request(
                2,
                Operation::Rotate {
                    document: sample_pdf("r", 1),
                    pages: vec![1],
                    degrees: 45,
                },
            ),
            &mut |_| {},
        );
        assert_eq!(response.id, CorrelationId::new(2));
        assert_eq!(
            response.outcome.unwrap_err(),
            "invalid rotation: 45 (must be a multiple of 90)"
        );

        let response = worker.handle(
            request(
                3,
                Operation::Extract {
                    document: b"junk".to_vec(),
                    pages: vec![1],
                },
            ),
            &mut |_| {},
        );
        assert!(response.outcome.unwrap_err().starts_with("failed to parse PDF"));
    }

    #[test]
    fn test_split_produces_documents() {
        let worker = OperationWorker::default();
        let response = worker.handle(
            request(
                4,
                Operation::Split {
                    document: sample_pdf("s", 3),
                    mode: SplitMode::Every(2),
                },
            ),
            &mut |_| {},
        );
        let Ok(Artifact::Documents(parts)) = response.outcome else {
            panic!("split failed");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(page_labels(&parts[1]), vec!["s p3"]);
    }

    #[test]
    fn test_reorder_policy_from_config() {
        let worker = OperationWorker::new(&WorkerConfig {
            reorder_policy: ReorderPolicy::Permutation,
            compress_output: false,
        });
        let response = worker.handle(
            request(
                5,
                Operation::Reorder {
                    document: sample_pdf("p", 2),
                    order: vec![2],
                },
            ),
            &mut |_| {},
        );
        assert!(response.outcome.unwrap_err().starts_with("invalid page order"));
    }

    #[test]
    fn test_watermark_options_checked_before_loading() {
        let worker = OperationWorker::default();
        let response = worker.handle(
            request(
                6,
                Operation::Watermark {
                    document: b"not even a pdf".to_vec(),
                    options: WatermarkOptions::new(""),
                },
            ),
            &mut |_| {},
        );
        assert_eq!(response.outcome.unwrap_err(), "invalid watermark: text is empty");

        let response = worker.handle(
            request(
                7,
                Operation::Watermark {
                    document: sample_pdf("w", 2),
                    options: WatermarkOptions::new("COPY"),
                },
            ),
            &mut |_| {},
        );
        let Ok(Artifact::Document(data)) = response.outcome else {
            panic!("watermark failed");
        };
        assert_eq!(page_labels(&data), vec!["w p1", "w p2"]);
    }

    #[cfg(feature = "native")]
    #[test]
    fn test_run_serves_until_channel_closes() {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let (progress_tx, progress_rx) = flume::unbounded();

        let handle = std::thread::spawn(move || {
            OperationWorker::default().run(WorkerChannels {
                requests: request_rx,
                responses: response_tx,
                progress: progress_tx,
            })
        });

        request_tx
            .send(request(
                10,
                Operation::Delete {
                    document: sample_pdf("d", 2),
                    pages: vec![1],
                },
            ))
            .unwrap();
        request_tx
            .send(request(11, Operation::Merge { documents: vec![sample_pdf("m", 1)] }))
            .unwrap();
        drop(request_tx);
        handle.join().unwrap();

        let ids: Vec<CorrelationId> = response_rx.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![CorrelationId::new(10), CorrelationId::new(11)]);
        assert_eq!(progress_rx.iter().count(), 1);
    }
}
