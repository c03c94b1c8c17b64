//! Core library for pagecraft PDF page operations.
//!
//! This crate provides:
//! - An in-memory document model over `lopdf` (load, save, copy pages)
//! - Page operations: merge, extract, reorder, delete, rotate, split
//! - An operation worker and a dispatch layer that runs it in isolation
//! - Thumbnail generation with a bounded cache

pub mod config;
#[cfg(feature = "native")]
pub mod dispatch;
pub mod document;
pub mod error;
pub mod ops;
pub mod thumbnail;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{PagecraftConfig, ThumbnailConfig, WorkerConfig};
#[cfg(feature = "native")]
pub use dispatch::{Dispatcher, PendingTask, Spawn, ThreadSpawner};
pub use document::PagedDocument;
pub use error::{DispatchError, DocumentError, PagecraftError, Result};
pub use ops::{ReorderPolicy, SaveOptions, SplitMode, WatermarkOptions};
pub use thumbnail::{CacheStats, ThumbnailCache, ThumbnailKey, ThumbnailWorker};
#[cfg(feature = "native")]
pub use thumbnail::ThumbnailService;
#[cfg(feature = "native")]
pub use worker::WorkerChannels;
pub use worker::{Artifact, CorrelationId, Operation, OperationKind, OperationWorker, ProgressEvent};

/// Re-export rasterization types.
pub use pagecraft_render::{BackendKind, Bitmap, RasterBackend, RenderError, TargetSize};
