//! Thumbnail generation.

mod cache;
#[cfg(feature = "native")]
mod service;
mod worker;

pub use cache::{CacheStats, ThumbnailCache, ThumbnailKey, DEFAULT_CACHE_CAPACITY};
#[cfg(feature = "native")]
pub use service::ThumbnailService;
pub use worker::{ThumbnailJob, ThumbnailRequest, ThumbnailResponse, ThumbnailResult, ThumbnailWorker};
