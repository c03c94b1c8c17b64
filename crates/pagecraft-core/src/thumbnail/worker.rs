//! Thumbnail worker: one cache, one backend, requests handled in order.

use std::sync::Arc;

use pagecraft_render::{create_backend, Bitmap, RasterBackend, RenderError, TargetSize};
use tracing::{debug, trace, warn};

use super::cache::{CacheStats, ThumbnailCache, ThumbnailKey};
use crate::config::ThumbnailConfig;

/// One page to render.
#[derive(Debug, Clone)]
pub struct ThumbnailJob {
    pub document_id: String,
    pub data: Arc<[u8]>,
    /// 1-based page number.
    pub page: u32,
    pub size: TargetSize,
}

/// Outcome for one page.
#[derive(Debug, Clone)]
pub struct ThumbnailResult {
    pub document_id: String,
    pub page: u32,
    pub outcome: Result<Arc<Bitmap>, String>,
    /// Served from the cache.
    pub cached: bool,
}

/// Requests understood by [`ThumbnailWorker`].
#[derive(Debug, Clone)]
pub enum ThumbnailRequest {
    Generate(ThumbnailJob),
    GenerateBatch {
        document_id: String,
        data: Arc<[u8]>,
        start: u32,
        end: u32,
        size: TargetSize,
    },
    ClearCache,
    GetStats,
}

/// Replies from [`ThumbnailWorker`], one per request.
#[derive(Debug, Clone)]
pub enum ThumbnailResponse {
    ThumbnailReady(ThumbnailResult),
    BatchReady {
        document_id: String,
        results: Vec<ThumbnailResult>,
    },
    CacheCleared,
    Stats(CacheStats),
}

/// Renders thumbnails and caches them. The document bytes come with every
/// request; no document handle is kept.
pub struct ThumbnailWorker {
    cache: ThumbnailCache,
    backend: Box<dyn RasterBackend>,
}

impl ThumbnailWorker {
    /// Create a worker with the configured backend and cache capacity.
    pub fn new(config: &ThumbnailConfig) -> Result<Self, RenderError> {
        let backend = create_backend(config.backend)?;
        Ok(Self::with_backend(backend, config.cache_capacity))
    }

    pub fn with_backend(backend: Box<dyn RasterBackend>, cache_capacity: usize) -> Self {
        debug!(
            "Thumbnail worker using {} backend, cache capacity {}",
            backend.name(),
            cache_capacity
        );
        Self {
            cache: ThumbnailCache::new(cache_capacity),
            backend,
        }
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    pub fn handle(&mut self, request: ThumbnailRequest) -> ThumbnailResponse {
        match request {
            ThumbnailRequest::Generate(job) => ThumbnailResponse::ThumbnailReady(self.generate(&job)),
            ThumbnailRequest::GenerateBatch {
                document_id,
                data,
                start,
                end,
                size,
            } => {
                let results = self.generate_batch(&document_id, &data, start, end, size);
                ThumbnailResponse::BatchReady { document_id, results }
            }
            ThumbnailRequest::ClearCache => {
                self.cache.clear();
                debug!("Thumbnail cache cleared");
                ThumbnailResponse::CacheCleared
            }
            ThumbnailRequest::GetStats => ThumbnailResponse::Stats(self.cache.stats()),
        }
    }

    /// Render one page, or serve it from the cache.
    pub fn generate(&mut self, job: &ThumbnailJob) -> ThumbnailResult {
        self.render_page(&job.document_id, &job.data, job.page, job.size)
    }

    fn render_page(&mut self, document_id: &str, data: &[u8], page: u32, size: TargetSize) -> ThumbnailResult {
        let key = ThumbnailKey::new(document_id, page);
        if let Some(bitmap) = self.cache.get(&key) {
            trace!("Thumbnail cache hit: {}", key);
            return ThumbnailResult {
                document_id: document_id.to_string(),
                page,
                outcome: Ok(bitmap),
                cached: true,
            };
        }

        let outcome = match self.backend.render(data, page, size) {
            Ok(bitmap) => {
                trace!("Rendered {} at {}x{}", key, bitmap.width(), bitmap.height());
                Ok(self.cache.insert(key, bitmap))
            }
            Err(e) => {
                warn!("Thumbnail {} failed: {}", key, e);
                Err(e.to_string())
            }
        };

        ThumbnailResult {
            document_id: document_id.to_string(),
            page,
            outcome,
            cached: false,
        }
    }

    /// Render pages `start..=end`, clamped to the document, in ascending order.
    pub fn generate_batch(
        &mut self,
        document_id: &str,
        data: &[u8],
        start: u32,
        end: u32,
        size: TargetSize,
    ) -> Vec<ThumbnailResult> {
        let total = match self.backend.page_count(data) {
            Ok(total) => total,
            Err(e) => {
                warn!("Batch for {} failed: {}", document_id, e);
                return vec![ThumbnailResult {
                    document_id: document_id.to_string(),
                    page: start,
                    outcome: Err(e.to_string()),
                    cached: false,
                }];
            }
        };

        let first = start.max(1);
        let last = end.min(total);
        debug!("Batch for {}: pages {}..={} of {}", document_id, first, last, total);
        (first..=last)
            .map(|page| self.render_page(document_id, data, page, size))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_pdf;
    use pagecraft_render::ImageLayerBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps the real backend and counts renders.
    struct CountingBackend {
        inner: ImageLayerBackend,
        renders: Arc<AtomicUsize>,
    }

    impl RasterBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn page_count(&self, data: &[u8]) -> pagecraft_render::Result<u32> {
            self.inner.page_count(data)
        }

        fn render(&self, data: &[u8], page: u32, target: TargetSize) -> pagecraft_render::Result<Bitmap> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            self.inner.render(data, page, target)
        }
    }

    fn counting_worker(capacity: usize) -> (ThumbnailWorker, Arc<AtomicUsize>) {
        let renders = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            inner: ImageLayerBackend::new(),
            renders: Arc::clone(&renders),
        };
        (ThumbnailWorker::with_backend(Box::new(backend), capacity), renders)
    }

    fn job(data: &Arc<[u8]>, page: u32) -> ThumbnailJob {
        ThumbnailJob {
            document_id: "doc".to_string(),
            data: Arc::clone(data),
            page,
            size: TargetSize::default(),
        }
    }

    #[test]
    fn test_second_request_is_cached() {
        let (mut worker, renders) = counting_worker(50);
        let data: Arc<[u8]> = sample_pdf("t", 2).into();

        let first = worker.generate(&job(&data, 1));
        assert!(!first.cached);
        let bitmap = first.outcome.unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (200, 267));

        let second = worker.generate(&job(&data, 1));
        assert!(second.cached);
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bad_page_is_error_result() {
        let (mut worker, _) = counting_worker(50);
        let data: Arc<[u8]> = sample_pdf("t", 2).into();
        let result = worker.generate(&job(&data, 3));
        assert!(!result.cached);
        assert!(result.outcome.unwrap_err().contains("out of range"));
        assert!(worker.cache().is_empty());
    }

    #[test]
    fn test_batch_clamps_and_orders() {
        let (mut worker, _) = counting_worker(50);
        let data: Arc<[u8]> = sample_pdf("t", 3).into();
        let results = worker.generate_batch("doc", &data, 0, 10, TargetSize::default());
        let pages: Vec<u32> = results.iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
        assert!(results.iter().all(|r| r.outcome.is_ok()));
    }

    #[test]
    fn test_batch_on_unreadable_document() {
        let (mut worker, _) = counting_worker(50);
        let results = worker.generate_batch("doc", b"nope", 4, 6, TargetSize::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].page, 4);
        assert!(results[0].outcome.is_err());
    }

    #[test]
    fn test_clear_and_stats_requests() {
        let (mut worker, _) = counting_worker(8);
        let data: Arc<[u8]> = sample_pdf("t", 2).into();
        worker.handle(ThumbnailRequest::GenerateBatch {
            document_id: "doc".to_string(),
            data,
            start: 1,
            end: 2,
            size: TargetSize::new(50, 50),
        });

        let ThumbnailResponse::Stats(stats) = worker.handle(ThumbnailRequest::GetStats) else {
            panic!("expected stats");
        };
        assert_eq!(stats, CacheStats { size: 2, capacity: 8 });

        assert!(matches!(
            worker.handle(ThumbnailRequest::ClearCache),
            ThumbnailResponse::CacheCleared
        ));
        assert!(worker.cache().is_empty());
    }
}
