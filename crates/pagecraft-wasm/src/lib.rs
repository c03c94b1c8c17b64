//! WASM bindings for pagecraft PDF page operations.
//!
//! This crate provides WebAssembly bindings for use in browsers and Node.js.
//! Operations run synchronously on the calling thread; hosts that need
//! isolation run this module inside a Web Worker.

use std::str::FromStr;
use std::sync::Arc;

use js_sys::{Array, Function, Uint8Array};
use serde::Deserialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use pagecraft_core::ops::{self, parse_page_range as parse_range, validate_page_numbers as validate_pages};
use pagecraft_core::thumbnail::{ThumbnailJob, ThumbnailRequest, ThumbnailResult};
use pagecraft_core::{
    Artifact, CorrelationId, Operation, OperationKind, OperationWorker, SplitMode, TargetSize,
    ThumbnailConfig, ThumbnailWorker, WatermarkOptions,
};
use pagecraft_core::worker::OperationRequest;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Number of pages in a PDF.
#[wasm_bindgen]
pub fn page_count(data: &[u8]) -> Result<u32, JsValue> {
    let count = ops::page_count(data).map_err(js_error)?;
    u32::try_from(count).map_err(js_error)
}

/// Parse a range expression such as "1,3-5" into sorted page numbers.
#[wasm_bindgen]
pub fn parse_page_range(text: &str, max_pages: u32) -> Vec<u32> {
    parse_range(text, max_pages)
}

/// Whether every page number lies in `1..=max_pages`.
#[wasm_bindgen]
pub fn validate_page_numbers(pages: Vec<u32>, max_pages: u32) -> bool {
    validate_pages(&pages, max_pages)
}

/// Options of a [`PageWorker::run`] call. Unused fields are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct OperationOptions {
    pages: Vec<u32>,
    order: Vec<u32>,
    degrees: i32,
    split_after: Vec<u32>,
    split_every: Option<u32>,
    text: String,
    opacity: Option<f32>,
    rotation: Option<f32>,
    font_size: Option<f32>,
    color: Option<[u8; 3]>,
}

impl OperationOptions {
    /// Watermark settings; fields left out keep their defaults.
    fn watermark(&self) -> WatermarkOptions {
        let defaults = WatermarkOptions::default();
        WatermarkOptions {
            text: self.text.clone(),
            opacity: self.opacity.unwrap_or(defaults.opacity),
            rotation: self.rotation.unwrap_or(defaults.rotation),
            font_size: self.font_size.unwrap_or(defaults.font_size),
            color: self.color.unwrap_or(defaults.color),
        }
    }
}

fn to_bytes(value: JsValue) -> Result<Vec<u8>, JsValue> {
    value
        .dyn_into::<Uint8Array>()
        .map(|array| array.to_vec())
        .map_err(|_| JsValue::from_str("expected a Uint8Array"))
}

fn artifact_to_js(artifact: Artifact) -> JsValue {
    match artifact {
        Artifact::Document(data) => Uint8Array::from(data.as_slice()).into(),
        Artifact::Documents(parts) => parts
            .iter()
            .map(|part| JsValue::from(Uint8Array::from(part.as_slice())))
            .collect::<Array>()
            .into(),
    }
}

/// Page operation worker for browser use.
///
/// Each call is tagged with a fresh correlation id, handled by the same
/// worker the native dispatcher runs, and answered with the produced bytes.
#[wasm_bindgen]
pub struct PageWorker {
    worker: OperationWorker,
    next_id: u64,
    on_progress: Option<Function>,
}

#[wasm_bindgen]
impl PageWorker {
    /// Create a worker. `config` is an optional worker configuration object
    /// (`{ reorder_policy, compress_output }`).
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<PageWorker, JsValue> {
        let worker = if config.is_undefined() || config.is_null() {
            OperationWorker::default()
        } else {
            let config = serde_wasm_bindgen::from_value(config).map_err(js_error)?;
            OperationWorker::new(&config)
        };
        Ok(Self {
            worker,
            next_id: 1,
            on_progress: None,
        })
    }

    /// Register a callback receiving `(percent, kind)` during merges.
    #[wasm_bindgen]
    pub fn set_progress_callback(&mut self, callback: Option<Function>) {
        self.on_progress = callback;
    }

    fn execute(&mut self, operation: Operation) -> Result<JsValue, JsValue> {
        let id = CorrelationId::new(self.next_id);
        self.next_id += 1;

        let on_progress = self.on_progress.clone();
        let response = self.worker.handle(OperationRequest { id, operation }, &mut |event| {
            if let Some(callback) = &on_progress {
                let _ = callback.call2(
                    &JsValue::NULL,
                    &JsValue::from_f64(f64::from(event.percent)),
                    &JsValue::from_str(event.kind.as_str()),
                );
            }
        });

        response.outcome.map(artifact_to_js).map_err(|e| JsValue::from_str(&e))
    }

    /// Run an operation by name: "merge", "extract", "rotate", "reorder",
    /// "delete", "split" or "watermark". `documents` is an array of
    /// `Uint8Array`; merge uses all of them, the other operations the first.
    #[wasm_bindgen]
    pub fn run(&mut self, kind: &str, documents: Array, options: JsValue) -> Result<JsValue, JsValue> {
        let kind = OperationKind::from_str(kind).map_err(js_error)?;
        let options: OperationOptions = if options.is_undefined() || options.is_null() {
            OperationOptions::default()
        } else {
            serde_wasm_bindgen::from_value(options).map_err(js_error)?
        };

        let mut documents = documents
            .iter()
            .map(to_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        if kind != OperationKind::Merge && documents.is_empty() {
            return Err(JsValue::from_str("no document given"));
        }

        let operation = match kind {
            OperationKind::Merge => Operation::Merge { documents },
            OperationKind::Extract => Operation::Extract {
                document: documents.swap_remove(0),
                pages: options.pages,
            },
            OperationKind::Rotate => Operation::Rotate {
                document: documents.swap_remove(0),
                pages: options.pages,
                degrees: options.degrees,
            },
            OperationKind::Reorder => Operation::Reorder {
                document: documents.swap_remove(0),
                order: options.order,
            },
            OperationKind::Delete => Operation::Delete {
                document: documents.swap_remove(0),
                pages: options.pages,
            },
            OperationKind::Split => Operation::Split {
                document: documents.swap_remove(0),
                mode: match options.split_every {
                    Some(n) => SplitMode::Every(n),
                    None => SplitMode::AfterPages(options.split_after),
                },
            },
            OperationKind::Watermark => Operation::Watermark {
                document: documents.swap_remove(0),
                options: options.watermark(),
            },
        };
        self.execute(operation)
    }

    /// Concatenate documents in order.
    #[wasm_bindgen]
    pub fn merge(&mut self, documents: Array) -> Result<Uint8Array, JsValue> {
        let documents = documents
            .iter()
            .map(to_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        self.execute(Operation::Merge { documents }).map(Uint8Array::unchecked_from_js)
    }

    /// Keep the given 1-based pages in the given order; a repeated number
    /// repeats the page.
    #[wasm_bindgen]
    pub fn extract(&mut self, document: &[u8], pages: Vec<u32>) -> Result<Uint8Array, JsValue> {
        self.execute(Operation::Extract {
            document: document.to_vec(),
            pages,
        })
        .map(Uint8Array::unchecked_from_js)
    }

    /// Rearrange pages into `order`.
    #[wasm_bindgen]
    pub fn reorder(&mut self, document: &[u8], order: Vec<u32>) -> Result<Uint8Array, JsValue> {
        self.execute(Operation::Reorder {
            document: document.to_vec(),
            order,
        })
        .map(Uint8Array::unchecked_from_js)
    }

    /// Remove the given 1-based pages.
    #[wasm_bindgen]
    pub fn delete(&mut self, document: &[u8], pages: Vec<u32>) -> Result<Uint8Array, JsValue> {
        self.execute(Operation::Delete {
            document: document.to_vec(),
            pages,
        })
        .map(Uint8Array::unchecked_from_js)
    }

    /// Add `degrees` (a multiple of 90) to the rotation of the given pages.
    #[wasm_bindgen]
    pub fn rotate(&mut self, document: &[u8], pages: Vec<u32>, degrees: i32) -> Result<Uint8Array, JsValue> {
        self.execute(Operation::Rotate {
            document: document.to_vec(),
            pages,
            degrees,
        })
        .map(Uint8Array::unchecked_from_js)
    }

    /// Split after each listed page. Returns an array of `Uint8Array`.
    #[wasm_bindgen]
    pub fn split(&mut self, document: &[u8], after: Vec<u32>) -> Result<Array, JsValue> {
        self.execute(Operation::Split {
            document: document.to_vec(),
            mode: SplitMode::AfterPages(after),
        })
        .map(Array::unchecked_from_js)
    }

    /// Stamp `text` across every page with the default look.
    #[wasm_bindgen]
    pub fn watermark(&mut self, document: &[u8], text: &str) -> Result<Uint8Array, JsValue> {
        self.execute(Operation::Watermark {
            document: document.to_vec(),
            options: WatermarkOptions::new(text),
        })
        .map(Uint8Array::unchecked_from_js)
    }
}

/// A rendered thumbnail, or the reason a page could not be rendered.
#[wasm_bindgen]
pub struct Thumbnail {
    page: u32,
    cached: bool,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    error: Option<String>,
}

impl From<ThumbnailResult> for Thumbnail {
    fn from(result: ThumbnailResult) -> Self {
        match result.outcome {
            Ok(bitmap) => Self {
                page: result.page,
                cached: result.cached,
                width: bitmap.width(),
                height: bitmap.height(),
                pixels: bitmap.pixels().to_vec(),
                error: None,
            },
            Err(e) => Self {
                page: result.page,
                cached: false,
                width: 0,
                height: 0,
                pixels: Vec::new(),
                error: Some(e),
            },
        }
    }
}

#[wasm_bindgen]
impl Thumbnail {
    #[wasm_bindgen(getter)]
    pub fn page(&self) -> u32 {
        self.page
    }

    #[wasm_bindgen(getter)]
    pub fn cached(&self) -> bool {
        self.cached
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[wasm_bindgen(getter)]
    pub fn error(&self) -> Option<String> {
        self.error.clone()
    }

    /// RGBA pixels, ready for `new ImageData(...)`.
    #[wasm_bindgen]
    pub fn pixels(&self) -> Uint8Array {
        Uint8Array::from(self.pixels.as_slice())
    }
}

/// Thumbnail renderer with its own cache.
#[wasm_bindgen]
pub struct ThumbnailRenderer {
    worker: ThumbnailWorker,
    size: TargetSize,
}

#[wasm_bindgen]
impl ThumbnailRenderer {
    /// Create a renderer fitting pages into `width` x `height` and caching
    /// up to `cache_capacity` thumbnails.
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32, cache_capacity: usize) -> Result<ThumbnailRenderer, JsValue> {
        let config = ThumbnailConfig {
            width,
            height,
            cache_capacity,
            ..ThumbnailConfig::default()
        };
        let worker = ThumbnailWorker::new(&config).map_err(js_error)?;
        Ok(Self {
            worker,
            size: config.target(),
        })
    }

    /// Render one 1-based page of the document identified by `document_id`.
    #[wasm_bindgen]
    pub fn render(&mut self, document_id: &str, data: &[u8], page: u32) -> Thumbnail {
        let job = ThumbnailJob {
            document_id: document_id.to_string(),
            data: Arc::from(data),
            page,
            size: self.size,
        };
        self.worker.generate(&job).into()
    }

    /// Render pages `start..=end`, clamped to the document.
    #[wasm_bindgen]
    pub fn render_batch(&mut self, document_id: &str, data: &[u8], start: u32, end: u32) -> Vec<Thumbnail> {
        self.worker
            .generate_batch(document_id, data, start, end, self.size)
            .into_iter()
            .map(Thumbnail::from)
            .collect()
    }

    #[wasm_bindgen]
    pub fn clear_cache(&mut self) {
        self.worker.handle(ThumbnailRequest::ClearCache);
    }

    /// Cache statistics as `{ size, capacity }`.
    #[wasm_bindgen]
    pub fn stats(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.worker.cache().stats()).map_err(js_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagecraft_core::PagedDocument;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn empty_pdf() -> Vec<u8> {
        PagedDocument::new().save().unwrap()
    }

    #[wasm_bindgen_test]
    fn test_page_count_of_empty_document() {
        assert_eq!(page_count(&empty_pdf()).unwrap(), 0);
    }

    #[wasm_bindgen_test]
    fn test_parse_page_range() {
        assert_eq!(parse_page_range("3,1-2,9", 5), vec![1, 2, 3]);
        assert!(validate_page_numbers(vec![1, 5], 5));
        assert!(!validate_page_numbers(vec![0], 5));
    }

    #[wasm_bindgen_test]
    fn test_merge_empty_documents() {
        let mut worker = PageWorker::new(JsValue::UNDEFINED).unwrap();
        let documents: Array = [empty_pdf(), empty_pdf()]
            .iter()
            .map(|d| JsValue::from(Uint8Array::from(d.as_slice())))
            .collect();
        let merged = worker.merge(documents).unwrap();
        assert_eq!(page_count(&merged.to_vec()).unwrap(), 0);
    }

    #[wasm_bindgen_test]
    fn test_unknown_operation() {
        let mut worker = PageWorker::new(JsValue::UNDEFINED).unwrap();
        let err = worker.run("compress", Array::new(), JsValue::UNDEFINED).unwrap_err();
        assert_eq!(err.as_string().unwrap(), "unknown operation type: compress");
    }

    #[wasm_bindgen_test]
    fn test_rotate_rejects_odd_angle() {
        let mut worker = PageWorker::new(JsValue::UNDEFINED).unwrap();
        let err = worker.rotate(&empty_pdf(), vec![1], 45).unwrap_err();
        assert!(err.as_string().unwrap().contains("multiple of 90"));
    }

    #[wasm_bindgen_test]
    fn test_watermark_options_from_js() {
        let options: OperationOptions = serde_wasm_bindgen::from_value(
            js_sys::JSON::parse(r#"{"text":"DRAFT","fontSize":24}"#).unwrap(),
        )
        .unwrap();
        let watermark = options.watermark();
        assert_eq!(watermark.text, "DRAFT");
        assert_eq!(watermark.font_size, 24.0);
        assert_eq!(watermark.opacity, 0.3);

        let mut worker = PageWorker::new(JsValue::UNDEFINED).unwrap();
        let err = worker.watermark(&empty_pdf(), " ").unwrap_err();
        assert!(err.as_string().unwrap().contains("text is empty"));
    }

    #[wasm_bindgen_test]
    fn test_thumbnail_out_of_range_reports_error() {
        let mut renderer = ThumbnailRenderer::new(100, 100, 4).unwrap();
        let thumbnail = renderer.render("doc", &empty_pdf(), 1);
        assert!(thumbnail.error().is_some());
        assert_eq!(thumbnail.width(), 0);
    }
}
