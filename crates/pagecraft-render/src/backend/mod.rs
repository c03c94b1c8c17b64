//! Rasterization backend implementations.

mod image_layer;

#[cfg(feature = "pdfium")]
pub mod pdfium;

pub use image_layer::ImageLayerBackend;

use serde::{Deserialize, Serialize};

use crate::{Bitmap, Result, TargetSize};

/// Trait for page rasterization backends.
///
/// Backends receive the document as bytes on every call and keep no
/// document handle between calls.
pub trait RasterBackend: Send {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Number of pages in the document.
    fn page_count(&self, data: &[u8]) -> Result<u32>;

    /// Render 1-based `page` scaled to fit `target` (never upscaled).
    fn render(&self, data: &[u8], page: u32, target: TargetSize) -> Result<Bitmap>;
}

/// Selectable backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Pure Rust, paints the image XObjects of a page.
    #[default]
    ImageLayer,
    /// System PDFium library.
    Pdfium,
}

/// Create a backend of the given kind.
pub fn create_backend(kind: BackendKind) -> Result<Box<dyn RasterBackend>> {
    match kind {
        BackendKind::ImageLayer => Ok(Box::new(ImageLayerBackend::new())),
        #[cfg(feature = "pdfium")]
        BackendKind::Pdfium => Ok(Box::new(pdfium::PdfiumBackend::new()?)),
        #[cfg(not(feature = "pdfium"))]
        BackendKind::Pdfium => Err(crate::RenderError::Unavailable(
            "pagecraft was built without the `pdfium` feature".to_string(),
        )),
    }
}
