//! PDFium backend.
//!
//! Renders the full page (text, vectors and images) through the PDFium
//! shared library. Bindings are created per call so the backend itself
//! stays `Send` and can live inside a worker thread.

use std::path::PathBuf;

use pdfium_render::prelude::*;
use tracing::debug;

use super::RasterBackend;
use crate::{Bitmap, RenderError, Result, TargetSize};

/// Environment variable naming a directory that contains the PDFium library.
pub const PDFIUM_DIR_ENV: &str = "PAGECRAFT_PDFIUM_DIR";

pub struct PdfiumBackend {
    library_dir: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Create a backend, failing early when no PDFium library can be bound.
    ///
    /// Looks in `$PAGECRAFT_PDFIUM_DIR`, then the current directory, then
    /// the system library path.
    pub fn new() -> Result<Self> {
        let backend = Self {
            library_dir: std::env::var_os(PDFIUM_DIR_ENV).map(PathBuf::from),
        };
        backend.bind()?;
        Ok(backend)
    }

    /// Create a backend bound to the library in `dir`.
    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let backend = Self {
            library_dir: Some(dir.into()),
        };
        backend.bind()?;
        Ok(backend)
    }

    fn bind(&self) -> Result<Pdfium> {
        let local = self
            .library_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("./"));
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&local))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| RenderError::Unavailable(format!("PDFium library not found: {}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

fn backend_error(err: PdfiumError) -> RenderError {
    RenderError::Backend(err.to_string())
}

impl RasterBackend for PdfiumBackend {
    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn page_count(&self, data: &[u8]) -> Result<u32> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| RenderError::Parse(e.to_string()))?;
        Ok(u32::from(document.pages().len()))
    }

    fn render(&self, data: &[u8], page: u32, target: TargetSize) -> Result<Bitmap> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(|e| RenderError::Parse(e.to_string()))?;

        let page_count = u32::from(document.pages().len());
        if page == 0 || page > page_count {
            return Err(RenderError::PageOutOfRange { page, page_count });
        }
        let pdf_page = document
            .pages()
            .get((page - 1) as u16)
            .map_err(backend_error)?;

        let (width, height, scale) = target.fit(pdf_page.width().value, pdf_page.height().value);
        debug!("PDFium rendering page {} at {}x{} (scale {:.3})", page, width, height, scale);

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_maximum_height(height as i32);
        let rendered = pdf_page.render_with_config(&config).map_err(backend_error)?;
        Ok(Bitmap::from(rendered.as_image()))
    }
}
