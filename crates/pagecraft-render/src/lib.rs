//! Page rasterization layer for pagecraft.
//!
//! This crate provides a unified interface for turning a single PDF page
//! into a pixel buffer across different backends:
//! - `ImageLayerBackend`, pure Rust, paints the image content of a page
//! - `PdfiumBackend` (behind the `pdfium` feature) for full-fidelity rendering

mod backend;
mod bitmap;
mod error;
mod geometry;
pub mod pdf;

pub use backend::{create_backend, BackendKind, ImageLayerBackend, RasterBackend};
pub use bitmap::Bitmap;
pub use error::RenderError;
pub use geometry::{fit_scale, PageBox, TargetSize};

#[cfg(feature = "pdfium")]
pub use backend::pdfium::PdfiumBackend;

/// Result type for rasterization.
pub type Result<T> = std::result::Result<T, RenderError>;
