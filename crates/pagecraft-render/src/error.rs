//! Error types for the rasterization layer.

use thiserror::Error;

/// Errors that can occur while rendering a page.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The document bytes could not be parsed.
    #[error("failed to parse document: {0}")]
    Parse(String),

    /// The requested page does not exist.
    #[error("page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },

    /// The backend failed while rasterizing.
    #[error("rendering failed: {0}")]
    Backend(String),

    /// The requested backend is not compiled in or cannot be loaded.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Image decoding or encoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
