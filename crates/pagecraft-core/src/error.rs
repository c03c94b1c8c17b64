//! Error types for the pagecraft-core library.

use thiserror::Error;

/// Main error type for the pagecraft library.
#[derive(Error, Debug)]
pub enum PagecraftError {
    /// Document model or page operation error.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// Rasterization error from the render layer.
    #[error("render error: {0}")]
    Render(#[from] pagecraft_render::RenderError),

    /// Dispatch layer error.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by the document model and the page operations.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The input bytes are not a readable PDF.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// A page outside the document (1-based).
    #[error("page {page} is out of range (document has {page_count} pages)")]
    Index { page: usize, page_count: usize },

    /// Serialization of the document failed.
    #[error("failed to save PDF: {0}")]
    Save(String),

    /// The PDF is encrypted and the empty password does not open it.
    #[error("PDF is encrypted")]
    Encrypted,

    /// Rotation that is not a multiple of 90 degrees.
    #[error("invalid rotation: {0} (must be a multiple of 90)")]
    InvalidRotation(i32),

    /// A page order that the active policy rejects.
    #[error("invalid page order: {0}")]
    InvalidOrder(String),

    /// A split request that cannot produce parts.
    #[error("invalid split: {0}")]
    InvalidSplit(String),

    /// Watermark options that cannot be drawn.
    #[error("invalid watermark: {0}")]
    InvalidWatermark(String),
}

/// Errors surfaced by the dispatch layer to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The execution unit died while the request was outstanding.
    #[error("worker crashed")]
    WorkerUnavailable,

    /// An operation kind that no worker understands.
    #[error("unknown operation type: {0}")]
    UnknownOperation(String),

    /// The operation ran and failed; carries the worker's message.
    #[error("operation failed: {0}")]
    Failed(String),

    /// The dispatcher was shut down before the request completed.
    #[error("dispatcher terminated")]
    Terminated,

    /// The execution unit could not be started.
    #[error("failed to start worker: {0}")]
    Spawn(String),
}

/// Result type for the pagecraft library.
pub type Result<T> = std::result::Result<T, PagecraftError>;
