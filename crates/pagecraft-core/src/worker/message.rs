//! Request and response types exchanged with the operation worker.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::ops::{SplitMode, WatermarkOptions};

/// Identifies one request and its response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(pub u64);

impl CorrelationId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A page operation and its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Merge { documents: Vec<Vec<u8>> },
    Extract { document: Vec<u8>, pages: Vec<u32> },
    Rotate { document: Vec<u8>, pages: Vec<u32>, degrees: i32 },
    Reorder { document: Vec<u8>, order: Vec<u32> },
    Delete { document: Vec<u8>, pages: Vec<u32> },
    Split { document: Vec<u8>, mode: SplitMode },
    Watermark { document: Vec<u8>, options: WatermarkOptions },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Merge { .. } => OperationKind::Merge,
            Operation::Extract { .. } => OperationKind::Extract,
            Operation::Rotate { .. } => OperationKind::Rotate,
            Operation::Reorder { .. } => OperationKind::Reorder,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Split { .. } => OperationKind::Split,
            Operation::Watermark { .. } => OperationKind::Watermark,
        }
    }

    /// Total size of the input documents in bytes.
    pub fn input_len(&self) -> usize {
        match self {
            Operation::Merge { documents } => documents.iter().map(Vec::len).sum(),
            Operation::Extract { document, .. }
            | Operation::Rotate { document, .. }
            | Operation::Reorder { document, .. }
            | Operation::Delete { document, .. }
            | Operation::Split { document, .. }
            | Operation::Watermark { document, .. } => document.len(),
        }
    }
}

/// Name of an operation, as used on the wire and on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Merge,
    Extract,
    Rotate,
    Reorder,
    Delete,
    Split,
    Watermark,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::Merge,
        OperationKind::Extract,
        OperationKind::Rotate,
        OperationKind::Reorder,
        OperationKind::Delete,
        OperationKind::Split,
        OperationKind::Watermark,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Merge => "merge",
            OperationKind::Extract => "extract",
            OperationKind::Rotate => "rotate",
            OperationKind::Reorder => "reorder",
            OperationKind::Delete => "delete",
            OperationKind::Split => "split",
            OperationKind::Watermark => "watermark",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DispatchError::UnknownOperation(s.to_string()))
    }
}

/// A request handed to the worker. Consumed exactly once.
#[derive(Debug)]
pub struct OperationRequest {
    pub id: CorrelationId,
    pub operation: Operation,
}

/// What a successful operation produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// A single document.
    Document(Vec<u8>),
    /// Several documents (split parts, in page order).
    Documents(Vec<Vec<u8>>),
}

impl Artifact {
    /// Flatten into a list of documents.
    pub fn into_documents(self) -> Vec<Vec<u8>> {
        match self {
            Artifact::Document(data) => vec![data],
            Artifact::Documents(parts) => parts,
        }
    }

    /// Total size in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Artifact::Document(data) => data.len(),
            Artifact::Documents(parts) => parts.iter().map(Vec::len).sum(),
        }
    }
}

/// The worker's answer to one request.
#[derive(Debug)]
pub struct OperationResponse {
    pub id: CorrelationId,
    /// The artifact, or the failure message.
    pub outcome: Result<Artifact, String>,
}

/// Progress of a long-running operation. Carries no correlation id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub kind: OperationKind,
    /// Percentage in `0.0..=100.0`.
    pub percent: f32,
}
