//! Error taxonomy shared by tensors, operators, kernels, and runtimes.

use thiserror::Error;

use crate::ops::OpKind;
use crate::runtime::Device;
use crate::tensor::{DType, Shape};

/// Failure surfaced by any layer of the runtime core.
///
/// Every variant is fatal for the call that produced it. Construction-time variants
/// (`ShapeMismatch`, `ShapeInference`, `InvalidAxis`, ...) are raised by the graph factory
/// before any device work starts.
#[derive(Debug, Error)]
pub enum RtError {
    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch { expected: Shape, found: Shape },

    #[error("dtype mismatch: expected {expected}, found {found}")]
    DTypeMismatch { expected: DType, found: DType },

    #[error("size mismatch: expected {expected}, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("axis {axis} is out of range for rank {rank}")]
    InvalidAxis { axis: i64, rank: usize },

    #[error("shape inference failed for {kind}: {reason}")]
    ShapeInference { kind: OpKind, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no kernel registered for ({device}, {kind}, {dtype})")]
    UnsupportedKernel {
        device: Device,
        kind: OpKind,
        dtype: DType,
    },

    #[error("kernel {name} failed: {source}")]
    Kernel {
        name: String,
        #[source]
        source: Box<RtError>,
    },

    #[error("duplicate kernel registration for ({device}, {kind}, {dtype}): {existing} vs {incoming}")]
    DuplicateKernel {
        device: Device,
        kind: OpKind,
        dtype: DType,
        existing: String,
        incoming: String,
    },

    #[error("kernel registry has not been initialized")]
    RegistryUninitialized,

    #[error("{device} out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory {
        device: Device,
        requested: usize,
        available: usize,
    },

    #[error("device pointer {0:#x} is not owned by this runtime")]
    InvalidPointer(u64),

    #[error("tensor {guid} holds no data")]
    NoData { guid: u64 },

    #[error("tensor {guid} already holds a buffer")]
    AlreadyAllocated { guid: u64 },

    #[error("device execution failure: {0}")]
    Execution(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RtError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RtError::InvalidArgument(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        RtError::Execution(message.into())
    }

    pub fn inference(kind: OpKind, reason: impl Into<String>) -> Self {
        RtError::ShapeInference {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns `true` when the error reports a missing (device, kind, dtype) kernel.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, RtError::UnsupportedKernel { .. })
    }
}

/// Convenience alias for results returned by runtime routines.
pub type RtResult<T> = Result<T, RtError>;
