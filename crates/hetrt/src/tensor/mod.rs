//! Core tensor abstractions shared across runtimes.
//!
//! The tensor module defines shapes, dtypes, host element traits, reference-counted device
//! blobs, and the device-resident [`Tensor`] that operators and kernels read and write.

pub mod blob;
mod device_tensor;
pub mod dtype;
pub mod generator;
pub mod shape;
pub mod storage;

pub use blob::{Blob, BlobRef};
pub use device_tensor::{Tensor, TensorRole, DEFAULT_RELATIVE_ERROR};
pub use dtype::DType;
pub use generator::{
    DataGenerator, IncrementalGenerator, OneGenerator, RandomGenerator, ValueGenerator,
    ZeroGenerator,
};
pub use shape::{normalize_axis, Shape};
pub use storage::Element;
