//! Core of a heterogeneous tensor-graph runtime.
//!
//! * [`tensor`]: dtypes, shapes, reference-counted device blobs and the device [`Tensor`].
//! * [`ops`]: the closed operator set with shape inference and workload fingerprints.
//! * [`kernel`]: the `(device, kind, dtype)` kernel table, dispatch and the tuning cache.
//! * [`runtime`]: the device-polymorphic [`Runtime`] trait, the native CPU runtime and the
//!   sequential graph executor.
//! * [`graph`]: the tensor/operator container that ties everything together.
//!
//! Kernels are not part of this crate. Backend crates expose a `register_kernels` routine that
//! is passed to [`kernel::initialize`] once at startup.

pub mod config;
mod env;
pub mod error;
pub mod graph;
pub mod io;
pub mod kernel;
pub mod ops;
pub mod runtime;
pub mod tensor;

pub use config::RuntimeConfig;
pub use error::{RtError, RtResult};
pub use graph::{Graph, OpId, TensorId};
pub use ops::{DetMode, OpKind, OpParams, OpRef};
pub use runtime::{Device, NativeCpuRuntime, RunOptions, Runtime, RuntimeHandle};
pub use tensor::{DType, Shape, Tensor};
