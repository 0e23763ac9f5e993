//! Kernel registration, dispatch, and tuning.

pub mod dispatch;
pub mod registry;
pub mod tuning;

pub use dispatch::dispatch;
pub use registry::{
    initialize, kernel_fn, FnKernel, Kernel, KernelEntry, KernelKey, KernelRegistry,
    KernelRegistryBuilder,
};
pub use tuning::{PerfEngine, PerfRecord, DEFAULT_PERF_CACHE_CAPACITY};
