//! Device-scoped runtimes: memory lifecycle, host transfers, and graph execution.
//!
//! A [`Runtime`] is chosen once per device family when it is constructed; everything above it
//! (tensors, kernels, graphs) talks to it through [`RuntimeHandle`]. The only sanctioned way to
//! move bytes between host and device is `copy_blob_from_cpu` / `copy_blob_to_cpu`, and
//! transfers between two accelerator runtimes are always staged through the host.

mod arena;
mod cpu;
mod device;
mod executor;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::RtResult;

pub use arena::MemoryArena;
pub use cpu::{as_cpu_runtime, NativeCpuRuntime};
pub use device::{Device, DevicePtr};
pub use executor::RunOptions;

/// Shared handle to a runtime. Tensors and blobs keep their runtime alive through it.
pub type RuntimeHandle = Arc<dyn Runtime>;

/// Device-polymorphic memory and synchronisation primitives.
///
/// Implementations are not required to support concurrent `run` calls on one instance;
/// callers serialise access or use one runtime per execution stream.
pub trait Runtime: Send + Sync {
    /// Device family driven by this runtime.
    fn device(&self) -> Device;

    /// Human-readable runtime identifier (e.g. `"cpu"`, `"emu-cuda"`).
    fn name(&self) -> &str;

    /// Allocates `bytes` of device memory.
    fn alloc(&self, bytes: usize) -> RtResult<DevicePtr>;

    /// Releases memory previously returned by [`Runtime::alloc`].
    fn dealloc(&self, ptr: DevicePtr) -> RtResult<()>;

    /// Copies host bytes into the start of a device buffer.
    fn copy_blob_from_cpu(&self, dst: DevicePtr, src: &[u8]) -> RtResult<()>;

    /// Copies the first `dst.len()` bytes of a device buffer to the host.
    fn copy_blob_to_cpu(&self, dst: &mut [u8], src: DevicePtr) -> RtResult<()>;

    /// Copies `dst.len()` bytes starting `offset` bytes into a device buffer to the host.
    fn copy_region_to_cpu(&self, dst: &mut [u8], src: DevicePtr, offset: usize) -> RtResult<()>;

    /// Device-native copy between two buffers owned by this runtime; no-op when `dst == src`.
    fn copy_blob_inside(&self, dst: DevicePtr, src: DevicePtr, bytes: usize) -> RtResult<()>;

    /// Free device memory in bytes, or `None` when the runtime cannot report it.
    ///
    /// Callers that want to avoid a fatal allocation failure probe this first.
    fn capacity(&self) -> Option<usize> {
        None
    }

    /// Blocks until all work queued on the device has completed.
    fn sync(&self) -> RtResult<()> {
        Ok(())
    }

    /// Downcast hook so kernels can reach device-native calls.
    fn as_any(&self) -> &dyn Any;
}

impl fmt::Debug for dyn Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("name", &self.name())
            .field("device", &self.device())
            .finish()
    }
}

/// Reports whether two handles refer to the same runtime instance.
pub fn same_runtime(a: &RuntimeHandle, b: &RuntimeHandle) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}
