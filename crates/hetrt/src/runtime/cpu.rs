use std::any::Any;
use std::sync::{Arc, OnceLock};

use crate::error::{RtError, RtResult};

use super::{Device, DevicePtr, MemoryArena, Runtime, RuntimeHandle};

static CPU_INSTANCE: OnceLock<RuntimeHandle> = OnceLock::new();

/// Host runtime whose buffers are directly addressable by kernels.
pub struct NativeCpuRuntime {
    arena: MemoryArena,
}

impl NativeCpuRuntime {
    pub fn new() -> Self {
        Self {
            arena: MemoryArena::new(Device::Cpu, None),
        }
    }

    /// Process-wide CPU runtime shared by everything that does not ask for a private one.
    pub fn instance() -> RuntimeHandle {
        CPU_INSTANCE
            .get_or_init(|| Arc::new(NativeCpuRuntime::new()))
            .clone()
    }

    pub fn with_bytes<R>(&self, ptr: DevicePtr, f: impl FnOnce(&[u8]) -> R) -> RtResult<R> {
        self.arena.with(ptr, f)
    }

    pub fn with_bytes_mut<R>(&self, ptr: DevicePtr, f: impl FnOnce(&mut [u8]) -> R) -> RtResult<R> {
        self.arena.with_mut(ptr, f)
    }

    /// Reads `src` while writing a different buffer `dst`.
    pub fn with_pair<R>(
        &self,
        src: DevicePtr,
        dst: DevicePtr,
        f: impl FnOnce(&[u8], &mut [u8]) -> R,
    ) -> RtResult<R> {
        self.arena.with_pair(src, dst, f)
    }

    pub fn bytes_in_use(&self) -> usize {
        self.arena.in_use()
    }
}

impl Default for NativeCpuRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime for NativeCpuRuntime {
    fn device(&self) -> Device {
        Device::Cpu
    }

    fn name(&self) -> &str {
        "cpu"
    }

    fn alloc(&self, bytes: usize) -> RtResult<DevicePtr> {
        self.arena.alloc(bytes)
    }

    fn dealloc(&self, ptr: DevicePtr) -> RtResult<()> {
        self.arena.free(ptr)
    }

    fn copy_blob_from_cpu(&self, dst: DevicePtr, src: &[u8]) -> RtResult<()> {
        self.arena.write(dst, src)
    }

    fn copy_blob_to_cpu(&self, dst: &mut [u8], src: DevicePtr) -> RtResult<()> {
        self.arena.read(dst, src)
    }

    fn copy_region_to_cpu(&self, dst: &mut [u8], src: DevicePtr, offset: usize) -> RtResult<()> {
        self.arena.read_at(dst, src, offset)
    }

    fn copy_blob_inside(&self, dst: DevicePtr, src: DevicePtr, bytes: usize) -> RtResult<()> {
        self.arena.copy_region(dst, 0, src, 0, bytes)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Recovers the concrete CPU runtime from a handle, failing for any other device.
pub fn as_cpu_runtime(runtime: &dyn Runtime) -> RtResult<&NativeCpuRuntime> {
    runtime
        .as_any()
        .downcast_ref::<NativeCpuRuntime>()
        .ok_or_else(|| {
            RtError::execution(format!(
                "runtime {} ({}) is not the native CPU runtime",
                runtime.name(),
                runtime.device()
            ))
        })
}
