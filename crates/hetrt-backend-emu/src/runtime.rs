use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use hetrt::runtime::{DevicePtr, MemoryArena};
use hetrt::{Device, RtError, RtResult, Runtime, RuntimeHandle};

/// In-process stand-in for one accelerator device.
pub struct EmulatedRuntime {
    device: Device,
    name: String,
    arena: MemoryArena,
    launches: AtomicU64,
}

impl EmulatedRuntime {
    /// Unbounded device memory.
    pub fn new(device: Device) -> RtResult<Self> {
        Self::build(device, None)
    }

    /// Device memory limited to `capacity` bytes.
    pub fn with_capacity(device: Device, capacity: usize) -> RtResult<Self> {
        Self::build(device, Some(capacity))
    }

    /// Convenience constructor returning a shared handle.
    pub fn handle(device: Device) -> RtResult<RuntimeHandle> {
        Ok(Arc::new(Self::new(device)?))
    }

    fn build(device: Device, capacity: Option<usize>) -> RtResult<Self> {
        if device.is_cpu() {
            return Err(RtError::invalid(
                "the emulated runtime drives accelerator devices only",
            ));
        }
        debug!(device = %device, capacity = ?capacity, "emulated runtime created");
        Ok(EmulatedRuntime {
            device,
            name: format!("emu-{}", device.name().to_ascii_lowercase()),
            arena: MemoryArena::new(device, capacity),
            launches: AtomicU64::new(0),
        })
    }

    /// Device-side copy of `len` bytes between (possibly identical) buffers.
    pub fn copy_region(
        &self,
        dst: DevicePtr,
        dst_offset: usize,
        src: DevicePtr,
        src_offset: usize,
        len: usize,
    ) -> RtResult<()> {
        self.launches.fetch_add(1, Ordering::Relaxed);
        self.arena.copy_region(dst, dst_offset, src, src_offset, len)
    }

    /// Number of device copy launches issued so far.
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    pub fn bytes_in_use(&self) -> usize {
        self.arena.in_use()
    }
}

impl Runtime for EmulatedRuntime {
    fn device(&self) -> Device {
        self.device
    }

    fn name(&self) -> &str {
        &self.name
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
        if dst == src {
            return Ok(());
        }
        self.copy_region(dst, 0, src, 0, bytes)
    }

    fn capacity(&self) -> Option<usize> {
        self.arena.available()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Recovers the emulated runtime behind a handle.
pub fn as_emulated(runtime: &dyn Runtime) -> RtResult<&EmulatedRuntime> {
    runtime
        .as_any()
        .downcast_ref::<EmulatedRuntime>()
        .ok_or_else(|| {
            RtError::execution(format!(
                "runtime {} ({}) is not an emulated accelerator",
                runtime.name(),
                runtime.device()
            ))
        })
}
