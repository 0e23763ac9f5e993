//! Handle-indexed buffer store shared by runtimes that keep their memory in-process.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{RtError, RtResult};

use super::device::{Device, DevicePtr};

#[derive(Default)]
struct ArenaInner {
    next_id: u64,
    buffers: HashMap<u64, Box<[u8]>>,
    in_use: usize,
}

/// Buffers addressed by [`DevicePtr`] with an optional byte capacity.
pub struct MemoryArena {
    device: Device,
    capacity: Option<usize>,
    inner: Mutex<ArenaInner>,
}

impl MemoryArena {
    pub fn new(device: Device, capacity: Option<usize>) -> Self {
        Self {
            device,
            capacity,
            inner: Mutex::new(ArenaInner {
                next_id: 1,
                ..ArenaInner::default()
            }),
        }
    }

    pub fn alloc(&self, bytes: usize) -> RtResult<DevicePtr> {
        let mut inner = self.inner.lock().expect("memory arena poisoned");
        if let Some(capacity) = self.capacity {
            let available = capacity.saturating_sub(inner.in_use);
            if bytes > available {
                return Err(RtError::OutOfMemory {
                    device: self.device,
                    requested: bytes,
                    available,
                });
            }
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.buffers.insert(id, vec![0u8; bytes].into_boxed_slice());
        inner.in_use += bytes;
        debug!(device = %self.device, ptr = id, bytes, "allocated buffer");
        Ok(DevicePtr(id))
    }

    pub fn free(&self, ptr: DevicePtr) -> RtResult<()> {
        let mut inner = self.inner.lock().expect("memory arena poisoned");
        let buffer = inner
            .buffers
            .remove(&ptr.0)
            .ok_or(RtError::InvalidPointer(ptr.0))?;
        inner.in_use -= buffer.len();
        debug!(device = %self.device, ptr = ptr.0, bytes = buffer.len(), "freed buffer");
        Ok(())
    }

    /// Bytes still allocatable, or `None` when the arena is unbounded.
    pub fn available(&self) -> Option<usize> {
        let inner = self.inner.lock().expect("memory arena poisoned");
        self.capacity
            .map(|capacity| capacity.saturating_sub(inner.in_use))
    }

    pub fn in_use(&self) -> usize {
        self.inner.lock().expect("memory arena poisoned").in_use
    }

    pub fn with<R>(&self, ptr: DevicePtr, f: impl FnOnce(&[u8]) -> R) -> RtResult<R> {
        let inner = self.inner.lock().expect("memory arena poisoned");
        let buffer = inner
            .buffers
            .get(&ptr.0)
            .ok_or(RtError::InvalidPointer(ptr.0))?;
        Ok(f(buffer))
    }

    pub fn with_mut<R>(&self, ptr: DevicePtr, f: impl FnOnce(&mut [u8]) -> R) -> RtResult<R> {
        let mut inner = self.inner.lock().expect("memory arena poisoned");
        let buffer = inner
            .buffers
            .get_mut(&ptr.0)
            .ok_or(RtError::InvalidPointer(ptr.0))?;
        Ok(f(buffer))
    }

    /// Borrows a source buffer immutably and a distinct destination buffer mutably.
    pub fn with_pair<R>(
        &self,
        src: DevicePtr,
        dst: DevicePtr,
        f: impl FnOnce(&[u8], &mut [u8]) -> R,
    ) -> RtResult<R> {
        if src == dst {
            return Err(RtError::invalid(format!(
                "source and destination alias the same buffer {:#x}",
                src.0
            )));
        }
        let mut inner = self.inner.lock().expect("memory arena poisoned");
        let src_buffer = inner
            .buffers
            .remove(&src.0)
            .ok_or(RtError::InvalidPointer(src.0))?;
        let result = match inner.buffers.get_mut(&dst.0) {
            Some(dst_buffer) => Ok(f(&src_buffer, dst_buffer)),
            None => Err(RtError::InvalidPointer(dst.0)),
        };
        inner.buffers.insert(src.0, src_buffer);
        result
    }

    /// Copies `len` bytes between two regions; a region copied onto itself is a no-op.
    pub fn copy_region(
        &self,
        dst: DevicePtr,
        dst_offset: usize,
        src: DevicePtr,
        src_offset: usize,
        len: usize,
    ) -> RtResult<()> {
        if src == dst {
            if src_offset == dst_offset {
                return Ok(());
            }
            return self.with_mut(dst, |bytes| -> RtResult<()> {
                check_range(bytes.len(), src_offset, len)?;
                check_range(bytes.len(), dst_offset, len)?;
                bytes.copy_within(src_offset..src_offset + len, dst_offset);
                Ok(())
            })?;
        }
        self.with_pair(src, dst, |src_bytes, dst_bytes| -> RtResult<()> {
            check_range(src_bytes.len(), src_offset, len)?;
            check_range(dst_bytes.len(), dst_offset, len)?;
            dst_bytes[dst_offset..dst_offset + len]
                .copy_from_slice(&src_bytes[src_offset..src_offset + len]);
            Ok(())
        })?
    }

    pub fn write(&self, dst: DevicePtr, src: &[u8]) -> RtResult<()> {
        self.with_mut(dst, |bytes| -> RtResult<()> {
            check_range(bytes.len(), 0, src.len())?;
            bytes[..src.len()].copy_from_slice(src);
            Ok(())
        })?
    }

    pub fn read(&self, dst: &mut [u8], src: DevicePtr) -> RtResult<()> {
        self.read_at(dst, src, 0)
    }

    pub fn read_at(&self, dst: &mut [u8], src: DevicePtr, offset: usize) -> RtResult<()> {
        self.with(src, |bytes| -> RtResult<()> {
            check_range(bytes.len(), offset, dst.len())?;
            dst.copy_from_slice(&bytes[offset..offset + dst.len()]);
            Ok(())
        })?
    }
}

fn check_range(buffer_len: usize, offset: usize, len: usize) -> RtResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= buffer_len => Ok(()),
        _ => Err(RtError::SizeMismatch {
            expected: buffer_len,
            found: offset.saturating_add(len),
        }),
    }
}
