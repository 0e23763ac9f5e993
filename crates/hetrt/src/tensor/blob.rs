//! Reference-counted device buffers.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::error::RtResult;
use crate::runtime::{DevicePtr, RuntimeHandle};

/// A device buffer together with the runtime that owns it.
///
/// The buffer is released through the runtime when the last [`BlobRef`] drops. Tensors that
/// share a buffer (for example one weight used by several graph copies) hold clones of the
/// same `BlobRef`.
pub struct Blob {
    runtime: RuntimeHandle,
    ptr: DevicePtr,
    bytes: usize,
}

/// Shared pointer to a [`Blob`].
pub type BlobRef = Arc<Blob>;

impl Blob {
    /// Allocates `bytes` on `runtime`.
    pub fn allocate(runtime: &RuntimeHandle, bytes: usize) -> RtResult<BlobRef> {
        let ptr = runtime.alloc(bytes)?;
        Ok(Arc::new(Blob {
            runtime: Arc::clone(runtime),
            ptr,
            bytes,
        }))
    }

    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }
}

impl Drop for Blob {
    fn drop(&mut self) {
        if let Err(err) = self.runtime.dealloc(self.ptr) {
            warn!(runtime = self.runtime.name(), error = %err, "failed to free device buffer");
        }
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("runtime", &self.runtime.name())
            .field("ptr", &self.ptr)
            .field("bytes", &self.bytes)
            .finish()
    }
}
