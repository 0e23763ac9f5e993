//! Device-resident tensor: shape metadata, identities, role, and a lazily allocated blob.

use std::fmt;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use tracing::warn;

use super::blob::{Blob, BlobRef};
use super::generator::DataGenerator;
use super::storage::{self, Element};
use super::{DType, Shape};
use crate::error::{RtError, RtResult};
use crate::graph::OpId;
use crate::runtime::{same_runtime, Device, DevicePtr, RuntimeHandle};

static GUID_COUNTER: AtomicU64 = AtomicU64::new(1);
static FUID_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_guid() -> u64 {
    GUID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
}

fn next_fuid() -> u64 {
    FUID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Default threshold used by [`Tensor::equal_data_default`].
pub const DEFAULT_RELATIVE_ERROR: f64 = 1e-6;

/// What a tensor is used for inside a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TensorRole {
    Weight,
    Input,
    Output,
    #[default]
    Other,
}

impl TensorRole {
    pub fn as_str(self) -> &'static str {
        match self {
            TensorRole::Weight => "weight",
            TensorRole::Input => "input",
            TensorRole::Output => "output",
            TensorRole::Other => "others",
        }
    }
}

/// Typed, shaped array that lives on one runtime.
///
/// `guid` is fresh for every instance and is what graphs deduplicate on. `fuid` is shared by a
/// tensor and every tensor cloned from it, so it identifies the same logical value across
/// devices and graph copies.
pub struct Tensor {
    guid: u64,
    fuid: u64,
    shape: Shape,
    size: usize,
    dtype: DType,
    runtime: RuntimeHandle,
    data: Option<BlobRef>,
    role: TensorRole,
    source: Option<OpId>,
    targets: Vec<OpId>,
}

impl Tensor {
    /// Creates a tensor without a buffer; call [`Tensor::data_malloc`] before use.
    pub fn new(shape: impl Into<Shape>, dtype: DType, runtime: RuntimeHandle) -> Self {
        let shape = shape.into();
        let size = shape.num_elements();
        Tensor {
            guid: next_guid(),
            fuid: next_fuid(),
            shape,
            size,
            dtype,
            runtime,
            data: None,
            role: TensorRole::Other,
            source: None,
            targets: Vec::new(),
        }
    }

    pub fn guid(&self) -> u64 {
        self.guid
    }

    pub fn fuid(&self) -> u64 {
        self.fuid
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Cached element count, always equal to the product of the dims.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bytes(&self) -> usize {
        self.size * self.dtype.size_in_bytes()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    pub fn device(&self) -> Device {
        self.runtime.device()
    }

    pub fn stride(&self) -> Vec<usize> {
        self.shape.strides()
    }

    pub fn offset(&self, index: &[usize]) -> RtResult<usize> {
        self.shape.offset(index)
    }

    /// Maps a flat offset computed against `bc_shape` to this tensor's own flat offset.
    pub fn offset_by_broadcast_offset(&self, bc_offset: usize, bc_shape: &Shape) -> RtResult<usize> {
        self.shape.offset_by_broadcast_offset(bc_offset, bc_shape)
    }

    /// Replaces the shape and recomputes the cached size.
    ///
    /// A tensor that already holds data may only be reshaped to the same byte size.
    pub fn set_shape(&mut self, shape: impl Into<Shape>) -> RtResult<()> {
        let shape = shape.into();
        let size = shape.num_elements();
        if self.data.is_some() && size != self.size {
            return Err(RtError::SizeMismatch {
                expected: self.size,
                found: size,
            });
        }
        self.shape = shape;
        self.size = size;
        Ok(())
    }

    pub fn role(&self) -> TensorRole {
        self.role
    }

    pub fn is_weight(&self) -> bool {
        self.role == TensorRole::Weight
    }

    pub fn is_input(&self) -> bool {
        self.role == TensorRole::Input
    }

    pub fn is_output(&self) -> bool {
        self.role == TensorRole::Output
    }

    pub fn is_other(&self) -> bool {
        self.role == TensorRole::Other
    }

    pub fn set_role(&mut self, role: TensorRole) {
        self.role = role;
    }

    pub fn set_weight(&mut self) {
        self.role = TensorRole::Weight;
    }

    pub fn set_input(&mut self) {
        self.role = TensorRole::Input;
    }

    pub fn set_output(&mut self) {
        self.role = TensorRole::Output;
    }

    /// Operator producing this tensor inside its graph.
    pub fn source(&self) -> Option<OpId> {
        self.source
    }

    /// Operators reading this tensor inside its graph.
    pub fn targets(&self) -> &[OpId] {
        &self.targets
    }

    pub(crate) fn set_source(&mut self, op: OpId) {
        self.source = Some(op);
    }

    pub(crate) fn add_target(&mut self, op: OpId) {
        self.targets.push(op);
    }

    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    pub fn blob(&self) -> Option<&BlobRef> {
        self.data.as_ref()
    }

    /// Device pointer of the buffer, failing when nothing has been allocated.
    pub fn data_ptr(&self) -> RtResult<DevicePtr> {
        self.data
            .as_ref()
            .map(|blob| blob.ptr())
            .ok_or(RtError::NoData { guid: self.guid })
    }

    /// Allocates a buffer of exactly [`Tensor::bytes`] on the owning runtime.
    pub fn data_malloc(&mut self) -> RtResult<()> {
        if self.data.is_some() {
            return Err(RtError::AlreadyAllocated { guid: self.guid });
        }
        self.data = Some(Blob::allocate(&self.runtime, self.bytes())?);
        Ok(())
    }

    /// Adopts a buffer owned elsewhere, e.g. a weight shared across graph copies.
    pub fn set_data_blob(&mut self, blob: BlobRef) -> RtResult<()> {
        if blob.bytes() != self.bytes() {
            return Err(RtError::SizeMismatch {
                expected: self.bytes(),
                found: blob.bytes(),
            });
        }
        if !same_runtime(blob.runtime(), &self.runtime) {
            return Err(RtError::invalid(format!(
                "blob lives on {} but tensor {} lives on {}",
                blob.runtime().name(),
                self.guid,
                self.runtime.name()
            )));
        }
        self.data = Some(blob);
        Ok(())
    }

    /// Drops this tensor's reference to its buffer.
    pub fn free_data(&mut self) {
        self.data = None;
    }

    /// Copies raw bytes from the host. The byte count must equal [`Tensor::bytes`].
    pub fn copyin_bytes(&self, src: &[u8]) -> RtResult<()> {
        self.ensure_byte_len(src.len())?;
        self.runtime.copy_blob_from_cpu(self.data_ptr()?, src)
    }

    /// Copies the buffer to the host. The byte count must equal [`Tensor::bytes`].
    pub fn copyout_bytes(&self, dst: &mut [u8]) -> RtResult<()> {
        self.ensure_byte_len(dst.len())?;
        self.runtime.copy_blob_to_cpu(dst, self.data_ptr()?)
    }

    /// Copies typed host elements in; `T` must match the dtype and the element count must match.
    pub fn copyin<T: Element>(&self, data: &[T]) -> RtResult<()> {
        self.ensure_element::<T>()?;
        if data.len() != self.size {
            return Err(RtError::SizeMismatch {
                expected: self.size,
                found: data.len(),
            });
        }
        self.copyin_bytes(bytemuck::cast_slice(data))
    }

    /// Copies every element out to a host vector.
    pub fn copyout<T: Element>(&self) -> RtResult<Vec<T>> {
        self.ensure_element::<T>()?;
        let mut bytes = vec![0u8; self.bytes()];
        self.copyout_bytes(&mut bytes)?;
        Ok(storage::bytes_to_vec(&bytes))
    }

    /// Reads the single element at `index`, transferring only that element's bytes.
    pub fn copy_one<T: Element>(&self, index: &[usize]) -> RtResult<T> {
        self.ensure_element::<T>()?;
        let offset = self.offset(index)?;
        let width = self.dtype.size_in_bytes();
        let mut bytes = vec![0u8; width];
        self.runtime
            .copy_region_to_cpu(&mut bytes, self.data_ptr()?, offset * width)?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    /// Byte-for-byte copy from `src`, which must have the same byte size.
    ///
    /// On the same runtime this is a device-native copy (a no-op when both tensors share one
    /// blob); across runtimes the bytes are staged through host memory.
    pub fn copy_data(&self, src: &Tensor) -> RtResult<()> {
        if src.bytes() != self.bytes() {
            return Err(RtError::SizeMismatch {
                expected: self.bytes(),
                found: src.bytes(),
            });
        }
        let dst_ptr = self.data_ptr()?;
        let src_ptr = src.data_ptr()?;
        if same_runtime(&self.runtime, &src.runtime) {
            return self.runtime.copy_blob_inside(dst_ptr, src_ptr, self.bytes());
        }
        let staged = src.to_host_bytes()?;
        self.runtime.copy_blob_from_cpu(dst_ptr, &staged)
    }

    /// Runs `generator` over a host copy of this tensor's buffer, then writes it back.
    ///
    /// The generator runs with no runtime lock held, so it may read other tensors.
    pub fn set_data<G: DataGenerator + ?Sized>(&self, generator: &mut G) -> RtResult<()> {
        let ptr = self.data_ptr()?;
        let mut staged = self.to_host_bytes()?;
        generator.fill(&mut staged, self.size, self.dtype);
        self.runtime.copy_blob_from_cpu(ptr, &staged)
    }

    /// Structural copy that keeps `fuid`, shape, and dtype but drops data, edges, and role.
    pub fn clone_detached(&self) -> Tensor {
        Tensor {
            guid: next_guid(),
            fuid: self.fuid,
            shape: self.shape.clone(),
            size: self.size,
            dtype: self.dtype,
            runtime: Arc::clone(&self.runtime),
            data: None,
            role: TensorRole::Other,
            source: None,
            targets: Vec::new(),
        }
    }

    /// Like [`Tensor::clone_detached`] but targeting `runtime`; data is copied across when
    /// the source holds any.
    pub fn clone_to(&self, runtime: &RuntimeHandle) -> RtResult<Tensor> {
        let mut cloned = self.clone_detached();
        cloned.runtime = Arc::clone(runtime);
        if self.has_data() {
            cloned.data_malloc()?;
            cloned.copy_data(self)?;
        }
        Ok(cloned)
    }

    /// Element-wise comparison with `other`.
    ///
    /// Integral types compare exactly. Floating types pass when
    /// `|a - b| / max(|a|, |b|) <= relative_error`; reduced-precision floats are promoted first.
    /// The first mismatch is logged and `Ok(false)` is returned.
    pub fn equal_data(&self, other: &Tensor, relative_error: f64) -> RtResult<bool> {
        if self.dtype != other.dtype {
            return Err(RtError::DTypeMismatch {
                expected: self.dtype,
                found: other.dtype,
            });
        }
        if self.size != other.size {
            return Err(RtError::SizeMismatch {
                expected: self.size,
                found: other.size,
            });
        }
        let lhs = self.to_host_bytes()?;
        let rhs = other.to_host_bytes()?;
        Ok(compare_bytes(self.dtype, &lhs, self.dtype, &rhs, self.size, relative_error))
    }

    pub fn equal_data_default(&self, other: &Tensor) -> RtResult<bool> {
        self.equal_data(other, DEFAULT_RELATIVE_ERROR)
    }

    /// Compares against host reference values.
    ///
    /// `T` must match the dtype, except that F16/BF16 tensors may be checked against `f32`
    /// references.
    pub fn equal_values<T: Element>(&self, values: &[T]) -> RtResult<bool> {
        if values.len() != self.size {
            return Err(RtError::SizeMismatch {
                expected: self.size,
                found: values.len(),
            });
        }
        let promoted = matches!(self.dtype, DType::F16 | DType::BF16) && T::DTYPE == DType::F32;
        if !promoted {
            self.ensure_element::<T>()?;
        }
        let lhs = self.to_host_bytes()?;
        let rhs: &[u8] = bytemuck::cast_slice(values);
        Ok(compare_bytes(
            self.dtype,
            &lhs,
            T::DTYPE,
            rhs,
            self.size,
            DEFAULT_RELATIVE_ERROR,
        ))
    }

    /// Renders the elements as nested brackets, one bracket level per axis.
    pub fn data_to_string(&self) -> RtResult<String> {
        let bytes = self.to_host_bytes()?;
        let mut out = format!("Tensor: {}\n", self.guid);
        let rank = self.rank();
        if rank == 0 {
            out.push_str(&storage::format_element(self.dtype, &bytes, 0));
            out.push('\n');
            return Ok(out);
        }
        // block[j]: number of elements spanned by axis j and everything inside it
        let mut block = vec![1usize; rank];
        block[rank - 1] = self.dims()[rank - 1];
        for axis in (1..rank).rev() {
            block[axis - 1] = block[axis] * self.dims()[axis - 1];
        }
        let row = block[rank - 1];
        for i in 0..self.size {
            for &span in &block {
                if span > 0 && i % span == 0 {
                    out.push('[');
                }
            }
            out.push_str(&storage::format_element(self.dtype, &bytes, i));
            for &span in &block {
                if span > 0 && i % span == span - 1 {
                    out.push(']');
                }
            }
            if i + 1 != self.size {
                out.push_str(", ");
            }
            if row > 0 && i % row == row - 1 {
                out.push('\n');
            }
        }
        Ok(out)
    }

    /// Writes the raw buffer bytes to `path` with no header.
    pub fn save(&self, path: impl AsRef<Path>) -> RtResult<()> {
        crate::io::tensor_file::save(self, path)
    }

    /// Fills the existing buffer from a raw byte file written by [`Tensor::save`].
    pub fn load(&self, path: impl AsRef<Path>) -> RtResult<()> {
        crate::io::tensor_file::load(self, path)
    }

    /// Copies the whole buffer to a host byte vector.
    pub fn to_host_bytes(&self) -> RtResult<Vec<u8>> {
        let mut bytes = vec![0u8; self.bytes()];
        self.copyout_bytes(&mut bytes)?;
        Ok(bytes)
    }

    fn ensure_byte_len(&self, len: usize) -> RtResult<()> {
        if len != self.bytes() {
            return Err(RtError::SizeMismatch {
                expected: self.bytes(),
                found: len,
            });
        }
        Ok(())
    }

    fn ensure_element<T: Element>(&self) -> RtResult<()> {
        if T::DTYPE != self.dtype {
            return Err(RtError::DTypeMismatch {
                expected: self.dtype,
                found: T::DTYPE,
            });
        }
        Ok(())
    }
}

fn compare_bytes(
    lhs_dtype: DType,
    lhs: &[u8],
    rhs_dtype: DType,
    rhs: &[u8],
    size: usize,
    relative_error: f64,
) -> bool {
    if lhs_dtype.is_integer() {
        let width = lhs_dtype.size_in_bytes();
        for i in 0..size {
            let range = i * width..(i + 1) * width;
            if lhs[range.clone()] != rhs[range] {
                warn!(
                    index = i,
                    lhs = %storage::format_element(lhs_dtype, lhs, i),
                    rhs = %storage::format_element(rhs_dtype, rhs, i),
                    "tensor data mismatch"
                );
                return false;
            }
        }
        return true;
    }
    for i in 0..size {
        let a = storage::read_as_f64(lhs_dtype, lhs, i);
        let b = storage::read_as_f64(rhs_dtype, rhs, i);
        // 0/0 yields NaN, which never exceeds the threshold
        if (a - b).abs() / a.abs().max(b.abs()) > relative_error {
            warn!(index = i, lhs = a, rhs = b, "tensor data mismatch");
            return false;
        }
    }
    true
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut targets = String::new();
        for (i, op) in self.targets.iter().enumerate() {
            if i > 0 {
                targets.push(',');
            }
            let _ = write!(targets, "{}", op.index());
        }
        write!(
            f,
            "Tensor {}, Fuid {}, shape {}, dtype {}, rank {}, runtime {}, source {}, targets [{}], tensor type {}, data {}",
            self.guid,
            self.fuid,
            self.shape,
            self.dtype,
            self.rank(),
            self.runtime.name(),
            self.source
                .map(|op| op.index().to_string())
                .unwrap_or_else(|| "None".to_string()),
            targets,
            self.role.as_str(),
            match &self.data {
                Some(blob) => format!("{:#x}", blob.ptr().raw()),
                None => "None".to_string(),
            }
        )
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
