//! Process-wide kernel table keyed by `(device, operator kind, dtype)`.
//!
//! Backends contribute kernels through an explicit registration routine that receives a
//! [`KernelRegistryBuilder`]. The table is built once by [`initialize`], after which it is
//! immutable and read without locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RtError, RtResult};
use crate::ops::{OpKind, OpRef};
use crate::runtime::{Device, Runtime};
use crate::tensor::DType;

use super::tuning::PerfRecord;

static GLOBAL_REGISTRY: OnceLock<KernelRegistry> = OnceLock::new();

/// Lookup key for a kernel implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KernelKey {
    pub device: Device,
    pub kind: OpKind,
    pub dtype: DType,
}

impl KernelKey {
    pub fn new(device: Device, kind: OpKind, dtype: DType) -> Self {
        KernelKey {
            device,
            kind,
            dtype,
        }
    }

    /// Key selecting the kernel for `op` on `device`.
    pub fn for_op(op: &OpRef<'_>, device: Device) -> RtResult<Self> {
        Ok(KernelKey::new(device, op.kind(), op.dtype()?))
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.device, self.kind, self.dtype)
    }
}

/// Device implementation of one operator kind for one dtype.
///
/// Kernels read their inputs and write their outputs through `runtime` and must be pure in
/// their inputs.
pub trait Kernel: Send + Sync {
    fn compute(&self, op: &OpRef<'_>, runtime: &dyn Runtime) -> RtResult<()>;

    /// Measures one execution. The default times a single synchronised `compute`.
    fn tune(&self, op: &OpRef<'_>, runtime: &dyn Runtime) -> RtResult<PerfRecord> {
        let start = Instant::now();
        self.compute(op, runtime)?;
        runtime.sync()?;
        Ok(PerfRecord::new(start.elapsed()))
    }
}

/// Adapter that turns a plain function or closure into a [`Kernel`].
pub struct FnKernel<F>(F);

/// Wraps `f` as a kernel.
pub fn kernel_fn<F>(f: F) -> FnKernel<F>
where
    F: Fn(&OpRef<'_>, &dyn Runtime) -> RtResult<()> + Send + Sync,
{
    FnKernel(f)
}

impl<F> Kernel for FnKernel<F>
where
    F: Fn(&OpRef<'_>, &dyn Runtime) -> RtResult<()> + Send + Sync,
{
    fn compute(&self, op: &OpRef<'_>, runtime: &dyn Runtime) -> RtResult<()> {
        (self.0)(op, runtime)
    }
}

/// Registered kernel plus the name used in logs and error reports.
#[derive(Clone)]
pub struct KernelEntry {
    kernel: Arc<dyn Kernel>,
    name: String,
}

impl KernelEntry {
    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for KernelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelEntry")
            .field("name", &self.name)
            .finish()
    }
}

/// Collects registrations; duplicate keys are reported by [`KernelRegistryBuilder::build`].
#[derive(Default)]
pub struct KernelRegistryBuilder {
    entries: Vec<(KernelKey, KernelEntry)>,
}

impl KernelRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<K>(
        &mut self,
        device: Device,
        kind: OpKind,
        dtype: DType,
        kernel: K,
        name: impl Into<String>,
    ) -> &mut Self
    where
        K: Kernel + 'static,
    {
        self.register_shared(device, kind, dtype, Arc::new(kernel), name)
    }

    /// Registers one kernel instance under several keys.
    pub fn register_shared(
        &mut self,
        device: Device,
        kind: OpKind,
        dtype: DType,
        kernel: Arc<dyn Kernel>,
        name: impl Into<String>,
    ) -> &mut Self {
        self.entries.push((
            KernelKey::new(device, kind, dtype),
            KernelEntry {
                kernel,
                name: name.into(),
            },
        ));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> RtResult<KernelRegistry> {
        let mut kernels: HashMap<KernelKey, KernelEntry> = HashMap::with_capacity(self.entries.len());
        for (key, entry) in self.entries {
            if let Some(existing) = kernels.get(&key) {
                return Err(RtError::DuplicateKernel {
                    device: key.device,
                    kind: key.kind,
                    dtype: key.dtype,
                    existing: existing.name.clone(),
                    incoming: entry.name,
                });
            }
            kernels.insert(key, entry);
        }
        Ok(KernelRegistry { kernels })
    }
}

/// Immutable kernel table.
pub struct KernelRegistry {
    kernels: HashMap<KernelKey, KernelEntry>,
}

impl KernelRegistry {
    pub fn builder() -> KernelRegistryBuilder {
        KernelRegistryBuilder::new()
    }

    pub fn lookup(&self, key: &KernelKey) -> Option<&KernelEntry> {
        self.kernels.get(key)
    }

    pub fn contains(&self, key: &KernelKey) -> bool {
        self.kernels.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<KernelKey> {
        let mut keys: Vec<_> = self.kernels.keys().copied().collect();
        keys.sort();
        keys
    }

    /// The table installed by [`initialize`].
    pub fn global() -> RtResult<&'static KernelRegistry> {
        GLOBAL_REGISTRY.get().ok_or(RtError::RegistryUninitialized)
    }
}

impl fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("kernels", &self.keys())
            .finish()
    }
}

/// Builds and installs the process-wide table.
///
/// The first successful call wins; later calls return the installed table without running
/// `register`.
pub fn initialize<F>(register: F) -> RtResult<&'static KernelRegistry>
where
    F: FnOnce(&mut KernelRegistryBuilder),
{
    if let Some(registry) = GLOBAL_REGISTRY.get() {
        return Ok(registry);
    }
    let mut builder = KernelRegistryBuilder::new();
    register(&mut builder);
    let registry = builder.build()?;
    debug!(kernels = registry.len(), "kernel registry initialized");
    Ok(GLOBAL_REGISTRY.get_or_init(|| registry))
}
