use tracing::debug;

use crate::error::{RtError, RtResult};
use crate::ops::OpRef;
use crate::runtime::Runtime;

use super::registry::{KernelEntry, KernelKey, KernelRegistry};
use super::tuning::PerfRecord;

/// Resolves the kernel for `op` on `runtime`'s device.
pub fn resolve<'r>(
    registry: &'r KernelRegistry,
    op: &OpRef<'_>,
    runtime: &dyn Runtime,
) -> RtResult<(KernelKey, &'r KernelEntry)> {
    let key = KernelKey::for_op(op, runtime.device())?;
    let entry = registry.lookup(&key).ok_or(RtError::UnsupportedKernel {
        device: key.device,
        kind: key.kind,
        dtype: key.dtype,
    })?;
    Ok((key, entry))
}

/// Runs the registered kernel for `op`.
///
/// A missing kernel is [`RtError::UnsupportedKernel`]; a kernel that fails is wrapped in
/// [`RtError::Kernel`].
pub fn dispatch(registry: &KernelRegistry, op: &OpRef<'_>, runtime: &dyn Runtime) -> RtResult<()> {
    let (key, entry) = resolve(registry, op, runtime)?;
    debug!(kernel = entry.name(), key = %key, op = op.guid(), "dispatch");
    entry
        .kernel()
        .compute(op, runtime)
        .map_err(|source| wrap(entry, source))
}

/// Tunes the registered kernel for `op`; the kernel also produces its outputs.
pub fn tune(
    registry: &KernelRegistry,
    op: &OpRef<'_>,
    runtime: &dyn Runtime,
) -> RtResult<PerfRecord> {
    let (key, entry) = resolve(registry, op, runtime)?;
    debug!(kernel = entry.name(), key = %key, op = op.guid(), "tune");
    entry
        .kernel()
        .tune(op, runtime)
        .map_err(|source| wrap(entry, source))
}

fn wrap(entry: &KernelEntry, source: RtError) -> RtError {
    RtError::Kernel {
        name: entry.name().to_string(),
        source: Box::new(source),
    }
}
