//! Reference CPU kernels.
//!
//! Every kernel here runs on [`hetrt::NativeCpuRuntime`] buffers and is the ground truth the
//! accelerator backends are checked against.

mod copy;
mod det;
mod split;

use std::sync::Arc;

use half::{bf16, f16};
use hetrt::kernel::{Kernel, KernelRegistryBuilder};
use hetrt::{DType, Device, OpKind};
use tracing::debug;

pub use copy::CopyKernel;
pub use det::DetKernel;
pub use split::SplitKernel;

/// Adds the CPU kernels to `builder`.
///
/// Reshape, Flatten, and Identity share one byte-copy kernel and, like Split, are registered
/// for every dtype. Det is registered for floating dtypes only.
pub fn register_kernels(builder: &mut KernelRegistryBuilder) {
    let copy: Arc<dyn Kernel> = Arc::new(CopyKernel);
    let split: Arc<dyn Kernel> = Arc::new(SplitKernel);
    for dtype in DType::ALL {
        for kind in [OpKind::Reshape, OpKind::Flatten, OpKind::Identity] {
            builder.register_shared(Device::Cpu, kind, dtype, copy.clone(), "cpu.copy");
        }
        builder.register_shared(Device::Cpu, OpKind::Split, dtype, split.clone(), "cpu.split");
    }
    builder
        .register(Device::Cpu, OpKind::Det, DType::F32, DetKernel::<f32>::new(), "cpu.det.f32")
        .register(Device::Cpu, OpKind::Det, DType::F64, DetKernel::<f64>::new(), "cpu.det.f64")
        .register(Device::Cpu, OpKind::Det, DType::F16, DetKernel::<f16>::new(), "cpu.det.f16")
        .register(Device::Cpu, OpKind::Det, DType::BF16, DetKernel::<bf16>::new(), "cpu.det.bf16");
    debug!(total = builder.len(), "registered cpu kernels");
}
