//! Emulated accelerator backend.
//!
//! [`EmulatedRuntime`] stands in for a CUDA, BANG, or Kunlun device: its memory lives in a
//! private arena that the host can only reach through the runtime's transfer calls, so code
//! paths that stage data through the host are exercised exactly as on real hardware.

mod kernels;
mod runtime;

use hetrt::kernel::KernelRegistryBuilder;
use hetrt::Device;

pub use kernels::{DeviceCopyKernel, DeviceSplitKernel};
pub use runtime::{as_emulated, EmulatedRuntime};

/// Accelerator families this backend can emulate.
pub const DEVICES: [Device; 3] = [Device::Cuda, Device::Bang, Device::Kunlun];

/// Adds the emulated device kernels for every family in [`DEVICES`] to `builder`.
pub fn register_kernels(builder: &mut KernelRegistryBuilder) {
    for device in DEVICES {
        kernels::register_device(builder, device);
    }
}
