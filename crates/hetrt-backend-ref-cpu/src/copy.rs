use hetrt::kernel::Kernel;
use hetrt::runtime::as_cpu_runtime;
use hetrt::{OpRef, RtError, RtResult, Runtime};

/// Byte copy from input 0 to output 0.
///
/// Reshape, Flatten, and Identity only relabel dims, so the bytes are identical.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyKernel;

impl Kernel for CopyKernel {
    fn compute(&self, op: &OpRef<'_>, runtime: &dyn Runtime) -> RtResult<()> {
        let cpu = as_cpu_runtime(runtime)?;
        let input = op.input(0)?;
        let output = op.output(0)?;
        if input.bytes() != output.bytes() {
            return Err(RtError::SizeMismatch {
                expected: output.bytes(),
                found: input.bytes(),
            });
        }
        let src = input.data_ptr()?;
        let dst = output.data_ptr()?;
        if src == dst {
            return Ok(());
        }
        cpu.with_pair(src, dst, |src, dst| dst.copy_from_slice(src))
    }
}
