use hetrt::kernel::Kernel;
use hetrt::ops::{split_copy_plan, OpParams};
use hetrt::runtime::as_cpu_runtime;
use hetrt::{OpRef, RtError, RtResult, Runtime};

/// Dtype-agnostic split: moves contiguous byte blocks into each output.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitKernel;

impl Kernel for SplitKernel {
    fn compute(&self, op: &OpRef<'_>, runtime: &dyn Runtime) -> RtResult<()> {
        let cpu = as_cpu_runtime(runtime)?;
        let OpParams::Split { axis, .. } = op.params() else {
            return Err(RtError::execution(format!("split kernel received {}", op.kind())));
        };
        let input = op.input(0)?;
        let outputs = op.outputs();
        let extents: Vec<usize> = outputs.iter().map(|t| t.dims()[*axis]).collect();
        let plan = split_copy_plan(input.shape(), *axis, &extents, input.dtype().size_in_bytes())?;

        let src = input.data_ptr()?;
        let dsts = outputs
            .iter()
            .map(|t| t.data_ptr())
            .collect::<RtResult<Vec<_>>>()?;
        for region in plan {
            cpu.with_pair(src, dsts[region.output], |src, dst| {
                dst[region.dst_offset..region.dst_offset + region.len]
                    .copy_from_slice(&src[region.src_offset..region.src_offset + region.len]);
            })?;
        }
        Ok(())
    }
}
