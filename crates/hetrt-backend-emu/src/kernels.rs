use std::sync::Arc;

use hetrt::kernel::{Kernel, KernelRegistryBuilder};
use hetrt::ops::{split_copy_plan, OpParams};
use hetrt::{DType, Device, OpKind, OpRef, RtError, RtResult, Runtime};

use crate::runtime::as_emulated;

const COPY_DTYPES: [DType; 5] = [DType::F32, DType::F16, DType::I32, DType::I64, DType::U8];
const SPLIT_DTYPES: [DType; 2] = [DType::F32, DType::F16];

/// Whole-buffer device copy for the ops that only relabel dims.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCopyKernel;

impl Kernel for DeviceCopyKernel {
    fn compute(&self, op: &OpRef<'_>, runtime: &dyn Runtime) -> RtResult<()> {
        let device = as_emulated(runtime)?;
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
        device.copy_region(dst, 0, src, 0, input.bytes())
    }
}

/// Split as one device copy per contiguous block.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceSplitKernel;

impl Kernel for DeviceSplitKernel {
    fn compute(&self, op: &OpRef<'_>, runtime: &dyn Runtime) -> RtResult<()> {
        let device = as_emulated(runtime)?;
        let OpParams::Split { axis, .. } = op.params() else {
            return Err(RtError::execution(format!("split kernel received {}", op.kind())));
        };
        let input = op.input(0)?;
        let outputs = op.outputs();
        let extents: Vec<usize> = outputs.iter().map(|t| t.dims()[*axis]).collect();
        let plan = split_copy_plan(input.shape(), *axis, &extents, input.dtype().size_in_bytes())?;
        let src = input.data_ptr()?;
        for region in plan {
            let dst = outputs[region.output].data_ptr()?;
            device.copy_region(dst, region.dst_offset, src, region.src_offset, region.len)?;
        }
        Ok(())
    }
}

pub(crate) fn register_device(builder: &mut KernelRegistryBuilder, device: Device) {
    let tag = device.name().to_ascii_lowercase();
    let copy: Arc<dyn Kernel> = Arc::new(DeviceCopyKernel);
    for dtype in COPY_DTYPES {
        for kind in [OpKind::Reshape, OpKind::Flatten, OpKind::Identity] {
            builder.register_shared(device, kind, dtype, copy.clone(), format!("{}.copy", tag));
        }
    }
    let split: Arc<dyn Kernel> = Arc::new(DeviceSplitKernel);
    for dtype in SPLIT_DTYPES {
        builder.register_shared(
            device,
            OpKind::Split,
            dtype,
            split.clone(),
            format!("{}.split", tag),
        );
    }
}
