//! Split along one axis, either into `num` near-equal pieces or by an explicit ratio list.

use crate::error::{RtError, RtResult};
use crate::tensor::{normalize_axis, Shape, Tensor};

use super::reshape::first_input;
use super::{OpKind, OpParams};

/// Builds split parameters that cut `input` into `num` pieces along `axis`.
///
/// Every piece gets `size / num` elements along the axis and the last one also absorbs the
/// remainder, so a size-10 axis split three ways yields `[3, 3, 4]`.
pub fn split_by_num(input: &Shape, axis: i64, num: usize) -> RtResult<OpParams> {
    let axis = normalize_axis(axis, input.rank())?;
    if num == 0 {
        return Err(RtError::inference(OpKind::Split, "split count must be positive"));
    }
    let dim = input.dims()[axis];
    let piece = dim / num;
    let remainder = dim - piece * num;
    let mut ratio = vec![piece; num];
    if remainder > 0 {
        ratio[num - 1] += remainder;
    }
    Ok(OpParams::Split { axis, num, ratio })
}

/// Builds split parameters from an explicit ratio list.
pub fn split_by_ratio(input: &Shape, axis: i64, ratio: &[usize]) -> RtResult<OpParams> {
    let axis = normalize_axis(axis, input.rank())?;
    if ratio.is_empty() {
        return Err(RtError::inference(OpKind::Split, "ratio list is empty"));
    }
    Ok(OpParams::Split {
        axis,
        num: ratio.len(),
        ratio: ratio.to_vec(),
    })
}

pub(super) fn infer_split(
    axis: usize,
    num: usize,
    ratio: &[usize],
    inputs: &[&Tensor],
) -> RtResult<Option<Vec<Shape>>> {
    let input = first_input(OpKind::Split, inputs)?;
    if num == 0 || ratio.len() != num {
        return Err(RtError::inference(
            OpKind::Split,
            format!("split count {} does not match ratio {:?}", num, ratio),
        ));
    }
    if axis >= input.rank() {
        return Err(RtError::InvalidAxis {
            axis: axis as i64,
            rank: input.rank(),
        });
    }
    let total = input.dims()[axis];
    let ratio_sum: usize = ratio.iter().sum();
    if ratio_sum == 0 || total % ratio_sum != 0 {
        return Err(RtError::inference(
            OpKind::Split,
            format!(
                "axis size {} is not divisible by ratio sum {}",
                total, ratio_sum
            ),
        ));
    }
    let piece = total / ratio_sum;
    let shapes = ratio
        .iter()
        .map(|&r| input.shape().with_dim(axis, piece * r))
        .collect();
    Ok(Some(shapes))
}

/// One contiguous byte range moved from the split input into output `output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRegion {
    pub output: usize,
    pub src_offset: usize,
    pub dst_offset: usize,
    pub len: usize,
}

/// Byte ranges that realise a split of `input` along `axis` into pieces of `extents`.
///
/// Shared by every device kernel so the data movement is identical everywhere.
pub fn split_copy_plan(
    input: &Shape,
    axis: usize,
    extents: &[usize],
    elem_bytes: usize,
) -> RtResult<Vec<CopyRegion>> {
    if axis >= input.rank() {
        return Err(RtError::InvalidAxis {
            axis: axis as i64,
            rank: input.rank(),
        });
    }
    let dims = input.dims();
    let total = dims[axis];
    if extents.iter().sum::<usize>() != total {
        return Err(RtError::SizeMismatch {
            expected: total,
            found: extents.iter().sum(),
        });
    }
    let outer: usize = dims[..axis].iter().product();
    let inner_bytes = dims[axis + 1..].iter().product::<usize>() * elem_bytes;

    let mut regions = Vec::with_capacity(outer * extents.len());
    let mut start = 0;
    for (output, &extent) in extents.iter().enumerate() {
        let len = extent * inner_bytes;
        if len > 0 {
            for o in 0..outer {
                regions.push(CopyRegion {
                    output,
                    src_offset: (o * total + start) * inner_bytes,
                    dst_offset: o * len,
                    len,
                });
            }
        }
        start += extent;
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_walks_outer_blocks() {
        // [2, 4] split along axis 1 into [1, 3], 4-byte elements
        let plan = split_copy_plan(&Shape::new([2, 4]), 1, &[1, 3], 4).unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(
            plan[1],
            CopyRegion {
                output: 0,
                src_offset: 16,
                dst_offset: 4,
                len: 4
            }
        );
        assert_eq!(
            plan[3],
            CopyRegion {
                output: 1,
                src_offset: 20,
                dst_offset: 12,
                len: 12
            }
        );
    }
}
