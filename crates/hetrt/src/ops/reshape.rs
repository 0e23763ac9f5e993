//! Reshape, Flatten, and Identity: ops that only relabel the dims of an unchanged buffer.

use crate::error::{RtError, RtResult};
use crate::tensor::{normalize_axis, Shape, Tensor};

use super::OpKind;

pub(super) fn infer_reshape(target: &Shape, inputs: &[&Tensor]) -> RtResult<Option<Vec<Shape>>> {
    let input = first_input(OpKind::Reshape, inputs)?;
    if target.num_elements() != input.size() {
        return Err(RtError::inference(
            OpKind::Reshape,
            format!(
                "target {} holds {} elements but input {} holds {}",
                target,
                target.num_elements(),
                input.shape(),
                input.size()
            ),
        ));
    }
    Ok(Some(vec![target.clone()]))
}

/// Normalizes a flatten axis against the input rank.
pub(crate) fn flatten_axis(axis: i64, input: &Shape) -> RtResult<usize> {
    normalize_axis(axis, input.rank())
}

pub(super) fn infer_flatten(axis: usize, inputs: &[&Tensor]) -> RtResult<Option<Vec<Shape>>> {
    let input = first_input(OpKind::Flatten, inputs)?;
    if axis >= input.rank() {
        return Err(RtError::InvalidAxis {
            axis: axis as i64,
            rank: input.rank(),
        });
    }
    let dims = input.dims();
    let outer: usize = dims[..axis].iter().product();
    let inner: usize = dims[axis..].iter().product();
    Ok(Some(vec![Shape::new([outer, inner])]))
}

pub(super) fn infer_identity(inputs: &[&Tensor]) -> RtResult<Option<Vec<Shape>>> {
    let input = first_input(OpKind::Identity, inputs)?;
    Ok(Some(vec![input.shape().clone()]))
}

pub(super) fn first_input<'a>(kind: OpKind, inputs: &[&'a Tensor]) -> RtResult<&'a Tensor> {
    inputs
        .first()
        .copied()
        .ok_or_else(|| RtError::inference(kind, "operator has no input"))
}
