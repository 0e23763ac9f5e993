//! Lightweight wrapper for tensor shapes and dimension bookkeeping.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{RtError, RtResult};

type Dims = SmallVec<[usize; 6]>;

/// Stores the logical dimensions of a tensor. An empty dimension list is a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dims: Dims,
}

impl Shape {
    /// Constructs a new shape from the provided dimensions.
    pub fn new<D: AsRef<[usize]>>(dims: D) -> Self {
        Shape {
            dims: Dims::from_slice(dims.as_ref()),
        }
    }

    pub fn scalar() -> Self {
        Shape::default()
    }

    /// Borrow the raw dimension slice for downstream calculations.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the rank (number of axes) of the shape.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Computes the total number of elements implied by the shape.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Row-major strides; the innermost axis has stride 1.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.rank()];
        for axis in (0..self.rank().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * self.dims[axis + 1];
        }
        strides
    }

    /// Flat offset of an index tuple: the dot product of `index` and the strides.
    pub fn offset(&self, index: &[usize]) -> RtResult<usize> {
        if index.len() != self.rank() {
            return Err(RtError::invalid(format!(
                "index {:?} has rank {}, shape {} has rank {}",
                index,
                index.len(),
                self,
                self.rank()
            )));
        }
        let mut offset = 0;
        for ((&i, &dim), stride) in index.iter().zip(self.dims.iter()).zip(self.strides()) {
            if i >= dim {
                return Err(RtError::invalid(format!(
                    "index {:?} is out of bounds for shape {}",
                    index, self
                )));
            }
            offset += i * stride;
        }
        Ok(offset)
    }

    /// Decomposes a flat offset back into an index tuple.
    pub fn index_of(&self, offset: usize) -> RtResult<Vec<usize>> {
        if offset >= self.num_elements() {
            return Err(RtError::invalid(format!(
                "offset {} is out of bounds for shape {}",
                offset, self
            )));
        }
        let mut index = vec![0usize; self.rank()];
        let mut rest = offset;
        for axis in (0..self.rank()).rev() {
            index[axis] = rest % self.dims[axis];
            rest /= self.dims[axis];
        }
        Ok(index)
    }

    /// Maps `bc_offset`, a flat offset into `bc_shape`, to the flat offset of the same element
    /// in this (broadcastable) shape.
    ///
    /// Shapes are right-aligned; a size-1 axis of `self` contributes no offset, any other axis
    /// must match the broadcast extent exactly.
    pub fn offset_by_broadcast_offset(&self, bc_offset: usize, bc_shape: &Shape) -> RtResult<usize> {
        if self.rank() > bc_shape.rank() {
            return Err(RtError::ShapeMismatch {
                expected: bc_shape.clone(),
                found: self.clone(),
            });
        }
        let bc_index = bc_shape.index_of(bc_offset)?;
        let lead = bc_shape.rank() - self.rank();
        let strides = self.strides();
        let mut offset = 0;
        for (axis, &dim) in self.dims.iter().enumerate() {
            let bc_dim = bc_shape.dims[lead + axis];
            if dim == 1 {
                continue;
            }
            if dim != bc_dim {
                return Err(RtError::ShapeMismatch {
                    expected: bc_shape.clone(),
                    found: self.clone(),
                });
            }
            offset += bc_index[lead + axis] * strides[axis];
        }
        Ok(offset)
    }

    /// Replaces one axis extent.
    pub fn with_dim(&self, axis: usize, extent: usize) -> Shape {
        let mut dims = self.dims.clone();
        dims[axis] = extent;
        Shape { dims }
    }

    /// Asserts that another shape matches exactly, returning an error on mismatch.
    pub fn ensure_same(&self, other: &Shape) -> RtResult<()> {
        if self != other {
            return Err(RtError::ShapeMismatch {
                expected: self.clone(),
                found: other.clone(),
            });
        }
        Ok(())
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{dim}")?;
        }
        f.write_str("]")
    }
}

/// Normalizes a possibly negative axis into `[0, rank)`.
pub fn normalize_axis(axis: i64, rank: usize) -> RtResult<usize> {
    let rank_i = rank as i64;
    let real = if axis < 0 { axis + rank_i } else { axis };
    if real < 0 || real >= rank_i {
        return Err(RtError::InvalidAxis { axis, rank });
    }
    Ok(real as usize)
}
