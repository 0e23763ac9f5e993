//! Determinant over the trailing two axes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RtError, RtResult};
use crate::tensor::{Shape, Tensor};

use super::reshape::first_input;
use super::OpKind;

/// Whether the kernel produces `det(A)` or `log(det(A))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DetMode {
    #[default]
    Normal,
    LogDet,
}

impl DetMode {
    pub fn code(self) -> i64 {
        match self {
            DetMode::Normal => 0,
            DetMode::LogDet => 1,
        }
    }
}

impl fmt::Display for DetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetMode::Normal => f.write_str("normal"),
            DetMode::LogDet => f.write_str("logDet"),
        }
    }
}

pub(super) fn infer_det(inputs: &[&Tensor]) -> RtResult<Option<Vec<Shape>>> {
    let input = first_input(OpKind::Det, inputs)?;
    let dims = input.dims();
    match dims.len() {
        0 | 1 => Err(RtError::inference(
            OpKind::Det,
            format!("input {} has fewer than two axes", input.shape()),
        )),
        2 => Ok(Some(vec![Shape::new([1])])),
        rank => Ok(Some(vec![Shape::new(&dims[..rank - 2])])),
    }
}
