//! Operator nodes, their per-kind parameters, and the borrowed view kernels receive.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::error::{RtError, RtResult};
use crate::graph::{Graph, OpId, TensorId};
use crate::tensor::{DType, Shape, Tensor};

use super::det::{self, DetMode};
use super::{reshape, split, OpKind};

static OP_GUID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Kind-specific parameters. The variant determines the operator kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpParams {
    Reshape { dims: Shape },
    /// `axis` is already normalized into `[0, rank)`.
    Flatten { axis: usize },
    Identity,
    /// `ratio.len() == num`; split-by-count derives the ratio at construction.
    Split {
        axis: usize,
        num: usize,
        ratio: Vec<usize>,
    },
    Det { mode: DetMode },
}

impl OpParams {
    pub fn kind(&self) -> OpKind {
        match self {
            OpParams::Reshape { .. } => OpKind::Reshape,
            OpParams::Flatten { .. } => OpKind::Flatten,
            OpParams::Identity => OpKind::Identity,
            OpParams::Split { .. } => OpKind::Split,
            OpParams::Det { .. } => OpKind::Det,
        }
    }

    /// Computes one output shape per declared output from the current input shapes.
    ///
    /// `Ok(None)` means the shapes are not determinable yet.
    pub fn infer_shape(&self, inputs: &[&Tensor]) -> RtResult<Option<Vec<Shape>>> {
        match self {
            OpParams::Reshape { dims } => reshape::infer_reshape(dims, inputs),
            OpParams::Flatten { axis } => reshape::infer_flatten(*axis, inputs),
            OpParams::Identity => reshape::infer_identity(inputs),
            OpParams::Split { axis, num, ratio } => split::infer_split(*axis, *num, ratio, inputs),
            OpParams::Det { .. } => det::infer_det(inputs),
        }
    }

    /// Kind followed by the operator's own parameters, no shapes.
    pub fn attr_vector(&self) -> Vec<i64> {
        let mut ret = vec![self.kind().underlying()];
        match self {
            OpParams::Reshape { dims } => ret.extend(dims.dims().iter().map(|&d| d as i64)),
            OpParams::Flatten { axis } => ret.push(*axis as i64),
            OpParams::Identity => {}
            OpParams::Split { axis, num, .. } => {
                ret.push(*axis as i64);
                ret.push(*num as i64);
            }
            OpParams::Det { mode } => ret.push(mode.code()),
        }
        ret
    }
}

/// A graph node: kind parameters plus input and output tensor ids.
#[derive(Debug, Clone)]
pub struct Operator {
    guid: u64,
    params: OpParams,
    inputs: Vec<TensorId>,
    outputs: Vec<TensorId>,
}

impl Operator {
    pub(crate) fn new(params: OpParams, inputs: Vec<TensorId>, outputs: Vec<TensorId>) -> Self {
        Operator {
            guid: OP_GUID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed),
            params,
            inputs,
            outputs,
        }
    }

    pub fn guid(&self) -> u64 {
        self.guid
    }

    pub fn kind(&self) -> OpKind {
        self.params.kind()
    }

    pub fn params(&self) -> &OpParams {
        &self.params
    }

    pub fn input_ids(&self) -> &[TensorId] {
        &self.inputs
    }

    pub fn output_ids(&self) -> &[TensorId] {
        &self.outputs
    }
}

/// Borrowed view of an operator together with the graph that owns its tensors.
#[derive(Clone, Copy)]
pub struct OpRef<'g> {
    graph: &'g Graph,
    id: OpId,
    op: &'g Operator,
}

impl<'g> OpRef<'g> {
    pub(crate) fn new(graph: &'g Graph, id: OpId, op: &'g Operator) -> Self {
        OpRef { graph, id, op }
    }

    pub fn id(&self) -> OpId {
        self.id
    }

    pub fn guid(&self) -> u64 {
        self.op.guid()
    }

    pub fn kind(&self) -> OpKind {
        self.op.kind()
    }

    pub fn params(&self) -> &'g OpParams {
        self.op.params()
    }

    pub fn operator(&self) -> &'g Operator {
        self.op
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn inputs(&self) -> Vec<&'g Tensor> {
        self.op.inputs.iter().map(|&id| self.graph.tensor(id)).collect()
    }

    pub fn outputs(&self) -> Vec<&'g Tensor> {
        self.op.outputs.iter().map(|&id| self.graph.tensor(id)).collect()
    }

    pub fn input(&self, index: usize) -> RtResult<&'g Tensor> {
        self.op
            .inputs
            .get(index)
            .map(|&id| self.graph.tensor(id))
            .ok_or_else(|| RtError::invalid(format!("{} has no input {}", self.kind(), index)))
    }

    pub fn output(&self, index: usize) -> RtResult<&'g Tensor> {
        self.op
            .outputs
            .get(index)
            .map(|&id| self.graph.tensor(id))
            .ok_or_else(|| RtError::invalid(format!("{} has no output {}", self.kind(), index)))
    }

    /// Element type used for kernel selection: the dtype of the first input.
    pub fn dtype(&self) -> RtResult<DType> {
        Ok(self.input(0)?.dtype())
    }

    pub fn infer_shape(&self) -> RtResult<Option<Vec<Shape>>> {
        self.op.params.infer_shape(&self.inputs())
    }

    /// Kind plus the shape and parameter data a kernel's performance depends on.
    pub fn workload_vector(&self) -> RtResult<Vec<i64>> {
        let mut ret = vec![self.kind().underlying()];
        match self.params() {
            OpParams::Reshape { dims } => {
                ret.extend(dims_of(self.input(0)?));
                ret.extend(dims.dims().iter().map(|&d| d as i64));
            }
            OpParams::Flatten { axis } => {
                ret.push(*axis as i64);
                ret.extend(dims_of(self.input(0)?));
            }
            OpParams::Identity => ret.extend(dims_of(self.input(0)?)),
            OpParams::Split { axis, num, .. } => {
                ret.extend(dims_of(self.input(0)?));
                ret.push(*axis as i64);
                ret.push(*num as i64);
            }
            OpParams::Det { .. } => ret.extend(dims_of(self.output(0)?)),
        }
        Ok(ret)
    }

    /// Kind plus the operator's own parameters; identical for the same op on any shape.
    pub fn op_attr_vector(&self) -> Vec<i64> {
        self.params().attr_vector()
    }
}

fn dims_of(tensor: &Tensor) -> impl Iterator<Item = i64> + '_ {
    tensor.dims().iter().map(|&d| d as i64)
}

impl fmt::Display for OpRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}](", self.kind(), self.guid())?;
        if let Some(input) = self.inputs().first() {
            write!(f, "{},", input.shape())?;
        }
        match self.params() {
            OpParams::Reshape { dims } => write!(f, "dims={},", dims)?,
            OpParams::Flatten { axis } => write!(f, "axis={},", axis)?,
            OpParams::Identity => {}
            OpParams::Split { axis, num, ratio } => {
                write!(f, "dim={},num={},ratio={:?},", axis, num, ratio)?
            }
            OpParams::Det { mode } => write!(f, "mode={},", mode)?,
        }
        f.write_str("input=")?;
        for (i, tensor) in self.inputs().iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", tensor.guid())?;
        }
        f.write_str(",output=")?;
        for (i, tensor) in self.outputs().iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", tensor.guid())?;
        }
        f.write_str(")")
    }
}
