//! Minimal graph container: owns tensors and operators and wires producer/consumer edges.
//!
//! Tensors and operators live in two vectors and refer to each other through [`TensorId`] and
//! [`OpId`] indices, so edges never form ownership cycles. Every operator factory runs the
//! operator's shape inference against the graph before the operator is stored; a graph that
//! fails inference never reaches a runtime.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::error::{RtError, RtResult};
use crate::ops::{reshape, split_by_num, split_by_ratio, DetMode, OpParams, OpRef, Operator};
use crate::runtime::{same_runtime, RuntimeHandle};
use crate::tensor::{DType, Shape, Tensor};

/// Index of a tensor inside its [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub(crate) usize);

impl TensorId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of an operator inside its [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub(crate) usize);

impl OpId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Operator input that is produced by an operator added later than its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyError {
    pub tensor: u64,
    pub operator: u64,
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tensor {} is consumed by operator {} before it is produced",
            self.tensor, self.operator
        )
    }
}

/// Tensors and operators bound to a single runtime.
pub struct Graph {
    runtime: RuntimeHandle,
    tensors: Vec<Tensor>,
    ops: Vec<Operator>,
    by_guid: HashMap<u64, TensorId>,
}

impl Graph {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Graph {
            runtime,
            tensors: Vec::new(),
            ops: Vec::new(),
            by_guid: HashMap::new(),
        }
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    /// Creates an unallocated tensor on the graph's runtime.
    pub fn add_tensor(&mut self, shape: impl Into<Shape>, dtype: DType) -> TensorId {
        let tensor = Tensor::new(shape, dtype, self.runtime.clone());
        self.register(tensor)
    }

    /// Registers a tensor built elsewhere. It must live on this graph's runtime and carry no
    /// graph edges; a tensor whose guid is already registered resolves to the existing id.
    pub fn add_existing(&mut self, tensor: Tensor) -> RtResult<TensorId> {
        if let Some(&id) = self.by_guid.get(&tensor.guid()) {
            return Ok(id);
        }
        if !same_runtime(tensor.runtime(), &self.runtime) {
            return Err(RtError::invalid(format!(
                "tensor {} lives on {} but the graph runs on {}",
                tensor.guid(),
                tensor.runtime().name(),
                self.runtime.name()
            )));
        }
        if tensor.source().is_some() || !tensor.targets().is_empty() {
            return Err(RtError::invalid(format!(
                "tensor {} is already wired into another graph",
                tensor.guid()
            )));
        }
        Ok(self.register(tensor))
    }

    /// Clones `tensor` (from any runtime) onto this graph's runtime, copying data if present.
    pub fn clone_tensor(&mut self, tensor: &Tensor) -> RtResult<TensorId> {
        let cloned = tensor.clone_to(&self.runtime)?;
        Ok(self.register(cloned))
    }

    fn register(&mut self, tensor: Tensor) -> TensorId {
        let id = TensorId(self.tensors.len());
        self.by_guid.insert(tensor.guid(), id);
        self.tensors.push(tensor);
        id
    }

    /// Panics if `id` was not issued by this graph.
    pub fn tensor(&self, id: TensorId) -> &Tensor {
        &self.tensors[id.0]
    }

    pub fn tensor_mut(&mut self, id: TensorId) -> &mut Tensor {
        &mut self.tensors[id.0]
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn find_by_guid(&self, guid: u64) -> Option<TensorId> {
        self.by_guid.get(&guid).copied()
    }

    /// All tensors that share the clone identity `fuid`.
    pub fn find_by_fuid(&self, fuid: u64) -> Vec<TensorId> {
        self.tensors
            .iter()
            .enumerate()
            .filter(|(_, t)| t.fuid() == fuid)
            .map(|(i, _)| TensorId(i))
            .collect()
    }

    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// Panics if `id` was not issued by this graph.
    pub fn op(&self, id: OpId) -> OpRef<'_> {
        OpRef::new(self, id, &self.ops[id.0])
    }

    /// Operators in insertion order.
    pub fn operators(&self) -> impl Iterator<Item = OpRef<'_>> + '_ {
        self.ops
            .iter()
            .enumerate()
            .map(move |(i, op)| OpRef::new(self, OpId(i), op))
    }

    /// Allocates every tensor that does not hold a buffer yet.
    pub fn data_malloc(&mut self) -> RtResult<()> {
        for tensor in self.tensors.iter_mut().filter(|t| !t.has_data()) {
            tensor.data_malloc()?;
        }
        Ok(())
    }

    /// Checks that insertion order is a valid execution order.
    pub fn check_topology(&self) -> Result<(), TopologyError> {
        let mut available: HashSet<TensorId> = (0..self.tensors.len())
            .map(TensorId)
            .filter(|&id| self.tensor(id).source().is_none())
            .collect();
        for op in &self.ops {
            for &input in op.input_ids() {
                if !available.contains(&input) {
                    return Err(TopologyError {
                        tensor: self.tensor(input).guid(),
                        operator: op.guid(),
                    });
                }
            }
            available.extend(op.output_ids().iter().copied());
        }
        Ok(())
    }

    pub fn add_reshape(
        &mut self,
        input: TensorId,
        dims: impl Into<Shape>,
        output: Option<TensorId>,
    ) -> RtResult<OpId> {
        let params = OpParams::Reshape { dims: dims.into() };
        self.add_op(params, vec![input], output.map(|o| vec![o]))
    }

    /// `axis` may be negative and counts from the end.
    pub fn add_flatten(
        &mut self,
        input: TensorId,
        axis: i64,
        output: Option<TensorId>,
    ) -> RtResult<OpId> {
        self.ensure_tensor(input)?;
        let axis = reshape::flatten_axis(axis, self.tensor(input).shape())?;
        self.add_op(OpParams::Flatten { axis }, vec![input], output.map(|o| vec![o]))
    }

    pub fn add_identity(&mut self, input: TensorId, output: Option<TensorId>) -> RtResult<OpId> {
        self.add_op(OpParams::Identity, vec![input], output.map(|o| vec![o]))
    }

    pub fn add_split_num(
        &mut self,
        input: TensorId,
        axis: i64,
        num: usize,
        outputs: Option<Vec<TensorId>>,
    ) -> RtResult<OpId> {
        self.ensure_tensor(input)?;
        let params = split_by_num(self.tensor(input).shape(), axis, num)?;
        self.add_op(params, vec![input], outputs)
    }

    pub fn add_split_ratio(
        &mut self,
        input: TensorId,
        axis: i64,
        ratio: &[usize],
        outputs: Option<Vec<TensorId>>,
    ) -> RtResult<OpId> {
        self.ensure_tensor(input)?;
        let params = split_by_ratio(self.tensor(input).shape(), axis, ratio)?;
        self.add_op(params, vec![input], outputs)
    }

    pub fn add_det(
        &mut self,
        input: TensorId,
        mode: DetMode,
        output: Option<TensorId>,
    ) -> RtResult<OpId> {
        self.add_op(OpParams::Det { mode }, vec![input], output.map(|o| vec![o]))
    }

    /// Validates `params` against the inputs, materialises missing outputs, and links edges.
    pub fn add_op(
        &mut self,
        params: OpParams,
        inputs: Vec<TensorId>,
        outputs: Option<Vec<TensorId>>,
    ) -> RtResult<OpId> {
        for &id in &inputs {
            self.ensure_tensor(id)?;
        }
        let kind = params.kind();
        let (shapes, dtype) = {
            let input_refs: Vec<&Tensor> = inputs.iter().map(|&id| self.tensor(id)).collect();
            let shapes = params
                .infer_shape(&input_refs)?
                .ok_or_else(|| RtError::inference(kind, "output shapes are not determinable"))?;
            let dtype = input_refs
                .first()
                .map(|t| t.dtype())
                .ok_or_else(|| RtError::inference(kind, "operator has no input"))?;
            (shapes, dtype)
        };

        let outputs = match outputs {
            Some(outputs) => {
                if outputs.len() != shapes.len() {
                    return Err(RtError::inference(
                        kind,
                        format!("expected {} outputs, got {}", shapes.len(), outputs.len()),
                    ));
                }
                let mut seen = HashSet::with_capacity(outputs.len());
                for &id in &outputs {
                    if !seen.insert(id) {
                        return Err(RtError::invalid(format!(
                            "tensor id {} bound to more than one output",
                            id.0
                        )));
                    }
                    if inputs.contains(&id) {
                        return Err(RtError::invalid(format!(
                            "tensor id {} is both an input and an output",
                            id.0
                        )));
                    }
                }
                for (&id, shape) in outputs.iter().zip(&shapes) {
                    self.ensure_tensor(id)?;
                    let tensor = self.tensor(id);
                    shape.ensure_same(tensor.shape())?;
                    if tensor.dtype() != dtype {
                        return Err(RtError::DTypeMismatch {
                            expected: dtype,
                            found: tensor.dtype(),
                        });
                    }
                    if tensor.source().is_some() {
                        return Err(RtError::invalid(format!(
                            "tensor {} already has a producer",
                            tensor.guid()
                        )));
                    }
                }
                outputs
            }
            None => shapes
                .into_iter()
                .map(|shape| self.add_tensor(shape, dtype))
                .collect(),
        };

        let op_id = OpId(self.ops.len());
        for &id in &inputs {
            self.tensors[id.0].add_target(op_id);
        }
        for &id in &outputs {
            self.tensors[id.0].set_source(op_id);
        }
        let op = Operator::new(params, inputs, outputs);
        debug!(kind = %kind, guid = op.guid(), "operator added");
        self.ops.push(op);
        Ok(op_id)
    }

    fn ensure_tensor(&self, id: TensorId) -> RtResult<()> {
        if id.0 < self.tensors.len() {
            Ok(())
        } else {
            Err(RtError::invalid(format!(
                "tensor id {} is not part of this graph",
                id.0
            )))
        }
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph Tensors:")?;
        for tensor in &self.tensors {
            writeln!(f, "{}", tensor)?;
        }
        writeln!(f, "Graph operators:")?;
        for op in self.operators() {
            let preds: Vec<String> = op
                .inputs()
                .iter()
                .filter_map(|t| t.source())
                .map(|id| self.ops[id.0].guid().to_string())
                .collect();
            let succs: Vec<String> = op
                .outputs()
                .iter()
                .flat_map(|t| t.targets().iter())
                .map(|id| self.ops[id.0].guid().to_string())
                .collect();
            writeln!(
                f,
                "OP {}, pred [{}], succ [{}], {}",
                op.guid(),
                preds.join(","),
                succs.join(","),
                op
            )?;
        }
        Ok(())
    }
}
