use hetrt::ops::{split_by_num, OpParams};
use hetrt::{DType, DetMode, Graph, NativeCpuRuntime, OpKind, RtError, Shape};

fn graph() -> Graph {
    Graph::new(NativeCpuRuntime::instance())
}

fn output_dims(graph: &Graph, op: hetrt::OpId) -> Vec<Vec<usize>> {
    graph
        .op(op)
        .outputs()
        .iter()
        .map(|t| t.dims().to_vec())
        .collect()
}

#[test]
fn reshape_requires_matching_element_count() -> anyhow::Result<()> {
    let mut g = graph();
    let input = g.add_tensor([2, 3, 4], DType::F32);
    let op = g.add_reshape(input, [4, 6], None)?;
    assert_eq!(output_dims(&g, op), vec![vec![4, 6]]);

    let err = g.add_reshape(input, [5, 5], None).unwrap_err();
    assert!(matches!(err, RtError::ShapeInference { kind: OpKind::Reshape, .. }));
    Ok(())
}

#[test]
fn flatten_splits_dims_at_axis() -> anyhow::Result<()> {
    let mut g = graph();
    let input = g.add_tensor([2, 3, 4], DType::F32);
    let axis1 = g.add_flatten(input, 1, None)?;
    let axis0 = g.add_flatten(input, 0, None)?;
    let last = g.add_flatten(input, -1, None)?;
    assert_eq!(output_dims(&g, axis1), vec![vec![2, 12]]);
    assert_eq!(output_dims(&g, axis0), vec![vec![1, 24]]);
    assert_eq!(output_dims(&g, last), vec![vec![6, 4]]);
    assert!(matches!(
        g.add_flatten(input, 3, None),
        Err(RtError::InvalidAxis { axis: 3, rank: 3 })
    ));
    Ok(())
}

#[test]
fn identity_keeps_shape_and_dtype() -> anyhow::Result<()> {
    let mut g = graph();
    let input = g.add_tensor([7, 2], DType::I64);
    let op = g.add_identity(input, None)?;
    let output = g.op(op).output(0)?;
    assert_eq!(output.dims(), &[7, 2]);
    assert_eq!(output.dtype(), DType::I64);
    Ok(())
}

#[test]
fn split_by_count_puts_remainder_last() -> anyhow::Result<()> {
    let mut g = graph();
    let input = g.add_tensor([10], DType::F32);
    let op = g.add_split_num(input, 0, 3, None)?;
    assert_eq!(output_dims(&g, op), vec![vec![3], vec![3], vec![4]]);

    let params = split_by_num(&Shape::new([2, 10]), -1, 3)?;
    assert_eq!(
        params,
        OpParams::Split {
            axis: 1,
            num: 3,
            ratio: vec![3, 3, 4]
        }
    );
    Ok(())
}

#[test]
fn split_by_ratio_scales_pieces() -> anyhow::Result<()> {
    let mut g = graph();
    let input = g.add_tensor([2, 12], DType::F32);
    let op = g.add_split_ratio(input, 1, &[1, 1, 2], None)?;
    assert_eq!(output_dims(&g, op), vec![vec![2, 3], vec![2, 3], vec![2, 6]]);

    let odd = g.add_tensor([10], DType::F32);
    assert!(matches!(
        g.add_split_ratio(odd, 0, &[1, 2], None),
        Err(RtError::ShapeInference { kind: OpKind::Split, .. })
    ));
    Ok(())
}

#[test]
fn det_drops_trailing_matrix_axes() -> anyhow::Result<()> {
    let mut g = graph();
    let single = g.add_tensor([2, 2], DType::F32);
    let batched = g.add_tensor([5, 3, 3], DType::F32);
    let vector = g.add_tensor([3], DType::F32);
    let a = g.add_det(single, DetMode::Normal, None)?;
    let b = g.add_det(batched, DetMode::LogDet, None)?;
    assert_eq!(output_dims(&g, a), vec![vec![1]]);
    assert_eq!(output_dims(&g, b), vec![vec![5]]);
    assert!(g.add_det(vector, DetMode::Normal, None).is_err());
    Ok(())
}

#[test]
fn supplied_outputs_are_checked_against_inference() -> anyhow::Result<()> {
    let mut g = graph();
    let input = g.add_tensor([2, 3, 4], DType::F32);
    let good = g.add_tensor([4, 6], DType::F32);
    let wrong_shape = g.add_tensor([6, 4], DType::F32);
    let wrong_dtype = g.add_tensor([4, 6], DType::I32);

    assert!(matches!(
        g.add_reshape(input, [4, 6], Some(wrong_shape)),
        Err(RtError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        g.add_reshape(input, [4, 6], Some(wrong_dtype)),
        Err(RtError::DTypeMismatch { .. })
    ));
    let op = g.add_reshape(input, [4, 6], Some(good))?;
    assert_eq!(g.op(op).operator().output_ids(), &[good]);
    assert_eq!(g.num_ops(), 1);

    let pieces = vec![g.add_tensor([5], DType::F32), g.add_tensor([5], DType::F32)];
    let ten = g.add_tensor([10], DType::F32);
    assert!(g.add_split_num(ten, 0, 3, Some(pieces.clone())).is_err());
    g.add_split_num(ten, 0, 2, Some(pieces))?;
    Ok(())
}

#[test]
fn edges_link_producers_and_consumers() -> anyhow::Result<()> {
    let mut g = graph();
    let input = g.add_tensor([4, 4], DType::F32);
    let first = g.add_identity(input, None)?;
    let mid = g.op(first).operator().output_ids()[0];
    let second = g.add_flatten(mid, 0, None)?;

    assert_eq!(g.tensor(input).targets(), &[first]);
    assert_eq!(g.tensor(mid).source(), Some(first));
    assert_eq!(g.tensor(mid).targets(), &[second]);
    assert!(g.check_topology().is_ok());

    let kinds: Vec<OpKind> = g.operators().map(|op| op.kind()).collect();
    assert_eq!(kinds, vec![OpKind::Identity, OpKind::Flatten]);

    // an output may only have one producer
    assert!(g.add_identity(input, Some(mid)).is_err());
    Ok(())
}

#[test]
fn consumers_added_before_producers_fail_topology_check() -> anyhow::Result<()> {
    let mut g = graph();
    let a = g.add_tensor([3], DType::F32);
    let b = g.add_tensor([3], DType::F32);
    let c = g.add_tensor([3], DType::F32);
    g.add_identity(b, Some(c))?;
    g.add_identity(a, Some(b))?;
    let err = g.check_topology().unwrap_err();
    assert_eq!(err.tensor, g.tensor(b).guid());
    Ok(())
}

#[test]
fn workload_vectors_track_shapes_and_params() -> anyhow::Result<()> {
    let mut g = graph();
    let input = g.add_tensor([2, 3, 4], DType::F32);
    let flat = g.add_tensor([24], DType::F32);
    let reshape = g.add_reshape(input, [4, 6], None)?;
    let reshape_again = g.add_reshape(input, [4, 6], None)?;
    let reshape_other = g.add_reshape(input, [6, 4], None)?;
    let reshape_flat = g.add_reshape(flat, [4, 6], None)?;
    let flatten = g.add_flatten(input, 1, None)?;
    let identity = g.add_identity(input, None)?;
    let split = g.add_split_num(input, 1, 3, None)?;
    let matrices = g.add_tensor([5, 3, 3], DType::F32);
    let det = g.add_det(matrices, DetMode::LogDet, None)?;

    assert_eq!(g.op(reshape).workload_vector()?, vec![15, 2, 3, 4, 4, 6]);
    assert_eq!(g.op(flatten).workload_vector()?, vec![16, 1, 2, 3, 4]);
    assert_eq!(g.op(identity).workload_vector()?, vec![17, 2, 3, 4]);
    assert_eq!(g.op(split).workload_vector()?, vec![31, 2, 3, 4, 1, 3]);
    assert_eq!(g.op(det).workload_vector()?, vec![77, 5]);

    assert_eq!(
        g.op(reshape).workload_vector()?,
        g.op(reshape_again).workload_vector()?
    );
    assert_ne!(
        g.op(reshape).workload_vector()?,
        g.op(reshape_other).workload_vector()?
    );
    assert_ne!(
        g.op(reshape).workload_vector()?,
        g.op(reshape_flat).workload_vector()?
    );
    assert_eq!(g.op(reshape).op_attr_vector(), g.op(reshape_flat).op_attr_vector());
    assert_ne!(g.op(reshape).op_attr_vector(), g.op(reshape_other).op_attr_vector());

    assert_eq!(g.op(reshape).op_attr_vector(), vec![15, 4, 6]);
    assert_eq!(g.op(flatten).op_attr_vector(), vec![16, 1]);
    assert_eq!(g.op(identity).op_attr_vector(), vec![17]);
    assert_eq!(g.op(split).op_attr_vector(), vec![31, 1, 3]);
    assert_eq!(g.op(det).op_attr_vector(), vec![77, 1]);
    Ok(())
}

#[test]
fn operator_display_names_kind_params_and_edges() -> anyhow::Result<()> {
    let mut g = graph();
    let input = g.add_tensor([2, 3, 4], DType::F32);
    let op = g.add_reshape(input, [4, 6], None)?;
    let view = g.op(op);
    let output = view.output(0)?.guid();
    let expected = format!(
        "Reshape[{}]([2,3,4],dims=[4,6],input={},output={})",
        view.guid(),
        g.tensor(input).guid(),
        output
    );
    assert_eq!(view.to_string(), expected);
    assert_eq!(view.dtype()?, DType::F32);

    let rendered = g.to_string();
    assert!(rendered.contains("Graph Tensors:"));
    assert!(rendered.contains(&expected));
    Ok(())
}

#[test]
fn tensors_from_other_runtimes_are_cloned_in() -> anyhow::Result<()> {
    let private: hetrt::RuntimeHandle = std::sync::Arc::new(NativeCpuRuntime::new());
    let mut g = graph();
    let mut foreign = hetrt::Tensor::new([2, 2], DType::I32, private);
    foreign.data_malloc()?;
    foreign.copyin(&[1i32, 2, 3, 4])?;

    let id = g.clone_tensor(&foreign)?;
    assert_eq!(g.tensor(id).copyout::<i32>()?, vec![1, 2, 3, 4]);
    assert_eq!(g.find_by_fuid(foreign.fuid()), vec![id]);
    assert!(g.add_existing(foreign).is_err());

    let local = hetrt::Tensor::new([3], DType::F32, NativeCpuRuntime::instance());
    let guid = local.guid();
    let local_id = g.add_existing(local)?;
    assert_eq!(g.find_by_guid(guid), Some(local_id));

    g.data_malloc()?;
    assert!(g.tensors().iter().all(|t| t.has_data()));
    Ok(())
}

#[test]
fn repeated_output_binding_is_rejected() -> anyhow::Result<()> {
    let mut g = graph();
    let input = g.add_tensor([4], DType::F32);
    let piece = g.add_tensor([2], DType::F32);
    assert!(g.add_split_num(input, 0, 2, Some(vec![piece, piece])).is_err());
    assert_eq!(g.num_ops(), 0);
    assert!(g.tensor(piece).source().is_none());
    Ok(())
}

#[test]
fn output_bound_to_an_input_is_rejected() -> anyhow::Result<()> {
    let mut g = graph();
    let x = g.add_tensor([2, 3], DType::F32);
    assert!(g.add_identity(x, Some(x)).is_err());
    assert_eq!(g.num_ops(), 0);
    assert!(g.tensor(x).targets().is_empty());
    assert!(g.check_topology().is_ok());
    Ok(())
}
