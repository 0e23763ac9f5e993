use hetrt::kernel::{KernelKey, KernelRegistry};
use hetrt::tensor::{IncrementalGenerator, RandomGenerator};
use hetrt::{
    DType, DetMode, Device, Graph, NativeCpuRuntime, OpKind, RtError, RunOptions, Tensor,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn registry() -> KernelRegistry {
    let mut builder = KernelRegistry::builder();
    hetrt_backend_ref_cpu::register_kernels(&mut builder);
    builder.build().expect("cpu kernels register without duplicates")
}

#[test]
fn registers_copy_and_split_for_every_dtype() {
    let registry = registry();
    for dtype in DType::ALL {
        for kind in [OpKind::Reshape, OpKind::Flatten, OpKind::Identity, OpKind::Split] {
            assert!(registry.contains(&KernelKey::new(Device::Cpu, kind, dtype)));
        }
    }
    assert!(registry.contains(&KernelKey::new(Device::Cpu, OpKind::Det, DType::F64)));
    assert!(!registry.contains(&KernelKey::new(Device::Cpu, OpKind::Det, DType::I32)));
}

#[test]
fn relabeling_ops_copy_bytes_unchanged() -> anyhow::Result<()> {
    let registry = registry();
    let runtime = NativeCpuRuntime::instance();
    let mut g = Graph::new(runtime.clone());
    let input = g.add_tensor([2, 3, 4], DType::I64);
    let reshape = g.add_reshape(input, [4, 6], None)?;
    let flatten = g.add_flatten(input, 2, None)?;
    let identity = g.add_identity(input, None)?;
    g.data_malloc()?;
    g.tensor(input).set_data(&mut IncrementalGenerator)?;

    runtime.run_with(&registry, &g, RunOptions::default())?;
    let expected: Vec<i64> = (0..24).collect();
    for op in [reshape, flatten, identity] {
        assert_eq!(g.op(op).output(0)?.copyout::<i64>()?, expected);
    }
    assert_eq!(g.op(flatten).output(0)?.dims(), &[6, 4]);
    Ok(())
}

#[test]
fn split_by_count_slices_inner_axis() -> anyhow::Result<()> {
    let registry = registry();
    let runtime = NativeCpuRuntime::instance();
    let mut g = Graph::new(runtime.clone());
    let input = g.add_tensor([2, 10], DType::F32);
    let op = g.add_split_num(input, 1, 3, None)?;
    g.data_malloc()?;
    g.tensor(input).set_data(&mut IncrementalGenerator)?;

    runtime.run_with(&registry, &g, RunOptions::default())?;
    let outputs = g.op(op).outputs();
    assert_eq!(outputs[0].copyout::<f32>()?, vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
    assert_eq!(outputs[1].copyout::<f32>()?, vec![3.0, 4.0, 5.0, 13.0, 14.0, 15.0]);
    assert_eq!(
        outputs[2].copyout::<f32>()?,
        vec![6.0, 7.0, 8.0, 9.0, 16.0, 17.0, 18.0, 19.0]
    );
    Ok(())
}

#[test]
fn split_by_ratio_on_outer_axis() -> anyhow::Result<()> {
    let registry = registry();
    let runtime = NativeCpuRuntime::instance();
    let mut g = Graph::new(runtime.clone());
    let input = g.add_tensor([12, 2], DType::I32);
    let op = g.add_split_ratio(input, 0, &[1, 1, 2], None)?;
    g.data_malloc()?;
    g.tensor(input).set_data(&mut IncrementalGenerator)?;

    runtime.run_with(&registry, &g, RunOptions::default())?;
    let outputs = g.op(op).outputs();
    assert_eq!(outputs[0].dims(), &[3, 2]);
    assert_eq!(outputs[2].dims(), &[6, 2]);
    assert_eq!(outputs[1].copyout::<i32>()?, (6..12).collect::<Vec<i32>>());
    assert_eq!(outputs[2].copyout::<i32>()?, (12..24).collect::<Vec<i32>>());
    Ok(())
}

#[test]
fn det_handles_batches_and_log_mode() -> anyhow::Result<()> {
    let registry = registry();
    let runtime = NativeCpuRuntime::instance();
    let mut g = Graph::new(runtime.clone());
    let input = g.add_tensor([2, 2, 2], DType::F64);
    let det = g.add_det(input, DetMode::Normal, None)?;
    let log_det = g.add_det(input, DetMode::LogDet, None)?;
    g.data_malloc()?;
    g.tensor(input)
        .copyin(&[4.0f64, 3.0, 6.0, 3.0, 2.0, 0.0, 0.0, 5.0])?;

    runtime.run_with(&registry, &g, RunOptions::default())?;
    let dets = g.op(det).output(0)?.copyout::<f64>()?;
    assert!((dets[0] + 6.0).abs() < 1e-12);
    assert!((dets[1] - 10.0).abs() < 1e-12);
    let logs = g.op(log_det).output(0)?.copyout::<f64>()?;
    assert!(logs[0].is_nan());
    assert!((logs[1] - 10.0f64.ln()).abs() < 1e-12);
    Ok(())
}

#[test]
fn det_of_random_f32_matrices_matches_expansion() -> anyhow::Result<()> {
    let registry = registry();
    let runtime = NativeCpuRuntime::instance();
    let mut rng = StdRng::seed_from_u64(11);
    let values: Vec<f32> = (0..4 * 9).map(|_| rng.gen_range(-2.0..2.0)).collect();

    let mut g = Graph::new(runtime.clone());
    let input = g.add_tensor([4, 3, 3], DType::F32);
    let op = g.add_det(input, DetMode::Normal, None)?;
    g.data_malloc()?;
    g.tensor(input).copyin(&values)?;
    runtime.run_with(&registry, &g, RunOptions::default())?;

    let expected: Vec<f32> = values
        .chunks_exact(9)
        .map(|m| {
            let m: Vec<f64> = m.iter().map(|&v| f64::from(v)).collect();
            let det = m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
                + m[2] * (m[3] * m[7] - m[4] * m[6]);
            det as f32
        })
        .collect();
    let mut reference = Tensor::new([4], DType::F32, runtime.clone());
    reference.data_malloc()?;
    reference.copyin(&expected)?;
    assert!(g.op(op).output(0)?.equal_data(&reference, 1e-4)?);
    Ok(())
}

#[test]
fn det_rejects_non_square_matrices() -> anyhow::Result<()> {
    let registry = registry();
    let runtime = NativeCpuRuntime::instance();
    let mut g = Graph::new(runtime.clone());
    let input = g.add_tensor([2, 3], DType::F32);
    g.add_det(input, DetMode::Normal, None)?;
    g.data_malloc()?;
    g.tensor(input)
        .set_data(&mut RandomGenerator::new(0.0, 1.0, 5))?;
    let err = runtime
        .run_with(&registry, &g, RunOptions::default())
        .unwrap_err();
    assert!(matches!(err, RtError::Kernel { ref name, .. } if name == "cpu.det.f32"));
    Ok(())
}
