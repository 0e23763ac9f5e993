use std::sync::Arc;

use half::f16;
use hetrt::tensor::{
    IncrementalGenerator, OneGenerator, RandomGenerator, ValueGenerator, ZeroGenerator,
};
use hetrt::{DType, NativeCpuRuntime, RtError, RuntimeHandle, Shape, Tensor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn private_cpu() -> (Arc<NativeCpuRuntime>, RuntimeHandle) {
    let cpu = Arc::new(NativeCpuRuntime::new());
    let handle: RuntimeHandle = cpu.clone();
    (cpu, handle)
}

fn allocated(dims: &[usize], dtype: DType) -> Tensor {
    let mut tensor = Tensor::new(dims, dtype, NativeCpuRuntime::instance());
    tensor.data_malloc().unwrap();
    tensor
}

#[test]
fn size_and_bytes_follow_shape_and_dtype() {
    let tensor = Tensor::new([2, 3, 4], DType::F16, NativeCpuRuntime::instance());
    assert_eq!(tensor.size(), 24);
    assert_eq!(tensor.bytes(), 48);
    assert_eq!(tensor.rank(), 3);
    assert_eq!(tensor.stride(), vec![12, 4, 1]);
    assert!(!tensor.has_data());

    let scalar = Tensor::new(Shape::scalar(), DType::I64, NativeCpuRuntime::instance());
    assert_eq!(scalar.size(), 1);
    assert_eq!(scalar.bytes(), 8);
}

#[test]
fn data_malloc_allocates_exactly_once() -> anyhow::Result<()> {
    let (cpu, handle) = private_cpu();
    let mut tensor = Tensor::new([3, 5], DType::F32, handle);
    tensor.data_malloc()?;
    assert_eq!(cpu.bytes_in_use(), 60);
    assert!(matches!(
        tensor.data_malloc(),
        Err(RtError::AlreadyAllocated { .. })
    ));
    tensor.free_data();
    assert_eq!(cpu.bytes_in_use(), 0);
    Ok(())
}

#[test]
fn typed_copies_check_dtype_and_length() -> anyhow::Result<()> {
    let tensor = allocated(&[2, 2], DType::I32);
    tensor.copyin(&[1i32, 2, 3, 4])?;
    assert_eq!(tensor.copyout::<i32>()?, vec![1, 2, 3, 4]);
    assert_eq!(tensor.copy_one::<i32>(&[1, 0])?, 3);

    assert!(matches!(
        tensor.copyin(&[1.0f32, 2.0, 3.0, 4.0]),
        Err(RtError::DTypeMismatch { .. })
    ));
    assert!(matches!(
        tensor.copyin(&[1i32, 2, 3]),
        Err(RtError::SizeMismatch { expected: 4, found: 3 })
    ));
    let mut short = vec![0u8; 15];
    assert!(tensor.copyout_bytes(&mut short).is_err());
    Ok(())
}

#[test]
fn reads_without_buffer_fail() {
    let tensor = Tensor::new([4], DType::F32, NativeCpuRuntime::instance());
    assert!(matches!(tensor.copyout::<f32>(), Err(RtError::NoData { .. })));
    assert!(matches!(
        tensor.set_data(&mut OneGenerator),
        Err(RtError::NoData { .. })
    ));
}

#[test]
fn generators_fill_existing_buffers() -> anyhow::Result<()> {
    let tensor = allocated(&[2, 3], DType::F32);
    tensor.set_data(&mut IncrementalGenerator)?;
    assert_eq!(tensor.copyout::<f32>()?, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

    tensor.set_data(&mut ValueGenerator(2.5))?;
    assert!(tensor.equal_values(&[2.5f32; 6])?);

    tensor.set_data(&mut ZeroGenerator)?;
    assert!(tensor.copyout::<f32>()?.iter().all(|&v| v == 0.0));

    let ints = allocated(&[3], DType::I64);
    ints.set_data(&mut OneGenerator)?;
    assert_eq!(ints.copyout::<i64>()?, vec![1, 1, 1]);

    let mut custom = |bytes: &mut [u8], size: usize, _dtype: DType| {
        for (i, chunk) in bytes.chunks_exact_mut(8).take(size).enumerate() {
            chunk.copy_from_slice(&(10 * i as i64).to_le_bytes());
        }
    };
    ints.set_data(&mut custom)?;
    assert_eq!(ints.copyout::<i64>()?, vec![0, 10, 20]);
    Ok(())
}

#[test]
fn generator_may_read_other_tensors_on_the_same_runtime() -> anyhow::Result<()> {
    let src = allocated(&[4], DType::F32);
    src.copyin(&[1.0f32, 2.0, 3.0, 4.0])?;
    let dst = allocated(&[4], DType::F32);

    let mut doubled = |bytes: &mut [u8], _size: usize, _dtype: DType| {
        let values: Vec<f32> = src
            .copyout::<f32>()
            .unwrap()
            .iter()
            .map(|v| v * 2.0)
            .collect();
        bytes.copy_from_slice(bytemuck::cast_slice(&values));
    };
    dst.set_data(&mut doubled)?;
    assert_eq!(dst.copyout::<f32>()?, vec![2.0, 4.0, 6.0, 8.0]);
    Ok(())
}

#[test]
fn copy_one_reads_a_single_element() -> anyhow::Result<()> {
    let tensor = allocated(&[3, 4], DType::F16);
    tensor.set_data(&mut IncrementalGenerator)?;
    assert_eq!(tensor.copy_one::<f16>(&[0, 0])?, f16::from_f32(0.0));
    assert_eq!(tensor.copy_one::<f16>(&[2, 3])?, f16::from_f32(11.0));
    assert!(tensor.copy_one::<f16>(&[3, 0]).is_err());
    assert!(tensor.copy_one::<f32>(&[0, 0]).is_err());
    Ok(())
}

#[test]
fn random_generator_is_seeded_and_bounded() -> anyhow::Result<()> {
    let a = allocated(&[64], DType::F32);
    let b = allocated(&[64], DType::F32);
    a.set_data(&mut RandomGenerator::new(-1.0, 1.0, 7))?;
    b.set_data(&mut RandomGenerator::new(-1.0, 1.0, 7))?;
    assert!(a.equal_data_default(&b)?);
    assert!(a.copyout::<f32>()?.iter().all(|&v| (-1.0..=1.0).contains(&v)));

    let mut shared = RandomGenerator::new(0.0, 1.0, 7);
    a.set_data(&mut shared)?;
    b.set_data(&mut shared)?;
    assert!(!a.equal_data_default(&b)?);
    Ok(())
}

#[test]
fn equal_data_is_reflexive_and_detects_single_difference() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(42);
    let values: Vec<f32> = (0..60).map(|_| rng.gen_range(-10.0..10.0)).collect();
    let a = allocated(&[3, 4, 5], DType::F32);
    let b = allocated(&[3, 4, 5], DType::F32);
    a.copyin(&values)?;
    b.copyin(&values)?;
    assert!(a.equal_data_default(&a)?);
    assert!(a.equal_data_default(&b)?);

    let mut changed = values.clone();
    changed[37] += 1.0;
    b.copyin(&changed)?;
    assert!(!a.equal_data_default(&b)?);
    Ok(())
}

#[test]
fn equal_data_uses_relative_error_for_floats() -> anyhow::Result<()> {
    let a = allocated(&[3], DType::F64);
    let b = allocated(&[3], DType::F64);
    a.copyin(&[0.0f64, 1000.0, -2.0])?;
    b.copyin(&[0.0f64, 1000.0001, -2.0])?;
    // zero against zero divides 0 by 0 and still compares equal
    assert!(a.equal_data(&b, 1e-6)?);
    assert!(!a.equal_data(&b, 1e-8)?);
    Ok(())
}

#[test]
fn equal_data_is_exact_for_integers() -> anyhow::Result<()> {
    let a = allocated(&[2], DType::I32);
    let b = allocated(&[2], DType::I32);
    a.copyin(&[1_000_000i32, 7])?;
    b.copyin(&[1_000_001i32, 7])?;
    assert!(!a.equal_data(&b, 1e-3)?);
    Ok(())
}

#[test]
fn equal_data_rejects_mismatched_tensors() {
    let a = allocated(&[4], DType::F32);
    let b = allocated(&[4], DType::I32);
    let c = allocated(&[5], DType::F32);
    assert!(matches!(a.equal_data_default(&b), Err(RtError::DTypeMismatch { .. })));
    assert!(matches!(a.equal_data_default(&c), Err(RtError::SizeMismatch { .. })));
}

#[test]
fn half_tensors_compare_against_f32_references() -> anyhow::Result<()> {
    let tensor = allocated(&[4], DType::F16);
    let values = [0.5f32, -1.25, 3.0, 8.0];
    tensor.copyin(&values.map(f16::from_f32))?;
    assert!(tensor.equal_values(&values)?);
    assert!(!tensor.equal_values(&[0.5f32, -1.25, 3.0, 9.0])?);
    Ok(())
}

#[test]
fn clone_detached_keeps_identity_but_not_data() -> anyhow::Result<()> {
    let (cpu, handle) = private_cpu();
    let mut source = Tensor::new([2, 3], DType::F32, handle);
    source.set_input();
    source.data_malloc()?;
    let before = cpu.bytes_in_use();

    let cloned = source.clone_detached();
    assert_eq!(cpu.bytes_in_use(), before);
    assert_eq!(cloned.fuid(), source.fuid());
    assert_ne!(cloned.guid(), source.guid());
    assert_eq!(cloned.shape(), source.shape());
    assert_eq!(cloned.dtype(), source.dtype());
    assert!(!cloned.has_data());
    assert!(cloned.is_other());
    assert!(cloned.source().is_none());
    assert!(cloned.targets().is_empty());
    Ok(())
}

#[test]
fn clone_to_copies_data_only_when_present() -> anyhow::Result<()> {
    let (_, other) = private_cpu();
    let mut source = Tensor::new([2, 3], DType::F32, NativeCpuRuntime::instance());
    let empty = source.clone_to(&other)?;
    assert!(!empty.has_data());

    source.data_malloc()?;
    source.set_data(&mut IncrementalGenerator)?;
    let full = source.clone_to(&other)?;
    assert!(full.has_data());
    assert!(full.equal_data_default(&source)?);
    assert_eq!(full.fuid(), source.fuid());
    Ok(())
}

#[test]
fn shared_blob_is_released_with_last_reference() -> anyhow::Result<()> {
    let (cpu, handle) = private_cpu();
    let mut a = Tensor::new([8], DType::U8, handle.clone());
    a.data_malloc()?;
    let blob = a.blob().cloned().expect("allocated");
    let mut b = Tensor::new([8], DType::U8, handle);
    b.set_data_blob(blob)?;
    a.copyin(&[1u8, 2, 3, 4, 5, 6, 7, 8])?;
    assert_eq!(b.copyout::<u8>()?, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    // same buffer: copying onto itself is a no-op
    b.copy_data(&a)?;

    drop(a);
    assert_eq!(cpu.bytes_in_use(), 8);
    drop(b);
    assert_eq!(cpu.bytes_in_use(), 0);
    Ok(())
}

#[test]
fn set_shape_keeps_size_once_allocated() -> anyhow::Result<()> {
    let mut tensor = allocated(&[2, 6], DType::F32);
    tensor.set_shape([3, 4])?;
    assert_eq!(tensor.dims(), &[3, 4]);
    assert!(tensor.set_shape([5]).is_err());
    Ok(())
}

#[test]
fn broadcast_offsets_map_unit_dims_to_zero() -> anyhow::Result<()> {
    let tensor = Tensor::new([3, 1], DType::F32, NativeCpuRuntime::instance());
    let target = Shape::new([3, 4]);
    for i in 0..3 {
        for j in 0..4 {
            assert_eq!(tensor.offset_by_broadcast_offset(i * 4 + j, &target)?, i);
        }
    }
    Ok(())
}

#[test]
fn data_to_string_nests_brackets_by_rank() -> anyhow::Result<()> {
    let tensor = allocated(&[2, 2], DType::I32);
    tensor.copyin(&[1i32, 2, 3, 4])?;
    let rendered = tensor.data_to_string()?;
    let body = rendered.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    assert_eq!(body, "[[1, 2], \n[3, 4]]\n");
    assert!(rendered.starts_with(&format!("Tensor: {}", tensor.guid())));
    Ok(())
}

#[test]
fn display_lists_metadata() {
    let mut tensor = Tensor::new([2], DType::F32, NativeCpuRuntime::instance());
    tensor.set_weight();
    let text = tensor.to_string();
    assert!(text.contains("shape [2]"));
    assert!(text.contains("tensor type weight"));
    assert!(text.contains("data None"));
}

#[test]
fn save_and_load_round_trip_raw_bytes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tensor.bin");
    let tensor = allocated(&[2, 3], DType::F32);
    tensor.set_data(&mut IncrementalGenerator)?;
    tensor.save(&path)?;
    assert_eq!(std::fs::metadata(&path)?.len(), 24);

    let restored = allocated(&[3, 2], DType::F32);
    restored.load(&path)?;
    assert_eq!(restored.copyout::<f32>()?, tensor.copyout::<f32>()?);

    let wrong = allocated(&[5], DType::F32);
    assert!(matches!(wrong.load(&path), Err(RtError::SizeMismatch { .. })));
    Ok(())
}
