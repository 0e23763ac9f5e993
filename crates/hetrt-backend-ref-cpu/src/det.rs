use std::marker::PhantomData;

use hetrt::kernel::Kernel;
use hetrt::ops::{DetMode, OpParams};
use hetrt::runtime::as_cpu_runtime;
use hetrt::tensor::Element;
use hetrt::{OpRef, RtError, RtResult, Runtime};

/// Batched determinant over the trailing two axes via LU with partial pivoting.
///
/// Accumulation happens in `f64` regardless of `T`.
#[derive(Debug)]
pub struct DetKernel<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> DetKernel<T> {
    pub fn new() -> Self {
        DetKernel {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for DetKernel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Kernel for DetKernel<T> {
    fn compute(&self, op: &OpRef<'_>, runtime: &dyn Runtime) -> RtResult<()> {
        let cpu = as_cpu_runtime(runtime)?;
        let OpParams::Det { mode } = op.params() else {
            return Err(RtError::execution(format!("det kernel received {}", op.kind())));
        };
        let input = op.input(0)?;
        let output = op.output(0)?;
        let dims = input.dims();
        let rank = dims.len();
        if rank < 2 || dims[rank - 2] != dims[rank - 1] {
            return Err(RtError::execution(format!(
                "det expects square trailing matrices, got {}",
                input.shape()
            )));
        }
        let n = dims[rank - 1];

        let values = cpu.with_bytes(input.data_ptr()?, decode::<T>)?;
        let batch = output.size();
        let mut results = Vec::with_capacity(batch);
        let mut scratch = vec![0.0f64; n * n];
        for b in 0..batch {
            scratch.copy_from_slice(&values[b * n * n..(b + 1) * n * n]);
            let det = lu_determinant(&mut scratch, n);
            results.push(match mode {
                DetMode::Normal => det,
                DetMode::LogDet => det.ln(),
            });
        }
        cpu.with_bytes_mut(output.data_ptr()?, |bytes| encode::<T>(&results, bytes))
    }
}

fn decode<T: Element>(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(|chunk| bytemuck::pod_read_unaligned::<T>(chunk).to_f64())
        .collect()
}

fn encode<T: Element>(values: &[f64], bytes: &mut [u8]) {
    for (chunk, &value) in bytes
        .chunks_exact_mut(std::mem::size_of::<T>())
        .zip(values)
    {
        chunk.copy_from_slice(bytemuck::bytes_of(&T::from_f64(value)));
    }
}

/// Determinant of the row-major `n x n` matrix in `a`, which is overwritten by its LU factors.
pub(crate) fn lu_determinant(a: &mut [f64], n: usize) -> f64 {
    let mut det = 1.0;
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&x, &y| a[x * n + col].abs().total_cmp(&a[y * n + col].abs()))
            .unwrap_or(col);
        if a[pivot * n + col] == 0.0 {
            return 0.0;
        }
        if pivot != col {
            for k in 0..n {
                a.swap(col * n + k, pivot * n + k);
            }
            det = -det;
        }
        let diag = a[col * n + col];
        det *= diag;
        for row in col + 1..n {
            let factor = a[row * n + col] / diag;
            for k in col..n {
                a[row * n + k] -= factor * a[col * n + k];
            }
        }
    }
    det
}

#[cfg(test)]
mod tests {
    use super::lu_determinant;

    #[test]
    fn determinant_of_small_matrices() {
        let mut identity = vec![1.0, 0.0, 0.0, 1.0];
        assert_eq!(lu_determinant(&mut identity, 2), 1.0);

        let mut swapped = vec![0.0, 1.0, 1.0, 0.0];
        assert_eq!(lu_determinant(&mut swapped, 2), -1.0);

        let mut m = vec![2.0, -3.0, 1.0, 2.0, 0.0, -1.0, 1.0, 4.0, 5.0];
        assert!((lu_determinant(&mut m, 3) - 49.0).abs() < 1e-9);

        let mut singular = vec![1.0, 2.0, 2.0, 4.0];
        assert_eq!(lu_determinant(&mut singular, 2), 0.0);
    }
}
