//! Deterministic fill functions for [`Tensor::set_data`](super::Tensor::set_data).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::storage;
use super::DType;

/// Fills a raw buffer holding `size` elements of `dtype`.
pub trait DataGenerator {
    fn fill(&mut self, bytes: &mut [u8], size: usize, dtype: DType);
}

impl<F> DataGenerator for F
where
    F: FnMut(&mut [u8], usize, DType),
{
    fn fill(&mut self, bytes: &mut [u8], size: usize, dtype: DType) {
        self(bytes, size, dtype)
    }
}

/// Writes `0, 1, 2, ...` converted to the tensor dtype.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncrementalGenerator;

impl DataGenerator for IncrementalGenerator {
    fn fill(&mut self, bytes: &mut [u8], size: usize, dtype: DType) {
        for i in 0..size {
            storage::write_from_f64(dtype, bytes, i, i as f64);
        }
    }
}

/// Writes the same value everywhere.
#[derive(Debug, Clone, Copy)]
pub struct ValueGenerator(pub f64);

impl DataGenerator for ValueGenerator {
    fn fill(&mut self, bytes: &mut [u8], size: usize, dtype: DType) {
        for i in 0..size {
            storage::write_from_f64(dtype, bytes, i, self.0);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OneGenerator;

impl DataGenerator for OneGenerator {
    fn fill(&mut self, bytes: &mut [u8], size: usize, dtype: DType) {
        ValueGenerator(1.0).fill(bytes, size, dtype)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroGenerator;

impl DataGenerator for ZeroGenerator {
    fn fill(&mut self, bytes: &mut [u8], size: usize, dtype: DType) {
        ValueGenerator(0.0).fill(bytes, size, dtype)
    }
}

/// Uniform samples from `[low, high)` drawn from a seeded generator.
///
/// The generator keeps its state between calls, so filling two tensors with the same
/// instance yields different data.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    low: f64,
    high: f64,
    rng: StdRng,
}

impl RandomGenerator {
    pub fn new(low: f64, high: f64, seed: u64) -> Self {
        Self {
            low,
            high,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DataGenerator for RandomGenerator {
    fn fill(&mut self, bytes: &mut [u8], size: usize, dtype: DType) {
        for i in 0..size {
            let value = if self.high > self.low {
                self.rng.gen_range(self.low..self.high)
            } else {
                self.low
            };
            storage::write_from_f64(dtype, bytes, i, value);
        }
    }
}
