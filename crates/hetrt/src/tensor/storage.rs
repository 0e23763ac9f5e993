//! Defines the scalar element trait implemented by host-side element types.

use std::fmt;

use bytemuck::Pod;
use half::{bf16, f16};

use super::dtype::DType;

/// Host element type that maps one-to-one onto a [`DType`].
///
/// Typed copies (`copyin`/`copyout`) check `Self::DTYPE` against the tensor dtype before
/// reinterpreting bytes, so implementations must have exactly `DTYPE.size_in_bytes()` bytes.
pub trait Element: Pod + PartialEq + fmt::Display + Send + Sync + 'static {
    const DTYPE: DType;

    /// Converts a 64-bit float into this element type (truncating for integers).
    fn from_f64(v: f64) -> Self;

    /// Widens the element into a 64-bit float for comparisons.
    fn to_f64(self) -> f64;
}

macro_rules! impl_element_primitive {
    ($($ty:ty => $dtype:expr),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = $dtype;

                fn from_f64(v: f64) -> Self {
                    v as $ty
                }

                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_element_primitive!(
    f32 => DType::F32,
    f64 => DType::F64,
    i8 => DType::I8,
    i16 => DType::I16,
    i32 => DType::I32,
    i64 => DType::I64,
    u8 => DType::U8,
);

impl Element for f16 {
    const DTYPE: DType = DType::F16;

    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }

    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }
}

impl Element for bf16 {
    const DTYPE: DType = DType::BF16;

    fn from_f64(v: f64) -> Self {
        bf16::from_f64(v)
    }

    fn to_f64(self) -> f64 {
        bf16::to_f64(self)
    }
}

/// Reads the element at `index` of a little-endian byte buffer as `f64`.
pub(crate) fn read_as_f64(dtype: DType, bytes: &[u8], index: usize) -> f64 {
    fn at<T: Element>(bytes: &[u8], index: usize) -> f64 {
        let width = std::mem::size_of::<T>();
        bytemuck::pod_read_unaligned::<T>(&bytes[index * width..(index + 1) * width]).to_f64()
    }
    match dtype {
        DType::F32 => at::<f32>(bytes, index),
        DType::F64 => at::<f64>(bytes, index),
        DType::F16 => at::<f16>(bytes, index),
        DType::BF16 => at::<bf16>(bytes, index),
        DType::I8 => at::<i8>(bytes, index),
        DType::I16 => at::<i16>(bytes, index),
        DType::I32 => at::<i32>(bytes, index),
        DType::I64 => at::<i64>(bytes, index),
        DType::U8 | DType::Bool => at::<u8>(bytes, index),
    }
}

/// Writes `value` into element `index` of a byte buffer, converting to `dtype`.
pub(crate) fn write_from_f64(dtype: DType, bytes: &mut [u8], index: usize, value: f64) {
    fn put<T: Element>(bytes: &mut [u8], index: usize, value: f64) {
        let width = std::mem::size_of::<T>();
        let element = T::from_f64(value);
        bytes[index * width..(index + 1) * width].copy_from_slice(bytemuck::bytes_of(&element));
    }
    match dtype {
        DType::F32 => put::<f32>(bytes, index, value),
        DType::F64 => put::<f64>(bytes, index, value),
        DType::F16 => put::<f16>(bytes, index, value),
        DType::BF16 => put::<bf16>(bytes, index, value),
        DType::I8 => put::<i8>(bytes, index, value),
        DType::I16 => put::<i16>(bytes, index, value),
        DType::I32 => put::<i32>(bytes, index, value),
        DType::I64 => put::<i64>(bytes, index, value),
        DType::U8 => put::<u8>(bytes, index, value),
        DType::Bool => put::<u8>(bytes, index, if value != 0.0 { 1.0 } else { 0.0 }),
    }
}

/// Renders element `index` using the natural `Display` of its host type.
pub(crate) fn format_element(dtype: DType, bytes: &[u8], index: usize) -> String {
    fn show<T: Element>(bytes: &[u8], index: usize) -> String {
        let width = std::mem::size_of::<T>();
        bytemuck::pod_read_unaligned::<T>(&bytes[index * width..(index + 1) * width]).to_string()
    }
    match dtype {
        DType::F32 => show::<f32>(bytes, index),
        DType::F64 => show::<f64>(bytes, index),
        DType::F16 => show::<f16>(bytes, index),
        DType::BF16 => show::<bf16>(bytes, index),
        DType::I8 => show::<i8>(bytes, index),
        DType::I16 => show::<i16>(bytes, index),
        DType::I32 => show::<i32>(bytes, index),
        DType::I64 => show::<i64>(bytes, index),
        DType::U8 => show::<u8>(bytes, index),
        DType::Bool => (bytes[index] != 0).to_string(),
    }
}

/// Decodes a byte buffer into typed elements without alignment requirements.
pub(crate) fn bytes_to_vec<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect()
}
