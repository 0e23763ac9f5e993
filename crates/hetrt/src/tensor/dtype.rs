//! Enumerates the scalar element types a tensor buffer can hold.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical dtype identifier shared by tensors, kernels, and the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DType {
    /// 32-bit floating point following IEEE-754 semantics.
    F32,
    /// 64-bit floating point.
    F64,
    /// 16-bit floating point (fp16).
    F16,
    /// 16-bit bfloat16 as used by many accelerators.
    BF16,
    I8,
    I16,
    /// 32-bit signed integer, primarily for index buffers.
    I32,
    I64,
    U8,
    /// One byte per element, zero is false.
    Bool,
}

impl DType {
    pub const ALL: [DType; 10] = [
        DType::F32,
        DType::F64,
        DType::F16,
        DType::BF16,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::Bool,
    ];

    /// Returns the number of bytes required per scalar element.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::I8 | DType::U8 | DType::Bool => 1,
            DType::F16 | DType::BF16 | DType::I16 => 2,
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64 | DType::F16 | DType::BF16)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DType::I8 | DType::I16 | DType::I32 | DType::I64 | DType::U8 | DType::Bool
        )
    }

    /// Produces a stable tag used in fingerprints and serialized metadata.
    pub fn tag(self) -> u32 {
        match self {
            DType::F32 => 0,
            DType::F64 => 1,
            DType::F16 => 2,
            DType::BF16 => 3,
            DType::I8 => 4,
            DType::I16 => 5,
            DType::I32 => 6,
            DType::I64 => 7,
            DType::U8 => 8,
            DType::Bool => 9,
        }
    }

    /// Reconstructs a `DType` from its tag representation.
    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(DType::F32),
            1 => Some(DType::F64),
            2 => Some(DType::F16),
            3 => Some(DType::BF16),
            4 => Some(DType::I8),
            5 => Some(DType::I16),
            6 => Some(DType::I32),
            7 => Some(DType::I64),
            8 => Some(DType::U8),
            9 => Some(DType::Bool),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "Float32",
            DType::F64 => "Float64",
            DType::F16 => "Float16",
            DType::BF16 => "BFloat16",
            DType::I8 => "Int8",
            DType::I16 => "Int16",
            DType::I32 => "Int32",
            DType::I64 => "Int64",
            DType::U8 => "UInt8",
            DType::Bool => "Bool",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
