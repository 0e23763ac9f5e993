//! Operator contract: kinds, parameters, shape inference, and fingerprints.
//!
//! Operators form a closed set. [`OpParams`] is the tagged variant that carries each kind's
//! parameters and routes shape inference to the per-kind functions in the submodules.

pub mod det;
mod kind;
mod operator;
pub mod reshape;
pub mod split;

pub use det::DetMode;
pub use kind::OpKind;
pub use operator::{OpParams, OpRef, Operator};
pub use split::{split_by_num, split_by_ratio, split_copy_plan, CopyRegion};
