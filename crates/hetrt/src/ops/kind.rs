use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of operator kinds.
///
/// The discriminant is the stable `underlying` id that leads every workload and attribute
/// vector, so values must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i64)]
pub enum OpKind {
    Reshape = 15,
    Flatten = 16,
    Identity = 17,
    Split = 31,
    Det = 77,
}

impl OpKind {
    pub const ALL: [OpKind; 5] = [
        OpKind::Reshape,
        OpKind::Flatten,
        OpKind::Identity,
        OpKind::Split,
        OpKind::Det,
    ];

    pub fn underlying(self) -> i64 {
        self as i64
    }

    pub fn name(self) -> &'static str {
        match self {
            OpKind::Reshape => "Reshape",
            OpKind::Flatten => "Flatten",
            OpKind::Identity => "Identity",
            OpKind::Split => "Split",
            OpKind::Det => "Det",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
