// src/core/common/types.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a physical storage cluster. A schema class owns one or more
/// clusters; records of that class live in exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Physical record identifier: owning cluster plus position within it.
///
/// Printed in the `#<cluster>:<position>` form used by the statement surface
/// (`DELETE VERTEX #12:3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rid {
    pub cluster: ClusterId,
    pub position: u64,
}

impl Rid {
    #[must_use]
    pub const fn new(cluster: ClusterId, position: u64) -> Self {
        Self { cluster, position }
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster, self.position)
    }
}

/// Monotonically assigned transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}
