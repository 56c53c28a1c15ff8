use serde::{Deserialize, Serialize};

/// Payload slot for one vertex replica.
///
/// `version` is a monotonically increasing logical clock; `modified` marks
/// local writes not yet reconciled with the owner; `snapshot_made` is cleared
/// whenever `version` changes so checkpoint logic can tell fresh state apart.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord<V> {
    pub data: V,
    pub version: u64,
    pub modified: bool,
    pub snapshot_made: bool,
}

/// Payload slot for one edge replica, with the same flag semantics as
/// [`VertexRecord`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord<E> {
    pub data: E,
    pub version: u64,
    pub modified: bool,
    pub snapshot_made: bool,
}

/// Immutable endpoints of one edge, in fragment-local vertex indices.
///
/// The derived ordering is the `(source, target)` lexicographic key that
/// adjacency lists are sorted by.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Endpoints {
    pub source: u32,
    pub target: u32,
}
