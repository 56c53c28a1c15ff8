use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Globally unique vertex identifier, assigned by the external partitioner.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct VertexId(pub u32);

/// Globally unique edge identifier. Under canonical numbering the value is
/// only valid within the fragment that produced it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct EdgeId(pub u32);

/// Identifier of a peer process in the cluster.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize, Deserialize)]
pub struct ProcId(pub u16);

/// Fragment-local vertex index, dense in `0..num_vertices`. Never leaves the
/// fragment.
pub(crate) type Lvid = u32;

/// Fragment-local edge index, dense in `0..num_edges`. Never leaves the
/// fragment.
pub(crate) type Leid = u32;

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for VertexId {
    fn from(value: u32) -> Self {
        VertexId(value)
    }
}

impl From<VertexId> for u32 {
    fn from(value: VertexId) -> Self {
        value.0
    }
}

impl From<u32> for EdgeId {
    fn from(value: u32) -> Self {
        EdgeId(value)
    }
}

impl From<EdgeId> for u32 {
    fn from(value: EdgeId) -> Self {
        value.0
    }
}

impl From<u16> for ProcId {
    fn from(value: u16) -> Self {
        ProcId(value)
    }
}

impl From<ProcId> for u16 {
    fn from(value: ProcId) -> Self {
        value.0
    }
}

/// Bound alias for application payloads stored on vertices and edges.
///
/// Payloads cross the wire and the archive boundary, so they must be
/// serde-able; `Default` covers record allocation before the atom payload
/// pass runs.
pub trait GraphData:
    Clone + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> GraphData for T where
    T: Clone + Default + Send + Sync + Serialize + DeserializeOwned + 'static
{
}
