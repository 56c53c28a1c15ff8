//! Wire shapes for the ghost synchronization protocol.
//!
//! A ghost sends its current version (plus its payload when locally
//! modified); the owner answers with a [`Conditional`] that carries data only
//! when the owner's copy is strictly newer. The batched forms pack many such
//! exchanges into parallel arrays so one round trip reconciles a whole scope.

use serde::{Deserialize, Serialize};

use crate::types::{EdgeId, VertexId};

/// A payload together with the version it was produced at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub data: T,
    pub version: u64,
}

/// Owner-side answer to a version probe: `None` means the ghost is already
/// current (or the owner adopted the ghost's forwarded write).
pub type Conditional<T> = Option<Versioned<T>>;

/// Batched synchronization request addressing edges by global edge id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlockSyncRequest<V, E> {
    pub vids: Vec<VertexId>,
    pub vertex_versions: Vec<u64>,
    pub vertex_payloads: Vec<Option<V>>,
    pub eids: Vec<EdgeId>,
    pub edge_versions: Vec<u64>,
    pub edge_payloads: Vec<Option<E>>,
}

impl<V, E> BlockSyncRequest<V, E> {
    pub fn new() -> Self {
        Self {
            vids: Vec::new(),
            vertex_versions: Vec::new(),
            vertex_payloads: Vec::new(),
            eids: Vec::new(),
            edge_versions: Vec::new(),
            edge_payloads: Vec::new(),
        }
    }

    pub fn push_vertex(&mut self, vid: VertexId, version: u64, payload: Option<V>) {
        self.vids.push(vid);
        self.vertex_versions.push(version);
        self.vertex_payloads.push(payload);
    }

    pub fn push_edge(&mut self, eid: EdgeId, version: u64, payload: Option<E>) {
        self.eids.push(eid);
        self.edge_versions.push(version);
        self.edge_payloads.push(payload);
    }

    pub fn is_empty(&self) -> bool {
        self.vids.is_empty() && self.eids.is_empty()
    }
}

/// Batched synchronization request addressing edges by `(source, target)`
/// pair; the only edge form available under canonical numbering.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlockSyncByPairRequest<V, E> {
    pub vids: Vec<VertexId>,
    pub vertex_versions: Vec<u64>,
    pub vertex_payloads: Vec<Option<V>>,
    pub pairs: Vec<(VertexId, VertexId)>,
    pub edge_versions: Vec<u64>,
    pub edge_payloads: Vec<Option<E>>,
}

impl<V, E> BlockSyncByPairRequest<V, E> {
    pub fn new() -> Self {
        Self {
            vids: Vec::new(),
            vertex_versions: Vec::new(),
            vertex_payloads: Vec::new(),
            pairs: Vec::new(),
            edge_versions: Vec::new(),
            edge_payloads: Vec::new(),
        }
    }

    pub fn push_vertex(&mut self, vid: VertexId, version: u64, payload: Option<V>) {
        self.vids.push(vid);
        self.vertex_versions.push(version);
        self.vertex_payloads.push(payload);
    }

    pub fn push_edge(&mut self, source: VertexId, target: VertexId, version: u64, payload: Option<E>) {
        self.pairs.push((source, target));
        self.edge_versions.push(version);
        self.edge_payloads.push(payload);
    }

    pub fn is_empty(&self) -> bool {
        self.vids.is_empty() && self.pairs.is_empty()
    }
}

/// Owner's answer to a [`BlockSyncRequest`], shaped entry-for-entry like the
/// request it answers.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlockSyncReply<V, E> {
    pub vids: Vec<VertexId>,
    pub vertex_replies: Vec<Conditional<V>>,
    pub eids: Vec<EdgeId>,
    pub edge_replies: Vec<Conditional<E>>,
}

/// Owner's answer to a [`BlockSyncByPairRequest`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlockSyncByPairReply<V, E> {
    pub vids: Vec<VertexId>,
    pub vertex_replies: Vec<Conditional<V>>,
    pub pairs: Vec<(VertexId, VertexId)>,
    pub edge_replies: Vec<Conditional<E>>,
}
