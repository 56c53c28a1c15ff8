//! Typed RPC surface exchanged between peers.

use serde::{Deserialize, Serialize};

use crate::error::fatal;
use crate::sync::{
    BlockSyncByPairReply, BlockSyncByPairRequest, BlockSyncReply, BlockSyncRequest, Conditional,
};
use crate::types::{EdgeId, ProcId, VertexId};

/// Which distributed directory a `Dir*` request addresses.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DirKind {
    Vertex,
    Edge,
}

/// Every remote operation the core issues. One-way variants (the `Async*`
/// family, the `*Reply` family and `DirSet`) are delivered without a reply;
/// the rest travel as blocking requests.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Request<V, E> {
    DirSet { kind: DirKind, id: u32, owner: ProcId },
    DirGet { kind: DirKind, id: u32 },

    NumInNeighbors { vid: VertexId },
    NumOutNeighbors { vid: VertexId },
    Find { source: VertexId, target: VertexId },
    RevEdgeId { eid: EdgeId },
    EdgeSource { eid: EdgeId },
    EdgeTarget { eid: EdgeId },
    InEdgeIds { vid: VertexId },
    OutEdgeIds { vid: VertexId },

    GetVertexData { vid: VertexId },
    GetEdgeData { eid: EdgeId },
    GetEdgeDataByPair { source: VertexId, target: VertexId },
    SetVertexData { vid: VertexId, data: V },
    SetEdgeData { eid: EdgeId, data: E },
    SetEdgeDataByPair { source: VertexId, target: VertexId, data: E },
    GetColor { vid: VertexId },
    SetColor { vid: VertexId, color: u32 },

    VertexSync { vid: VertexId, version: u64, payload: Option<V> },
    EdgeSync { eid: EdgeId, version: u64, payload: Option<E> },
    EdgeSyncByPair { source: VertexId, target: VertexId, version: u64, payload: Option<E> },
    AsyncVertexSync { vid: VertexId, version: u64, payload: Option<V> },
    AsyncEdgeSync { eid: EdgeId, version: u64, payload: Option<E> },
    AsyncEdgeSyncByPair { source: VertexId, target: VertexId, version: u64, payload: Option<E> },
    BatchSync(BlockSyncRequest<V, E>),
    BatchSyncByPair(BlockSyncByPairRequest<V, E>),
    AsyncBatchSync(BlockSyncRequest<V, E>),
    AsyncBatchSyncByPair(BlockSyncByPairRequest<V, E>),

    VertexSyncReply { vid: VertexId, response: Conditional<V> },
    EdgeSyncReply { eid: EdgeId, response: Conditional<E> },
    EdgeSyncByPairReply { source: VertexId, target: VertexId, response: Conditional<E> },
    BatchSyncReply(BlockSyncReply<V, E>),
    BatchSyncByPairReply(BlockSyncByPairReply<V, E>),

    Flush,
}

impl<V, E> Request<V, E> {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Request::DirSet { .. } => "dir_set",
            Request::DirGet { .. } => "dir_get",
            Request::NumInNeighbors { .. } => "num_in_neighbors",
            Request::NumOutNeighbors { .. } => "num_out_neighbors",
            Request::Find { .. } => "find",
            Request::RevEdgeId { .. } => "rev_edge_id",
            Request::EdgeSource { .. } => "edge_source",
            Request::EdgeTarget { .. } => "edge_target",
            Request::InEdgeIds { .. } => "in_edge_ids",
            Request::OutEdgeIds { .. } => "out_edge_ids",
            Request::GetVertexData { .. } => "get_vertex_data",
            Request::GetEdgeData { .. } => "get_edge_data",
            Request::GetEdgeDataByPair { .. } => "get_edge_data_by_pair",
            Request::SetVertexData { .. } => "set_vertex_data",
            Request::SetEdgeData { .. } => "set_edge_data",
            Request::SetEdgeDataByPair { .. } => "set_edge_data_by_pair",
            Request::GetColor { .. } => "get_color",
            Request::SetColor { .. } => "set_color",
            Request::VertexSync { .. } => "vertex_sync",
            Request::EdgeSync { .. } => "edge_sync",
            Request::EdgeSyncByPair { .. } => "edge_sync_by_pair",
            Request::AsyncVertexSync { .. } => "async_vertex_sync",
            Request::AsyncEdgeSync { .. } => "async_edge_sync",
            Request::AsyncEdgeSyncByPair { .. } => "async_edge_sync_by_pair",
            Request::BatchSync(_) => "batch_sync",
            Request::BatchSyncByPair(_) => "batch_sync_by_pair",
            Request::AsyncBatchSync(_) => "async_batch_sync",
            Request::AsyncBatchSyncByPair(_) => "async_batch_sync_by_pair",
            Request::VertexSyncReply { .. } => "vertex_sync_reply",
            Request::EdgeSyncReply { .. } => "edge_sync_reply",
            Request::EdgeSyncByPairReply { .. } => "edge_sync_by_pair_reply",
            Request::BatchSyncReply(_) => "batch_sync_reply",
            Request::BatchSyncByPairReply(_) => "batch_sync_by_pair_reply",
            Request::Flush => "flush",
        }
    }
}

/// Return values carried back for blocking requests.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Reply<V, E> {
    Unit,
    Count(usize),
    MaybeEdge(Option<EdgeId>),
    Edge(EdgeId),
    Vertex(VertexId),
    EdgeIds(Vec<EdgeId>),
    VertexData(V),
    EdgeData(E),
    Color(u32),
    Owner(ProcId),
    CondVertex(Conditional<V>),
    CondEdge(Conditional<E>),
    Batch(BlockSyncReply<V, E>),
    BatchByPair(BlockSyncByPairReply<V, E>),
}

impl<V, E> Reply<V, E> {
    pub(crate) fn into_unit(self) {
        match self {
            Reply::Unit => (),
            other => fatal!("rpc", "expected unit reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_count(self) -> usize {
        match self {
            Reply::Count(n) => n,
            other => fatal!("rpc", "expected count reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_maybe_edge(self) -> Option<EdgeId> {
        match self {
            Reply::MaybeEdge(eid) => eid,
            other => fatal!("rpc", "expected optional edge reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_edge(self) -> EdgeId {
        match self {
            Reply::Edge(eid) => eid,
            other => fatal!("rpc", "expected edge reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_vertex(self) -> VertexId {
        match self {
            Reply::Vertex(vid) => vid,
            other => fatal!("rpc", "expected vertex reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_edge_ids(self) -> Vec<EdgeId> {
        match self {
            Reply::EdgeIds(eids) => eids,
            other => fatal!("rpc", "expected edge id list reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_vertex_data(self) -> V {
        match self {
            Reply::VertexData(data) => data,
            other => fatal!("rpc", "expected vertex data reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_edge_data(self) -> E {
        match self {
            Reply::EdgeData(data) => data,
            other => fatal!("rpc", "expected edge data reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_color(self) -> u32 {
        match self {
            Reply::Color(color) => color,
            other => fatal!("rpc", "expected color reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_owner(self) -> ProcId {
        match self {
            Reply::Owner(proc) => proc,
            other => fatal!("rpc", "expected owner reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_cond_vertex(self) -> Conditional<V> {
        match self {
            Reply::CondVertex(response) => response,
            other => fatal!("rpc", "expected conditional vertex reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_cond_edge(self) -> Conditional<E> {
        match self {
            Reply::CondEdge(response) => response,
            other => fatal!("rpc", "expected conditional edge reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_batch(self) -> BlockSyncReply<V, E> {
        match self {
            Reply::Batch(reply) => reply,
            other => fatal!("rpc", "expected batch reply, got {}", other.name()),
        }
    }

    pub(crate) fn into_batch_by_pair(self) -> BlockSyncByPairReply<V, E> {
        match self {
            Reply::BatchByPair(reply) => reply,
            other => fatal!("rpc", "expected by-pair batch reply, got {}", other.name()),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Reply::Unit => "unit",
            Reply::Count(_) => "count",
            Reply::MaybeEdge(_) => "maybe_edge",
            Reply::Edge(_) => "edge",
            Reply::Vertex(_) => "vertex",
            Reply::EdgeIds(_) => "edge_ids",
            Reply::VertexData(_) => "vertex_data",
            Reply::EdgeData(_) => "edge_data",
            Reply::Color(_) => "color",
            Reply::Owner(_) => "owner",
            Reply::CondVertex(_) => "cond_vertex",
            Reply::CondEdge(_) => "cond_edge",
            Reply::Batch(_) => "batch",
            Reply::BatchByPair(_) => "batch_by_pair",
        }
    }
}
