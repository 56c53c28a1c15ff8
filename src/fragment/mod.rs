//! Distributed graph fragment: one peer's partition plus its boundary,
//! presented as a single logical graph.
//!
//! Every vertex has a unique owning peer; every edge is owned by its
//! target's owner. Reads are served from the local store when the local
//! replica is authoritative and routed to the owner otherwise; writes always
//! target the owner. Ghost replicas go stale until a synchronization pulls
//! them current again.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::directory::CachingDirectory;
use crate::error::{fatal, Result};
use crate::rpc::{Reply, Request, RpcNode};
use crate::store::LocalStore;
use crate::types::{EdgeId, GraphData, Leid, Lvid, ProcId, VertexId};

mod access;
mod bootstrap;
mod numbering;
mod sync_ops;

use numbering::EdgeNumbering;

const COMPONENT: &str = "fragment";

pub struct DistributedGraph<V: GraphData, E: GraphData> {
    rpc: Arc<RpcNode<V, E>>,
    store: LocalStore<V, E>,
    global_to_local_vid: HashMap<VertexId, Lvid>,
    local_to_global_vid: Vec<VertexId>,
    numbering: EdgeNumbering,
    /// Owner of each fragment-local vertex; consulted on every routing
    /// decision, so it is kept dense rather than behind the directory.
    local_owner: Vec<ProcId>,
    vertex_dir: Arc<CachingDirectory>,
    edge_dir: Arc<CachingDirectory>,
    num_global_vertices: usize,
    num_global_edges: usize,
    pending_async_updates: AtomicUsize,
}

impl<V: GraphData, E: GraphData> DistributedGraph<V, E> {
    pub fn proc(&self) -> ProcId {
        self.rpc.proc()
    }

    /// Number of vertices in the whole distributed graph.
    pub fn num_vertices(&self) -> usize {
        self.num_global_vertices
    }

    /// Number of edges in the whole distributed graph.
    pub fn num_edges(&self) -> usize {
        self.num_global_edges
    }

    /// True when edge ids are only valid within this fragment.
    pub fn edge_canonical_numbering(&self) -> bool {
        self.numbering.is_canonical()
    }

    pub fn vertex_is_local(&self, vid: VertexId) -> bool {
        self.global_to_local_vid.contains_key(&vid)
    }

    pub fn edge_is_local(&self, eid: EdgeId) -> bool {
        self.numbering.global_to_local(eid).is_some()
    }

    /// True when the local replica of `vid` is not authoritative. The vertex
    /// must be present in this fragment.
    pub fn is_ghost(&self, vid: VertexId) -> bool {
        let lvid = self.require_local_vid(vid);
        self.local_owner[lvid as usize] != self.proc()
    }

    /// Reads the local replica of `vid` directly, bypassing routing. The
    /// vertex must be present in this fragment; the value may be stale for a
    /// ghost.
    pub fn vertex_data(&self, vid: VertexId) -> V {
        self.store.vertex_data(self.require_local_vid(vid))
    }

    /// Version of the local replica of `vid`.
    pub fn vertex_version(&self, vid: VertexId) -> u64 {
        self.store.vertex_version(self.require_local_vid(vid))
    }

    /// True when the local replica of `vid` carries writes not yet
    /// reconciled with the owner.
    pub fn vertex_modified(&self, vid: VertexId) -> bool {
        self.store.vertex_modified(self.require_local_vid(vid))
    }

    /// True when the local replica of `source -> target` carries writes not
    /// yet reconciled with the owner.
    pub fn edge_modified_from_pair(&self, source: VertexId, target: VertexId) -> bool {
        let (ls, lt) = (self.require_local_vid(source), self.require_local_vid(target));
        self.store.edge_modified(self.store.edge_id(ls, lt))
    }

    /// Writes the local replica of `vid` only: bumps its version and marks it
    /// modified so the next synchronization forwards the write to the owner.
    pub fn write_local_vertex_data(&self, vid: VertexId, data: V) {
        let lvid = self.require_local_vid(vid);
        self.store.increment_and_update_vertex(lvid, data);
        self.store.set_vertex_modified(lvid, true);
    }

    /// Reads the local replica of the edge `source -> target` directly. Both
    /// endpoints must be present in this fragment and the edge must exist.
    pub fn edge_data_from_pair(&self, source: VertexId, target: VertexId) -> E {
        let (ls, lt) = (self.require_local_vid(source), self.require_local_vid(target));
        self.store.edge_data(self.store.edge_id(ls, lt))
    }

    /// Version of the local replica of the edge `source -> target`.
    pub fn edge_version_from_pair(&self, source: VertexId, target: VertexId) -> u64 {
        let (ls, lt) = (self.require_local_vid(source), self.require_local_vid(target));
        self.store.edge_version_by_pair(ls, lt)
    }

    /// Writes the local replica of the edge `source -> target` only, marking
    /// it modified for the next synchronization.
    pub fn write_local_edge_data(&self, source: VertexId, target: VertexId, data: E) {
        let (ls, lt) = (self.require_local_vid(source), self.require_local_vid(target));
        let leid = self.store.edge_id(ls, lt);
        self.store.increment_and_update_edge(leid, data);
        self.store.set_edge_modified(leid, true);
    }

    /// Number of asynchronous synchronizations still in flight.
    pub fn pending_async_updates(&self) -> usize {
        self.pending_async_updates.load(Ordering::SeqCst)
    }

    /// Spins, yielding the CPU, until every asynchronous synchronization
    /// issued from this peer has merged its reply.
    pub fn wait_for_all_async_syncs(&self) {
        while self.pending_async_updates.load(Ordering::SeqCst) != 0 {
            std::thread::yield_now();
        }
    }

    /// Archives the local store with cluster-wide barriers bracketing the
    /// write, so every peer saves a mutually consistent cut.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.rpc.full_barrier();
        let result = self.store.save(path);
        self.rpc.full_barrier();
        result
    }

    // ------------------------------------------------------------------
    // internal plumbing shared by the routing and synchronization paths
    // ------------------------------------------------------------------

    fn local_vid(&self, vid: VertexId) -> Option<Lvid> {
        self.global_to_local_vid.get(&vid).copied()
    }

    fn require_local_vid(&self, vid: VertexId) -> Lvid {
        match self.local_vid(vid) {
            Some(lvid) => lvid,
            None => fatal!(COMPONENT, "vertex {vid} is not in the fragment of peer {}", self.proc()),
        }
    }

    /// Local vertex index iff present and owned by this peer.
    fn owned_local_vid(&self, vid: VertexId) -> Option<Lvid> {
        self.local_vid(vid)
            .filter(|&lvid| self.local_owner[lvid as usize] == self.proc())
    }

    fn owns_local_vid(&self, lvid: Lvid) -> bool {
        self.local_owner[lvid as usize] == self.proc()
    }

    fn global_vid(&self, lvid: Lvid) -> VertexId {
        self.local_to_global_vid[lvid as usize]
    }

    /// Owner of `vid`: the dense local map answers for anything in the
    /// fragment (this lookup is on every routing path), the directory for
    /// the rest.
    fn vertex_owner(&self, vid: VertexId) -> ProcId {
        if let Some(lvid) = self.local_vid(vid) {
            return self.local_owner[lvid as usize];
        }
        self.vertex_dir.get_cached(vid.0, &self.rpc)
    }

    /// Owner of an edge that is not in this fragment. Requires globally
    /// valid edge ids.
    fn remote_edge_owner(&self, eid: EdgeId) -> ProcId {
        if self.numbering.is_canonical() {
            fatal!(
                COMPONENT,
                "remote request for edge {eid} impossible under canonical edge numbering"
            );
        }
        self.edge_dir.get_cached(eid.0, &self.rpc)
    }

    /// Serves an inbound request against this fragment. Runs on the RPC
    /// dispatcher thread; everything here is local work plus at most a
    /// one-way reply call.
    pub(crate) fn handle_request(&self, from: ProcId, request: Request<V, E>) -> Option<Reply<V, E>> {
        trace!(from = from.0, request = request.name(), "fragment.serve");
        match request {
            Request::NumInNeighbors { vid } => {
                Some(Reply::Count(self.store.num_in_neighbors(self.require_owned(vid))))
            }
            Request::NumOutNeighbors { vid } => {
                Some(Reply::Count(self.store.num_out_neighbors(self.require_owned(vid))))
            }
            Request::Find { source, target } => Some(Reply::MaybeEdge(self.serve_find(source, target))),
            Request::RevEdgeId { eid } => {
                let leid = self.require_local_eid(eid);
                Some(Reply::Edge(self.numbering.local_to_global(self.store.rev_edge_id(leid))))
            }
            Request::EdgeSource { eid } => {
                let leid = self.require_local_eid(eid);
                Some(Reply::Vertex(self.global_vid(self.store.source(leid))))
            }
            Request::EdgeTarget { eid } => {
                let leid = self.require_local_eid(eid);
                Some(Reply::Vertex(self.global_vid(self.store.target(leid))))
            }
            Request::InEdgeIds { vid } => {
                let lvid = self.require_owned(vid);
                let eids = self
                    .store
                    .in_edge_ids(lvid)
                    .iter()
                    .map(|&leid| self.numbering.local_to_global(leid))
                    .collect();
                Some(Reply::EdgeIds(eids))
            }
            Request::OutEdgeIds { vid } => {
                let lvid = self.require_owned(vid);
                let eids = self
                    .store
                    .out_edge_ids(lvid)
                    .iter()
                    .map(|&leid| self.numbering.local_to_global(leid))
                    .collect();
                Some(Reply::EdgeIds(eids))
            }
            Request::GetVertexData { vid } => {
                Some(Reply::VertexData(self.store.vertex_data(self.require_owned(vid))))
            }
            Request::GetEdgeData { eid } => {
                Some(Reply::EdgeData(self.store.edge_data(self.require_owned_eid(eid))))
            }
            Request::GetEdgeDataByPair { source, target } => {
                Some(Reply::EdgeData(self.store.edge_data(self.require_owned_edge(source, target))))
            }
            Request::SetVertexData { vid, data } => {
                self.store.increment_and_update_vertex(self.require_owned(vid), data);
                Some(Reply::Unit)
            }
            Request::SetEdgeData { eid, data } => {
                self.store.increment_and_update_edge(self.require_owned_eid(eid), data);
                Some(Reply::Unit)
            }
            Request::SetEdgeDataByPair { source, target, data } => {
                self.store.increment_and_update_edge(self.require_owned_edge(source, target), data);
                Some(Reply::Unit)
            }
            Request::GetColor { vid } => Some(Reply::Color(self.store.color(self.require_owned(vid)))),
            Request::SetColor { vid, color } => {
                self.store.set_color(self.require_owned(vid), color);
                Some(Reply::Unit)
            }

            Request::VertexSync { vid, version, payload } => {
                Some(Reply::CondVertex(self.get_vertex_if_version_less_than(vid, version, payload)))
            }
            Request::EdgeSync { eid, version, payload } => {
                Some(Reply::CondEdge(self.get_edge_if_version_less_than(eid, version, payload)))
            }
            Request::EdgeSyncByPair { source, target, version, payload } => Some(Reply::CondEdge(
                self.get_edge_if_version_less_than_by_pair(source, target, version, payload),
            )),
            Request::AsyncVertexSync { vid, version, payload } => {
                let response = self.get_vertex_if_version_less_than(vid, version, payload);
                self.rpc.remote_call(from, Request::VertexSyncReply { vid, response });
                None
            }
            Request::AsyncEdgeSync { eid, version, payload } => {
                let response = self.get_edge_if_version_less_than(eid, version, payload);
                self.rpc.remote_call(from, Request::EdgeSyncReply { eid, response });
                None
            }
            Request::AsyncEdgeSyncByPair { source, target, version, payload } => {
                let response =
                    self.get_edge_if_version_less_than_by_pair(source, target, version, payload);
                self.rpc
                    .remote_call(from, Request::EdgeSyncByPairReply { source, target, response });
                None
            }
            Request::BatchSync(request) => Some(Reply::Batch(self.serve_batch(request))),
            Request::BatchSyncByPair(request) => {
                Some(Reply::BatchByPair(self.serve_batch_by_pair(request)))
            }
            Request::AsyncBatchSync(request) => {
                let reply = self.serve_batch(request);
                self.rpc.remote_call(from, Request::BatchSyncReply(reply));
                None
            }
            Request::AsyncBatchSyncByPair(request) => {
                let reply = self.serve_batch_by_pair(request);
                self.rpc.remote_call(from, Request::BatchSyncByPairReply(reply));
                None
            }

            Request::VertexSyncReply { vid, response } => {
                self.apply_vertex_response(vid, response);
                self.finish_async_update();
                None
            }
            Request::EdgeSyncReply { eid, response } => {
                self.apply_edge_response(self.require_local_eid(eid), response);
                self.finish_async_update();
                None
            }
            Request::EdgeSyncByPairReply { source, target, response } => {
                let leid = self.require_local_edge(source, target);
                self.apply_edge_response(leid, response);
                self.finish_async_update();
                None
            }
            Request::BatchSyncReply(reply) => {
                self.apply_batch(reply);
                self.finish_async_update();
                None
            }
            Request::BatchSyncByPairReply(reply) => {
                self.apply_batch_by_pair(reply);
                self.finish_async_update();
                None
            }

            Request::Flush => Some(Reply::Unit),
            Request::DirSet { .. } | Request::DirGet { .. } => {
                fatal!(COMPONENT, "directory request routed into the fragment")
            }
        }
    }

    /// Owner-side find: both endpoints local means the store decides; a
    /// locally owned target with a non-local source means the edge cannot
    /// exist anywhere.
    fn serve_find(&self, source: VertexId, target: VertexId) -> Option<EdgeId> {
        match (self.local_vid(source), self.local_vid(target)) {
            (Some(ls), Some(lt)) => {
                self.store.find(ls, lt).map(|leid| self.numbering.local_to_global(leid))
            }
            (None, Some(lt)) if self.owns_local_vid(lt) => None,
            _ => fatal!(
                COMPONENT,
                "find({source} -> {target}) routed to peer {} which owns neither endpoint",
                self.proc()
            ),
        }
    }

    fn require_owned(&self, vid: VertexId) -> Lvid {
        match self.owned_local_vid(vid) {
            Some(lvid) => lvid,
            None => fatal!(
                COMPONENT,
                "peer {} is not the owner of vertex {vid}",
                self.proc()
            ),
        }
    }

    fn require_local_eid(&self, eid: EdgeId) -> Leid {
        match self.numbering.global_to_local(eid) {
            Some(leid) => leid,
            None => fatal!(COMPONENT, "edge {eid} is not in the fragment of peer {}", self.proc()),
        }
    }

    /// Local edge index iff present and owned by this peer (an edge belongs
    /// to its target's owner).
    fn require_owned_eid(&self, eid: EdgeId) -> Leid {
        let leid = self.require_local_eid(eid);
        if !self.owns_local_vid(self.store.target(leid)) {
            fatal!(COMPONENT, "peer {} is not the owner of edge {eid}", self.proc());
        }
        leid
    }

    /// Local edge id of `source -> target` where this peer owns the target.
    fn require_owned_edge(&self, source: VertexId, target: VertexId) -> Leid {
        let lt = self.require_owned(target);
        let ls = self.require_local_vid(source);
        self.store.edge_id(ls, lt)
    }

    /// Local edge id of `source -> target` with no ownership requirement;
    /// used when merging synchronization replies into ghost replicas.
    fn require_local_edge(&self, source: VertexId, target: VertexId) -> Leid {
        let ls = self.require_local_vid(source);
        let lt = self.require_local_vid(target);
        self.store.edge_id(ls, lt)
    }

    fn finish_async_update(&self) {
        self.pending_async_updates.fetch_sub(1, Ordering::SeqCst);
    }
}
