//! Ghost synchronization: version-gated reconciliation with owners.
//!
//! The owner-side primitives implement one rule, applied per entity: an
//! owner strictly newer than the ghost returns its data and version; an
//! owner strictly older adopts the ghost's forwarded write; equal versions
//! mean the pair is already reconciled and no data moves.

use std::collections::{HashMap, HashSet};

use crate::error::fatal;
use crate::rpc::Request;
use crate::sync::{
    BlockSyncByPairReply, BlockSyncByPairRequest, BlockSyncReply, BlockSyncRequest, Conditional,
    Versioned,
};
use crate::types::{EdgeId, GraphData, Leid, Lvid, ProcId, VertexId};

use super::{DistributedGraph, COMPONENT};

impl<V: GraphData, E: GraphData> DistributedGraph<V, E> {
    /// Reconciles the local replica of `vid` with its owner, blocking until
    /// the exchange completes. A no-op when this peer owns the vertex.
    pub fn synchronize_vertex(&self, vid: VertexId) {
        self.synchronize_vertex_impl(vid, false);
    }

    /// Fire-and-forget form of [`DistributedGraph::synchronize_vertex`]; the
    /// reply is merged by the dispatcher and gated by the pending counter.
    pub fn async_synchronize_vertex(&self, vid: VertexId) {
        self.synchronize_vertex_impl(vid, true);
    }

    fn synchronize_vertex_impl(&self, vid: VertexId, asynchronous: bool) {
        let lvid = self.require_local_vid(vid);
        if self.owns_local_vid(lvid) {
            return;
        }
        let owner = self.local_owner[lvid as usize];
        let version = self.store.vertex_version(lvid);
        let payload = self.ghost_vertex_payload(lvid);
        if asynchronous {
            self.begin_async_update();
            self.rpc.remote_call(owner, Request::AsyncVertexSync { vid, version, payload });
        } else {
            let response = self
                .rpc
                .remote_request(owner, Request::VertexSync { vid, version, payload })
                .into_cond_vertex();
            self.apply_vertex_response(vid, response);
        }
    }

    /// Reconciles the local replica of edge `eid` with its owner, blocking.
    /// A no-op when this peer owns the edge's target.
    pub fn synchronize_edge(&self, eid: EdgeId) {
        self.synchronize_edge_impl(eid, false);
    }

    /// Fire-and-forget form of [`DistributedGraph::synchronize_edge`].
    pub fn async_synchronize_edge(&self, eid: EdgeId) {
        self.synchronize_edge_impl(eid, true);
    }

    fn synchronize_edge_impl(&self, eid: EdgeId, asynchronous: bool) {
        let leid = match self.numbering.global_to_local(eid) {
            Some(leid) => leid,
            None => fatal!(
                COMPONENT,
                "cannot synchronize edge {eid}: not in the fragment of peer {}",
                self.proc()
            ),
        };
        let ltarget = self.store.target(leid);
        if self.owns_local_vid(ltarget) {
            return;
        }
        let owner = self.local_owner[ltarget as usize];
        let version = self.store.edge_version(leid);
        let payload = self.ghost_edge_payload(leid);
        if self.numbering.is_canonical() {
            let source = self.global_vid(self.store.source(leid));
            let target = self.global_vid(ltarget);
            if asynchronous {
                self.begin_async_update();
                self.rpc.remote_call(
                    owner,
                    Request::AsyncEdgeSyncByPair { source, target, version, payload },
                );
            } else {
                let response = self
                    .rpc
                    .remote_request(owner, Request::EdgeSyncByPair { source, target, version, payload })
                    .into_cond_edge();
                self.apply_edge_response(leid, response);
            }
        } else if asynchronous {
            self.begin_async_update();
            self.rpc.remote_call(owner, Request::AsyncEdgeSync { eid, version, payload });
        } else {
            let response = self
                .rpc
                .remote_request(owner, Request::EdgeSync { eid, version, payload })
                .into_cond_edge();
            self.apply_edge_response(leid, response);
        }
    }

    /// Reconciles every ghost replica incident to `vid`: the vertex itself,
    /// its ghost neighbors, and its ghost edges. One batched request goes to
    /// each remote owner touched by the scope.
    pub fn synchronize_scope(&self, vid: VertexId) {
        self.synchronize_scope_impl(vid, false);
    }

    /// Fire-and-forget form of [`DistributedGraph::synchronize_scope`]; the
    /// pending counter rises by the number of remote owners contacted.
    pub fn async_synchronize_scope(&self, vid: VertexId) {
        self.synchronize_scope_impl(vid, true);
    }

    fn synchronize_scope_impl(&self, vid: VertexId, asynchronous: bool) {
        let lvid = self.require_local_vid(vid);
        let mut groups: HashMap<ProcId, BlockSyncByPairRequest<V, E>> = HashMap::new();
        let mut seen_vertices: HashSet<Lvid> = HashSet::new();
        let mut seen_edges: HashSet<Leid> = HashSet::new();

        self.scope_vertex(lvid, &mut groups, &mut seen_vertices);
        for &leid in self.store.in_edge_ids(lvid) {
            self.scope_vertex(self.store.source(leid), &mut groups, &mut seen_vertices);
            self.scope_edge(leid, &mut groups, &mut seen_edges);
        }
        for &leid in self.store.out_edge_ids(lvid) {
            self.scope_vertex(self.store.target(leid), &mut groups, &mut seen_vertices);
            self.scope_edge(leid, &mut groups, &mut seen_edges);
        }

        for (owner, request) in groups {
            if request.is_empty() {
                continue;
            }
            if asynchronous {
                self.begin_async_update();
                self.rpc.remote_call(owner, Request::AsyncBatchSyncByPair(request));
            } else {
                let reply = self
                    .rpc
                    .remote_request(owner, Request::BatchSyncByPair(request))
                    .into_batch_by_pair();
                self.apply_batch_by_pair(reply);
            }
        }
    }

    /// Reconciles many ghost vertices at once, one batched request per
    /// remote owner.
    pub fn synchronize_vertices(&self, vids: &[VertexId]) {
        self.synchronize_vertices_impl(vids, false);
    }

    /// Fire-and-forget form of [`DistributedGraph::synchronize_vertices`].
    pub fn async_synchronize_vertices(&self, vids: &[VertexId]) {
        self.synchronize_vertices_impl(vids, true);
    }

    fn synchronize_vertices_impl(&self, vids: &[VertexId], asynchronous: bool) {
        let mut groups: HashMap<ProcId, BlockSyncRequest<V, E>> = HashMap::new();
        for &vid in vids {
            let lvid = self.require_local_vid(vid);
            if self.owns_local_vid(lvid) {
                continue;
            }
            groups
                .entry(self.local_owner[lvid as usize])
                .or_insert_with(BlockSyncRequest::new)
                .push_vertex(vid, self.store.vertex_version(lvid), self.ghost_vertex_payload(lvid));
        }
        self.dispatch_batches(groups, asynchronous);
    }

    /// Reconciles many ghost edges at once. Requires globally valid edge
    /// ids; under canonical numbering the pair-based scope form is the only
    /// batched edge path.
    pub fn synchronize_edges(&self, eids: &[EdgeId]) {
        self.synchronize_edges_impl(eids, false);
    }

    /// Fire-and-forget form of [`DistributedGraph::synchronize_edges`].
    pub fn async_synchronize_edges(&self, eids: &[EdgeId]) {
        self.synchronize_edges_impl(eids, true);
    }

    fn synchronize_edges_impl(&self, eids: &[EdgeId], asynchronous: bool) {
        if self.numbering.is_canonical() {
            fatal!(
                COMPONENT,
                "batched edge synchronization by id impossible under canonical edge numbering"
            );
        }
        let mut groups: HashMap<ProcId, BlockSyncRequest<V, E>> = HashMap::new();
        for &eid in eids {
            let leid = self.require_local_eid(eid);
            let ltarget = self.store.target(leid);
            if self.owns_local_vid(ltarget) {
                continue;
            }
            groups
                .entry(self.local_owner[ltarget as usize])
                .or_insert_with(BlockSyncRequest::new)
                .push_edge(eid, self.store.edge_version(leid), self.ghost_edge_payload(leid));
        }
        self.dispatch_batches(groups, asynchronous);
    }

    fn dispatch_batches(&self, groups: HashMap<ProcId, BlockSyncRequest<V, E>>, asynchronous: bool) {
        for (owner, request) in groups {
            if request.is_empty() {
                continue;
            }
            if asynchronous {
                self.begin_async_update();
                self.rpc.remote_call(owner, Request::AsyncBatchSync(request));
            } else {
                let reply =
                    self.rpc.remote_request(owner, Request::BatchSync(request)).into_batch();
                self.apply_batch(reply);
            }
        }
    }

    fn scope_vertex(
        &self,
        lvid: Lvid,
        groups: &mut HashMap<ProcId, BlockSyncByPairRequest<V, E>>,
        seen: &mut HashSet<Lvid>,
    ) {
        if self.owns_local_vid(lvid) || !seen.insert(lvid) {
            return;
        }
        let owner = self.local_owner[lvid as usize];
        let version = self.store.vertex_version(lvid);
        let payload = self.ghost_vertex_payload(lvid);
        groups
            .entry(owner)
            .or_insert_with(BlockSyncByPairRequest::new)
            .push_vertex(self.global_vid(lvid), version, payload);
    }

    fn scope_edge(
        &self,
        leid: Leid,
        groups: &mut HashMap<ProcId, BlockSyncByPairRequest<V, E>>,
        seen: &mut HashSet<Leid>,
    ) {
        let ltarget = self.store.target(leid);
        if self.owns_local_vid(ltarget) || !seen.insert(leid) {
            return;
        }
        let owner = self.local_owner[ltarget as usize];
        let version = self.store.edge_version(leid);
        let payload = self.ghost_edge_payload(leid);
        groups
            .entry(owner)
            .or_insert_with(BlockSyncByPairRequest::new)
            .push_edge(
                self.global_vid(self.store.source(leid)),
                self.global_vid(ltarget),
                version,
                payload,
            );
    }

    fn ghost_vertex_payload(&self, lvid: Lvid) -> Option<V> {
        self.store.vertex_modified(lvid).then(|| self.store.vertex_data(lvid))
    }

    fn ghost_edge_payload(&self, leid: Leid) -> Option<E> {
        self.store.edge_modified(leid).then(|| self.store.edge_data(leid))
    }

    fn begin_async_update(&self) {
        self.pending_async_updates.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // owner-side primitives (run on the owner, invoked by the dispatcher)
    // ------------------------------------------------------------------

    /// Compares the ghost's version against the authoritative copy of `vid`.
    pub(crate) fn get_vertex_if_version_less_than(
        &self,
        vid: VertexId,
        ghost_version: u64,
        ghost_payload: Option<V>,
    ) -> Conditional<V> {
        let lvid = self.require_owned(vid);
        let local_version = self.store.vertex_version(lvid);
        if local_version > ghost_version {
            Some(Versioned { data: self.store.vertex_data(lvid), version: local_version })
        } else if local_version < ghost_version {
            // the ghost's writes win forward
            let data = match ghost_payload {
                Some(data) => data,
                None => fatal!(
                    COMPONENT,
                    "ghost of vertex {vid} is ahead at version {ghost_version} but sent no payload"
                ),
            };
            self.store.conditional_update_vertex(lvid, data, ghost_version);
            None
        } else {
            None
        }
    }

    /// Edge form of the version gate, addressed by global edge id.
    pub(crate) fn get_edge_if_version_less_than(
        &self,
        eid: EdgeId,
        ghost_version: u64,
        ghost_payload: Option<E>,
    ) -> Conditional<E> {
        if self.numbering.is_canonical() {
            fatal!(
                COMPONENT,
                "edge synchronization by id {eid} impossible under canonical edge numbering"
            );
        }
        let leid = self.require_owned_eid(eid);
        self.edge_version_gate(leid, ghost_version, ghost_payload)
    }

    /// Edge form of the version gate, addressed by endpoint pair.
    pub(crate) fn get_edge_if_version_less_than_by_pair(
        &self,
        source: VertexId,
        target: VertexId,
        ghost_version: u64,
        ghost_payload: Option<E>,
    ) -> Conditional<E> {
        let leid = self.require_owned_edge(source, target);
        self.edge_version_gate(leid, ghost_version, ghost_payload)
    }

    fn edge_version_gate(
        &self,
        leid: Leid,
        ghost_version: u64,
        ghost_payload: Option<E>,
    ) -> Conditional<E> {
        let local_version = self.store.edge_version(leid);
        if local_version > ghost_version {
            Some(Versioned { data: self.store.edge_data(leid), version: local_version })
        } else if local_version < ghost_version {
            let data = match ghost_payload {
                Some(data) => data,
                None => fatal!(
                    COMPONENT,
                    "edge ghost is ahead at version {ghost_version} but sent no payload"
                ),
            };
            self.store.conditional_update_edge(leid, data, ghost_version);
            None
        } else {
            None
        }
    }

    /// Applies the version gate to every entry of a by-id batch.
    pub(crate) fn serve_batch(&self, request: BlockSyncRequest<V, E>) -> BlockSyncReply<V, E> {
        let mut reply = BlockSyncReply::default();
        for ((&vid, &version), payload) in request
            .vids
            .iter()
            .zip(&request.vertex_versions)
            .zip(request.vertex_payloads)
        {
            reply.vids.push(vid);
            reply
                .vertex_replies
                .push(self.get_vertex_if_version_less_than(vid, version, payload));
        }
        for ((&eid, &version), payload) in request
            .eids
            .iter()
            .zip(&request.edge_versions)
            .zip(request.edge_payloads)
        {
            reply.eids.push(eid);
            reply.edge_replies.push(self.get_edge_if_version_less_than(eid, version, payload));
        }
        reply
    }

    /// Applies the version gate to every entry of a by-pair batch.
    pub(crate) fn serve_batch_by_pair(
        &self,
        request: BlockSyncByPairRequest<V, E>,
    ) -> BlockSyncByPairReply<V, E> {
        let mut reply = BlockSyncByPairReply::default();
        for ((&vid, &version), payload) in request
            .vids
            .iter()
            .zip(&request.vertex_versions)
            .zip(request.vertex_payloads)
        {
            reply.vids.push(vid);
            reply
                .vertex_replies
                .push(self.get_vertex_if_version_less_than(vid, version, payload));
        }
        for ((&(source, target), &version), payload) in request
            .pairs
            .iter()
            .zip(&request.edge_versions)
            .zip(request.edge_payloads)
        {
            reply.pairs.push((source, target));
            reply.edge_replies.push(self.get_edge_if_version_less_than_by_pair(
                source,
                target,
                version,
                payload,
            ));
        }
        reply
    }

    // ------------------------------------------------------------------
    // caller-side merges
    // ------------------------------------------------------------------

    /// Installs a data-bearing response into the ghost replica and marks it
    /// reconciled either way.
    pub(crate) fn apply_vertex_response(&self, vid: VertexId, response: Conditional<V>) {
        let lvid = self.require_local_vid(vid);
        if let Some(Versioned { data, version }) = response {
            self.store.set_vertex_data_and_version(lvid, data, version);
        }
        self.store.set_vertex_modified(lvid, false);
    }

    pub(crate) fn apply_edge_response(&self, leid: Leid, response: Conditional<E>) {
        if let Some(Versioned { data, version }) = response {
            self.store.set_edge_data_and_version(leid, data, version);
        }
        self.store.set_edge_modified(leid, false);
    }

    pub(crate) fn apply_batch(&self, reply: BlockSyncReply<V, E>) {
        for (&vid, response) in reply.vids.iter().zip(reply.vertex_replies) {
            self.apply_vertex_response(vid, response);
        }
        for (&eid, response) in reply.eids.iter().zip(reply.edge_replies) {
            self.apply_edge_response(self.require_local_eid(eid), response);
        }
    }

    pub(crate) fn apply_batch_by_pair(&self, reply: BlockSyncByPairReply<V, E>) {
        for (&vid, response) in reply.vids.iter().zip(reply.vertex_replies) {
            self.apply_vertex_response(vid, response);
        }
        for (&(source, target), response) in reply.pairs.iter().zip(reply.edge_replies) {
            let leid = self.require_local_edge(source, target);
            self.apply_edge_response(leid, response);
        }
    }
}
