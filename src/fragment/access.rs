//! Routed accessors: serve from the local store when the replica is
//! authoritative, otherwise resolve the owner and ask it.

use crate::rpc::Request;
use crate::types::{EdgeId, GraphData, VertexId};

use super::{DistributedGraph, COMPONENT};
use crate::error::fatal;

impl<V: GraphData, E: GraphData> DistributedGraph<V, E> {
    /// In-degree of `vid`, from the owner's complete adjacency.
    pub fn num_in_neighbors(&self, vid: VertexId) -> usize {
        if let Some(lvid) = self.owned_local_vid(vid) {
            return self.store.num_in_neighbors(lvid);
        }
        let owner = self.vertex_owner(vid);
        self.rpc.remote_request(owner, Request::NumInNeighbors { vid }).into_count()
    }

    /// Out-degree of `vid`, from the owner's complete adjacency.
    pub fn num_out_neighbors(&self, vid: VertexId) -> usize {
        if let Some(lvid) = self.owned_local_vid(vid) {
            return self.store.num_out_neighbors(lvid);
        }
        let owner = self.vertex_owner(vid);
        self.rpc.remote_request(owner, Request::NumOutNeighbors { vid }).into_count()
    }

    /// Looks up the edge `source -> target` anywhere in the cluster.
    pub fn find(&self, source: VertexId, target: VertexId) -> Option<EdgeId> {
        if let (Some(ls), Some(lt)) = (self.local_vid(source), self.local_vid(target)) {
            return self.store.find(ls, lt).map(|leid| self.numbering.local_to_global(leid));
        }
        // if the edge exists, its target's owner has it
        let owner = self.vertex_owner(target);
        if owner == self.proc() {
            return None;
        }
        self.rpc.remote_request(owner, Request::Find { source, target }).into_maybe_edge()
    }

    /// Unchecked [`DistributedGraph::find`]: the edge must exist.
    pub fn edge_id(&self, source: VertexId, target: VertexId) -> EdgeId {
        match self.find(source, target) {
            Some(eid) => eid,
            None => fatal!(COMPONENT, "edge ({source} -> {target}) does not exist"),
        }
    }

    /// Edge id of the opposite-direction edge.
    pub fn rev_edge_id(&self, eid: EdgeId) -> EdgeId {
        if let Some(leid) = self.numbering.global_to_local(eid) {
            return self.numbering.local_to_global(self.store.rev_edge_id(leid));
        }
        let owner = self.remote_edge_owner(eid);
        self.rpc.remote_request(owner, Request::RevEdgeId { eid }).into_edge()
    }

    /// Source vertex of `eid`. Structure is immutable, so any local replica
    /// answers authoritatively.
    pub fn source(&self, eid: EdgeId) -> VertexId {
        if let Some(leid) = self.numbering.global_to_local(eid) {
            return self.global_vid(self.store.source(leid));
        }
        let owner = self.remote_edge_owner(eid);
        self.rpc.remote_request(owner, Request::EdgeSource { eid }).into_vertex()
    }

    /// Target vertex of `eid`.
    pub fn target(&self, eid: EdgeId) -> VertexId {
        if let Some(leid) = self.numbering.global_to_local(eid) {
            return self.global_vid(self.store.target(leid));
        }
        let owner = self.remote_edge_owner(eid);
        self.rpc.remote_request(owner, Request::EdgeTarget { eid }).into_vertex()
    }

    /// Global ids of the edges arriving at `vid`.
    pub fn in_edge_ids(&self, vid: VertexId) -> Vec<EdgeId> {
        if let Some(lvid) = self.owned_local_vid(vid) {
            return self
                .store
                .in_edge_ids(lvid)
                .iter()
                .map(|&leid| self.numbering.local_to_global(leid))
                .collect();
        }
        let owner = self.vertex_owner(vid);
        self.rpc.remote_request(owner, Request::InEdgeIds { vid }).into_edge_ids()
    }

    /// Global ids of the edges leaving `vid`.
    pub fn out_edge_ids(&self, vid: VertexId) -> Vec<EdgeId> {
        if let Some(lvid) = self.owned_local_vid(vid) {
            return self
                .store
                .out_edge_ids(lvid)
                .iter()
                .map(|&leid| self.numbering.local_to_global(leid))
                .collect();
        }
        let owner = self.vertex_owner(vid);
        self.rpc.remote_request(owner, Request::OutEdgeIds { vid }).into_edge_ids()
    }

    /// Current payload of `vid`, read from its owner.
    pub fn get_vertex_data(&self, vid: VertexId) -> V {
        if let Some(lvid) = self.owned_local_vid(vid) {
            return self.store.vertex_data(lvid);
        }
        let owner = self.vertex_owner(vid);
        self.rpc.remote_request(owner, Request::GetVertexData { vid }).into_vertex_data()
    }

    /// Current payload of edge `eid`, read from its owner. Under canonical
    /// numbering a non-authoritative read is rewritten into the by-pair form
    /// using the locally known endpoints.
    pub fn get_edge_data(&self, eid: EdgeId) -> E {
        match self.numbering.global_to_local(eid) {
            Some(leid) => {
                let lt = self.store.target(leid);
                if self.owns_local_vid(lt) {
                    return self.store.edge_data(leid);
                }
                if self.numbering.is_canonical() {
                    let source = self.global_vid(self.store.source(leid));
                    let target = self.global_vid(lt);
                    return self.get_edge_data_from_pair(source, target);
                }
                let owner = self.local_owner[lt as usize];
                self.rpc.remote_request(owner, Request::GetEdgeData { eid }).into_edge_data()
            }
            None => {
                let owner = self.remote_edge_owner(eid);
                self.rpc.remote_request(owner, Request::GetEdgeData { eid }).into_edge_data()
            }
        }
    }

    /// Current payload of the edge `source -> target`, read from its owner.
    pub fn get_edge_data_from_pair(&self, source: VertexId, target: VertexId) -> E {
        if let Some(lt) = self.owned_local_vid(target) {
            let ls = self.require_local_vid(source);
            return self.store.edge_data(self.store.edge_id(ls, lt));
        }
        let owner = self.vertex_owner(target);
        self.rpc
            .remote_request(owner, Request::GetEdgeDataByPair { source, target })
            .into_edge_data()
    }

    /// Writes `vid` on its owner, blocking until acknowledged.
    pub fn set_vertex_data(&self, vid: VertexId, data: V) {
        if let Some(lvid) = self.owned_local_vid(vid) {
            self.store.increment_and_update_vertex(lvid, data);
            return;
        }
        let owner = self.vertex_owner(vid);
        self.rpc.remote_request(owner, Request::SetVertexData { vid, data }).into_unit();
    }

    /// Writes `vid` on its owner without waiting for an acknowledgment.
    pub fn set_vertex_data_async(&self, vid: VertexId, data: V) {
        if let Some(lvid) = self.owned_local_vid(vid) {
            self.store.increment_and_update_vertex(lvid, data);
            return;
        }
        let owner = self.vertex_owner(vid);
        self.rpc.remote_call(owner, Request::SetVertexData { vid, data });
    }

    /// Writes edge `eid` on its owner, blocking until acknowledged.
    pub fn set_edge_data(&self, eid: EdgeId, data: E) {
        self.set_edge_data_impl(eid, data, false);
    }

    /// Writes edge `eid` on its owner without waiting.
    pub fn set_edge_data_async(&self, eid: EdgeId, data: E) {
        self.set_edge_data_impl(eid, data, true);
    }

    fn set_edge_data_impl(&self, eid: EdgeId, data: E, asynchronous: bool) {
        match self.numbering.global_to_local(eid) {
            Some(leid) => {
                let lt = self.store.target(leid);
                if self.owns_local_vid(lt) {
                    self.store.increment_and_update_edge(leid, data);
                    return;
                }
                if self.numbering.is_canonical() {
                    let source = self.global_vid(self.store.source(leid));
                    let target = self.global_vid(lt);
                    self.set_edge_data_from_pair_impl(source, target, data, asynchronous);
                    return;
                }
                let owner = self.local_owner[lt as usize];
                if asynchronous {
                    self.rpc.remote_call(owner, Request::SetEdgeData { eid, data });
                } else {
                    self.rpc.remote_request(owner, Request::SetEdgeData { eid, data }).into_unit();
                }
            }
            None => {
                let owner = self.remote_edge_owner(eid);
                if asynchronous {
                    self.rpc.remote_call(owner, Request::SetEdgeData { eid, data });
                } else {
                    self.rpc.remote_request(owner, Request::SetEdgeData { eid, data }).into_unit();
                }
            }
        }
    }

    /// Writes the edge `source -> target` on its owner, blocking until
    /// acknowledged.
    pub fn set_edge_data_from_pair(&self, source: VertexId, target: VertexId, data: E) {
        self.set_edge_data_from_pair_impl(source, target, data, false);
    }

    /// Writes the edge `source -> target` on its owner without waiting.
    pub fn set_edge_data_from_pair_async(&self, source: VertexId, target: VertexId, data: E) {
        self.set_edge_data_from_pair_impl(source, target, data, true);
    }

    fn set_edge_data_from_pair_impl(
        &self,
        source: VertexId,
        target: VertexId,
        data: E,
        asynchronous: bool,
    ) {
        if let Some(lt) = self.owned_local_vid(target) {
            let ls = self.require_local_vid(source);
            self.store.increment_and_update_edge(self.store.edge_id(ls, lt), data);
            return;
        }
        let owner = self.vertex_owner(target);
        if asynchronous {
            self.rpc.remote_call(owner, Request::SetEdgeDataByPair { source, target, data });
        } else {
            self.rpc
                .remote_request(owner, Request::SetEdgeDataByPair { source, target, data })
                .into_unit();
        }
    }

    /// Coloring tag of `vid`, read from its owner.
    pub fn get_color(&self, vid: VertexId) -> u32 {
        if let Some(lvid) = self.owned_local_vid(vid) {
            return self.store.color(lvid);
        }
        let owner = self.vertex_owner(vid);
        self.rpc.remote_request(owner, Request::GetColor { vid }).into_color()
    }

    /// Sets the coloring tag of `vid` on its owner, blocking.
    pub fn set_color(&self, vid: VertexId, color: u32) {
        if let Some(lvid) = self.owned_local_vid(vid) {
            self.store.set_color(lvid, color);
            return;
        }
        let owner = self.vertex_owner(vid);
        self.rpc.remote_request(owner, Request::SetColor { vid, color }).into_unit();
    }

    /// Sets the coloring tag of `vid` on its owner without waiting.
    pub fn set_color_async(&self, vid: VertexId, color: u32) {
        if let Some(lvid) = self.owned_local_vid(vid) {
            self.store.set_color(lvid, color);
            return;
        }
        let owner = self.vertex_owner(vid);
        self.rpc.remote_call(owner, Request::SetColor { vid, color });
    }
}
