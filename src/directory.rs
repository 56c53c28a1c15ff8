//! Caching distributed directory mapping global ids to their owners.
//!
//! Entries are sharded across all peers by `id % nprocs`. Lookups consult a
//! local cache first, then the locally held shard, and only then the shard
//! owner over a blocking request. Ownership is stable for the fragment's
//! lifetime, so cache entries are never evicted.

use dashmap::DashMap;
use tracing::trace;

use crate::error::fatal;
use crate::rpc::{DirKind, Reply, Request, RpcNode};
use crate::types::{GraphData, ProcId};

const COMPONENT: &str = "directory";

pub struct CachingDirectory {
    kind: DirKind,
    proc: ProcId,
    nprocs: usize,
    shard: DashMap<u32, ProcId>,
    cache: DashMap<u32, ProcId>,
}

impl CachingDirectory {
    pub fn new(kind: DirKind, proc: ProcId, nprocs: usize) -> Self {
        Self {
            kind,
            proc,
            nprocs,
            shard: DashMap::new(),
            cache: DashMap::new(),
        }
    }

    fn shard_owner(&self, id: u32) -> ProcId {
        ProcId((id as usize % self.nprocs) as u16)
    }

    /// Publishes `id -> owner`. Called on the owning peer for each owned
    /// entity at startup; the entry is replicated to its shard owner.
    pub fn set<V: GraphData, E: GraphData>(&self, id: u32, owner: ProcId, rpc: &RpcNode<V, E>) {
        self.cache.insert(id, owner);
        let shard_owner = self.shard_owner(id);
        if shard_owner == self.proc {
            self.shard.insert(id, owner);
        } else {
            rpc.remote_call(shard_owner, Request::DirSet { kind: self.kind, id, owner });
        }
    }

    /// Resolves the owner of `id`, caching the answer forever.
    ///
    /// The caller must have a legitimate reason to believe the id is live
    /// (it holds an edge pointing at the entity); an id unknown to its shard
    /// owner is a programming error and aborts there.
    pub fn get_cached<V: GraphData, E: GraphData>(&self, id: u32, rpc: &RpcNode<V, E>) -> ProcId {
        if let Some(owner) = self.cache.get(&id) {
            return *owner;
        }
        let shard_owner = self.shard_owner(id);
        let owner = if shard_owner == self.proc {
            self.shard_lookup(id)
        } else {
            trace!(kind = ?self.kind, id, shard = shard_owner.0, "directory.remote_lookup");
            rpc.remote_request(shard_owner, Request::DirGet { kind: self.kind, id })
                .into_owner()
        };
        self.cache.insert(id, owner);
        owner
    }

    /// Authoritative shard lookup, served on the shard owner.
    pub(crate) fn shard_lookup(&self, id: u32) -> ProcId {
        match self.shard.get(&id) {
            Some(owner) => *owner,
            None => fatal!(
                COMPONENT,
                "peer {} holds no {:?} shard entry for id {id}",
                self.proc,
                self.kind
            ),
        }
    }

    /// Inbound `DirSet` from a publishing peer.
    pub(crate) fn shard_insert(&self, id: u32, owner: ProcId) {
        self.shard.insert(id, owner);
    }

    #[cfg(test)]
    fn cached(&self, id: u32) -> Option<ProcId> {
        self.cache.get(&id).map(|owner| *owner)
    }
}

/// Routes an inbound directory request to the right instance.
pub(crate) fn handle_request<V: GraphData, E: GraphData>(
    vertex_dir: &CachingDirectory,
    edge_dir: &CachingDirectory,
    request: Request<V, E>,
) -> Option<Reply<V, E>> {
    match request {
        Request::DirSet { kind, id, owner } => {
            let dir = match kind {
                DirKind::Vertex => vertex_dir,
                DirKind::Edge => edge_dir,
            };
            dir.shard_insert(id, owner);
            None
        }
        Request::DirGet { kind, id } => {
            let dir = match kind {
                DirKind::Vertex => vertex_dir,
                DirKind::Edge => edge_dir,
            };
            Some(Reply::Owner(dir.shard_lookup(id)))
        }
        other => fatal!(COMPONENT, "non-directory request {} routed here", other.name()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::rpc::LoopbackMesh;
    use crate::types::ProcId;

    use super::*;

    type Node = RpcNode<u64, u64>;

    fn cluster(n: usize) -> Vec<(Arc<Node>, Arc<CachingDirectory>, Arc<CachingDirectory>)> {
        let (mesh, inboxes) = LoopbackMesh::new(n);
        let mut peers = Vec::new();
        for (i, inbox) in inboxes.into_iter().enumerate() {
            let proc = ProcId(i as u16);
            let node = Arc::new(RpcNode::new(proc, Arc::clone(&mesh), inbox));
            let vdir = Arc::new(CachingDirectory::new(DirKind::Vertex, proc, n));
            let edir = Arc::new(CachingDirectory::new(DirKind::Edge, proc, n));
            peers.push((node, vdir, edir));
        }
        for (node, vdir, edir) in &peers {
            let vdir = Arc::clone(vdir);
            let edir = Arc::clone(edir);
            node.start(Box::new(move |_from, request| match request {
                Request::Flush => Some(Reply::Unit),
                other => handle_request(&vdir, &edir, other),
            }));
        }
        peers
    }

    #[test]
    fn remote_lookup_hits_shard_owner_and_caches() {
        let peers = cluster(3);
        // id 7 shards to peer 1; peer 2 owns the entity and publishes it
        peers[2].1.set(7, ProcId(2), &peers[2].0);
        peers[2].0.comm_barrier();

        let owner = peers[0].1.get_cached(7, &peers[0].0);
        assert_eq!(owner, ProcId(2));
        assert_eq!(peers[0].1.cached(7), Some(ProcId(2)));

        // second lookup is cache-only: request count does not move
        let before = peers[0].0.metrics().requests_sent;
        assert_eq!(peers[0].1.get_cached(7, &peers[0].0), ProcId(2));
        assert_eq!(peers[0].0.metrics().requests_sent, before);

        for (node, _, _) in &peers {
            node.shutdown();
        }
    }

    #[test]
    fn vertex_and_edge_directories_do_not_mix() {
        let peers = cluster(2);
        peers[0].1.set(4, ProcId(0), &peers[0].0);
        peers[1].2.set(4, ProcId(1), &peers[1].0);
        peers[0].0.comm_barrier();
        peers[1].0.comm_barrier();

        assert_eq!(peers[1].1.get_cached(4, &peers[1].0), ProcId(0));
        assert_eq!(peers[0].2.get_cached(4, &peers[0].0), ProcId(1));

        for (node, _, _) in &peers {
            node.shutdown();
        }
    }
}
