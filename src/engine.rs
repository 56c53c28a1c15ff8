//! The per-process engine object: RPC endpoint, directories, fragment and
//! scheduler wired together, plus the bound worker loop.

use std::sync::{Arc, OnceLock};
use std::thread;

use crossbeam_channel::Receiver;

use crate::atom::AtomIndex;
use crate::config::SchedulerConfig;
use crate::directory::{self, CachingDirectory};
use crate::error::{fatal, Result};
use crate::fragment::DistributedGraph;
use crate::rpc::{DirKind, LoopbackMesh, RawFrame, Reply, Request, RpcMetricsSnapshot, RpcNode};
use crate::scheduler::{Message, MultiQueueScheduler};
use crate::types::{GraphData, ProcId, VertexId};

const COMPONENT: &str = "engine";

/// Routes inbound requests to the directories before the fragment exists,
/// and to the fragment afterwards.
struct EngineShared<V: GraphData, E: GraphData> {
    vertex_dir: Arc<CachingDirectory>,
    edge_dir: Arc<CachingDirectory>,
    fragment: OnceLock<Arc<DistributedGraph<V, E>>>,
}

impl<V: GraphData, E: GraphData> EngineShared<V, E> {
    fn handle(&self, from: ProcId, request: Request<V, E>) -> Option<Reply<V, E>> {
        match request {
            Request::DirSet { .. } | Request::DirGet { .. } => {
                directory::handle_request(&self.vertex_dir, &self.edge_dir, request)
            }
            Request::Flush => Some(Reply::Unit),
            other => match self.fragment.get() {
                Some(fragment) => fragment.handle_request(from, other),
                None => fatal!(
                    COMPONENT,
                    "{} request arrived before the fragment finished bootstrapping",
                    other.name()
                ),
            },
        }
    }
}

/// One peer's engine: owns the RPC node, the distributed graph fragment and
/// the scheduler, and drives the worker threads.
pub struct GraphEngine<V: GraphData, E: GraphData, M: Message> {
    rpc: Arc<RpcNode<V, E>>,
    graph: Arc<DistributedGraph<V, E>>,
    scheduler: Arc<MultiQueueScheduler<M>>,
    ncpus: usize,
}

impl<V: GraphData, E: GraphData, M: Message> GraphEngine<V, E, M> {
    /// Brings one peer up: starts RPC dispatch, builds the local fragment
    /// from the atoms of partition `proc`, publishes ownership, and arrives
    /// at the cluster barrier once the fragment is ready to serve.
    ///
    /// `partition_to_atoms` must be identical on every peer.
    pub fn bootstrap(
        mesh: Arc<LoopbackMesh>,
        inbox: Receiver<RawFrame>,
        proc: ProcId,
        atom_index: &AtomIndex,
        partition_to_atoms: &[Vec<usize>],
        ncpus: usize,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let nprocs = mesh.num_peers();
        let rpc = Arc::new(RpcNode::new(proc, mesh, inbox));
        let vertex_dir = Arc::new(CachingDirectory::new(DirKind::Vertex, proc, nprocs));
        let edge_dir = Arc::new(CachingDirectory::new(DirKind::Edge, proc, nprocs));
        let shared = Arc::new(EngineShared {
            vertex_dir: Arc::clone(&vertex_dir),
            edge_dir: Arc::clone(&edge_dir),
            fragment: OnceLock::new(),
        });
        let dispatch = Arc::clone(&shared);
        rpc.start(Box::new(move |from, request| dispatch.handle(from, request)));

        let graph = Arc::new(DistributedGraph::construct_local_fragment(
            Arc::clone(&rpc),
            vertex_dir,
            edge_dir,
            atom_index,
            partition_to_atoms,
            proc.0 as usize,
        )?);
        if shared.fragment.set(Arc::clone(&graph)).is_err() {
            fatal!(COMPONENT, "fragment registered twice on peer {proc}");
        }
        // every peer must be able to serve before anyone proceeds
        rpc.full_barrier();

        let scheduler = Arc::new(MultiQueueScheduler::new(graph.num_vertices(), ncpus, config));
        Ok(Self { rpc, graph, scheduler, ncpus })
    }

    pub fn proc(&self) -> ProcId {
        self.rpc.proc()
    }

    pub fn graph(&self) -> &Arc<DistributedGraph<V, E>> {
        &self.graph
    }

    pub fn scheduler(&self) -> &Arc<MultiQueueScheduler<M>> {
        &self.scheduler
    }

    pub fn rpc_metrics(&self) -> RpcMetricsSnapshot {
        self.rpc.metrics()
    }

    /// Cluster-wide rendezvous; used to bracket phases of an application.
    pub fn barrier(&self) {
        self.rpc.full_barrier();
    }

    /// Runs `update` over scheduled work until the termination detector
    /// declares the system idle. Each worker thread is bound to one logical
    /// worker index; `update` may schedule follow-up work through the
    /// scheduler and read or write the graph through the fragment.
    pub fn run<F>(&self, update: F)
    where
        F: Fn(usize, VertexId, M) + Send + Sync,
    {
        self.scheduler.start();
        let scheduler = &self.scheduler;
        let update = &update;
        thread::scope(|scope| {
            for worker in 0..self.ncpus {
                scope.spawn(move || loop {
                    match scheduler.get_next(worker) {
                        Some((vid, message)) => {
                            update(worker, vid, message);
                            scheduler.completed(worker);
                        }
                        None => {
                            if scheduler.terminator().sleep(worker) {
                                break;
                            }
                        }
                    }
                });
            }
        });
    }

    /// Stops RPC dispatch for this peer. Remote peers must have quiesced
    /// first; a cluster barrier before shutdown gives that guarantee.
    pub fn shutdown(&self) {
        self.rpc.shutdown();
    }
}
