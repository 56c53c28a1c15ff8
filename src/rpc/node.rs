//! Peer-local RPC endpoint: frame codec, request correlation, dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::fatal;
use crate::types::{GraphData, ProcId};

use super::mesh::{LoopbackMesh, RawFrame};
use super::protocol::{Reply, Request};

const COMPONENT: &str = "rpc";

#[derive(Serialize, Deserialize)]
enum FrameKind {
    /// One-way: no reply is produced.
    Call,
    /// Blocking: the handler's reply travels back under the same `seq`.
    Request,
    /// Answer to an earlier `Request`.
    Reply,
    /// Self-addressed poison frame that stops the dispatcher.
    Shutdown,
}

#[derive(Serialize, Deserialize)]
struct Frame {
    kind: FrameKind,
    seq: u64,
    body: Vec<u8>,
}

/// Traffic counters, mirrored into snapshots for assertions and monitoring.
#[derive(Default)]
pub struct RpcMetrics {
    calls_sent: AtomicU64,
    requests_sent: AtomicU64,
    requests_served: AtomicU64,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RpcMetricsSnapshot {
    pub calls_sent: u64,
    pub requests_sent: u64,
    pub requests_served: u64,
}

impl RpcMetrics {
    fn snapshot(&self) -> RpcMetricsSnapshot {
        RpcMetricsSnapshot {
            calls_sent: self.calls_sent.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_served: self.requests_served.load(Ordering::Relaxed),
        }
    }
}

type Handler<V, E> = Box<dyn Fn(ProcId, Request<V, E>) -> Option<Reply<V, E>> + Send + Sync>;

/// One peer's RPC endpoint.
///
/// Inbound frames are delivered by a dispatcher thread started in
/// [`RpcNode::start`]; handlers run on that thread and must not issue
/// blocking requests of their own (one-way calls are fine).
pub struct RpcNode<V, E> {
    proc: ProcId,
    nprocs: usize,
    mesh: Arc<LoopbackMesh>,
    inbox: Mutex<Option<Receiver<RawFrame>>>,
    pending: Mutex<HashMap<u64, Sender<Vec<u8>>>>,
    next_seq: AtomicU64,
    metrics: RpcMetrics,
    _marker: std::marker::PhantomData<(V, E)>,
}

impl<V: GraphData, E: GraphData> RpcNode<V, E> {
    pub fn new(proc: ProcId, mesh: Arc<LoopbackMesh>, inbox: Receiver<RawFrame>) -> Self {
        let nprocs = mesh.num_peers();
        Self {
            proc,
            nprocs,
            mesh,
            inbox: Mutex::new(Some(inbox)),
            pending: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            metrics: RpcMetrics::default(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn proc(&self) -> ProcId {
        self.proc
    }

    pub fn num_procs(&self) -> usize {
        self.nprocs
    }

    pub fn metrics(&self) -> RpcMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Starts the dispatcher thread with the peer's request handler.
    pub fn start(self: &Arc<Self>, handler: Handler<V, E>) {
        let node = Arc::clone(self);
        let inbox = node
            .inbox
            .lock()
            .take()
            .unwrap_or_else(|| fatal!(COMPONENT, "dispatcher started twice on peer {}", node.proc));
        thread::Builder::new()
            .name(format!("rpc-dispatch-{}", node.proc))
            .spawn(move || node.dispatch_loop(inbox, handler))
            .expect("spawn rpc dispatcher");
    }

    /// Fire-and-forget: no acknowledgment, no reply.
    pub fn remote_call(&self, to: ProcId, request: Request<V, E>) {
        trace!(to = to.0, request = request.name(), "rpc.remote_call");
        self.metrics.calls_sent.fetch_add(1, Ordering::Relaxed);
        self.send_frame(to, FrameKind::Call, 0, &request);
    }

    /// Blocks until `to` has executed the request and returned its reply.
    pub fn remote_request(&self, to: ProcId, request: Request<V, E>) -> Reply<V, E> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(1);
        self.pending.lock().insert(seq, tx);
        trace!(to = to.0, seq, request = request.name(), "rpc.remote_request");
        self.metrics.requests_sent.fetch_add(1, Ordering::Relaxed);
        self.send_frame(to, FrameKind::Request, seq, &request);
        let body = match rx.recv() {
            Ok(body) => body,
            Err(_) => fatal!(COMPONENT, "peer {to} vanished while serving seq {seq}"),
        };
        match bincode::deserialize(&body) {
            Ok(reply) => reply,
            Err(err) => fatal!(COMPONENT, "undecodable reply from peer {to}: {err}"),
        }
    }

    /// Flushes this peer's outbound traffic: one no-op round trip per peer
    /// proves, by per-link FIFO, that every earlier frame was dispatched.
    pub fn comm_barrier(&self) {
        for p in 0..self.nprocs as u16 {
            let peer = ProcId(p);
            if peer == self.proc {
                continue;
            }
            self.remote_request(peer, Request::Flush).into_unit();
        }
    }

    /// Flush plus cluster-wide rendezvous: when this returns, every peer has
    /// flushed and arrived.
    pub fn full_barrier(&self) {
        self.comm_barrier();
        self.mesh.rendezvous();
    }

    /// Stops the dispatcher thread. Pending inbound frames ahead of the stop
    /// marker are still served.
    pub fn shutdown(&self) {
        let frame = Frame { kind: FrameKind::Shutdown, seq: 0, body: Vec::new() };
        let bytes = bincode::serialize(&frame).expect("encode shutdown frame");
        if self.mesh.send(self.proc, (self.proc, bytes)).is_err() {
            // mesh already torn down
        }
    }

    fn send_frame(&self, to: ProcId, kind: FrameKind, seq: u64, request: &Request<V, E>) {
        let body = match bincode::serialize(request) {
            Ok(body) => body,
            Err(err) => fatal!(COMPONENT, "unencodable {} request: {err}", request.name()),
        };
        let frame = Frame { kind, seq, body };
        let bytes = bincode::serialize(&frame).expect("encode rpc frame");
        if let Err(err) = self.mesh.send(to, (self.proc, bytes)) {
            fatal!(COMPONENT, "send to peer {to} failed: {err}");
        }
    }

    fn dispatch_loop(&self, inbox: Receiver<RawFrame>, handler: Handler<V, E>) {
        while let Ok((from, bytes)) = inbox.recv() {
            let frame: Frame = match bincode::deserialize(&bytes) {
                Ok(frame) => frame,
                Err(err) => fatal!(COMPONENT, "undecodable frame from peer {from}: {err}"),
            };
            match frame.kind {
                FrameKind::Shutdown => break,
                FrameKind::Reply => {
                    let waiter = self.pending.lock().remove(&frame.seq);
                    match waiter {
                        Some(tx) => {
                            let _ = tx.send(frame.body);
                        }
                        None => warn!(seq = frame.seq, "rpc.reply_without_waiter"),
                    }
                }
                FrameKind::Call => {
                    let request = self.decode_request(from, &frame.body);
                    trace!(from = from.0, request = request.name(), "rpc.dispatch_call");
                    handler(from, request);
                }
                FrameKind::Request => {
                    let request = self.decode_request(from, &frame.body);
                    trace!(from = from.0, seq = frame.seq, request = request.name(), "rpc.dispatch_request");
                    let name = request.name();
                    let reply = match handler(from, request) {
                        Some(reply) => reply,
                        None => fatal!(COMPONENT, "handler produced no reply for {name}"),
                    };
                    self.metrics.requests_served.fetch_add(1, Ordering::Relaxed);
                    let body = match bincode::serialize(&reply) {
                        Ok(body) => body,
                        Err(err) => fatal!(COMPONENT, "unencodable reply for {name}: {err}"),
                    };
                    let frame = Frame { kind: FrameKind::Reply, seq: frame.seq, body };
                    let bytes = bincode::serialize(&frame).expect("encode rpc frame");
                    if let Err(err) = self.mesh.send(from, (self.proc, bytes)) {
                        fatal!(COMPONENT, "reply to peer {from} failed: {err}");
                    }
                }
            }
        }
        trace!(proc = self.proc.0, "rpc.dispatcher_stopped");
    }

    fn decode_request(&self, from: ProcId, body: &[u8]) -> Request<V, E> {
        match bincode::deserialize(body) {
            Ok(request) => request,
            Err(err) => fatal!(COMPONENT, "undecodable request from peer {from}: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_nodes() -> (Arc<RpcNode<u64, u64>>, Arc<RpcNode<u64, u64>>) {
        let (mesh, mut inboxes) = LoopbackMesh::new(2);
        let b_inbox = inboxes.pop().unwrap();
        let a_inbox = inboxes.pop().unwrap();
        let a = Arc::new(RpcNode::new(ProcId(0), Arc::clone(&mesh), a_inbox));
        let b = Arc::new(RpcNode::new(ProcId(1), mesh, b_inbox));
        (a, b)
    }

    fn echo_handler(_from: ProcId, request: Request<u64, u64>) -> Option<Reply<u64, u64>> {
        match request {
            Request::Flush => Some(Reply::Unit),
            Request::GetVertexData { vid } => Some(Reply::VertexData(vid.0 as u64 * 10)),
            _ => Some(Reply::Unit),
        }
    }

    #[test]
    fn request_reply_round_trip() {
        let (a, b) = two_nodes();
        a.start(Box::new(echo_handler));
        b.start(Box::new(echo_handler));

        let reply = a.remote_request(
            ProcId(1),
            Request::GetVertexData { vid: crate::types::VertexId(4) },
        );
        assert_eq!(reply.into_vertex_data(), 40);
        assert_eq!(a.metrics().requests_sent, 1);
        assert_eq!(b.metrics().requests_served, 1);

        a.shutdown();
        b.shutdown();
    }

    #[test]
    fn self_request_is_served() {
        let (a, b) = two_nodes();
        a.start(Box::new(echo_handler));
        b.start(Box::new(echo_handler));
        let reply = a.remote_request(
            ProcId(0),
            Request::GetVertexData { vid: crate::types::VertexId(2) },
        );
        assert_eq!(reply.into_vertex_data(), 20);
        a.shutdown();
        b.shutdown();
    }

    #[test]
    fn calls_preserve_link_order_before_flush() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let (a, b) = two_nodes();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_handler = Arc::clone(&seen);
        a.start(Box::new(echo_handler));
        b.start(Box::new(move |_from, request: Request<u64, u64>| match request {
            Request::SetColor { .. } => {
                seen_in_handler.fetch_add(1, Ordering::SeqCst);
                None
            }
            Request::Flush => Some(Reply::Unit),
            _ => Some(Reply::Unit),
        }));

        for i in 0..32 {
            a.remote_call(
                ProcId(1),
                Request::SetColor { vid: crate::types::VertexId(i), color: i },
            );
        }
        a.comm_barrier();
        // the flush reply can only arrive after every earlier call dispatched
        assert_eq!(seen.load(Ordering::SeqCst), 32);
        a.shutdown();
        b.shutdown();
    }
}
