//! In-process transport: one channel per peer plus a cluster rendezvous.
//!
//! This is the transport used by tests and single-host deployments. A wire
//! transport replacing it only needs to preserve the two properties the RPC
//! layer relies on: per-link FIFO delivery and sender identity.

use std::sync::Barrier;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{QuiverError, Result};
use crate::types::ProcId;

/// A frame in flight: sender identity plus the encoded bytes.
pub type RawFrame = (ProcId, Vec<u8>);

pub struct LoopbackMesh {
    links: Vec<Sender<RawFrame>>,
    rendezvous: Barrier,
}

impl LoopbackMesh {
    /// Builds a mesh of `nprocs` peers. The caller hands receiver `i` to the
    /// RPC node of peer `i`.
    pub fn new(nprocs: usize) -> (std::sync::Arc<Self>, Vec<Receiver<RawFrame>>) {
        let mut links = Vec::with_capacity(nprocs);
        let mut inboxes = Vec::with_capacity(nprocs);
        for _ in 0..nprocs {
            let (tx, rx) = unbounded();
            links.push(tx);
            inboxes.push(rx);
        }
        let mesh = std::sync::Arc::new(Self {
            links,
            rendezvous: Barrier::new(nprocs),
        });
        (mesh, inboxes)
    }

    pub fn num_peers(&self) -> usize {
        self.links.len()
    }

    pub(crate) fn send(&self, to: ProcId, frame: RawFrame) -> Result<()> {
        let link = self
            .links
            .get(to.0 as usize)
            .ok_or_else(|| QuiverError::Rpc(format!("no link to peer {to}")))?;
        link.send(frame)
            .map_err(|_| QuiverError::Rpc(format!("link to peer {to} is down")))
    }

    /// Blocks until every peer has arrived.
    pub(crate) fn rendezvous(&self) {
        self.rendezvous.wait();
    }
}
