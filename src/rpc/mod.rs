//! RPC dispatch glue between peers.
//!
//! The transport below this layer is external; everything here assumes only
//! reliable, ordered byte frames per peer pair plus sender identity. Typed
//! requests and replies are bincode-framed with a sequence number for
//! request/reply correlation.

mod mesh;
mod node;
mod protocol;

pub use mesh::{LoopbackMesh, RawFrame};
pub use node::{RpcNode, RpcMetricsSnapshot};
pub use protocol::{DirKind, Reply, Request};
