pub mod atom;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod rpc;
pub mod scheduler;
pub mod store;
pub mod sync;
pub mod types;

pub use crate::atom::{read_atom_index, AtomContent, AtomEntry, AtomFile, AtomIndex};
pub use crate::config::SchedulerConfig;
pub use crate::directory::CachingDirectory;
pub use crate::engine::GraphEngine;
pub use crate::error::{QuiverError, Result};
pub use crate::fragment::DistributedGraph;
pub use crate::rpc::LoopbackMesh;
pub use crate::scheduler::{
    CriticalTermination, MaxMessage, Message, MultiQueueScheduler, ScheduleOrder, SumMessage,
    VertexMessageMap,
};
pub use crate::store::LocalStore;
pub use crate::sync::{Conditional, Versioned};
pub use crate::types::{EdgeId, GraphData, ProcId, VertexId};
