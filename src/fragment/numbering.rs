//! Edge identifier numbering mode of a fragment.

use std::collections::HashMap;

use crate::types::{EdgeId, Leid};

/// How this fragment's edge identifiers relate to the cluster.
///
/// Only the `Global` arm carries the global/local edge maps, so code paths
/// that need a cluster-valid edge id must match on it; under `Canonical`
/// numbering those paths are structurally unreachable and a remote peer
/// asking by edge id is reported as a contract violation.
pub(crate) enum EdgeNumbering {
    Global {
        global_to_local: HashMap<EdgeId, Leid>,
        local_to_global: Vec<EdgeId>,
    },
    /// Edge ids were assigned densely at load time and are only valid inside
    /// this fragment.
    Canonical { num_edges: usize },
}

impl EdgeNumbering {
    pub(crate) fn is_canonical(&self) -> bool {
        matches!(self, EdgeNumbering::Canonical { .. })
    }

    pub(crate) fn local_to_global(&self, leid: Leid) -> EdgeId {
        match self {
            EdgeNumbering::Global { local_to_global, .. } => local_to_global[leid as usize],
            EdgeNumbering::Canonical { .. } => EdgeId(leid),
        }
    }

    pub(crate) fn global_to_local(&self, eid: EdgeId) -> Option<Leid> {
        match self {
            EdgeNumbering::Global { global_to_local, .. } => global_to_local.get(&eid).copied(),
            EdgeNumbering::Canonical { num_edges } => {
                ((eid.0 as usize) < *num_edges).then_some(eid.0)
            }
        }
    }
}
