//! Fragment construction from atom files.

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use tracing::{info, trace, warn};

use crate::atom::{AtomFile, AtomIndex};
use crate::directory::CachingDirectory;
use crate::error::{QuiverError, Result};
use crate::rpc::RpcNode;
use crate::store::LocalStore;
use crate::types::{EdgeId, GraphData, Leid, Lvid, ProcId, VertexId};

use super::numbering::EdgeNumbering;
use super::DistributedGraph;

impl<V: GraphData, E: GraphData> DistributedGraph<V, E> {
    /// Builds this peer's fragment from the atoms assigned to its partition.
    ///
    /// `partition_to_atoms` must be identical on every peer (it comes from
    /// the external partitioner); `my_partition` is this peer's index into
    /// it. Ownership of every owned vertex (and edge, when global edge ids
    /// exist) is published to the directories as a side effect, so the
    /// caller must follow construction with a cluster-wide barrier before
    /// serving queries.
    pub fn construct_local_fragment(
        rpc: Arc<RpcNode<V, E>>,
        vertex_dir: Arc<CachingDirectory>,
        edge_dir: Arc<CachingDirectory>,
        atom_index: &AtomIndex,
        partition_to_atoms: &[Vec<usize>],
        my_partition: usize,
    ) -> Result<Self> {
        let proc = rpc.proc();
        if my_partition >= partition_to_atoms.len() {
            return Err(QuiverError::Bootstrap(format!(
                "partition {my_partition} missing from a {}-partition assignment",
                partition_to_atoms.len()
            )));
        }

        // atom -> machine, needed to assign owners to boundary vertices
        let mut atom_to_machine: Vec<ProcId> = Vec::new();
        for (machine, atoms) in partition_to_atoms.iter().enumerate() {
            for &atom in atoms {
                if atom >= atom_index.atoms.len() {
                    return Err(QuiverError::Bootstrap(format!(
                        "partition assignment names atom {atom} but the index lists {}",
                        atom_index.atoms.len()
                    )));
                }
                if atom_to_machine.len() <= atom {
                    atom_to_machine.resize(atom + 1, ProcId(0));
                }
                atom_to_machine[atom] = ProcId(machine as u16);
            }
        }

        let atoms_in_curpart = &partition_to_atoms[my_partition];
        info!(peer = proc.0, atoms = atoms_in_curpart.len(), "fragment.load_id_maps");
        let mut atom_files: Vec<AtomFile<V, E>> = Vec::with_capacity(atoms_in_curpart.len());
        for &atom in atoms_in_curpart {
            let entry = &atom_index.atoms[atom];
            let mut file = AtomFile::open(&entry.protocol, &entry.path)?;
            file.load_id_maps()?;
            atom_files.push(file);
        }

        let edge_canonical = atom_files
            .first()
            .map(|file| file.global_eids().is_empty())
            .unwrap_or(false);
        if edge_canonical {
            warn!(peer = proc.0, "edge canonical numbering in use; edge ids are only locally valid");
        }

        info!(peer = proc.0, "fragment.generate_mappings");
        let mut local_to_global_vid: Vec<VertexId> = Vec::new();
        for file in &atom_files {
            local_to_global_vid.extend_from_slice(file.global_vids());
        }
        local_to_global_vid.sort_unstable();
        local_to_global_vid.dedup();
        let mut global_to_local_vid = HashMap::with_capacity(local_to_global_vid.len());
        for (lvid, &vid) in local_to_global_vid.iter().enumerate() {
            global_to_local_vid.insert(vid, lvid as Lvid);
        }

        let mut local_to_global_eid: Vec<EdgeId> = Vec::new();
        let mut global_to_local_eid: HashMap<EdgeId, Leid> = HashMap::new();
        if !edge_canonical {
            for file in &atom_files {
                local_to_global_eid.extend_from_slice(file.global_eids());
            }
            local_to_global_eid.sort_unstable();
            local_to_global_eid.dedup();
            for (leid, &eid) in local_to_global_eid.iter().enumerate() {
                global_to_local_eid.insert(eid, leid as Leid);
            }
        }

        info!(peer = proc.0, "fragment.load_structure");
        for file in &mut atom_files {
            file.load_structure()?;
        }

        // dense local ids for canonical mode: first-encounter order over
        // global endpoint pairs, deduplicated across atoms
        let mut canonical_ids: HashMap<(VertexId, VertexId), Leid> = HashMap::new();
        if edge_canonical {
            for file in &atom_files {
                for &(src, dst) in file.edge_src_dest() {
                    let pair = (file.global_vids()[src as usize], file.global_vids()[dst as usize]);
                    let next = canonical_ids.len() as Leid;
                    canonical_ids.entry(pair).or_insert(next);
                }
            }
        }

        let num_local_vertices = local_to_global_vid.len();
        let num_local_edges = if edge_canonical {
            canonical_ids.len()
        } else {
            local_to_global_eid.len()
        };
        info!(
            peer = proc.0,
            vertices = num_local_vertices,
            edges = num_local_edges,
            "fragment.create_store"
        );
        let mut store: LocalStore<V, E> = LocalStore::create_store(
            num_local_vertices,
            num_local_edges,
            format!("vdata.{my_partition}"),
            format!("edata.{my_partition}"),
        );
        trace!(
            vertex_hint = %store.vertex_store_hint().display(),
            edge_hint = %store.edge_store_hint().display(),
            "fragment.store_hints"
        );

        // structural pass: add each logical edge once, collapsing the
        // cross-atom duplicates that boundary edges produce
        let mut eid_loaded = vec![false; num_local_edges];
        let local_eid_of = |file: &AtomFile<V, E>, index: usize| -> Leid {
            if edge_canonical {
                let (src, dst) = file.edge_src_dest()[index];
                let pair = (file.global_vids()[src as usize], file.global_vids()[dst as usize]);
                canonical_ids[&pair]
            } else {
                global_to_local_eid[&file.global_eids()[index]]
            }
        };
        for file in &atom_files {
            for (j, &(src, dst)) in file.edge_src_dest().iter().enumerate() {
                let leid = local_eid_of(file, j);
                if eid_loaded[leid as usize] {
                    continue;
                }
                let lsource = global_to_local_vid[&file.global_vids()[src as usize]];
                let ltarget = global_to_local_vid[&file.global_vids()[dst as usize]];
                store.add_edge(leid, lsource, ltarget);
                eid_loaded[leid as usize] = true;
            }
        }

        // ownership and colors; owned vertices are published to the
        // vertex directory
        let mut local_owner = vec![ProcId(0); num_local_vertices];
        for file in &atom_files {
            for (j, &owning_atom) in file.atom().iter().enumerate() {
                let vid = file.global_vids()[j];
                let lvid = global_to_local_vid[&vid];
                let owner = *atom_to_machine.get(owning_atom as usize).ok_or_else(|| {
                    QuiverError::Bootstrap(format!(
                        "vertex {vid} claims atom {owning_atom}, which no partition holds"
                    ))
                })?;
                local_owner[lvid as usize] = owner;
                store.set_color(lvid, file.vcolor()[j]);
                if owner == proc {
                    vertex_dir.set(vid.0, proc, &rpc);
                }
            }
        }

        if edge_canonical {
            info!(peer = proc.0, "fragment.edge_directory_skipped");
        } else {
            info!(peer = proc.0, "fragment.publish_edge_owners");
            for file in &atom_files {
                for (j, &(_, dst)) in file.edge_src_dest().iter().enumerate() {
                    let ltarget = global_to_local_vid[&file.global_vids()[dst as usize]];
                    if local_owner[ltarget as usize] == proc {
                        edge_dir.set(file.global_eids()[j].0, proc, &rpc);
                    }
                }
            }
        }

        info!(peer = proc.0, "fragment.load_data");
        for file in &mut atom_files {
            file.load_all()?;
            for (j, data) in file.vdata().iter().enumerate() {
                let lvid = global_to_local_vid[&file.global_vids()[j]];
                store.set_vertex_data(lvid, data.clone());
                store.set_vertex_version(lvid, 0);
                store.set_vertex_snapshot_made(lvid, false);
            }
            for (j, data) in file.edata().iter().enumerate() {
                let leid = local_eid_of(file, j);
                store.set_edge_data(leid, data.clone());
                store.set_edge_version(leid, 0);
                store.set_edge_snapshot_made(leid, false);
            }
            file.clear();
        }

        info!(peer = proc.0, "fragment.finalize");
        store.finalize();

        let numbering = if edge_canonical {
            EdgeNumbering::Canonical { num_edges: num_local_edges }
        } else {
            EdgeNumbering::Global {
                global_to_local: global_to_local_eid,
                local_to_global: local_to_global_eid,
            }
        };

        info!(peer = proc.0, "fragment.load_complete");
        Ok(Self {
            rpc,
            store,
            global_to_local_vid,
            local_to_global_vid,
            numbering,
            local_owner,
            vertex_dir,
            edge_dir,
            num_global_vertices: atom_index.nverts,
            num_global_edges: atom_index.nedges,
            pending_async_updates: AtomicUsize::new(0),
        })
    }
}
