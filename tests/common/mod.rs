//! Shared fixtures: a ring-of-atoms graph and a loopback cluster launcher.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::thread;

use quiver::{
    AtomContent, AtomEntry, AtomIndex, EdgeId, GraphEngine, LoopbackMesh, ProcId, SchedulerConfig,
    SumMessage, VertexId,
};

pub type Engine = GraphEngine<u64, i64, SumMessage>;

pub fn vertex_payload(vid: u32) -> u64 {
    vid as u64 * 10
}

pub fn edge_payload(source: u32, target: u32) -> i64 {
    source as i64 * 1000 + target as i64
}

/// Writes `natoms` atoms forming a ring. Atom `a` owns vertices
/// `3a..3a+3` and four edges targeting them: two intra-atom links, one from
/// the previous atom's last vertex, and one from the previous atom's first
/// vertex. Each atom also replicates the previous atom's middle edge, so
/// fragments see boundary edges they do not own.
pub fn write_ring_atoms(dir: &Path, natoms: usize, with_global_eids: bool) -> AtomIndex {
    let mut entries = Vec::with_capacity(natoms);
    for a in 0..natoms as u32 {
        let p = (a + natoms as u32 - 1) % natoms as u32;
        let base = 3 * a;
        let pbase = 3 * p;
        // atom-local vertex order: own vertices, then the previous atom's
        let global_vids: Vec<u32> =
            vec![base, base + 1, base + 2, pbase, pbase + 1, pbase + 2];
        let edges: Vec<(u32, u32)> = vec![(0, 1), (1, 2), (5, 0), (3, 2), (4, 5)];
        let global_eids = if with_global_eids {
            vec![
                EdgeId(4 * a),
                EdgeId(4 * a + 1),
                EdgeId(4 * a + 2),
                EdgeId(4 * a + 3),
                EdgeId(4 * p + 1),
            ]
        } else {
            Vec::new()
        };
        let content = AtomContent {
            global_vids: global_vids.iter().map(|&v| VertexId(v)).collect(),
            global_eids,
            edge_src_dest: edges.clone(),
            atom: vec![a, a, a, p, p, p],
            vcolor: global_vids.iter().map(|&v| v % 3).collect(),
            vdata: global_vids.iter().map(|&v| vertex_payload(v)).collect(),
            edata: edges
                .iter()
                .map(|&(s, t)| {
                    edge_payload(global_vids[s as usize], global_vids[t as usize])
                })
                .collect(),
        };
        let path = dir.join(format!("atom{a}"));
        content.save(&path).expect("write atom");
        entries.push(AtomEntry {
            protocol: "file".into(),
            path: path.to_string_lossy().into_owned(),
        });
    }
    AtomIndex { atoms: entries, nverts: natoms * 3, nedges: natoms * 4 }
}

/// Boots `partition_to_atoms.len()` peers over a loopback mesh, one thread
/// per peer, and returns the engines once every peer passed the
/// construction barrier.
pub fn launch_cluster(
    atom_index: &AtomIndex,
    partition_to_atoms: &[Vec<usize>],
    ncpus: usize,
) -> Vec<Engine> {
    let nprocs = partition_to_atoms.len();
    let (mesh, inboxes) = LoopbackMesh::new(nprocs);
    let mut handles = Vec::with_capacity(nprocs);
    for (proc, inbox) in inboxes.into_iter().enumerate() {
        let mesh = Arc::clone(&mesh);
        let atom_index = atom_index.clone();
        let partition = partition_to_atoms.to_vec();
        handles.push(thread::spawn(move || {
            GraphEngine::bootstrap(
                mesh,
                inbox,
                ProcId(proc as u16),
                &atom_index,
                &partition,
                ncpus,
                SchedulerConfig::default(),
            )
            .expect("bootstrap peer")
        }));
    }
    handles.into_iter().map(|handle| handle.join().expect("peer thread")).collect()
}

pub fn shutdown_cluster(engines: &[Engine]) {
    for engine in engines {
        engine.shutdown();
    }
}
