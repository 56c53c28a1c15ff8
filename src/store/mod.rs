//! Dense in-memory storage for one machine's portion of the graph.
//!
//! The store only manages fragment-local vertex and edge indices; the
//! global-to-local mappings live one level up in the distributed fragment.
//! Structure (endpoints and adjacency) is built once and then frozen by
//! `finalize`; payloads and versions stay mutable behind per-record locks.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::error::fatal;
use crate::types::{Leid, Lvid};

mod archive;
mod coloring;
mod record;

pub use record::{EdgeRecord, Endpoints, VertexRecord};

const COMPONENT: &str = "local_store";

pub struct LocalStore<V, E> {
    vertices: Vec<Mutex<VertexRecord<V>>>,
    edges: Vec<Mutex<EdgeRecord<E>>>,
    endpoints: Vec<Endpoints>,
    in_adj: Vec<Vec<Leid>>,
    out_adj: Vec<Vec<Leid>>,
    colors: Vec<AtomicU32>,
    finalized: bool,
    changeid: u64,
    vertex_store_hint: PathBuf,
    edge_store_hint: PathBuf,
}

impl<V: Clone + Default, E: Clone + Default> Default for LocalStore<V, E> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            edges: Vec::new(),
            endpoints: Vec::new(),
            in_adj: Vec::new(),
            out_adj: Vec::new(),
            colors: Vec::new(),
            finalized: true,
            changeid: 0,
            vertex_store_hint: PathBuf::new(),
            edge_store_hint: PathBuf::new(),
        }
    }
}

impl<V: Clone + Default, E: Clone + Default> LocalStore<V, E> {
    /// Allocates records for `num_vertices` vertices and `num_edges` edges.
    ///
    /// The two paths are advisory backing-file hints; the store itself stays
    /// in memory.
    pub fn create_store(
        num_vertices: usize,
        num_edges: usize,
        vertex_store_hint: impl Into<PathBuf>,
        edge_store_hint: impl Into<PathBuf>,
    ) -> Self {
        let mut store = Self::default();
        store.vertices = (0..num_vertices).map(|_| Mutex::new(VertexRecord::default())).collect();
        store.edges = (0..num_edges).map(|_| Mutex::new(EdgeRecord::default())).collect();
        store.endpoints = vec![Endpoints::default(); num_edges];
        store.in_adj = vec![Vec::new(); num_vertices];
        store.out_adj = vec![Vec::new(); num_vertices];
        store.colors = (0..num_vertices).map(|_| AtomicU32::new(0)).collect();
        store.vertex_store_hint = vertex_store_hint.into();
        store.edge_store_hint = edge_store_hint.into();
        store
    }

    /// Resets the store to an empty, finalized state.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.edges.clear();
        self.endpoints.clear();
        self.in_adj.clear();
        self.out_adj.clear();
        self.colors.clear();
        self.finalized = true;
        self.changeid += 1;
    }

    /// Number of times the store has been cleared and rebuilt.
    pub fn changeid(&self) -> u64 {
        self.changeid
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_in_neighbors(&self, v: Lvid) -> usize {
        self.check_vertex(v);
        self.in_adj[v as usize].len()
    }

    pub fn num_out_neighbors(&self, v: Lvid) -> usize {
        self.check_vertex(v);
        self.out_adj[v as usize].len()
    }

    /// Records an edge during construction. Self-loops and out-of-range
    /// indices abort.
    pub fn add_edge(&mut self, eid: Leid, source: Lvid, target: Lvid) {
        if source as usize >= self.num_vertices() || target as usize >= self.num_vertices() {
            fatal!(
                COMPONENT,
                "add_edge({source} -> {target}) with only {} vertices",
                self.num_vertices()
            );
        }
        if eid as usize >= self.num_edges() {
            fatal!(COMPONENT, "edge id {eid} out of range ({} edges)", self.num_edges());
        }
        if source == target {
            fatal!(COMPONENT, "self edge ({source} -> {target}) is not permitted");
        }
        self.endpoints[eid as usize] = Endpoints { source, target };
        self.in_adj[target as usize].push(eid);
        self.out_adj[source as usize].push(eid);
        self.finalized = false;
    }

    /// Sorts every adjacency list by the `(source, target)` key of the
    /// referenced edges, enabling binary-search lookups. Idempotent.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        let endpoints = &self.endpoints;
        for list in &mut self.in_adj {
            list.sort_unstable_by_key(|&eid| endpoints[eid as usize]);
        }
        for list in &mut self.out_adj {
            list.sort_unstable_by_key(|&eid| endpoints[eid as usize]);
        }
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Looks up the edge `source -> target`, searching whichever of the two
    /// incident adjacency lists is shorter. Binary search once finalized,
    /// linear scan before that.
    pub fn find(&self, source: Lvid, target: Lvid) -> Option<Leid> {
        self.check_vertex(source);
        self.check_vertex(target);
        let ins = &self.in_adj[target as usize];
        let outs = &self.out_adj[source as usize];
        if ins.is_empty() || outs.is_empty() {
            return None;
        }
        let list = if ins.len() < outs.len() { ins } else { outs };
        let key = Endpoints { source, target };
        if self.finalized {
            list.binary_search_by(|&eid| self.endpoints[eid as usize].cmp(&key))
                .ok()
                .map(|index| list[index])
        } else {
            list.iter().copied().find(|&eid| self.endpoints[eid as usize] == key)
        }
    }

    /// Unchecked `find`: the edge must exist.
    pub fn edge_id(&self, source: Lvid, target: Lvid) -> Leid {
        match self.find(source, target) {
            Some(eid) => eid,
            None => fatal!(COMPONENT, "edge ({source} -> {target}) does not exist"),
        }
    }

    /// Edge id of the opposite-direction edge; aborts if it is absent.
    pub fn rev_edge_id(&self, eid: Leid) -> Leid {
        self.check_edge(eid);
        let Endpoints { source, target } = self.endpoints[eid as usize];
        self.edge_id(target, source)
    }

    pub fn source(&self, eid: Leid) -> Lvid {
        self.check_edge(eid);
        self.endpoints[eid as usize].source
    }

    pub fn target(&self, eid: Leid) -> Lvid {
        self.check_edge(eid);
        self.endpoints[eid as usize].target
    }

    /// Edge ids arriving at `v`, sorted by `(source, target)` once finalized.
    pub fn in_edge_ids(&self, v: Lvid) -> &[Leid] {
        self.check_vertex(v);
        &self.in_adj[v as usize]
    }

    /// Edge ids leaving `v`, sorted by `(source, target)` once finalized.
    pub fn out_edge_ids(&self, v: Lvid) -> &[Leid] {
        self.check_vertex(v);
        &self.out_adj[v as usize]
    }

    pub fn vertex_data(&self, v: Lvid) -> V {
        self.check_vertex(v);
        self.vertices[v as usize].lock().data.clone()
    }

    /// Raw payload write: does not touch the version or flags. Used by the
    /// loader and by reconciliation merges that carry their own version.
    pub fn set_vertex_data(&self, v: Lvid, data: V) {
        self.check_vertex(v);
        self.vertices[v as usize].lock().data = data;
    }

    /// Installs `data` at `version` in one critical section.
    pub fn set_vertex_data_and_version(&self, v: Lvid, data: V, version: u64) {
        self.check_vertex(v);
        let mut record = self.vertices[v as usize].lock();
        record.data = data;
        record.version = version;
        record.snapshot_made = false;
    }

    pub fn vertex_version(&self, v: Lvid) -> u64 {
        self.check_vertex(v);
        self.vertices[v as usize].lock().version
    }

    /// Sets the vertex version. Setting the version also clears the snapshot
    /// flag.
    pub fn set_vertex_version(&self, v: Lvid, version: u64) {
        self.check_vertex(v);
        let mut record = self.vertices[v as usize].lock();
        record.version = version;
        record.snapshot_made = false;
    }

    pub fn increment_vertex_version(&self, v: Lvid) {
        self.check_vertex(v);
        let mut record = self.vertices[v as usize].lock();
        record.version += 1;
        record.snapshot_made = false;
    }

    pub fn vertex_modified(&self, v: Lvid) -> bool {
        self.check_vertex(v);
        self.vertices[v as usize].lock().modified
    }

    pub fn set_vertex_modified(&self, v: Lvid, modified: bool) {
        self.check_vertex(v);
        self.vertices[v as usize].lock().modified = modified;
    }

    pub fn vertex_snapshot_made(&self, v: Lvid) -> bool {
        self.check_vertex(v);
        self.vertices[v as usize].lock().snapshot_made
    }

    pub fn set_vertex_snapshot_made(&self, v: Lvid, snapshot_made: bool) {
        self.check_vertex(v);
        self.vertices[v as usize].lock().snapshot_made = snapshot_made;
    }

    /// Owner-side write: install the payload and advance the version.
    pub fn increment_and_update_vertex(&self, v: Lvid, data: V) {
        self.check_vertex(v);
        let mut record = self.vertices[v as usize].lock();
        record.data = data;
        record.version += 1;
        record.snapshot_made = false;
    }

    /// Writes only when the supplied version is at least the local one;
    /// a successful write marks the record reconciled.
    pub fn conditional_update_vertex(&self, v: Lvid, data: V, version: u64) {
        self.check_vertex(v);
        let mut record = self.vertices[v as usize].lock();
        if record.version <= version {
            record.data = data;
            record.version = version;
            record.modified = false;
            record.snapshot_made = false;
        }
    }

    pub fn edge_data(&self, eid: Leid) -> E {
        self.check_edge(eid);
        self.edges[eid as usize].lock().data.clone()
    }

    /// Raw payload write; see [`LocalStore::set_vertex_data`].
    pub fn set_edge_data(&self, eid: Leid, data: E) {
        self.check_edge(eid);
        self.edges[eid as usize].lock().data = data;
    }

    /// Installs `data` at `version` in one critical section.
    pub fn set_edge_data_and_version(&self, eid: Leid, data: E, version: u64) {
        self.check_edge(eid);
        let mut record = self.edges[eid as usize].lock();
        record.data = data;
        record.version = version;
        record.snapshot_made = false;
    }

    pub fn edge_version(&self, eid: Leid) -> u64 {
        self.check_edge(eid);
        self.edges[eid as usize].lock().version
    }

    /// Version of the edge `source -> target`; the edge must exist.
    pub fn edge_version_by_pair(&self, source: Lvid, target: Lvid) -> u64 {
        self.edge_version(self.edge_id(source, target))
    }

    pub fn set_edge_version(&self, eid: Leid, version: u64) {
        self.check_edge(eid);
        let mut record = self.edges[eid as usize].lock();
        record.version = version;
        record.snapshot_made = false;
    }

    pub fn increment_edge_version(&self, eid: Leid) {
        self.check_edge(eid);
        let mut record = self.edges[eid as usize].lock();
        record.version += 1;
        record.snapshot_made = false;
    }

    pub fn edge_modified(&self, eid: Leid) -> bool {
        self.check_edge(eid);
        self.edges[eid as usize].lock().modified
    }

    pub fn set_edge_modified(&self, eid: Leid, modified: bool) {
        self.check_edge(eid);
        self.edges[eid as usize].lock().modified = modified;
    }

    pub fn edge_snapshot_made(&self, eid: Leid) -> bool {
        self.check_edge(eid);
        self.edges[eid as usize].lock().snapshot_made
    }

    pub fn set_edge_snapshot_made(&self, eid: Leid, snapshot_made: bool) {
        self.check_edge(eid);
        self.edges[eid as usize].lock().snapshot_made = snapshot_made;
    }

    /// Owner-side write: install the payload and advance the version.
    pub fn increment_and_update_edge(&self, eid: Leid, data: E) {
        self.check_edge(eid);
        let mut record = self.edges[eid as usize].lock();
        record.data = data;
        record.version += 1;
        record.snapshot_made = false;
    }

    /// Writes only when the supplied version is at least the local one;
    /// a successful write marks the record reconciled.
    pub fn conditional_update_edge(&self, eid: Leid, data: E, version: u64) {
        self.check_edge(eid);
        let mut record = self.edges[eid as usize].lock();
        if record.version <= version {
            record.data = data;
            record.version = version;
            record.modified = false;
            record.snapshot_made = false;
        }
    }

    /// Coloring tag of `v`. Only meaningful after the loader installed atom
    /// colors or `compute_coloring` ran.
    pub fn color(&self, v: Lvid) -> u32 {
        self.check_vertex(v);
        self.colors[v as usize].load(Ordering::Relaxed)
    }

    pub fn set_color(&self, v: Lvid, color: u32) {
        self.check_vertex(v);
        self.colors[v as usize].store(color, Ordering::Relaxed);
    }

    pub(crate) fn vertex_store_hint(&self) -> &PathBuf {
        &self.vertex_store_hint
    }

    pub(crate) fn edge_store_hint(&self) -> &PathBuf {
        &self.edge_store_hint
    }

    fn check_vertex(&self, v: Lvid) {
        if v as usize >= self.vertices.len() {
            fatal!(COMPONENT, "vertex {v} out of range ({} vertices)", self.vertices.len());
        }
    }

    fn check_edge(&self, eid: Leid) {
        if eid as usize >= self.edges.len() {
            fatal!(COMPONENT, "edge {eid} out of range ({} edges)", self.edges.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> LocalStore<u64, u64> {
        // 0 -> 1, 0 -> 2, 1 -> 3, 2 -> 3
        let mut store = LocalStore::create_store(4, 4, "vdata.test", "edata.test");
        store.add_edge(0, 0, 1);
        store.add_edge(1, 0, 2);
        store.add_edge(2, 1, 3);
        store.add_edge(3, 2, 3);
        store
    }

    #[test]
    fn find_before_and_after_finalize() {
        let mut store = diamond();
        assert!(!store.is_finalized());
        assert_eq!(store.find(0, 2), Some(1));
        store.finalize();
        assert!(store.is_finalized());
        assert_eq!(store.find(0, 2), Some(1));
        assert_eq!(store.find(2, 0), None);
        assert_eq!(store.find(1, 2), None);
        assert_eq!(store.edge_id(2, 3), 3);
    }

    #[test]
    fn finalize_orders_adjacency_by_endpoint_key() {
        let mut store: LocalStore<(), ()> = LocalStore::create_store(4, 3, "v", "e");
        // insert out of key order on purpose
        store.add_edge(0, 2, 3);
        store.add_edge(1, 0, 3);
        store.add_edge(2, 1, 3);
        store.finalize();
        let sources: Vec<u32> = store
            .in_edge_ids(3)
            .iter()
            .map(|&eid| store.source(eid))
            .collect();
        assert_eq!(sources, vec![0, 1, 2]);
        // idempotent
        store.finalize();
        assert_eq!(store.in_edge_ids(3).len(), 3);
    }

    #[test]
    fn degree_counts() {
        let mut store = diamond();
        store.finalize();
        assert_eq!(store.num_in_neighbors(3), 2);
        assert_eq!(store.num_out_neighbors(0), 2);
        assert_eq!(store.num_in_neighbors(0), 0);
    }

    #[test]
    fn rev_edge_id_round_trip() {
        let mut store: LocalStore<(), ()> = LocalStore::create_store(2, 2, "v", "e");
        store.add_edge(0, 0, 1);
        store.add_edge(1, 1, 0);
        store.finalize();
        assert_eq!(store.rev_edge_id(0), 1);
        assert_eq!(store.rev_edge_id(1), 0);
    }

    #[test]
    fn version_updates_clear_snapshot_flag() {
        let store: LocalStore<u64, u64> = LocalStore::create_store(1, 0, "v", "e");
        store.set_vertex_snapshot_made(0, true);
        store.increment_vertex_version(0);
        assert_eq!(store.vertex_version(0), 1);
        assert!(!store.vertex_snapshot_made(0));
    }

    #[test]
    fn conditional_update_respects_versions() {
        let store: LocalStore<u64, u64> = LocalStore::create_store(1, 0, "v", "e");
        store.set_vertex_version(0, 5);
        store.conditional_update_vertex(0, 77, 4);
        assert_eq!(store.vertex_version(0), 5);
        assert_eq!(store.vertex_data(0), 0);

        store.set_vertex_modified(0, true);
        store.conditional_update_vertex(0, 99, 6);
        assert_eq!(store.vertex_version(0), 6);
        assert_eq!(store.vertex_data(0), 99);
        assert!(!store.vertex_modified(0));
    }

    #[test]
    fn edge_versions_and_flags() {
        let mut store: LocalStore<u64, u64> = LocalStore::create_store(2, 1, "v", "e");
        store.add_edge(0, 0, 1);
        store.finalize();

        store.set_edge_snapshot_made(0, true);
        assert!(store.edge_snapshot_made(0));
        store.increment_edge_version(0);
        assert_eq!(store.edge_version(0), 1);
        assert!(!store.edge_snapshot_made(0));

        store.set_edge_modified(0, true);
        assert!(store.edge_modified(0));
        store.conditional_update_edge(0, 42, 3);
        assert_eq!(store.edge_data(0), 42);
        assert_eq!(store.edge_version(0), 3);
        assert!(!store.edge_modified(0));
        assert_eq!(store.edge_version_by_pair(0, 1), 3);

        store.increment_and_update_edge(0, 43);
        assert_eq!(store.edge_version(0), 4);
        assert_eq!(store.edge_data(0), 43);
    }

    #[test]
    fn increment_and_update_bumps_version() {
        let store: LocalStore<u64, u64> = LocalStore::create_store(2, 1, "v", "e");
        store.increment_and_update_vertex(1, 7);
        store.increment_and_update_vertex(1, 8);
        assert_eq!(store.vertex_version(1), 2);
        assert_eq!(store.vertex_data(1), 8);
    }

    #[test]
    #[should_panic(expected = "self edge")]
    fn self_loops_are_fatal() {
        let mut store: LocalStore<(), ()> = LocalStore::create_store(2, 1, "v", "e");
        store.add_edge(0, 1, 1);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_vertex_is_fatal() {
        let store: LocalStore<u64, u64> = LocalStore::create_store(1, 0, "v", "e");
        store.vertex_data(1);
    }

    #[test]
    fn empty_store_finalizes() {
        let mut store: LocalStore<(), ()> = LocalStore::create_store(0, 0, "v", "e");
        store.finalize();
        assert_eq!(store.num_vertices(), 0);
        assert_eq!(store.num_edges(), 0);
    }

    #[test]
    fn clear_bumps_changeid() {
        let mut store = diamond();
        assert_eq!(store.changeid(), 0);
        store.clear();
        assert_eq!(store.changeid(), 1);
        assert_eq!(store.num_vertices(), 0);
    }
}
