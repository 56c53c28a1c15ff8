//! Archive round-trip for the local store.
//!
//! The archive is self-describing: counts, edge structure, adjacency,
//! coloring and the finalized flag come first, followed by the full vertex
//! and edge record blocks with every version and flag preserved.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::AtomicU32;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{QuiverError, Result};
use crate::types::Leid;

use super::record::{EdgeRecord, Endpoints, VertexRecord};
use super::LocalStore;

#[derive(Serialize, Deserialize)]
struct StoreArchive<V, E> {
    num_vertices: usize,
    num_edges: usize,
    endpoints: Vec<Endpoints>,
    in_adj: Vec<Vec<Leid>>,
    out_adj: Vec<Vec<Leid>>,
    colors: Vec<u32>,
    finalized: bool,
    vertices: Vec<VertexRecord<V>>,
    edges: Vec<EdgeRecord<E>>,
}

impl<V, E> LocalStore<V, E>
where
    V: Clone + Default + Serialize + DeserializeOwned,
    E: Clone + Default + Serialize + DeserializeOwned,
{
    /// Writes the whole store, records included, to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let archive = StoreArchive {
            num_vertices: self.num_vertices(),
            num_edges: self.num_edges(),
            endpoints: self.endpoints.clone(),
            in_adj: self.in_adj.clone(),
            out_adj: self.out_adj.clone(),
            colors: self.colors.iter().map(|c| c.load(std::sync::atomic::Ordering::Relaxed)).collect(),
            finalized: self.finalized,
            vertices: self.vertices.iter().map(|record| record.lock().clone()).collect(),
            edges: self.edges.iter().map(|record| record.lock().clone()).collect(),
        };
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, &archive)
            .map_err(|err| QuiverError::Serialization(err.to_string()))?;
        writer.flush()?;
        trace!(
            vertices = archive.num_vertices,
            edges = archive.num_edges,
            "local_store.save"
        );
        Ok(())
    }

    /// Reads a store previously written by [`LocalStore::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let archive: StoreArchive<V, E> = bincode::deserialize_from(std::io::BufReader::new(file))
            .map_err(|err| QuiverError::Serialization(err.to_string()))?;
        if archive.vertices.len() != archive.num_vertices
            || archive.colors.len() != archive.num_vertices
            || archive.in_adj.len() != archive.num_vertices
            || archive.out_adj.len() != archive.num_vertices
        {
            return Err(QuiverError::Corruption(
                "archive vertex sections disagree on length".into(),
            ));
        }
        if archive.edges.len() != archive.num_edges || archive.endpoints.len() != archive.num_edges {
            return Err(QuiverError::Corruption(
                "archive edge sections disagree on length".into(),
            ));
        }
        trace!(
            vertices = archive.num_vertices,
            edges = archive.num_edges,
            "local_store.load"
        );
        Ok(Self {
            vertices: archive.vertices.into_iter().map(Mutex::new).collect(),
            edges: archive.edges.into_iter().map(Mutex::new).collect(),
            endpoints: archive.endpoints,
            in_adj: archive.in_adj,
            out_adj: archive.out_adj,
            colors: archive.colors.into_iter().map(AtomicU32::new).collect(),
            finalized: archive.finalized,
            changeid: 0,
            vertex_store_hint: Default::default(),
            edge_store_hint: Default::default(),
        })
    }
}

impl<V: Clone + Default, E: Clone + Default> LocalStore<V, E> {
    /// Dumps the adjacency structure as `source, target` text lines.
    pub fn save_adjacency(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        for Endpoints { source, target } in &self.endpoints {
            writeln!(writer, "{source}, {target}")?;
        }
        writer.flush()?;
        Ok(())
    }
}
