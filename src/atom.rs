//! Atom files and the atom index.
//!
//! Atoms are persisted graph shards produced by the external partitioner.
//! Each atom carries three sections that can be materialized in stages: the
//! identifier maps, the structural records, and the payload blobs. An empty
//! global-edge-id list signals canonical edge numbering for the whole load.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{QuiverError, Result};
use crate::types::{EdgeId, VertexId};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct IdMapSection {
    global_vids: Vec<VertexId>,
    global_eids: Vec<EdgeId>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StructureSection {
    /// Atom-local `(source, target)` index pairs, parallel to the global
    /// edge ids (when those exist).
    edge_src_dest: Vec<(u32, u32)>,
    /// For each atom-local vertex, the atom it actually belongs to; differs
    /// from this atom for boundary vertices.
    atom: Vec<u32>,
    vcolor: Vec<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct DataSection<V, E> {
    vdata: Vec<V>,
    edata: Vec<E>,
}

/// Fully assembled content of one atom, used by writers (the partitioner,
/// test fixtures) to produce an atom file.
#[derive(Clone, Debug, Default)]
pub struct AtomContent<V, E> {
    pub global_vids: Vec<VertexId>,
    pub global_eids: Vec<EdgeId>,
    pub edge_src_dest: Vec<(u32, u32)>,
    pub atom: Vec<u32>,
    pub vcolor: Vec<u32>,
    pub vdata: Vec<V>,
    pub edata: Vec<E>,
}

impl<V: Serialize, E: Serialize> AtomContent<V, E> {
    /// Writes the three sections in load order.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        let id_maps = IdMapSection {
            global_vids: self.global_vids.clone(),
            global_eids: self.global_eids.clone(),
        };
        let structure = StructureSection {
            edge_src_dest: self.edge_src_dest.clone(),
            atom: self.atom.clone(),
            vcolor: self.vcolor.clone(),
        };
        let data = DataSectionRef { vdata: &self.vdata, edata: &self.edata };
        bincode::serialize_into(&mut writer, &id_maps)
            .and_then(|_| bincode::serialize_into(&mut writer, &structure))
            .and_then(|_| bincode::serialize_into(&mut writer, &data))
            .map_err(|err| QuiverError::Serialization(err.to_string()))?;
        writer.flush()?;
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize)]
struct DataSectionRef<'a, V, E> {
    vdata: &'a [V],
    edata: &'a [E],
}

/// Staged reader over one atom file.
pub struct AtomFile<V, E> {
    path: PathBuf,
    id_maps: IdMapSection,
    structure: StructureSection,
    data: DataSection<V, E>,
}

impl<V, E> AtomFile<V, E>
where
    V: DeserializeOwned + Default,
    E: DeserializeOwned + Default,
{
    /// Opens an atom by protocol and path. Only the `file` protocol is
    /// understood here; other protocols belong to external adapters.
    pub fn open(protocol: &str, path: impl Into<PathBuf>) -> Result<Self> {
        if protocol != "file" {
            return Err(QuiverError::Bootstrap(format!(
                "unsupported atom protocol `{protocol}`"
            )));
        }
        Ok(Self {
            path: path.into(),
            id_maps: IdMapSection::default(),
            structure: StructureSection::default(),
            data: DataSection::default(),
        })
    }

    /// Materializes the identifier maps.
    pub fn load_id_maps(&mut self) -> Result<()> {
        let mut reader = self.reader()?;
        self.id_maps = Self::next_section(&mut reader, "id maps")?;
        trace!(
            path = %self.path.display(),
            vertices = self.id_maps.global_vids.len(),
            "atom.load_id_maps"
        );
        Ok(())
    }

    /// Materializes identifier maps and structural records.
    pub fn load_structure(&mut self) -> Result<()> {
        let mut reader = self.reader()?;
        self.id_maps = Self::next_section(&mut reader, "id maps")?;
        self.structure = Self::next_section(&mut reader, "structure")?;
        self.validate_structure()?;
        trace!(
            path = %self.path.display(),
            edges = self.structure.edge_src_dest.len(),
            "atom.load_structure"
        );
        Ok(())
    }

    /// Materializes every section.
    pub fn load_all(&mut self) -> Result<()> {
        let mut reader = self.reader()?;
        self.id_maps = Self::next_section(&mut reader, "id maps")?;
        self.structure = Self::next_section(&mut reader, "structure")?;
        self.data = Self::next_section(&mut reader, "data")?;
        self.validate_structure()?;
        if self.data.vdata.len() != self.id_maps.global_vids.len() {
            return Err(QuiverError::Corruption(format!(
                "atom {}: {} vertex payloads for {} vertices",
                self.path.display(),
                self.data.vdata.len(),
                self.id_maps.global_vids.len()
            )));
        }
        if self.data.edata.len() != self.structure.edge_src_dest.len() {
            return Err(QuiverError::Corruption(format!(
                "atom {}: {} edge payloads for {} edges",
                self.path.display(),
                self.data.edata.len(),
                self.structure.edge_src_dest.len()
            )));
        }
        Ok(())
    }

    /// Releases all materialized sections.
    pub fn clear(&mut self) {
        self.id_maps = IdMapSection::default();
        self.structure = StructureSection::default();
        self.data = DataSection::default();
    }

    pub fn global_vids(&self) -> &[VertexId] {
        &self.id_maps.global_vids
    }

    /// Empty iff the load runs under canonical edge numbering.
    pub fn global_eids(&self) -> &[EdgeId] {
        &self.id_maps.global_eids
    }

    pub fn edge_src_dest(&self) -> &[(u32, u32)] {
        &self.structure.edge_src_dest
    }

    pub fn atom(&self) -> &[u32] {
        &self.structure.atom
    }

    pub fn vcolor(&self) -> &[u32] {
        &self.structure.vcolor
    }

    pub fn vdata(&self) -> &[V] {
        &self.data.vdata
    }

    pub fn edata(&self) -> &[E] {
        &self.data.edata
    }

    fn reader(&self) -> Result<BufReader<File>> {
        Ok(BufReader::new(File::open(&self.path)?))
    }

    fn next_section<T: DeserializeOwned>(reader: &mut BufReader<File>, what: &str) -> Result<T> {
        bincode::deserialize_from(reader)
            .map_err(|err| QuiverError::Corruption(format!("atom {what} section: {err}")))
    }

    fn validate_structure(&self) -> Result<()> {
        let nverts = self.id_maps.global_vids.len();
        if self.structure.atom.len() != nverts || self.structure.vcolor.len() != nverts {
            return Err(QuiverError::Corruption(format!(
                "atom {}: vertex sections disagree on length",
                self.path.display()
            )));
        }
        if !self.id_maps.global_eids.is_empty()
            && self.id_maps.global_eids.len() != self.structure.edge_src_dest.len()
        {
            return Err(QuiverError::Corruption(format!(
                "atom {}: {} global edge ids for {} edges",
                self.path.display(),
                self.id_maps.global_eids.len(),
                self.structure.edge_src_dest.len()
            )));
        }
        Ok(())
    }
}

/// One line of the atom index: how to reach an atom.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AtomEntry {
    pub protocol: String,
    pub path: String,
}

/// Descriptor of the whole partitioned graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AtomIndex {
    pub atoms: Vec<AtomEntry>,
    pub nverts: usize,
    pub nedges: usize,
}

impl AtomIndex {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .map_err(|err| QuiverError::Serialization(err.to_string()))
    }
}

/// Reads and validates an atom index file.
pub fn read_atom_index(path: impl AsRef<Path>) -> Result<AtomIndex> {
    let file = File::open(path.as_ref())?;
    let index: AtomIndex = serde_json::from_reader(BufReader::new(file))
        .map_err(|err| QuiverError::Bootstrap(format!("malformed atom index: {err}")))?;
    if index.atoms.is_empty() && (index.nverts > 0 || index.nedges > 0) {
        return Err(QuiverError::Bootstrap(
            "atom index lists no atoms for a non-empty graph".into(),
        ));
    }
    Ok(index)
}
