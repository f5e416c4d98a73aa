//! Binary save/load of an [`HnswGraph`].
//!
//! # File Layout (little endian)
//!
//! ```text
//! magic          8 bytes  "PSMHNSW\0"
//! version        u32      FORMAT_VERSION
//! dimension      u32
//! metric         u8       0 = inner product, 1 = euclidean
//! M              u32
//! ef_construction u32
//! ef_search      u32
//! level cap      u32
//! seed           u64
//! rng state      u64
//! node count     u64
//! entry point    u64      u64::MAX when empty
//! max level      u32
//! per node:
//!   id           u64
//!   vector       dimension × f32
//!   level count  u32
//!   per level:   u32 count, then count × u32 neighbor ids
//! ```
//!
//! Loading validates everything before returning; a malformed file yields
//! `IndexCorrupted` and never a partial graph.

use super::graph::{HnswGraph, MAX_DIMENSION};
use super::node::{Neighbor, Node, NodeId};
use super::params::HnswParams;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

/// File magic.
pub const MAGIC: [u8; 8] = *b"PSMHNSW\0";

/// Current on-disk format version.
pub const FORMAT_VERSION: u32 = 1;

const NO_ENTRY_POINT: u64 = u64::MAX;

// Caps pre-allocation so a corrupted count cannot trigger a huge allocation.
const MAX_PREALLOC: usize = 1 << 20;

/// Serializes `graph` into `writer`.
pub fn save<W: Write>(graph: &HnswGraph, mut writer: W) -> Result<()> {
    let params = graph.params;

    writer.write_all(&MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(graph.dimension as u32).to_le_bytes())?;
    writer.write_all(&[graph.metric.as_u8()])?;
    writer.write_all(&(params.max_connections as u32).to_le_bytes())?;
    writer.write_all(&(params.ef_construction as u32).to_le_bytes())?;
    writer.write_all(&(params.ef_search as u32).to_le_bytes())?;
    writer.write_all(&(params.max_level as u32).to_le_bytes())?;
    writer.write_all(&params.seed.to_le_bytes())?;
    writer.write_all(&graph.rng_state.to_le_bytes())?;
    writer.write_all(&(graph.nodes.len() as u64).to_le_bytes())?;
    let entry = graph.entry_point.map_or(NO_ENTRY_POINT, |ep| ep as u64);
    writer.write_all(&entry.to_le_bytes())?;
    writer.write_all(&(graph.max_level as u32).to_le_bytes())?;

    for (id, node) in graph.nodes.iter().enumerate() {
        writer.write_all(&(id as u64).to_le_bytes())?;
        for &component in &node.vector {
            writer.write_all(&component.to_le_bytes())?;
        }
        writer.write_all(&(node.links.len() as u32).to_le_bytes())?;
        for links in &node.links {
            writer.write_all(&(links.len() as u32).to_le_bytes())?;
            for neighbor in links {
                writer.write_all(&(neighbor.id as u32).to_le_bytes())?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Serializes `graph` into a byte vector.
pub fn to_bytes(graph: &HnswGraph) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    save(graph, &mut buf)?;
    Ok(buf)
}

/// Saves `graph` to `path` atomically (temporary sibling file, then rename).
pub fn save_to_path<P: AsRef<Path>>(graph: &HnswGraph, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).ok_or_else(|| {
        Error::Io(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("not a file path: {}", path.display()),
        ))
    })?;
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        save(graph, &mut writer)?;
        writer.get_ref().sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;

    tracing::info!(
        path = %path.display(),
        nodes = graph.len(),
        "Saved HNSW index"
    );
    Ok(())
}

/// Loads a graph from `reader`.
///
/// # Errors
///
/// `IndexCorrupted` for any header, count, or reference inconsistency
/// (including truncation and trailing bytes), `Io` for other read failures.
pub fn load<R: Read>(reader: R) -> Result<HnswGraph> {
    let mut r = FieldReader { inner: reader };

    let mut magic = [0u8; 8];
    r.read_exact(&mut magic, "magic")?;
    if magic != MAGIC {
        return Err(Error::corrupted("bad magic header"));
    }
    let version = r.u32("version")?;
    if version != FORMAT_VERSION {
        return Err(Error::corrupted(format!(
            "unsupported format version {version} (expected {FORMAT_VERSION})"
        )));
    }

    let dimension = r.u32("dimension")? as usize;
    if dimension == 0 || dimension > MAX_DIMENSION {
        return Err(Error::corrupted(format!("invalid dimension {dimension}")));
    }
    let metric_tag = r.u8("metric")?;
    let metric = DistanceMetric::from_u8(metric_tag)
        .ok_or_else(|| Error::corrupted(format!("unknown metric tag {metric_tag}")))?;

    let params = HnswParams {
        max_connections: r.u32("max_connections")? as usize,
        ef_construction: r.u32("ef_construction")? as usize,
        ef_search: r.u32("ef_search")? as usize,
        max_level: r.u32("max_level")? as usize,
        seed: r.u64("seed")?,
    };
    params
        .validate()
        .map_err(|e| Error::corrupted(format!("invalid parameters: {e}")))?;

    let rng_state = r.u64("rng state")?;
    if rng_state == 0 {
        return Err(Error::corrupted("zero level generator state"));
    }

    let count = r.u64("node count")?;
    if count > u64::from(u32::MAX) {
        return Err(Error::corrupted(format!("node count {count} too large")));
    }
    let count = count as usize;
    let entry = r.u64("entry point")?;
    let max_level = r.u32("max level")? as usize;

    let entry_point = if count == 0 {
        if entry != NO_ENTRY_POINT || max_level != 0 {
            return Err(Error::corrupted("empty index with an entry point"));
        }
        None
    } else {
        if entry >= count as u64 {
            return Err(Error::corrupted(format!(
                "entry point {entry} outside {count} nodes"
            )));
        }
        Some(entry as NodeId)
    };

    let mut nodes: Vec<Node> = Vec::with_capacity(count.min(MAX_PREALLOC));
    for expected_id in 0..count {
        let id = r.u64("node id")?;
        if id != expected_id as u64 {
            return Err(Error::corrupted(format!(
                "node id {id} out of sequence (expected {expected_id})"
            )));
        }

        let mut vector = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            let component = r.f32("vector component")?;
            if !component.is_finite() {
                return Err(Error::corrupted(format!("node {id} has a non-finite component")));
            }
            vector.push(component);
        }

        let level_count = r.u32("level count")? as usize;
        if level_count == 0 || level_count > params.max_level + 1 {
            return Err(Error::corrupted(format!(
                "node {id} has {level_count} levels (cap {})",
                params.max_level + 1
            )));
        }

        let mut links = Vec::with_capacity(level_count);
        for level in 0..level_count {
            let n = r.u32("neighbor count")? as usize;
            if n > params.capacity(level) {
                return Err(Error::corrupted(format!(
                    "node {id} has {n} neighbors at level {level} (capacity {})",
                    params.capacity(level)
                )));
            }
            let mut list = Vec::with_capacity(n);
            for _ in 0..n {
                let neighbor = r.u32("neighbor id")? as usize;
                if neighbor >= count || neighbor == expected_id {
                    return Err(Error::corrupted(format!(
                        "node {id} references invalid neighbor {neighbor} at level {level}"
                    )));
                }
                list.push(Neighbor {
                    id: neighbor,
                    distance: 0.0,
                });
            }
            links.push(list);
        }
        nodes.push(Node { vector, links });
    }

    if r.has_trailing_bytes()? {
        return Err(Error::corrupted("trailing bytes after last node"));
    }

    verify_structure(&nodes, entry_point, max_level)?;

    // Cached distances are not persisted
    for i in 0..nodes.len() {
        for level in 0..nodes[i].links.len() {
            for j in 0..nodes[i].links[level].len() {
                let target = nodes[i].links[level][j].id;
                let distance = metric.distance(&nodes[i].vector, &nodes[target].vector);
                nodes[i].links[level][j].distance = distance;
            }
        }
    }

    tracing::debug!(nodes = count, dimension, %metric, max_level, "Loaded HNSW index");

    Ok(HnswGraph {
        dimension,
        metric,
        params,
        nodes,
        entry_point,
        max_level,
        rng_state,
    })
}

/// Loads a graph from a byte slice.
pub fn from_bytes(bytes: &[u8]) -> Result<HnswGraph> {
    load(bytes)
}

/// Loads a graph from `path`.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<HnswGraph> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let graph = load(BufReader::new(file))?;
    tracing::info!(
        path = %path.display(),
        nodes = graph.len(),
        dimension = graph.dimension,
        "Loaded HNSW index"
    );
    Ok(graph)
}

/// Checks cross-node invariants that can only be verified once all nodes are read.
fn verify_structure(nodes: &[Node], entry_point: Option<NodeId>, max_level: usize) -> Result<()> {
    let highest = nodes.iter().map(Node::level).max().unwrap_or(0);
    if highest != max_level {
        return Err(Error::corrupted(format!(
            "header max level {max_level} but highest node level is {highest}"
        )));
    }

    if let Some(ep) = entry_point {
        if nodes[ep].level() != max_level {
            return Err(Error::corrupted(format!(
                "entry point {ep} is not on max level {max_level}"
            )));
        }
    }

    for (id, node) in nodes.iter().enumerate() {
        for (level, links) in node.links.iter().enumerate() {
            if let Some(bad) = links.iter().find(|n| nodes[n.id].level() < level) {
                return Err(Error::corrupted(format!(
                    "node {id} links to node {} which is absent from level {level}",
                    bad.id
                )));
            }
        }
    }
    Ok(())
}

struct FieldReader<R> {
    inner: R,
}

impl<R: Read> FieldReader<R> {
    fn read_exact(&mut self, buf: &mut [u8], field: &str) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                Error::corrupted(format!("truncated while reading {field}"))
            } else {
                Error::Io(e)
            }
        })
    }

    fn u8(&mut self, field: &str) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf, field)?;
        Ok(buf[0])
    }

    fn u32(&mut self, field: &str) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf, field)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn u64(&mut self, field: &str) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf, field)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn f32(&mut self, field: &str) -> Result<f32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf, field)?;
        Ok(f32::from_le_bytes(buf))
    }

    fn has_trailing_bytes(&mut self) -> Result<bool> {
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(n) => return Ok(n > 0),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }
}
