//! Streaming sources of embedding vectors.
//!
//! A [`VectorBatchSource`] yields fixed-dimension vectors in ordered chunks.
//! Row ids are dense and sequential from 0, and the graph built from a source
//! assigns node ids in the same order, so row `i` of the source is node `i`.
//!
//! Sources are forward-only. Once exhausted, `next_batch` keeps returning an
//! empty batch.

use crate::error::{Error, Result};
use crate::index::hnsw::NodeId;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::ops::Range;
use std::path::Path;

/// Default number of rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 200_000;

/// A contiguous chunk of source rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorBatch {
    /// Row id of the first vector in the batch.
    pub start_id: NodeId,
    /// Vectors in row order.
    pub vectors: Vec<Vec<f32>>,
}

impl VectorBatch {
    /// Number of rows in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Returns true once the source is exhausted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Row ids covered by this batch.
    #[must_use]
    pub fn ids(&self) -> Range<NodeId> {
        self.start_id..self.start_id + self.vectors.len()
    }
}

/// Forward-only stream of embedding vectors in batches.
pub trait VectorBatchSource {
    /// Dimension of every vector produced.
    fn dimension(&self) -> usize;

    /// Row id of the next vector to be produced.
    fn position(&self) -> NodeId;

    /// Returns the next batch, or an empty batch once the source is exhausted.
    fn next_batch(&mut self) -> Result<VectorBatch>;

    /// Discards up to `n` rows, returning how many were skipped.
    ///
    /// Used to resume a build from a checkpoint.
    fn skip_rows(&mut self, n: usize) -> Result<usize>;
}

/// Source over vectors already in memory.
#[derive(Debug)]
pub struct MemorySource {
    dimension: usize,
    batch_size: usize,
    position: NodeId,
    rows: std::vec::IntoIter<Vec<f32>>,
}

impl MemorySource {
    /// Creates a source over `vectors`.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for a zero dimension or batch size,
    /// `DimensionMismatch` if any vector has the wrong length.
    pub fn new(dimension: usize, vectors: Vec<Vec<f32>>, batch_size: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::invalid("dimension must be > 0"));
        }
        if batch_size == 0 {
            return Err(Error::invalid("batch_size must be > 0"));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        Ok(Self {
            dimension,
            batch_size,
            position: 0,
            rows: vectors.into_iter(),
        })
    }

    /// Rows not yet produced.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl VectorBatchSource for MemorySource {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn position(&self) -> NodeId {
        self.position
    }

    fn next_batch(&mut self) -> Result<VectorBatch> {
        let start_id = self.position;
        let vectors: Vec<Vec<f32>> = self.rows.by_ref().take(self.batch_size).collect();
        self.position += vectors.len();
        Ok(VectorBatch { start_id, vectors })
    }

    fn skip_rows(&mut self, n: usize) -> Result<usize> {
        let skipped = self.rows.by_ref().take(n).count();
        self.position += skipped;
        Ok(skipped)
    }
}

/// Source over the `.fvecs` container.
///
/// Each row is a little-endian `i32` dimension followed by that many `f32`
/// components. Every row must carry the same dimension.
pub struct FvecsSource<R> {
    reader: R,
    dimension: usize,
    batch_size: usize,
    position: NodeId,
    // Dimension prefix already consumed for the next row
    pending: Option<usize>,
    exhausted: bool,
}

impl FvecsSource<BufReader<File>> {
    /// Opens an `.fvecs` file.
    pub fn open<P: AsRef<Path>>(path: P, batch_size: usize) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), batch_size)
    }
}

impl<R: Read> FvecsSource<R> {
    /// Creates a source, reading the first row header to learn the dimension.
    ///
    /// # Errors
    ///
    /// `Source` if the stream is empty or the first header is invalid,
    /// `InvalidParameter` for a zero batch size.
    pub fn new(mut reader: R, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::invalid("batch_size must be > 0"));
        }
        let dimension = read_row_header(&mut reader, 0)?
            .ok_or_else(|| Error::Source("empty vector file".to_string()))?;

        Ok(Self {
            reader,
            dimension,
            batch_size,
            position: 0,
            pending: Some(dimension),
            exhausted: false,
        })
    }

    fn next_row(&mut self) -> Result<Option<Vec<f32>>> {
        if self.exhausted {
            return Ok(None);
        }
        let row = self.position;
        let dim = match self.pending.take() {
            Some(dim) => dim,
            None => match read_row_header(&mut self.reader, row)? {
                Some(dim) => dim,
                None => {
                    self.exhausted = true;
                    return Ok(None);
                }
            },
        };
        if dim != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: dim,
            });
        }

        let mut bytes = vec![0u8; dim * 4];
        self.reader.read_exact(&mut bytes).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                Error::Source(format!("row {row} truncated"))
            } else {
                Error::Io(e)
            }
        })?;
        let vector = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        self.position += 1;
        Ok(Some(vector))
    }
}

impl<R: Read> VectorBatchSource for FvecsSource<R> {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn position(&self) -> NodeId {
        self.position
    }

    fn next_batch(&mut self) -> Result<VectorBatch> {
        let start_id = self.position;
        let mut vectors = Vec::with_capacity(self.batch_size.min(4096));
        while vectors.len() < self.batch_size {
            match self.next_row()? {
                Some(v) => vectors.push(v),
                None => break,
            }
        }
        Ok(VectorBatch { start_id, vectors })
    }

    fn skip_rows(&mut self, n: usize) -> Result<usize> {
        let mut skipped = 0;
        while skipped < n && self.next_row()?.is_some() {
            skipped += 1;
        }
        Ok(skipped)
    }
}

/// Reads a row's dimension prefix. `None` on a clean end of stream.
fn read_row_header<R: Read>(reader: &mut R, row: NodeId) -> Result<Option<usize>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Io(e)),
        }
    }
    match filled {
        0 => Ok(None),
        4 => {
            let dim = i32::from_le_bytes(buf);
            if dim <= 0 {
                return Err(Error::Source(format!("row {row} has invalid dimension {dim}")));
            }
            Ok(Some(dim as usize))
        }
        _ => Err(Error::Source(format!("row {row} header truncated"))),
    }
}

/// Encodes vectors in the `.fvecs` layout.
pub fn write_fvecs<W: std::io::Write>(mut writer: W, vectors: &[Vec<f32>]) -> Result<()> {
    for v in vectors {
        let dim = i32::try_from(v.len())
            .map_err(|_| Error::invalid(format!("vector too long: {}", v.len())))?;
        writer.write_all(&dim.to_le_bytes())?;
        for x in v {
            writer.write_all(&x.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}
