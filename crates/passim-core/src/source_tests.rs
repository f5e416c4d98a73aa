//! Tests for `source` module

#![allow(clippy::cast_precision_loss)]

use crate::error::Error;
use crate::source::*;

fn rows(n: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..n)
        .map(|i| (0..dim).map(|j| (i * dim + j) as f32).collect())
        .collect()
}

fn fvecs_bytes(vectors: &[Vec<f32>]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_fvecs(&mut buf, vectors).expect("encode");
    buf
}

#[test]
fn test_memory_source_batches_in_order() {
    let mut source = MemorySource::new(3, rows(5, 3), 2).expect("source");

    let first = source.next_batch().expect("batch");
    let second = source.next_batch().expect("batch");
    let third = source.next_batch().expect("batch");

    assert_eq!(first.ids(), 0..2);
    assert_eq!(second.ids(), 2..4);
    assert_eq!(third.ids(), 4..5);
    assert_eq!(third.vectors[0], vec![12.0, 13.0, 14.0]);
    assert_eq!(source.position(), 5);
}

#[test]
fn test_memory_source_exhausted_returns_empty_batch() {
    let mut source = MemorySource::new(2, rows(2, 2), 10).expect("source");
    source.next_batch().expect("batch");

    for _ in 0..3 {
        let batch = source.next_batch().expect("empty batch, not an error");
        assert!(batch.is_empty());
        assert_eq!(batch.start_id, 2);
    }
}

#[test]
fn test_memory_source_rejects_bad_input() {
    let mut vectors = rows(3, 4);
    vectors[1].pop();

    assert!(matches!(
        MemorySource::new(4, vectors, 2),
        Err(Error::DimensionMismatch {
            expected: 4,
            actual: 3
        })
    ));
    assert!(matches!(
        MemorySource::new(4, rows(1, 4), 0),
        Err(Error::InvalidParameter(_))
    ));
    assert!(matches!(
        MemorySource::new(0, Vec::new(), 1),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn test_memory_source_skip_rows() {
    let mut source = MemorySource::new(2, rows(10, 2), 4).expect("source");

    assert_eq!(source.skip_rows(7).expect("skip"), 7);
    let batch = source.next_batch().expect("batch");

    assert_eq!(batch.ids(), 7..10);
    assert_eq!(source.skip_rows(5).expect("skip"), 0);
    assert_eq!(source.remaining(), 0);
}

#[test]
fn test_fvecs_source_reads_all_rows() {
    let vectors = rows(7, 3);
    let bytes = fvecs_bytes(&vectors);
    let mut source = FvecsSource::new(bytes.as_slice(), 3).expect("source");

    assert_eq!(source.dimension(), 3);
    let mut read = Vec::new();
    loop {
        let batch = source.next_batch().expect("batch");
        if batch.is_empty() {
            break;
        }
        assert_eq!(batch.start_id, read.len());
        read.extend(batch.vectors);
    }

    assert_eq!(read, vectors);
    assert!(source.next_batch().expect("after end").is_empty());
}

#[test]
fn test_fvecs_source_inconsistent_dimension() {
    let mut bytes = fvecs_bytes(&rows(2, 3));
    bytes.extend(fvecs_bytes(&rows(1, 2)));
    let mut source = FvecsSource::new(bytes.as_slice(), 10).expect("source");

    assert!(matches!(
        source.next_batch(),
        Err(Error::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));
}

#[test]
fn test_fvecs_source_truncated_row() {
    let mut bytes = fvecs_bytes(&rows(2, 4));
    bytes.truncate(bytes.len() - 3);
    let mut source = FvecsSource::new(bytes.as_slice(), 10).expect("source");

    assert!(matches!(source.next_batch(), Err(Error::Source(_))));
}

#[test]
fn test_fvecs_source_truncated_header() {
    let mut bytes = fvecs_bytes(&rows(1, 2));
    bytes.extend_from_slice(&[2, 0]);
    let mut source = FvecsSource::new(bytes.as_slice(), 10).expect("source");

    assert!(matches!(source.next_batch(), Err(Error::Source(msg)) if msg.contains("header")));
}

#[test]
fn test_fvecs_source_rejects_empty_and_negative_dimension() {
    assert!(matches!(
        FvecsSource::new(&b""[..], 10),
        Err(Error::Source(_))
    ));

    let bytes = (-1i32).to_le_bytes();
    assert!(matches!(
        FvecsSource::new(&bytes[..], 10),
        Err(Error::Source(_))
    ));
}

#[test]
fn test_fvecs_source_skip_rows() {
    let bytes = fvecs_bytes(&rows(6, 2));
    let mut source = FvecsSource::new(bytes.as_slice(), 10).expect("source");

    assert_eq!(source.skip_rows(4).expect("skip"), 4);
    let batch = source.next_batch().expect("batch");

    assert_eq!(batch.start_id, 4);
    assert_eq!(batch.vectors, rows(6, 2)[4..].to_vec());
}

#[test]
fn test_fvecs_open_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("vectors.fvecs");
    std::fs::write(&path, fvecs_bytes(&rows(3, 5))).expect("write");

    let mut source = FvecsSource::open(&path, 2).expect("open");

    assert_eq!(source.dimension(), 5);
    assert_eq!(source.next_batch().expect("batch").len(), 2);
}
