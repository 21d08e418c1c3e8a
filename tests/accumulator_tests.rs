// Integration tests for chunk accumulation and finalize
//
// These tests verify that finalize concatenates chunks in arrival order,
// reports empty sessions, and yields to the scheduler on long sessions.

use anyhow::Result;
use bytes::Bytes;
use lecture_recorder::audio::{Chunk, ChunkAccumulator, FinalizeConfig};
use lecture_recorder::RecorderError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn chunk(sequence: u64, len: usize) -> Chunk {
    let data: Vec<u8> = (0..len).map(|i| (sequence as usize * 31 + i) as u8).collect();
    Chunk {
        sequence,
        data: Bytes::from(data),
        captured_at_ms: sequence * 1000,
    }
}

fn filled(count: u64) -> ChunkAccumulator {
    let mut accumulator = ChunkAccumulator::new();
    for sequence in 0..count {
        // Uneven sizes so any reordering shows up in the bytes
        accumulator.append(chunk(sequence, 10 + (sequence as usize % 7)));
    }
    accumulator
}

#[tokio::test]
async fn test_finalize_concatenates_in_arrival_order() -> Result<()> {
    let mut accumulator = filled(25);
    let expected: Vec<u8> = accumulator
        .chunks()
        .iter()
        .flat_map(|c| c.data.iter().copied())
        .collect();
    let total = accumulator.total_bytes();

    let artifact = accumulator.finalize(&FinalizeConfig::default()).await?;

    assert_eq!(artifact.len(), total);
    assert_eq!(artifact.as_ref(), expected.as_slice());
    Ok(())
}

#[tokio::test]
async fn test_chunks_stay_inspectable_after_finalize() -> Result<()> {
    let mut accumulator = filled(5);
    let before: Vec<Bytes> = accumulator.chunks().iter().map(|c| c.data.clone()).collect();

    let artifact = accumulator.finalize(&FinalizeConfig::default()).await?;

    let after: Vec<Bytes> = accumulator.chunks().iter().map(|c| c.data.clone()).collect();
    assert_eq!(before, after);
    assert_eq!(accumulator.len(), 5);

    let mut offset = 0;
    for data in &after {
        assert_eq!(&artifact[offset..offset + data.len()], data.as_ref());
        offset += data.len();
    }
    Ok(())
}

#[tokio::test]
async fn test_finalize_without_chunks_is_empty_session() {
    let mut accumulator = ChunkAccumulator::new();
    let err = accumulator
        .finalize(&FinalizeConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err, RecorderError::EmptySession);
}

#[tokio::test]
async fn test_empty_chunks_are_not_stored() {
    let mut accumulator = ChunkAccumulator::new();
    accumulator.append(chunk(0, 0));
    assert!(accumulator.is_empty());
    assert_eq!(accumulator.total_bytes(), 0);
}

#[tokio::test]
async fn test_clear_drops_everything() {
    let mut accumulator = filled(10);
    assert_eq!(accumulator.len(), 10);
    assert!(accumulator.total_bytes() > 0);

    accumulator.clear();
    assert!(accumulator.is_empty());
    assert_eq!(accumulator.total_bytes(), 0);
    assert!(accumulator.chunks().is_empty());
}

/// Counts how often the scheduler got to run another task
fn spawn_counter() -> (Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
    let polls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&polls);
    let handle = tokio::spawn(async move {
        loop {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
        }
    });
    (polls, handle)
}

#[tokio::test]
async fn test_long_session_finalize_yields_and_stays_exact() -> Result<()> {
    let mut accumulator = filled(2500);
    let expected: Vec<u8> = accumulator
        .chunks()
        .iter()
        .flat_map(|c| c.data.iter().copied())
        .collect();

    let (polls, counter) = spawn_counter();
    let artifact = accumulator.finalize(&FinalizeConfig::default()).await?;
    counter.abort();

    assert!(
        polls.load(Ordering::SeqCst) > 0,
        "other tasks should run while a long session finalizes"
    );
    assert_eq!(artifact.as_ref(), expected.as_slice());
    Ok(())
}

#[tokio::test]
async fn test_short_session_finalize_runs_in_one_pass() -> Result<()> {
    let mut accumulator = filled(1000);

    let (polls, counter) = spawn_counter();
    let artifact = accumulator.finalize(&FinalizeConfig::default()).await?;
    counter.abort();

    assert_eq!(polls.load(Ordering::SeqCst), 0);
    assert_eq!(artifact.len(), accumulator.total_bytes());
    Ok(())
}

#[tokio::test]
async fn test_custom_batching_preserves_bytes() -> Result<()> {
    let config = FinalizeConfig {
        yield_threshold: 3,
        batch_size: 2,
    };
    let mut accumulator = filled(9);
    let expected: Vec<u8> = accumulator
        .chunks()
        .iter()
        .flat_map(|c| c.data.iter().copied())
        .collect();

    let artifact = accumulator.finalize(&config).await?;
    assert_eq!(artifact.as_ref(), expected.as_slice());
    Ok(())
}
