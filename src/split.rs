//! Chunk splitter.
//!
//! Partitions an encoded payload into backend-size-compliant slices.
//! Splitting is pure: no I/O, and concatenating the chunks in index order
//! reconstitutes the payload byte-for-byte.

use crate::backend::TranscribeError;
use crate::protocol::{Chunk, EncodedPayload, TranscriptionMode};

/// Maximum bytes submitted per backend call, chosen below the provider's
/// 25 MiB hard request limit.
pub const MAX_CHUNK_BYTES: usize = 24 * 1024 * 1024;

/// Split a payload into consecutive chunks of at most `max_chunk_bytes`.
///
/// A payload that fits yields a single chunk; otherwise every chunk except
/// possibly the last holds exactly `max_chunk_bytes`.
pub fn split_payload(payload: &EncodedPayload, max_chunk_bytes: usize) -> Vec<Chunk<'_>> {
    if payload.len() <= max_chunk_bytes {
        return vec![Chunk {
            bytes: &payload.bytes,
            index: 0,
            total: 1,
        }];
    }

    let total = payload.len().div_ceil(max_chunk_bytes);
    payload
        .bytes
        .chunks(max_chunk_bytes)
        .enumerate()
        .map(|(index, bytes)| Chunk {
            bytes,
            index,
            total,
        })
        .collect()
}

/// Split a payload for the given transcription mode.
///
/// The diarizing backend processes a whole payload in one call, so a
/// payload that would need more than one chunk is a configuration error
/// rather than something to silently truncate.
pub fn split_for_mode(
    payload: &EncodedPayload,
    max_chunk_bytes: usize,
    mode: TranscriptionMode,
) -> Result<Vec<Chunk<'_>>, TranscribeError> {
    if mode == TranscriptionMode::Diarized && payload.len() > max_chunk_bytes {
        return Err(TranscribeError::ChunkingUnsupported {
            payload_bytes: payload.len(),
            max_bytes: max_chunk_bytes,
        });
    }
    Ok(split_payload(payload, max_chunk_bytes))
}
