//! Resampling/encoding engine.
//!
//! Normalizes an arbitrary-format recording into a mono, 16 kHz, 16-bit PCM
//! WAV payload so large captures shrink below backend transport limits.
//! Encoding is a best-effort optimization: any decode or resample failure
//! falls back to the original bytes with a logged warning and never fails
//! the pipeline.

use tracing::{debug, info, warn};

use crate::protocol::{EncodedPayload, RawRecording};

mod decode;

pub use decode::DecodeError;

/// Recordings below this size are transmitted as-is; re-encoding them
/// costs CPU without a meaningful payload reduction.
pub const REENCODE_THRESHOLD_BYTES: usize = 10 * 1024 * 1024;

/// Sample rate of re-encoded payloads.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Size of the RIFF/WAVE header emitted by [`write_wav`].
pub const WAV_HEADER_LEN: usize = 44;

/// Normalize a recording for transmission.
///
/// Inputs below `threshold` bytes pass through byte-identical. Larger
/// inputs are decoded, downmixed to one channel, resampled to 16 kHz and
/// re-packed as PCM WAV. The original bytes are returned unchanged if
/// decoding fails or if re-encoding would not shrink the payload.
pub fn encode_recording(raw: RawRecording, threshold: usize) -> EncodedPayload {
    if raw.len() < threshold {
        debug!(
            bytes = raw.len(),
            threshold, "Recording below re-encode threshold, passing through"
        );
        return EncodedPayload::passthrough(raw);
    }

    match decode::decode_to_mono_16k(&raw.bytes, &raw.media_type) {
        Ok(samples) => {
            let wav = write_wav(&samples, TARGET_SAMPLE_RATE);
            if wav.len() >= raw.len() {
                debug!(
                    original = raw.len(),
                    encoded = wav.len(),
                    "Re-encoding did not shrink the payload, passing original through"
                );
                return EncodedPayload::passthrough(raw);
            }

            info!(
                original = raw.len(),
                encoded = wav.len(),
                media_type = %raw.media_type,
                "Re-encoded recording to 16 kHz mono PCM"
            );
            EncodedPayload::reencoded(wav, raw.len())
        }
        Err(err) => {
            warn!(
                error = %err,
                media_type = %raw.media_type,
                "Audio re-encode failed, passing original bytes through"
            );
            EncodedPayload::passthrough(raw)
        }
    }
}

/// Pack 16-bit samples into a self-describing WAV container: the fixed
/// 44-byte RIFF/WAVE header followed by little-endian samples.
pub fn write_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS_PER_SAMPLE: u16 = 16;

    let data_size = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * CHANNELS as u32 * (BITS_PER_SAMPLE / 8) as u32;
    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + data_size as usize);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt subchunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data subchunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_header_is_bit_exact() {
        let wav = write_wav(&[0, 1, -1, i16::MAX], 16_000);

        assert_eq!(wav.len(), WAV_HEADER_LEN + 8);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 8);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes(wav[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(wav[20..22].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(wav[22..24].try_into().unwrap()), 1);
        assert_eq!(
            u32::from_le_bytes(wav[24..28].try_into().unwrap()),
            16_000
        );
        assert_eq!(
            u32::from_le_bytes(wav[28..32].try_into().unwrap()),
            32_000
        );
        assert_eq!(u16::from_le_bytes(wav[32..34].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(wav[34..36].try_into().unwrap()), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32::from_le_bytes(wav[40..44].try_into().unwrap()), 8);

        // Little-endian samples follow the header.
        assert_eq!(i16::from_le_bytes(wav[44..46].try_into().unwrap()), 0);
        assert_eq!(i16::from_le_bytes(wav[46..48].try_into().unwrap()), 1);
        assert_eq!(i16::from_le_bytes(wav[48..50].try_into().unwrap()), -1);
        assert_eq!(
            i16::from_le_bytes(wav[50..52].try_into().unwrap()),
            i16::MAX
        );
    }

    #[test]
    fn test_small_recording_passes_through_unchanged() {
        let bytes: Vec<u8> = (0..255).collect();
        let raw = RawRecording::new(bytes.clone(), "audio/webm");

        let payload = encode_recording(raw, REENCODE_THRESHOLD_BYTES);

        assert_eq!(payload.bytes, bytes);
        assert_eq!(payload.media_type, "audio/webm");
        assert!(!payload.was_reencoded);
    }

    #[test]
    fn test_undecodable_recording_falls_back_to_original() {
        // Large enough to trigger re-encoding, but not decodable audio.
        let bytes = vec![0x42u8; REENCODE_THRESHOLD_BYTES + 1];
        let raw = RawRecording::new(bytes.clone(), "audio/webm");

        let payload = encode_recording(raw, REENCODE_THRESHOLD_BYTES);

        assert_eq!(payload.bytes, bytes);
        assert!(!payload.was_reencoded);
    }

    #[test]
    fn test_large_wav_is_reencoded_and_shrinks() {
        // Stereo 44.1 kHz source: re-encoding to mono 16 kHz must shrink it.
        let frames = 6 * 44_100;
        let mut samples = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let s = (((i % 100) as i32) - 50) as i16;
            samples.push(s);
            samples.push(-s);
        }
        let wav = stereo_wav(&samples, 44_100);
        let original_len = wav.len();
        let raw = RawRecording::new(wav, "audio/wav");

        let payload = encode_recording(raw, original_len);

        assert!(payload.was_reencoded);
        assert!(payload.len() < original_len);
        assert_eq!(payload.media_type, "audio/wav");
        assert_eq!(payload.original_len, original_len);
        assert_eq!(&payload.bytes[0..4], b"RIFF");
        // Mono target: block align of 2 bytes at offset 32.
        assert_eq!(
            u16::from_le_bytes(payload.bytes[32..34].try_into().unwrap()),
            2
        );
        assert_eq!(
            u32::from_le_bytes(payload.bytes[24..28].try_into().unwrap()),
            TARGET_SAMPLE_RATE
        );
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let frames = 44_100;
        let samples: Vec<i16> = (0..frames * 2).map(|i| (i % 331) as i16).collect();
        let wav = stereo_wav(&samples, 44_100);

        let a = encode_recording(RawRecording::new(wav.clone(), "audio/wav"), wav.len());
        let b = encode_recording(RawRecording::new(wav.clone(), "audio/wav"), wav.len());

        assert_eq!(a.bytes, b.bytes);
    }

    /// Interleaved stereo WAV fixture for decode tests.
    fn stereo_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
        let data_size = (samples.len() * 2) as u32;
        let mut wav = Vec::with_capacity(44 + data_size as usize);
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_size).to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&sample_rate.to_le_bytes());
        wav.extend_from_slice(&(sample_rate * 4).to_le_bytes());
        wav.extend_from_slice(&4u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_size.to_le_bytes());
        for sample in samples {
            wav.extend_from_slice(&sample.to_le_bytes());
        }
        wav
    }
}
