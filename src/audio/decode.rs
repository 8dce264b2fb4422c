//! PCM chunk decoding for the two capture wire formats
//!
//! Both decoders take a raw byte chunk of interleaved stereo pairs and
//! produce mono samples. A trailing incomplete pair (odd sample count or
//! partial sample bytes) is dropped silently; the reader keeps any
//! dangling bytes for the next chunk.

/// Full-scale divisor for signed 16-bit samples
const S16_FULL_SCALE: f32 = 32768.0;

/// Decode interleaved S16LE stereo into mono samples: normalize each
/// channel by full scale, mix `(L + R) / 2`.
pub fn decode_s16le_stereo(chunk: &[u8]) -> Vec<f32> {
    let mut out = Vec::with_capacity(chunk.len() / 4);

    // 4 bytes per stereo pair; partial trailing bytes are ignored
    for pair in chunk.chunks_exact(4) {
        let l = i16::from_le_bytes([pair[0], pair[1]]) as f32 / S16_FULL_SCALE;
        let r = i16::from_le_bytes([pair[2], pair[3]]) as f32 / S16_FULL_SCALE;
        out.push((l + r) * 0.5);
    }

    out
}

/// Decode interleaved F32LE stereo into mono samples.
pub fn decode_f32le_stereo(chunk: &[u8]) -> Vec<f32> {
    let mut out = Vec::with_capacity(chunk.len() / 8);

    // 8 bytes per stereo pair
    for pair in chunk.chunks_exact(8) {
        let l = f32::from_le_bytes([pair[0], pair[1], pair[2], pair[3]]);
        let r = f32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]);
        out.push((l + r) * 0.5);
    }

    out
}

/// Number of complete bytes consumed by a decoder for a chunk of this
/// length, given the stereo pair size in bytes. Used by stream readers
/// to carry the remainder into the next read.
pub fn consumed_bytes(chunk_len: usize, pair_bytes: usize) -> usize {
    (chunk_len / pair_bytes) * pair_bytes
}
