/// One sampled stereo instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

/// One capture cycle's worth of decoded frames. Shared read-only across
/// all analyzer consumers of that cycle.
pub type FrameBatch = Vec<Frame>;

/// One capture cycle's worth of undecoded bytes. Shared read-only across
/// all storage consumers of that cycle.
pub type RawBatch = Vec<u8>;

/// Decode little-endian interleaved (left, right) signed 16-bit pairs.
/// Trailing bytes that do not form a whole frame are dropped.
pub fn decode_frames(raw: &[u8]) -> FrameBatch {
    raw.chunks_exact(4)
        .map(|c| Frame {
            left: i16::from_le_bytes([c[0], c[1]]),
            right: i16::from_le_bytes([c[2], c[3]]),
        })
        .collect()
}
