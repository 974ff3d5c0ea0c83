use crate::decoder::FrameDecoder;
use crate::types::{DecoderStats, Orientation};
use std::collections::VecDeque;

/// Marks the first byte of every binary frame.
pub const SYNC_BYTE: u8 = 0xAA;
/// Sync byte plus four little-endian f32: w, x, y, z.
pub const FRAME_SIZE: usize = 1 + 16;
/// Receive buffer cap for bytes that cannot start a frame. Past this size the
/// leading run of non-sync bytes is dropped at once.
pub const MAX_BUFFERED: usize = 64 * FRAME_SIZE;

/// Streaming decoder for the binary quaternion protocol.
///
/// There is no checksum. Alignment is recovered by dropping one byte at a
/// time until the head of the buffer is a sync byte, so a corrupted payload
/// behind a valid sync byte is decoded and emitted as-is.
pub struct BinaryDecoder {
    buffer: VecDeque<u8>,
    stats: DecoderStats,
}

impl BinaryDecoder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_BUFFERED),
            stats: DecoderStats::default(),
        }
    }

    /// Resync ahead of `next_sample`. Drops exactly the bytes the resync
    /// loop would drop, so output does not depend on how input was chunked.
    /// Nothing from the first sync byte onward is touched.
    fn drop_leading_garbage(&mut self) {
        let garbage = self
            .buffer
            .iter()
            .position(|&b| b == SYNC_BYTE)
            .unwrap_or(self.buffer.len());
        if garbage == 0 {
            return;
        }

        self.buffer.drain(..garbage);
        self.stats.discarded_bytes += garbage as u64;
        self.stats.overflows += 1;
        tracing::trace!(garbage, "Binary receive buffer full, dropped bytes ahead of sync");
    }
}

impl Default for BinaryDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for BinaryDecoder {
    fn push_data(&mut self, data: &[u8]) {
        self.buffer.extend(data);

        if self.buffer.len() > MAX_BUFFERED {
            self.drop_leading_garbage();
        }
    }

    fn next_sample(&mut self) -> Option<Orientation> {
        while self.buffer.len() >= FRAME_SIZE {
            if self.buffer[0] != SYNC_BYTE {
                // Resynchronize.
                self.buffer.pop_front();
                self.stats.discarded_bytes += 1;
                continue;
            }

            let mut frame = [0u8; FRAME_SIZE];
            for (dst, src) in frame.iter_mut().zip(self.buffer.drain(..FRAME_SIZE)) {
                *dst = src;
            }
            self.stats.samples += 1;
            return Some(decode_frame(&frame));
        }
        None
    }

    fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn stats(&self) -> DecoderStats {
        self.stats
    }
}

/// Decode a complete frame. The sync byte is not checked here.
pub fn decode_frame(frame: &[u8; FRAME_SIZE]) -> Orientation {
    let f = |offset: usize| -> f32 {
        f32::from_le_bytes([
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ])
    };

    Orientation::from_wxyz(f(1), f(5), f(9), f(13))
}

/// Encode a sample the way the firmware does.
pub fn encode_frame(sample: &Orientation) -> [u8; FRAME_SIZE] {
    let mut frame = [0u8; FRAME_SIZE];
    frame[0] = SYNC_BYTE;
    for (i, value) in sample.wxyz().iter().enumerate() {
        let offset = 1 + i * 4;
        frame[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<Orientation> {
        vec![
            Orientation::from_wxyz(1.0, 0.0, 0.0, 0.0),
            Orientation::from_wxyz(0.9924, -0.0473, -0.1140, -0.0020),
            Orientation::from_wxyz(0.7071, 0.7071, 0.0, 0.0),
            Orientation::from_wxyz(0.5, 0.5, 0.5, 0.5),
        ]
    }

    /// Valid frames separated by garbage runs that never contain the sync byte.
    fn noisy_stream(samples: &[Orientation]) -> Vec<u8> {
        let garbage: [&[u8]; 4] = [&[0x00, 0x13], &[], &[0xFF; 9], &[0x42, 0xAB, 0x01]];
        let mut stream = vec![0x55, 0x01, 0x02];
        for (i, sample) in samples.iter().enumerate() {
            stream.extend_from_slice(&encode_frame(sample));
            stream.extend_from_slice(garbage[i % garbage.len()]);
        }
        stream
    }

    fn decode_in_chunks(stream: &[u8], chunk_size: usize) -> Vec<Orientation> {
        let mut decoder = BinaryDecoder::new();
        let mut out = Vec::new();
        for chunk in stream.chunks(chunk_size) {
            decoder.push_data(chunk);
            while let Some(sample) = decoder.next_sample() {
                out.push(sample);
            }
        }
        out
    }

    #[test]
    fn decode_single_frame() {
        let frame = encode_frame(&Orientation::from_wxyz(0.25, -0.5, 0.75, -1.0));
        assert_eq!(frame[0], SYNC_BYTE);
        assert_eq!(&frame[1..5], &0.25f32.to_le_bytes());

        let mut decoder = BinaryDecoder::new();
        decoder.push_data(&frame);

        let sample = decoder.next_sample().unwrap();
        assert_eq!(sample.wxyz(), [0.25, -0.5, 0.75, -1.0]);
        assert!(decoder.next_sample().is_none());
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn partial_frame_stays_buffered() {
        let frame = encode_frame(&Orientation::from_wxyz(0.5, 0.5, 0.5, 0.5));
        let mut decoder = BinaryDecoder::new();

        decoder.push_data(&frame[..10]);
        assert!(decoder.next_sample().is_none());
        assert_eq!(decoder.buffered_len(), 10);

        decoder.push_data(&frame[10..]);
        assert_eq!(decoder.next_sample().unwrap().wxyz(), [0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn resynchronizes_across_garbage() {
        let expected = samples();
        let stream = noisy_stream(&expected);

        for chunk_size in [1, 2, 5, 16, 17, 18, 64, stream.len()] {
            assert_eq!(
                decode_in_chunks(&stream, chunk_size),
                expected,
                "chunk size {chunk_size}"
            );
        }
    }

    #[test]
    fn chunking_does_not_change_output() {
        let stream = noisy_stream(&samples());
        assert_eq!(
            decode_in_chunks(&stream, 1),
            decode_in_chunks(&stream, stream.len())
        );
    }

    #[test]
    fn resync_bytes_are_counted() {
        let mut decoder = BinaryDecoder::new();
        decoder.push_data(&[0x01, 0x02, 0x03]);
        decoder.push_data(&encode_frame(&Orientation::default()));

        assert!(decoder.next_sample().is_some());
        let stats = decoder.stats();
        assert_eq!(stats.samples, 1);
        assert_eq!(stats.discarded_bytes, 3);
        assert_eq!(stats.overflows, 0);
    }

    #[test]
    fn corrupt_payload_is_emitted_without_panicking() {
        let mut frame = [0xFFu8; FRAME_SIZE];
        frame[0] = SYNC_BYTE;

        let mut decoder = BinaryDecoder::new();
        decoder.push_data(&frame);

        let sample = decoder.next_sample().unwrap();
        assert!(sample.quaternion.w.is_nan());
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn garbage_stream_stays_bounded() {
        let garbage: Vec<u8> = (0..=255u8).filter(|&b| b != SYNC_BYTE).collect();
        let mut decoder = BinaryDecoder::new();

        // Never drained: only the cap keeps the buffer small.
        for _ in 0..1_000 {
            decoder.push_data(&garbage);
            assert!(decoder.buffered_len() <= MAX_BUFFERED);
        }
        assert!(decoder.stats().overflows > 0);

        // Drained every chunk: resync keeps it below one frame.
        assert!(decoder.next_sample().is_none());
        assert!(decoder.buffered_len() < FRAME_SIZE);
        for _ in 0..1_000 {
            decoder.push_data(&garbage);
            assert!(decoder.next_sample().is_none());
            assert!(decoder.buffered_len() < FRAME_SIZE);
        }
    }

    #[test]
    fn large_chunk_of_frames_is_not_truncated() {
        let expected: Vec<Orientation> = (0..100)
            .map(|i| Orientation::from_wxyz(i as f32, 0.0, 0.0, 1.0))
            .collect();
        let mut stream = vec![0x01, 0x02];
        for sample in &expected {
            stream.extend_from_slice(&encode_frame(sample));
        }
        assert!(stream.len() > MAX_BUFFERED);

        let whole = decode_in_chunks(&stream, stream.len());
        assert_eq!(whole, expected);
        assert_eq!(decode_in_chunks(&stream, 1), whole);
    }

    #[test]
    fn undrained_frames_are_kept_past_the_cap() {
        let sample = Orientation::from_wxyz(0.5, 0.5, 0.5, 0.5);
        let mut decoder = BinaryDecoder::new();
        for _ in 0..100 {
            decoder.push_data(&encode_frame(&sample));
        }

        assert_eq!(decoder.buffered_len(), 100 * FRAME_SIZE);
        assert_eq!(decoder.stats().overflows, 0);
        assert_eq!(std::iter::from_fn(|| decoder.next_sample()).count(), 100);
    }

    #[test]
    fn overflow_keeps_the_newest_frames() {
        let latest = Orientation::from_wxyz(0.0, 0.0, 0.0, 1.0);
        let mut stream = vec![0x00; MAX_BUFFERED * 2];
        stream.extend_from_slice(&encode_frame(&latest));

        let mut decoder = BinaryDecoder::new();
        decoder.push_data(&stream);

        assert_eq!(decoder.buffered_len(), FRAME_SIZE);
        assert_eq!(decoder.next_sample(), Some(latest));
        assert_eq!(decoder.stats().overflows, 1);
        assert_eq!(decoder.stats().discarded_bytes, (MAX_BUFFERED * 2) as u64);
    }
}
