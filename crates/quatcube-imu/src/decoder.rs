use crate::protocol::BinaryDecoder;
use crate::text::LineDecoder;
use crate::types::{DecoderStats, Orientation};
use quatcube_config::Protocol;

/// Streaming decoder turning raw serial bytes into orientation samples.
///
/// Feed bytes in whatever chunks the transport delivers via `push_data`,
/// then drain samples with `next_sample` until it returns `None`.
/// Malformed input is never an error: it is skipped and counted.
pub trait FrameDecoder: Send {
    /// Append received bytes to the internal buffer.
    fn push_data(&mut self, data: &[u8]);

    /// Extract the next complete sample, or `None` if the buffer holds no
    /// complete frame yet.
    fn next_sample(&mut self) -> Option<Orientation>;

    /// Bytes currently held back waiting for more input.
    fn buffered_len(&self) -> usize;

    fn stats(&self) -> DecoderStats;
}

/// Create the decoder for a wire protocol.
pub fn decoder_for(protocol: Protocol) -> Box<dyn FrameDecoder> {
    match protocol {
        Protocol::Binary => Box::new(BinaryDecoder::new()),
        Protocol::Text => Box::new(LineDecoder::new()),
    }
}
