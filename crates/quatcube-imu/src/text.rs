use crate::decoder::FrameDecoder;
use crate::types::{DecoderStats, Orientation};
use std::collections::VecDeque;
use thiserror::Error;

/// Literal that starts every quaternion line, e.g. `Quat → w:1 x:0 y:0 z:0`.
pub const LINE_TAG: &str = "Quat";
/// Longest line accepted, terminator excluded. Longer lines are dropped
/// whole, however they were split across reads.
pub const MAX_LINE_LEN: usize = 256;

/// Log one in this many rejected lines.
const REJECT_LOG_INTERVAL: u64 = 100;

const LABELS: [&str; 4] = ["w", "x", "y", "z"];

#[derive(Debug, Error, PartialEq)]
pub enum LineError {
    #[error("Line does not start with the quaternion tag")]
    MissingTag,
    #[error("Expected 4 fields, found {0}")]
    TokenCount(usize),
    #[error("Field {0:?} has no ':' separator")]
    MissingSeparator(String),
    #[error("Expected field {expected:?}, found {found:?}")]
    UnexpectedLabel { expected: &'static str, found: String },
    #[error("Field {0:?} is not a finite number")]
    InvalidValue(String),
}

/// Parse one text record into a sample.
///
/// The tag must be followed by a non-alphanumeric separator (the firmware
/// prints `" → "`), then exactly four `label:value` fields in w, x, y, z
/// order.
pub fn parse_quat_line(line: &str) -> Result<Orientation, LineError> {
    let rest = line
        .trim()
        .strip_prefix(LINE_TAG)
        .ok_or(LineError::MissingTag)?;
    if rest.starts_with(|c: char| c.is_alphanumeric()) {
        // "Quaternion ...", "Quat2 ...": some other record.
        return Err(LineError::MissingTag);
    }
    let fields = rest.trim_start_matches(|c: char| !c.is_alphanumeric());

    let tokens: Vec<&str> = fields.split_whitespace().collect();
    if tokens.len() != LABELS.len() {
        return Err(LineError::TokenCount(tokens.len()));
    }

    let mut values = [0.0f32; 4];
    for ((slot, token), expected) in values.iter_mut().zip(&tokens).zip(LABELS) {
        let (label, value) = token
            .split_once(':')
            .ok_or_else(|| LineError::MissingSeparator(token.to_string()))?;
        if label != expected {
            return Err(LineError::UnexpectedLabel {
                expected,
                found: label.to_string(),
            });
        }
        *slot = value
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| LineError::InvalidValue(token.to_string()))?;
    }

    let [w, x, y, z] = values;
    Ok(Orientation::from_wxyz(w, x, y, z))
}

/// Streaming decoder for the line-oriented text protocol.
///
/// Does its own line framing so that a device that never sends a newline
/// cannot grow the buffer past `MAX_LINE_LEN`. Complete lines stay buffered
/// until drained by `next_sample`.
pub struct LineDecoder {
    buffer: VecDeque<u8>,
    /// Length of the unterminated line at the end of `buffer`.
    partial_len: usize,
    /// Skipping the remainder of an overlong line.
    discarding: bool,
    stats: DecoderStats,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_LINE_LEN),
            partial_len: 0,
            discarding: false,
            stats: DecoderStats::default(),
        }
    }

    /// Pop the next complete line, without its terminator.
    fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.buffer.drain(..=end).collect();
        let line = String::from_utf8_lossy(&raw);
        Some(line.trim().to_string())
    }

    /// Append a run of bytes holding at most one newline, at its end.
    fn push_segment(&mut self, segment: &[u8], terminated: bool) {
        if self.discarding {
            self.stats.discarded_bytes += segment.len() as u64;
            self.discarding = !terminated;
            return;
        }

        let content_len = segment.len() - usize::from(terminated);
        if self.partial_len + content_len > MAX_LINE_LEN {
            let dropped = self.partial_len + segment.len();
            self.buffer.truncate(self.buffer.len() - self.partial_len);
            self.partial_len = 0;
            self.discarding = !terminated;
            self.stats.discarded_bytes += dropped as u64;
            self.stats.overflows += 1;
            tracing::trace!(dropped, "Overlong text line, skipping to next newline");
            return;
        }

        self.buffer.extend(segment);
        self.partial_len = if terminated {
            0
        } else {
            self.partial_len + content_len
        };
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for LineDecoder {
    fn push_data(&mut self, data: &[u8]) {
        let mut rest = data;
        while !rest.is_empty() {
            let (segment, terminated) = match rest.iter().position(|&b| b == b'\n') {
                Some(end) => (&rest[..=end], true),
                None => (rest, false),
            };
            rest = &rest[segment.len()..];
            self.push_segment(segment, terminated);
        }
    }

    fn next_sample(&mut self) -> Option<Orientation> {
        while let Some(line) = self.next_line() {
            match parse_quat_line(&line) {
                Ok(sample) => {
                    self.stats.samples += 1;
                    return Some(sample);
                }
                // Debug prints and other chatter from the firmware.
                Err(LineError::MissingTag) => {}
                Err(e) => {
                    self.stats.rejected_lines += 1;
                    if self.stats.rejected_lines % REJECT_LOG_INTERVAL == 1 {
                        tracing::debug!(
                            error = %e,
                            rejected = self.stats.rejected_lines,
                            "Discarding malformed quaternion line"
                        );
                    }
                }
            }
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
