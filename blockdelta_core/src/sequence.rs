use rayon::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::frame::Frame;
use crate::residual::{Encoded, ResidualCodec};

/// Encodes a frame sequence against its first frame.
///
/// Frame 0 is the key frame and is never encoded. Every later frame is
/// encoded against the key frame, never against a previously encoded frame,
/// so each `(metadata, residual)` pair decodes on its own with just the key
/// frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiFrameEncoder {
    codec: ResidualCodec,
}

impl MultiFrameEncoder {
    pub fn new(codec: ResidualCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &ResidualCodec {
        &self.codec
    }

    /// Returns one [`Encoded`] per non-key frame, in sequence order.
    ///
    /// Shapes are checked for the whole sequence before any encoding starts,
    /// so a mismatch is reported for the first offending frame. Any failure
    /// aborts the whole sequence and is wrapped with the frame index.
    pub fn encode(&self, frames: &[Frame]) -> Result<Vec<Encoded>> {
        let Some((key, rest)) = frames.split_first() else {
            return Ok(Vec::new());
        };

        for (i, frame) in rest.iter().enumerate() {
            key.ensure_same_dims(frame, "key frame vs sequence frame")
                .map_err(|e| e.in_frame(i + 1))?;
        }

        let encoded = rest
            .par_iter()
            .enumerate()
            .map(|(i, frame)| self.codec.encode(key, frame).map_err(|e| e.in_frame(i + 1)))
            .collect::<Result<Vec<_>>>()?;

        debug!(frames = frames.len(), encoded = encoded.len(), "encoded sequence");
        Ok(encoded)
    }
}
