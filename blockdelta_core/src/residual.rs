use rayon::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::matcher::{self, MatchRecord};
use crate::params::{CodecParams, MatchPolicy};
use crate::partition;

/// Output of one encode call: one record per target block plus the residual
/// frame. Together with the reference frame they fully determine decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub metadata: Vec<MatchRecord>,
    pub residual: Frame,
}

impl Encoded {
    /// Blocks that found a match in the reference frame.
    pub fn matched_blocks(&self) -> usize {
        self.metadata.iter().filter(|r| !r.is_none()).count()
    }
}

/// Encodes a target frame against a reference frame block by block.
///
/// Each block is searched independently, so blocks are processed on the
/// rayon pool and scattered into the output in raster order afterwards.
///
/// Residual contents per block:
/// - no match: the raw target samples;
/// - [`MatchPolicy::Minimize`] match: `reference - target`, wrapping;
/// - [`MatchPolicy::ThresholdAccept`] match: zeros.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResidualCodec {
    params: CodecParams,
}

impl ResidualCodec {
    pub fn new(params: CodecParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CodecParams {
        &self.params
    }

    pub fn encode(&self, reference: &Frame, target: &Frame) -> Result<Encoded> {
        let bs = self.params.block_size;
        reference.ensure_same_dims(target, "reference vs target")?;
        let blocks = partition::cut(target, bs)?;

        let results = blocks
            .into_par_iter()
            .map(|(pos, block)| {
                let rec = matcher::search(reference, pos.x, pos.y, &block, &self.params)?;
                let payload = if rec.is_none() {
                    Some(block)
                } else {
                    match self.params.policy {
                        MatchPolicy::Minimize => {
                            let mut diff = reference.block(rec.x as usize, rec.y as usize, bs);
                            for (d, &t) in diff.iter_mut().zip(&block) {
                                *d = d.wrapping_sub(t);
                            }
                            Some(diff)
                        }
                        MatchPolicy::ThresholdAccept => None,
                    }
                };
                Ok((pos, rec, payload))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut residual = Frame::filled(target.width(), target.height(), target.channels(), 0)?;
        let mut metadata = Vec::with_capacity(results.len());
        for (pos, rec, payload) in results {
            if let Some(samples) = payload {
                residual.put_block(pos.x, pos.y, bs, &samples);
            }
            metadata.push(rec);
        }

        let encoded = Encoded { metadata, residual };
        debug!(
            blocks = encoded.metadata.len(),
            matched = encoded.matched_blocks(),
            policy = self.params.policy.name(),
            "encoded frame"
        );
        Ok(encoded)
    }

    pub fn decode(
        &self,
        reference: &Frame,
        residual: &Frame,
        metadata: &[MatchRecord],
    ) -> Result<Frame> {
        let bs = self.params.block_size;
        reference.ensure_same_dims(residual, "reference vs residual")?;
        residual.check_partitionable(bs)?;
        let blocks = residual.block_count(bs);
        if metadata.len() != blocks {
            return Err(Error::MalformedMetadata {
                records: metadata.len(),
                blocks,
            });
        }

        let positions = partition::positions(residual.width(), residual.height(), bs);
        let payloads = positions
            .par_iter()
            .zip(metadata)
            .enumerate()
            .map(|(index, (pos, rec))| {
                if rec.is_none() {
                    return Ok(residual.block(pos.x, pos.y, bs));
                }
                if rec.x < 0
                    || rec.y < 0
                    || !reference.contains_block(rec.x as usize, rec.y as usize, bs)
                {
                    return Err(Error::MatchOutOfBounds {
                        block: index,
                        x: rec.x,
                        y: rec.y,
                    });
                }
                let mut out = reference.block(rec.x as usize, rec.y as usize, bs);
                if self.params.policy == MatchPolicy::Minimize {
                    let diff = residual.block(pos.x, pos.y, bs);
                    for (o, &d) in out.iter_mut().zip(&diff) {
                        *o = o.wrapping_sub(d);
                    }
                }
                Ok(out)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut frame = Frame::filled(residual.width(), residual.height(), residual.channels(), 0)?;
        for (pos, samples) in positions.iter().zip(&payloads) {
            frame.put_block(pos.x, pos.y, bs, samples);
        }
        debug!(blocks, policy = self.params.policy.name(), "decoded frame");
        Ok(frame)
    }
}
