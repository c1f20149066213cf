use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::Frame;
use crate::metric::sad;
use crate::params::{CodecParams, MatchPolicy};

/// Where a target block was found in the reference frame.
///
/// `{-1, -1}` is the sentinel for "no accepted match".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchRecord {
    pub x: i32,
    pub y: i32,
}

impl MatchRecord {
    pub const NONE: MatchRecord = MatchRecord { x: -1, y: -1 };

    pub fn at(x: usize, y: usize) -> Self {
        Self {
            x: x as i32,
            y: y as i32,
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// Search the square neighborhood of `(x, y)` in `reference` for `block`.
///
/// Candidates are visited `ny` ascending (outer) then `nx` ascending
/// (inner), over `[y - radius, y + radius] x [x - radius, x + radius]`.
/// A candidate is in bounds when `0 <= nx < width - block_size` and
/// `0 <= ny < height - block_size`; the upper bound is strict, so the last
/// aligned column and row of blocks are never probed.
///
/// Under [`MatchPolicy::Minimize`] the lowest score wins, ties going to the
/// earlier candidate. Under [`MatchPolicy::ThresholdAccept`] every candidate
/// scoring below `threshold` replaces the previous result, so the answer is
/// the last qualifying candidate in scan order, not the best one.
pub fn search(
    reference: &Frame,
    x: usize,
    y: usize,
    block: &[u8],
    params: &CodecParams,
) -> Result<MatchRecord> {
    let bs = params.block_size;
    let r = params.radius;
    // Exclusive upper bounds on candidate origins.
    let max_x = reference.width().saturating_sub(bs);
    let max_y = reference.height().saturating_sub(bs);
    let xs = x.saturating_sub(r)..x.saturating_add(r).saturating_add(1).min(max_x);
    let ys = y.saturating_sub(r)..y.saturating_add(r).saturating_add(1).min(max_y);

    let mut candidate = Vec::with_capacity(reference.block_len(bs));
    let mut best: Option<u64> = None;
    let mut result = MatchRecord::NONE;

    for ny in ys {
        for nx in xs.clone() {
            reference.copy_block_into(nx, ny, bs, &mut candidate);
            let score = sad(block, &candidate)?;
            match params.policy {
                MatchPolicy::Minimize => {
                    if best.map_or(true, |b| score < b) {
                        best = Some(score);
                        result = MatchRecord::at(nx, ny);
                    }
                }
                MatchPolicy::ThresholdAccept => {
                    if score < params.threshold {
                        result = MatchRecord::at(nx, ny);
                    }
                }
            }
        }
    }

    Ok(result)
}
