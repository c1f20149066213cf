use crate::error::{Error, Result};

/// Sum of absolute differences over every sample of two equal-sized blocks.
///
/// Not normalized: an RGB block contributes three samples per pixel, so
/// thresholds for 3-channel frames are conventionally three times the luma
/// ones.
pub fn sad(a: &[u8], b: &[u8]) -> Result<u64> {
    if a.len() != b.len() {
        return Err(Error::SampleCountMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a.iter()
        .zip(b)
        .map(|(&p, &q)| p.abs_diff(q) as u64)
        .sum())
}
