use blockdelta_core::format::COMPRESSOR_STORE;
use blockdelta_core::Compressor;

/// Stores blobs verbatim.
///
/// Residual PNGs are already deflate-compressed, so packing them again
/// rarely pays off; this keeps archive writes cheap.
pub struct StoreCompressor;

impl Compressor for StoreCompressor {
    fn id(&self) -> u16 {
        COMPRESSOR_STORE
    }

    fn name(&self) -> &'static str {
        "store"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, packed: &[u8], _raw_len: usize) -> anyhow::Result<Vec<u8>> {
        Ok(packed.to_vec())
    }
}
