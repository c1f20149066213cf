use blockdelta_core::format::COMPRESSOR_LZ4;
use blockdelta_core::Compressor;
use lz4_flex::block::{compress, decompress};

/// LZ4 block format without a size prefix; the archive index already
/// records each blob's raw length.
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn id(&self) -> u16 {
        COMPRESSOR_LZ4
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compress(raw))
    }

    fn decompress(&self, packed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
        decompress(packed, raw_len).map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))
    }
}
