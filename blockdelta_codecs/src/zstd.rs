use blockdelta_core::format::COMPRESSOR_ZSTD;
use blockdelta_core::Compressor;

/// Zstandard, one independent frame per blob.
///
/// Best for metadata files, whose runs of sentinel records compress well.
pub struct ZstdCompressor {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Compressor for ZstdCompressor {
    fn id(&self) -> u16 {
        COMPRESSOR_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(::zstd::bulk::compress(raw, self.level)?)
    }

    fn decompress(&self, packed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
        Ok(::zstd::bulk::decompress(packed, raw_len)?)
    }
}
