use std::io::{Read, Write};

use blockdelta_core::format::COMPRESSOR_DEFLATE;
use blockdelta_core::Compressor;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

/// Raw deflate via flate2.
pub struct DeflateCompressor {
    /// 0 (store) to 9 (best).
    pub level: u32,
}

impl Default for DeflateCompressor {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl DeflateCompressor {
    pub fn new(level: u32) -> Self {
        Self { level }
    }
}

impl Compressor for DeflateCompressor {
    fn id(&self) -> u16 {
        COMPRESSOR_DEFLATE
    }

    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::new(self.level));
        enc.write_all(raw)?;
        Ok(enc.finish()?)
    }

    fn decompress(&self, packed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(raw_len);
        DeflateDecoder::new(packed).read_to_end(&mut out)?;
        Ok(out)
    }
}
