mod deflate;
mod lz4;
mod store;
mod zstd;

pub use deflate::DeflateCompressor;
pub use lz4::Lz4Compressor;
pub use store::StoreCompressor;
pub use zstd::ZstdCompressor;

use blockdelta_core::format::{COMPRESSOR_DEFLATE, COMPRESSOR_LZ4, COMPRESSOR_STORE, COMPRESSOR_ZSTD};
use blockdelta_core::Compressor;
use std::sync::Arc;

/// Resolve a compressor from the id stored in an archive header.
pub fn compressor_by_id(id: u16) -> anyhow::Result<Arc<dyn Compressor>> {
    match id {
        COMPRESSOR_STORE => Ok(Arc::new(StoreCompressor)),
        COMPRESSOR_ZSTD => Ok(Arc::new(ZstdCompressor::default())),
        COMPRESSOR_LZ4 => Ok(Arc::new(Lz4Compressor)),
        COMPRESSOR_DEFLATE => Ok(Arc::new(DeflateCompressor::default())),
        _ => anyhow::bail!(
            "unknown compressor id {}; supported: 0 (store), 1 (zstd), 2 (lz4), 3 (deflate)",
            id
        ),
    }
}

/// Resolve a compressor from its CLI name.
pub fn compressor_by_name(name: &str, level: Option<i32>) -> anyhow::Result<Box<dyn Compressor>> {
    match name {
        "store" | "none" => Ok(Box::new(StoreCompressor)),
        "zstd" | "z" => Ok(Box::new(level.map(ZstdCompressor::new).unwrap_or_default())),
        "lz4" | "l" => Ok(Box::new(Lz4Compressor)),
        "deflate" | "d" => Ok(Box::new(
            level
                .map(|l| DeflateCompressor::new(l.clamp(0, 9) as u32))
                .unwrap_or_default(),
        )),
        other => anyhow::bail!(
            "unknown compressor '{}'. Valid options: store, zstd, lz4, deflate",
            other
        ),
    }
}
