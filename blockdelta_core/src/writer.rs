use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::compressor::Compressor;
use crate::format::{
    BlobEntry, PackHeader, BLOB_ENTRY_SIZE, FLAG_HAS_CHECKSUM, FLAG_HAS_INDEX_CHECKSUM, PACK_HEADER_SIZE,
};

/// Append-only writer for blob archives.
///
/// # Layout written
/// ```text
/// [HEADER: 40 bytes placeholder]
/// [BLOB 0] [BLOB 1] ... [BLOB N-1]      ← [name_len][name][packed payload]
/// [BLOB INDEX: 40 bytes × N]
/// [FOOTER: 8 bytes, u64 LE offset of the index]
/// ← seek back to 0, overwrite header with real values
/// ```
pub struct BlobWriter {
    file: BufWriter<File>,
    compressor: Box<dyn Compressor>,
    entries: Vec<BlobEntry>,
    /// Current write position in the file (mirrors the file cursor).
    current_offset: u64,
}

impl BlobWriter {
    /// Create a new archive at `path`, overwriting any existing file.
    pub fn create(path: impl AsRef<Path>, compressor: Box<dyn Compressor>) -> anyhow::Result<Self> {
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(&[0u8; PACK_HEADER_SIZE as usize])?;
        Ok(Self {
            file,
            compressor,
            entries: Vec::new(),
            current_offset: PACK_HEADER_SIZE,
        })
    }

    /// Pack `bytes` and append it under `(id, name)`.
    pub fn store(&mut self, id: u64, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let name_len = u16::try_from(name.len())
            .map_err(|_| anyhow::anyhow!("blob name is {} bytes, limit is {}", name.len(), u16::MAX))?;
        let raw_len = u32::try_from(bytes.len())
            .map_err(|_| anyhow::anyhow!("blob '{}' is {} bytes, limit is {}", name, bytes.len(), u32::MAX))?;

        let packed = self.compressor.compress(bytes)?;
        let packed_len = u32::try_from(packed.len())
            .map_err(|_| anyhow::anyhow!("packed blob '{}' exceeds {} bytes", name, u32::MAX))?;
        let checksum = xxh3_64(&packed);

        let offset = self.current_offset;
        self.file.write_all(&name_len.to_le_bytes())?;
        self.file.write_all(name.as_bytes())?;
        self.file.write_all(&packed)?;
        self.current_offset += 2 + name_len as u64 + packed_len as u64;

        debug!(id, name, raw_len, packed_len, "stored blob");
        self.entries.push(BlobEntry {
            id,
            offset,
            packed_len,
            raw_len,
            checksum,
            name_len,
        });
        Ok(())
    }

    /// Write the blob index and footer, then seal the archive by writing the
    /// final header.
    ///
    /// Returns the number of blobs written.
    pub fn finish(mut self) -> anyhow::Result<u64> {
        // ── Blob index ─────────────────────────────────────────────────────
        let index_offset = self.current_offset;
        let mut index = Vec::with_capacity(self.entries.len() * BLOB_ENTRY_SIZE as usize);
        for entry in &self.entries {
            index.extend_from_slice(&entry.to_bytes());
        }
        self.file.write_all(&index)?;
        self.current_offset += index.len() as u64;

        // ── Footer: 8-byte u64 LE offset of index start ────────────────────
        self.file.write_all(&index_offset.to_le_bytes())?;

        // ── Seek back to 0 and write the real header ───────────────────────
        let blob_count = self.entries.len() as u64;
        let header = PackHeader {
            version: 1,
            compressor_id: self.compressor.id(),
            blob_count,
            flags: FLAG_HAS_CHECKSUM | FLAG_HAS_INDEX_CHECKSUM,
            index_checksum: xxh3_64(&index),
        };
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header.to_bytes())?;
        self.file.flush()?;

        Ok(blob_count)
    }
}
