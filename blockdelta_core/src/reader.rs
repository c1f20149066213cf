use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

use crate::compressor::Compressor;
use crate::format::{
    BlobEntry, PackHeader, BLOB_ENTRY_SIZE, FLAG_HAS_CHECKSUM, FLAG_HAS_INDEX_CHECKSUM, FOOTER_SIZE,
    PACK_HEADER_SIZE,
};

/// One blob as returned by [`BlobReader::fetch_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub id: u64,
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Reader for blob archives.
///
/// # Open sequence
/// 1. Read the 40-byte header (magic check, compressor id, blob count).
/// 2. Seek to `file_end - 8`, read the `index_offset` u64.
/// 3. Check that the index exactly fills the space between `index_offset`
///    and the footer, then load it into RAM and verify its checksum.
/// 4. Check that every blob lies between the header and the index.
///
/// [`fetch`](Self::fetch) seeks straight to one blob; nothing else is read.
pub struct BlobReader {
    file: File,
    pub header: PackHeader,
    entries: Vec<BlobEntry>,
    compressor: Arc<dyn Compressor>,
}

impl BlobReader {
    /// Read only the header of the archive at `path` and return its
    /// compressor id, so callers can resolve the compressor before opening.
    pub fn peek_compressor_id(path: impl AsRef<Path>) -> anyhow::Result<u16> {
        let mut file = File::open(path)?;
        let mut buf = [0u8; PACK_HEADER_SIZE as usize];
        file.read_exact(&mut buf)?;
        Ok(PackHeader::from_bytes(&buf)?.compressor_id)
    }

    /// Open an archive. `compressor` must match the id stored in the header.
    pub fn open(path: impl AsRef<Path>, compressor: Arc<dyn Compressor>) -> anyhow::Result<Self> {
        let mut file = File::open(path)?;

        // ── Read and validate header ────────────────────────────────────────
        let mut header_buf = [0u8; PACK_HEADER_SIZE as usize];
        file.read_exact(&mut header_buf)?;
        let header = PackHeader::from_bytes(&header_buf)?;

        if header.version != 1 {
            anyhow::bail!(
                "unsupported archive version {} (only version 1 is supported)",
                header.version
            );
        }
        if header.compressor_id != compressor.id() {
            anyhow::bail!(
                "compressor mismatch: archive uses compressor {} but provided compressor has id {}",
                header.compressor_id,
                compressor.id()
            );
        }

        // ── Read footer → index offset ──────────────────────────────────────
        let file_len = file.metadata()?.len();
        if file_len < PACK_HEADER_SIZE + FOOTER_SIZE {
            anyhow::bail!("archive is {file_len} bytes, too short for header and footer");
        }
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer_buf = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer_buf)?;
        let index_offset = u64::from_le_bytes(footer_buf);

        // ── Bounds of the index, before anything is allocated ───────────────
        let index_end = header
            .blob_count
            .checked_mul(BLOB_ENTRY_SIZE)
            .and_then(|len| len.checked_add(index_offset));
        if index_offset < PACK_HEADER_SIZE || index_end != Some(file_len - FOOTER_SIZE) {
            anyhow::bail!(
                "corrupt archive: index of {} entries at offset {} does not fit a {}-byte file",
                header.blob_count,
                index_offset,
                file_len
            );
        }

        // ── Load blob index ─────────────────────────────────────────────────
        file.seek(SeekFrom::Start(index_offset))?;
        let mut index = vec![0u8; (header.blob_count * BLOB_ENTRY_SIZE) as usize];
        file.read_exact(&mut index)?;
        if header.has_flag(FLAG_HAS_INDEX_CHECKSUM) {
            let computed = xxh3_64(&index);
            if computed != header.index_checksum {
                anyhow::bail!(
                    "index checksum mismatch: expected {:016x}, got {:016x}",
                    header.index_checksum,
                    computed
                );
            }
        }

        let mut entries = Vec::with_capacity(header.blob_count as usize);
        for (i, chunk) in index.chunks_exact(BLOB_ENTRY_SIZE as usize).enumerate() {
            let entry = BlobEntry::from_bytes(chunk.try_into()?)?;
            let end = entry
                .offset
                .saturating_add(2 + entry.name_len as u64 + entry.packed_len as u64);
            if entry.offset < PACK_HEADER_SIZE || end > index_offset {
                anyhow::bail!(
                    "corrupt archive: blob {} spans {}..{} outside the blob region {}..{}",
                    i,
                    entry.offset,
                    end,
                    PACK_HEADER_SIZE,
                    index_offset
                );
            }
            entries.push(entry);
        }

        Ok(Self {
            file,
            header,
            entries,
            compressor,
        })
    }

    #[inline]
    pub fn blob_count(&self) -> u64 {
        self.header.blob_count
    }

    /// Total unpacked size of all blobs in bytes.
    pub fn raw_size(&self) -> u64 {
        self.entries.iter().map(|e| e.raw_len as u64).sum()
    }

    /// Total packed size of all blob payloads in bytes (excluding names,
    /// index and header).
    pub fn packed_size(&self) -> u64 {
        self.entries.iter().map(|e| e.packed_len as u64).sum()
    }

    /// Compression ratio (raw / packed).
    pub fn ratio(&self) -> f64 {
        let packed = self.packed_size();
        if packed == 0 {
            return 1.0;
        }
        self.raw_size() as f64 / packed as f64
    }

    pub fn entries(&self) -> &[BlobEntry] {
        &self.entries
    }

    /// Unpack blob `idx` and return it with its id and name.
    pub fn fetch(&mut self, idx: usize) -> anyhow::Result<StoredBlob> {
        let entry = self
            .entries
            .get(idx)
            .ok_or_else(|| {
                anyhow::anyhow!("blob index {} out of range (total {})", idx, self.header.blob_count)
            })?
            .clone();

        self.file.seek(SeekFrom::Start(entry.offset))?;

        let mut len_buf = [0u8; 2];
        self.file.read_exact(&mut len_buf)?;
        let on_disk_name_len = u16::from_le_bytes(len_buf);
        if on_disk_name_len != entry.name_len {
            anyhow::bail!(
                "blob {} name_len mismatch: index says {} but on-disk prefix says {}",
                idx,
                entry.name_len,
                on_disk_name_len
            );
        }
        let mut name_buf = vec![0u8; entry.name_len as usize];
        self.file.read_exact(&mut name_buf)?;
        let name = String::from_utf8(name_buf)
            .map_err(|e| anyhow::anyhow!("blob {} name is not valid UTF-8: {}", idx, e))?;

        let mut packed = vec![0u8; entry.packed_len as usize];
        self.file.read_exact(&mut packed)?;

        if self.header.has_flag(FLAG_HAS_CHECKSUM) {
            let computed = xxh3_64(&packed);
            if computed != entry.checksum {
                anyhow::bail!(
                    "blob {} ('{}') checksum mismatch: expected {:016x}, got {:016x}",
                    idx,
                    name,
                    entry.checksum,
                    computed
                );
            }
        }

        let bytes = self.compressor.decompress(&packed, entry.raw_len as usize)?;
        if bytes.len() != entry.raw_len as usize {
            anyhow::bail!(
                "blob {} ('{}') unpacked to {} bytes but index says {}",
                idx,
                name,
                bytes.len(),
                entry.raw_len
            );
        }

        Ok(StoredBlob {
            id: entry.id,
            name,
            bytes,
        })
    }

    /// Every blob in storage order.
    pub fn fetch_all(&mut self) -> anyhow::Result<Vec<StoredBlob>> {
        (0..self.entries.len()).map(|i| self.fetch(i)).collect()
    }

    /// Every blob stored under `id`, in storage order.
    pub fn fetch_by_id(&mut self, id: u64) -> anyhow::Result<Vec<StoredBlob>> {
        let indices: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.id == id)
            .map(|(i, _)| i)
            .collect();
        indices.into_iter().map(|i| self.fetch(i)).collect()
    }
}
