/// Magic bytes for blob archives: "BDPACK1\n".
pub const PACK_MAGIC: &[u8; 8] = b"BDPACK1\n";

/// Fixed size of the archive header in bytes.
///   magic[8] + version:u16 + compressor_id:u16 + blob_count:u64
///   + flags:u64 + index_checksum:u64 + reserved[4]
///   = 8 + 2 + 2 + 8 + 8 + 8 + 4 = 40
pub const PACK_HEADER_SIZE: u64 = 40;

/// Size of each entry in the blob index, in bytes.
///   id:u64 + offset:u64 + packed_len:u32 + raw_len:u32
///   + checksum:u64 + name_len:u16 + _pad[6]
///   = 8 + 8 + 4 + 4 + 8 + 2 + 6 = 40
pub const BLOB_ENTRY_SIZE: u64 = 40;

/// Size of the index footer (single u64 offset) in bytes.
pub const FOOTER_SIZE: u64 = 8;

// ── Flags ──────────────────────────────────────────────────────────────────

/// Each blob carries an xxhash3-64 checksum of its packed payload.
pub const FLAG_HAS_CHECKSUM: u64 = 1 << 0;

/// The header carries an xxhash3-64 checksum of the whole blob index.
pub const FLAG_HAS_INDEX_CHECKSUM: u64 = 1 << 1;

// ── Compressor IDs ─────────────────────────────────────────────────────────

pub const COMPRESSOR_STORE: u16 = 0;
pub const COMPRESSOR_ZSTD: u16 = 1;
pub const COMPRESSOR_LZ4: u16 = 2;
pub const COMPRESSOR_DEFLATE: u16 = 3;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 40-byte archive header.
#[derive(Debug, Clone)]
pub struct PackHeader {
    pub version: u16,
    pub compressor_id: u16,
    pub blob_count: u64,
    pub flags: u64,
    /// xxhash3-64 of the serialized blob index.
    pub index_checksum: u64,
}

impl PackHeader {
    /// Serialize to exactly `PACK_HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; PACK_HEADER_SIZE as usize] {
        let mut buf = [0u8; PACK_HEADER_SIZE as usize];
        buf[..8].copy_from_slice(PACK_MAGIC);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[10..12].copy_from_slice(&self.compressor_id.to_le_bytes());
        buf[12..20].copy_from_slice(&self.blob_count.to_le_bytes());
        buf[20..28].copy_from_slice(&self.flags.to_le_bytes());
        buf[28..36].copy_from_slice(&self.index_checksum.to_le_bytes());
        buf
    }

    /// Deserialize from `PACK_HEADER_SIZE` bytes, checking the magic.
    pub fn from_bytes(buf: &[u8; PACK_HEADER_SIZE as usize]) -> anyhow::Result<Self> {
        if &buf[..8] != PACK_MAGIC {
            anyhow::bail!("invalid archive magic bytes, not a blockdelta archive");
        }
        Ok(Self {
            version: u16::from_le_bytes(buf[8..10].try_into()?),
            compressor_id: u16::from_le_bytes(buf[10..12].try_into()?),
            blob_count: u64::from_le_bytes(buf[12..20].try_into()?),
            flags: u64::from_le_bytes(buf[20..28].try_into()?),
            index_checksum: u64::from_le_bytes(buf[28..36].try_into()?),
        })
    }

    pub fn has_flag(&self, flag: u64) -> bool {
        self.flags & flag != 0
    }
}

// ── Blob index entry ────────────────────────────────────────────────────────

/// One entry in the blob index: where a stored blob lives and how to check it.
///
/// On disk a blob is `[name_len:u16][name bytes][packed payload]`; `offset`
/// points at the `name_len` prefix.
#[derive(Debug, Clone, Default)]
pub struct BlobEntry {
    /// Caller-chosen key; several blobs may share one id (e.g. the metadata
    /// and residual of the same frame).
    pub id: u64,
    pub offset: u64,
    pub packed_len: u32,
    pub raw_len: u32,
    /// xxhash3-64 of the packed payload.
    pub checksum: u64,
    pub name_len: u16,
}

impl BlobEntry {
    /// Serialize to exactly `BLOB_ENTRY_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; BLOB_ENTRY_SIZE as usize] {
        let mut buf = [0u8; BLOB_ENTRY_SIZE as usize];
        buf[0..8].copy_from_slice(&self.id.to_le_bytes());
        buf[8..16].copy_from_slice(&self.offset.to_le_bytes());
        buf[16..20].copy_from_slice(&self.packed_len.to_le_bytes());
        buf[20..24].copy_from_slice(&self.raw_len.to_le_bytes());
        buf[24..32].copy_from_slice(&self.checksum.to_le_bytes());
        buf[32..34].copy_from_slice(&self.name_len.to_le_bytes());
        buf
    }

    /// Deserialize from `BLOB_ENTRY_SIZE` bytes.
    pub fn from_bytes(buf: &[u8; BLOB_ENTRY_SIZE as usize]) -> anyhow::Result<Self> {
        Ok(Self {
            id: u64::from_le_bytes(buf[0..8].try_into()?),
            offset: u64::from_le_bytes(buf[8..16].try_into()?),
            packed_len: u32::from_le_bytes(buf[16..20].try_into()?),
            raw_len: u32::from_le_bytes(buf[20..24].try_into()?),
            checksum: u64::from_le_bytes(buf[24..32].try_into()?),
            name_len: u16::from_le_bytes(buf[32..34].try_into()?),
        })
    }
}
