use xxhash_rust::xxh3::xxh3_64;

use crate::matcher::MatchRecord;
use crate::params::{CodecParams, MatchPolicy};

/// Magic bytes of a `.blockmeta` file.
pub const META_MAGIC: &[u8; 8] = b"BDMETA1\n";

/// Current metadata format version.
pub const META_VERSION: u16 = 1;

/// Fixed size of the metadata header in bytes.
///   magic[8] + version:u16 + policy:u8 + channels:u8 + block_size:u32
///   + width:u32 + height:u32 + radius:u32 + threshold:u64
///   + record_count:u32 + checksum:u64
///   = 8 + 2 + 1 + 1 + 4 + 4 + 4 + 4 + 8 + 4 + 8 = 48
pub const META_HEADER_SIZE: usize = 48;

/// Bytes per serialized [`MatchRecord`]: `x:i32 + y:i32`.
pub const RECORD_SIZE: usize = 8;

/// Decoded `.blockmeta` header.
///
/// Carries everything the decoder needs besides the two images: block size
/// and policy, plus the frame shape so a residual can be checked against it
/// before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaHeader {
    pub version: u16,
    pub policy: MatchPolicy,
    pub channels: u8,
    pub block_size: u32,
    pub width: u32,
    pub height: u32,
    pub radius: u32,
    pub threshold: u64,
    pub record_count: u32,
    /// xxh3-64 of the serialized records.
    pub checksum: u64,
}

impl MetaHeader {
    /// Header for `records` produced by an encode with `params` on a
    /// `width x height x channels` frame.
    pub fn describe(
        params: &CodecParams,
        width: usize,
        height: usize,
        channels: usize,
        records: &[MatchRecord],
    ) -> Self {
        Self {
            version: META_VERSION,
            policy: params.policy,
            channels: channels as u8,
            block_size: params.block_size as u32,
            width: width as u32,
            height: height as u32,
            radius: params.radius as u32,
            threshold: params.threshold,
            record_count: records.len() as u32,
            checksum: xxh3_64(&records_to_bytes(records)),
        }
    }

    /// The codec parameters recorded at encode time.
    pub fn params(&self) -> CodecParams {
        CodecParams {
            block_size: self.block_size as usize,
            radius: self.radius as usize,
            threshold: self.threshold,
            policy: self.policy,
        }
    }

    /// Serialize to exactly `META_HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; META_HEADER_SIZE] {
        let mut buf = [0u8; META_HEADER_SIZE];
        buf[..8].copy_from_slice(META_MAGIC);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[10] = self.policy.tag();
        buf[11] = self.channels;
        buf[12..16].copy_from_slice(&self.block_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.width.to_le_bytes());
        buf[20..24].copy_from_slice(&self.height.to_le_bytes());
        buf[24..28].copy_from_slice(&self.radius.to_le_bytes());
        buf[28..36].copy_from_slice(&self.threshold.to_le_bytes());
        buf[36..40].copy_from_slice(&self.record_count.to_le_bytes());
        buf[40..48].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Deserialize from `META_HEADER_SIZE` bytes, checking magic, version and
    /// policy tag.
    pub fn from_bytes(buf: &[u8; META_HEADER_SIZE]) -> anyhow::Result<Self> {
        if &buf[..8] != META_MAGIC {
            anyhow::bail!("invalid metadata magic bytes, not a .blockmeta file");
        }
        let version = u16::from_le_bytes(buf[8..10].try_into()?);
        if version != META_VERSION {
            anyhow::bail!("unsupported metadata version {version} (only {META_VERSION} is supported)");
        }
        let policy = MatchPolicy::from_tag(buf[10])
            .ok_or_else(|| anyhow::anyhow!("unknown match policy tag {}", buf[10]))?;
        Ok(Self {
            version,
            policy,
            channels: buf[11],
            block_size: u32::from_le_bytes(buf[12..16].try_into()?),
            width: u32::from_le_bytes(buf[16..20].try_into()?),
            height: u32::from_le_bytes(buf[20..24].try_into()?),
            radius: u32::from_le_bytes(buf[24..28].try_into()?),
            threshold: u64::from_le_bytes(buf[28..36].try_into()?),
            record_count: u32::from_le_bytes(buf[36..40].try_into()?),
            checksum: u64::from_le_bytes(buf[40..48].try_into()?),
        })
    }
}

fn records_to_bytes(records: &[MatchRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(records.len() * RECORD_SIZE);
    for rec in records {
        out.extend_from_slice(&rec.x.to_le_bytes());
        out.extend_from_slice(&rec.y.to_le_bytes());
    }
    out
}

/// Serialize a header and its records into one `.blockmeta` payload.
pub fn encode_metadata(header: &MetaHeader, records: &[MatchRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(META_HEADER_SIZE + records.len() * RECORD_SIZE);
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&records_to_bytes(records));
    out
}

/// Parse a `.blockmeta` payload, verifying length and checksum.
pub fn decode_metadata(bytes: &[u8]) -> anyhow::Result<(MetaHeader, Vec<MatchRecord>)> {
    if bytes.len() < META_HEADER_SIZE {
        anyhow::bail!(
            "metadata is {} bytes, shorter than the {META_HEADER_SIZE}-byte header",
            bytes.len()
        );
    }
    let header = MetaHeader::from_bytes(bytes[..META_HEADER_SIZE].try_into()?)?;
    let body = &bytes[META_HEADER_SIZE..];
    let expected = header.record_count as usize * RECORD_SIZE;
    if body.len() != expected {
        anyhow::bail!(
            "metadata declares {} records ({expected} bytes) but carries {} bytes",
            header.record_count,
            body.len()
        );
    }
    let computed = xxh3_64(body);
    if computed != header.checksum {
        anyhow::bail!(
            "metadata checksum mismatch: expected {:016x}, got {:016x}",
            header.checksum,
            computed
        );
    }
    let records = body
        .chunks_exact(RECORD_SIZE)
        .map(|c| -> anyhow::Result<MatchRecord> {
            Ok(MatchRecord {
                x: i32::from_le_bytes(c[0..4].try_into()?),
                y: i32::from_le_bytes(c[4..8].try_into()?),
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok((header, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (MetaHeader, Vec<MatchRecord>) {
        let records = vec![
            MatchRecord::at(0, 4),
            MatchRecord::NONE,
            MatchRecord::at(13, 2),
            MatchRecord::NONE,
        ];
        let params = CodecParams::for_channels(3).with_policy(MatchPolicy::Minimize);
        (MetaHeader::describe(&params, 16, 16, 3, &records), records)
    }

    #[test]
    fn parses_what_it_writes() {
        let (header, records) = sample();
        let bytes = encode_metadata(&header, &records);
        assert_eq!(bytes.len(), META_HEADER_SIZE + 4 * RECORD_SIZE);
        let (h, r) = decode_metadata(&bytes).unwrap();
        assert_eq!(h, header);
        assert_eq!(r, records);
        assert_eq!(h.params().policy, MatchPolicy::Minimize);
        assert_eq!(h.params().threshold, 270);
    }

    #[test]
    fn sentinel_is_stored_as_minus_one() {
        let (header, records) = sample();
        let bytes = encode_metadata(&header, &records);
        let second = &bytes[META_HEADER_SIZE + RECORD_SIZE..META_HEADER_SIZE + 2 * RECORD_SIZE];
        assert_eq!(second, &[0xff; 8]);
    }

    #[test]
    fn flipped_record_byte_fails_checksum() {
        let (header, records) = sample();
        let mut bytes = encode_metadata(&header, &records);
        bytes[META_HEADER_SIZE] ^= 0x01;
        let err = decode_metadata(&bytes).unwrap_err().to_string();
        assert!(err.contains("checksum mismatch"), "got: {err}");
    }

    #[test]
    fn truncated_body_is_rejected() {
        let (header, records) = sample();
        let bytes = encode_metadata(&header, &records);
        let err = decode_metadata(&bytes[..bytes.len() - 3]).unwrap_err().to_string();
        assert!(err.contains("declares 4 records"), "got: {err}");
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let err = decode_metadata(&[0u8; 64]).unwrap_err().to_string();
        assert!(err.contains("magic"), "got: {err}");
    }
}
