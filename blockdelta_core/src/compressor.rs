/// Byte-level compression applied to each blob of an archive.
///
/// Each blob is packed independently, so any blob can be unpacked without
/// touching its neighbors. The compressor's `id()` is stored in the archive
/// header and checked when the archive is reopened.
pub trait Compressor: Send + Sync {
    /// Stable id stored in the archive header.
    fn id(&self) -> u16;

    /// Human-readable name for CLI display.
    fn name(&self) -> &'static str;

    fn compress(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Unpack one blob. `raw_len` is the original length recorded in the
    /// archive index; implementations may use it to size their output.
    fn decompress(&self, packed: &[u8], raw_len: usize) -> anyhow::Result<Vec<u8>>;
}
