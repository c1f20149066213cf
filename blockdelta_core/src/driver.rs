//! File-level entry points: encode a pair of images, decode one back, encode
//! a directory of frames, and move artifacts in and out of a blob archive.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::compressor::Compressor;
use crate::frame::Frame;
use crate::imageio::{load_frame, save_frame, ColorMode};
use crate::metadata::{decode_metadata, encode_metadata, MetaHeader};
use crate::params::CodecParams;
use crate::reader::BlobReader;
use crate::residual::{Encoded, ResidualCodec};
use crate::sequence::MultiFrameEncoder;
use crate::writer::BlobWriter;

/// Extension of metadata files.
pub const METADATA_EXT: &str = "blockmeta";

/// Suffix of residual images; always PNG so residuals survive losslessly.
pub const RESIDUAL_SUFFIX: &str = "residual.png";

/// Artifacts written for one encoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPaths {
    /// Position of the encoded frame in its sequence (the key frame is 0).
    pub frame: usize,
    pub metadata: PathBuf,
    pub residual: PathBuf,
}

/// Artifact stem of a frame image: its file name without the final
/// extension, so `clip.0001.png` becomes `clip.0001`.
fn file_stem(path: &Path) -> anyhow::Result<String> {
    path.file_stem()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("cannot derive an artifact name from {}", path.display()))
}

/// Write the metadata file and residual image of `encoded` into `out_dir`
/// as `<stem>.blockmeta` and `<stem>.residual.png`.
pub fn write_artifacts(
    encoded: &Encoded,
    params: &CodecParams,
    stem: &str,
    frame: usize,
    out_dir: &Path,
) -> anyhow::Result<EncodedPaths> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    let residual = &encoded.residual;
    let header = MetaHeader::describe(
        params,
        residual.width(),
        residual.height(),
        residual.channels(),
        &encoded.metadata,
    );

    // Residual first: a metadata file on disk always has its residual.
    let residual_path = out_dir.join(format!("{stem}.{RESIDUAL_SUFFIX}"));
    save_frame(residual, &residual_path)?;

    let metadata_path = out_dir.join(format!("{stem}.{METADATA_EXT}"));
    fs::write(&metadata_path, encode_metadata(&header, &encoded.metadata))
        .with_context(|| format!("writing metadata {}", metadata_path.display()))?;

    Ok(EncodedPaths {
        frame,
        metadata: metadata_path,
        residual: residual_path,
    })
}

/// Encode `target` against `reference` and write both artifacts to `out_dir`.
pub fn encode_files(
    reference: &Path,
    target: &Path,
    out_dir: &Path,
    params: &CodecParams,
    color: ColorMode,
) -> anyhow::Result<EncodedPaths> {
    let reference_frame = load_frame(reference, color)?;
    let target_frame = load_frame(target, color)?;
    let encoded = ResidualCodec::new(*params)
        .encode(&reference_frame, &target_frame)
        .with_context(|| format!("encoding {} against {}", target.display(), reference.display()))?;
    info!(
        target = %target.display(),
        blocks = encoded.metadata.len(),
        matched = encoded.matched_blocks(),
        "encoded frame"
    );
    write_artifacts(&encoded, params, &file_stem(target)?, 1, out_dir)
}

/// Read a metadata file written by [`write_artifacts`].
pub fn read_metadata(path: &Path) -> anyhow::Result<(MetaHeader, Vec<crate::MatchRecord>)> {
    let bytes = fs::read(path).with_context(|| format!("reading metadata {}", path.display()))?;
    decode_metadata(&bytes).with_context(|| format!("parsing metadata {}", path.display()))
}

/// Rebuild a frame from its reference, residual image and metadata file, and
/// write it to `output`. Block size, policy and color mode come from the
/// metadata header.
pub fn decode_files(
    reference: &Path,
    residual: &Path,
    metadata: &Path,
    output: &Path,
) -> anyhow::Result<PathBuf> {
    let (header, records) = read_metadata(metadata)?;
    let color = ColorMode::from_channels(header.channels as usize).ok_or_else(|| {
        anyhow::anyhow!("metadata {} declares {} channels", metadata.display(), header.channels)
    })?;

    let reference_frame = load_frame(reference, color)?;
    let residual_frame = load_frame(residual, color)?;
    if residual_frame.width() != header.width as usize
        || residual_frame.height() != header.height as usize
    {
        anyhow::bail!(
            "residual {} is {}x{} but metadata describes a {}x{} frame",
            residual.display(),
            residual_frame.width(),
            residual_frame.height(),
            header.width,
            header.height
        );
    }

    let decoded = ResidualCodec::new(header.params())
        .decode(&reference_frame, &residual_frame, &records)
        .with_context(|| format!("decoding {}", residual.display()))?;
    save_frame(&decoded, output)?;
    info!(output = %output.display(), blocks = records.len(), "decoded frame");
    Ok(output.to_path_buf())
}

/// Image files of `dir` sorted by file name; the sort order is the frame
/// order of the sequence.
pub fn list_frames(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
            .unwrap_or(false);
        if path.is_file() && is_image {
            frames.push(path);
        }
    }
    frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(frames)
}

/// Encode every frame of `dir` against its first frame and write one
/// artifact pair per non-key frame into `out_dir`.
pub fn encode_sequence(
    dir: &Path,
    out_dir: &Path,
    params: &CodecParams,
    color: ColorMode,
) -> anyhow::Result<Vec<EncodedPaths>> {
    let paths = list_frames(dir)?;
    if paths.is_empty() {
        anyhow::bail!("no image frames found in {}", dir.display());
    }
    info!(dir = %dir.display(), frames = paths.len(), key = %paths[0].display(), "encoding sequence");

    let stems = paths[1..]
        .iter()
        .map(|p| file_stem(p))
        .collect::<anyhow::Result<Vec<String>>>()?;
    let mut seen = HashSet::new();
    for (stem, path) in stems.iter().zip(&paths[1..]) {
        if !seen.insert(stem.as_str()) {
            anyhow::bail!(
                "frames of {} share the artifact name '{}' ({})",
                dir.display(),
                stem,
                path.display()
            );
        }
    }

    let frames = paths
        .iter()
        .map(|p| load_frame(p, color))
        .collect::<anyhow::Result<Vec<Frame>>>()?;
    let encoded = MultiFrameEncoder::new(ResidualCodec::new(*params))
        .encode(&frames)
        .with_context(|| format!("encoding sequence {}", dir.display()))?;

    encoded
        .iter()
        .zip(&stems)
        .enumerate()
        .map(|(i, (enc, stem))| write_artifacts(enc, params, stem, i + 1, out_dir))
        .collect()
}

/// Store each frame's metadata and residual in a new archive at `archive`,
/// both under the frame's sequence index. Returns the number of blobs.
pub fn pack_artifacts(
    artifacts: &[EncodedPaths],
    archive: &Path,
    compressor: Box<dyn Compressor>,
) -> anyhow::Result<u64> {
    let mut writer = BlobWriter::create(archive, compressor)
        .with_context(|| format!("creating archive {}", archive.display()))?;
    for art in artifacts {
        for path in [&art.metadata, &art.residual] {
            let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("unnamed artifact {}", path.display()))?;
            writer.store(art.frame as u64, name, &bytes)?;
        }
    }
    let count = writer.finish()?;
    info!(archive = %archive.display(), blobs = count, "packed artifacts");
    Ok(count)
}

/// Write every blob of `archive` into `out_dir` under its stored name.
pub fn unpack_archive(
    archive: &Path,
    compressor: Arc<dyn Compressor>,
    out_dir: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    let mut reader = BlobReader::open(archive, compressor)
        .with_context(|| format!("opening archive {}", archive.display()))?;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let mut written = Vec::new();
    for blob in reader.fetch_all()? {
        let name = Path::new(&blob.name);
        if name.components().count() != 1 || name.file_name().is_none() {
            anyhow::bail!("refusing to unpack blob {} with path-like name '{}'", blob.id, blob.name);
        }
        let path = out_dir.join(name);
        fs::write(&path, &blob.bytes).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }
    info!(archive = %archive.display(), files = written.len(), "unpacked archive");
    Ok(written)
}
