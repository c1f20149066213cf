//! blockdelta demo
//!
//! Generates a synthetic panning sequence in memory, encodes every frame
//! against the first one under both match policies, checks reconstruction
//! quality, and compares archive sizes across the bundled compressors.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;

use blockdelta_codecs::{compressor_by_id, DeflateCompressor, Lz4Compressor, StoreCompressor, ZstdCompressor};
use blockdelta_core::metadata::{encode_metadata, MetaHeader};
use blockdelta_core::{
    BlobReader, BlobWriter, CodecParams, Compressor, Encoded, Frame, MatchPolicy, MultiFrameEncoder,
    ResidualCodec,
};

// ── constants ──────────────────────────────────────────────────────────────

const WIDTH: usize = 256;
const HEIGHT: usize = 192;
const FRAMES: usize = 12;

// ── data generator ─────────────────────────────────────────────────────────

/// Frame `t` of a scene that pans one pixel per frame to the left, with a
/// bright square drifting diagonally on top.
fn scene(t: usize, channels: usize) -> Result<Frame> {
    let mut data = Vec::with_capacity(WIDTH * HEIGHT * channels);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let sx = x + t;
            let base = ((sx / 6 + y / 6) % 2) as u32 * 60 + ((sx * 3 + y * 2) % 90) as u32;
            let in_square = (40 + 2 * t..72 + 2 * t).contains(&x) && (30 + t..62 + t).contains(&y);
            for c in 0..channels {
                let v = if in_square { 220 + c as u32 * 10 } else { base + c as u32 * 25 };
                data.push(v.min(255) as u8);
            }
        }
    }
    Ok(Frame::new(WIDTH, HEIGHT, channels, data)?)
}

fn psnr(a: &Frame, b: &Frame) -> f64 {
    let mse = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&p, &q)| {
            let d = p as f64 - q as f64;
            d * d
        })
        .sum::<f64>()
        / a.data().len() as f64;
    if mse == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (255.0 * 255.0 / mse).log10()
    }
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("blockdelta_demo_{}.bdpack", name))
}

/// Pack every frame's metadata and raw residual samples, then reopen the
/// archive and verify it. Returns (archive bytes on disk, pack seconds).
fn pack_all(
    encoded: &[Encoded],
    params: &CodecParams,
    compressor: Box<dyn Compressor>,
) -> Result<(u64, f64)> {
    let path = temp_path(compressor.name());
    let id = compressor.id();
    let t0 = Instant::now();
    let mut writer = BlobWriter::create(&path, compressor)?;
    for (i, enc) in encoded.iter().enumerate() {
        let r = &enc.residual;
        let header = MetaHeader::describe(params, r.width(), r.height(), r.channels(), &enc.metadata);
        writer.store(i as u64 + 1, &format!("frame{:03}.blockmeta", i + 1), &encode_metadata(&header, &enc.metadata))?;
        writer.store(i as u64 + 1, &format!("frame{:03}.residual", i + 1), r.data())?;
    }
    writer.finish()?;
    let elapsed = t0.elapsed().as_secs_f64();

    let mut reader = BlobReader::open(&path, compressor_by_id(id)?)?;
    let blobs = reader.fetch_all()?;
    anyhow::ensure!(blobs.len() == encoded.len() * 2, "archive lost blobs");
    for (i, enc) in encoded.iter().enumerate() {
        anyhow::ensure!(blobs[2 * i + 1].bytes == enc.residual.data(), "residual {} corrupted", i + 1);
    }

    let size = std::fs::metadata(&path)?.len();
    std::fs::remove_file(&path)?;
    Ok((size, elapsed))
}

fn run(channels: usize) -> Result<()> {
    let frames = (0..FRAMES).map(|t| scene(t, channels)).collect::<Result<Vec<_>>>()?;
    let key = &frames[0];
    let raw_bytes = (FRAMES - 1) * WIDTH * HEIGHT * channels;

    println!();
    println!(
        "=== {} sequence: {} frames of {}x{} ({} raw bytes after the key frame) ===",
        if channels == 1 { "luma" } else { "rgb" },
        FRAMES,
        WIDTH,
        HEIGHT,
        raw_bytes
    );

    for policy in [MatchPolicy::ThresholdAccept, MatchPolicy::Minimize] {
        let params = CodecParams::for_channels(channels).with_policy(policy);
        let encoder = MultiFrameEncoder::new(ResidualCodec::new(params));

        let t0 = Instant::now();
        let encoded = encoder.encode(&frames)?;
        let encode_secs = t0.elapsed().as_secs_f64();

        let total_blocks: usize = encoded.iter().map(|e| e.metadata.len()).sum();
        let matched: usize = encoded.iter().map(Encoded::matched_blocks).sum();

        let mut worst_psnr = f64::INFINITY;
        for (enc, original) in encoded.iter().zip(&frames[1..]) {
            let dec = encoder.codec().decode(key, &enc.residual, &enc.metadata)?;
            worst_psnr = worst_psnr.min(psnr(&dec, original));
        }

        println!();
        println!("  policy        : {}", policy.name());
        println!("  threshold     : {}", params.threshold);
        println!(
            "  matched       : {} / {} blocks ({:.1}%)",
            matched,
            total_blocks,
            100.0 * matched as f64 / total_blocks as f64
        );
        println!("  encode        : {:.3}s", encode_secs);
        if worst_psnr.is_infinite() {
            println!("  reconstruction: exact");
        } else {
            println!("  reconstruction: worst PSNR {:.2} dB", worst_psnr);
        }

        let compressors: Vec<Box<dyn Compressor>> = vec![
            Box::new(StoreCompressor),
            Box::new(Lz4Compressor),
            Box::new(DeflateCompressor::default()),
            Box::new(ZstdCompressor::default()),
        ];
        for c in compressors {
            let name = c.name();
            let (size, secs) = pack_all(&encoded, &params, c)?;
            println!(
                "  {:<8} archive: {:>9} bytes  {:>6.2}x  ({:.3}s)",
                name,
                size,
                raw_bytes as f64 / size as f64,
                secs
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    run(1)?;
    run(3)?;
    Ok(())
}
