/// Integration tests: blob archives with every bundled compressor, and the
/// file driver end to end (encode → artifacts on disk → decode, sequence
/// encode → pack → unpack).
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use blockdelta_codecs::{compressor_by_id, compressor_by_name, Lz4Compressor, StoreCompressor, ZstdCompressor};
use blockdelta_core::driver;
use blockdelta_core::imageio::{load_frame, save_frame};
use blockdelta_core::{
    BlobReader, BlobWriter, CodecParams, ColorMode, Frame, MatchPolicy, MatchRecord, ResidualCodec,
};

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// A textured frame shifted left by `shift` pixels.
fn panned_frame(width: usize, height: usize, channels: usize, shift: usize) -> Frame {
    let mut data = Vec::with_capacity(width * height * channels);
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                data.push((((x + shift) * 5 + y * 11 + c * 40) % 200) as u8);
            }
        }
    }
    Frame::new(width, height, channels, data).unwrap()
}

// ── helpers ───────────────────────────────────────────────────────────────

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("blockdelta_test_{}.bdpack", name))
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("blockdelta_test_{}", name));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

// ── archive tests ─────────────────────────────────────────────────────────

#[test]
fn test_archive_round_trip_every_compressor() {
    let blobs: Vec<(u64, String, Vec<u8>)> = vec![
        (1, "a.blockmeta".into(), pseudo_random_bytes(300, 1)),
        (1, "a.residual.png".into(), vec![0u8; 5000]),
        (2, "b.blockmeta".into(), Vec::new()),
        (2, "b.residual.png".into(), pseudo_random_bytes(70_000, 2)),
    ];

    for name in ["store", "zstd", "lz4", "deflate"] {
        let packer = compressor_by_name(name, None).unwrap();
        let unpacker = compressor_by_id(packer.id()).unwrap();
        let path = temp_path(&format!("roundtrip_{name}"));
        let mut w = BlobWriter::create(&path, packer).unwrap();
        for (id, n, bytes) in &blobs {
            w.store(*id, n, bytes).unwrap();
        }
        assert_eq!(w.finish().unwrap(), 4);

        let mut r = BlobReader::open(&path, unpacker).unwrap();
        assert_eq!(r.blob_count(), 4);
        let fetched = r.fetch_all().unwrap();
        for ((id, n, bytes), got) in blobs.iter().zip(&fetched) {
            assert_eq!(got.id, *id, "{name}");
            assert_eq!(&got.name, n, "{name}");
            assert_eq!(&got.bytes, bytes, "{name}: blob {n} should round-trip byte-exact");
        }
    }
}

#[test]
fn test_fetch_by_id_returns_frame_pair() {
    let path = temp_path("by_id");
    let mut w = BlobWriter::create(&path, Box::new(ZstdCompressor::default())).unwrap();
    for id in 1..=3u64 {
        w.store(id, &format!("f{id}.blockmeta"), &[id as u8; 16]).unwrap();
        w.store(id, &format!("f{id}.residual.png"), &[id as u8; 64]).unwrap();
    }
    w.finish().unwrap();

    let mut r = BlobReader::open(&path, Arc::new(ZstdCompressor::default())).unwrap();
    let pair = r.fetch_by_id(2).unwrap();
    let names: Vec<&str> = pair.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["f2.blockmeta", "f2.residual.png"]);
    assert!(r.fetch_by_id(9).unwrap().is_empty());
}

#[test]
fn test_compressor_mismatch_error() {
    let path = temp_path("compressor_mismatch");
    let mut w = BlobWriter::create(&path, Box::new(ZstdCompressor::default())).unwrap();
    w.store(0, "x", b"hello world test data for compressor mismatch").unwrap();
    w.finish().unwrap();

    assert_eq!(BlobReader::peek_compressor_id(&path).unwrap(), 1);
    let result = BlobReader::open(&path, Arc::new(Lz4Compressor));
    assert!(result.is_err(), "opening with wrong compressor should fail");
    let err = result.err().unwrap().to_string();
    assert!(
        err.contains("compressor mismatch"),
        "error message should mention compressor mismatch, got: {err}"
    );
}

#[test]
fn test_corrupted_payload_fails_checksum() {
    let path = temp_path("corrupt");
    let mut w = BlobWriter::create(&path, Box::new(StoreCompressor)).unwrap();
    w.store(7, "frame", &pseudo_random_bytes(256, 9)).unwrap();
    w.finish().unwrap();

    // Header (40) + name_len (2) + name (5) puts the payload at byte 47.
    let mut bytes = fs::read(&path).unwrap();
    bytes[47 + 10] ^= 0xff;
    fs::write(&path, &bytes).unwrap();

    let mut r = BlobReader::open(&path, Arc::new(StoreCompressor)).unwrap();
    let err = r.fetch(0).unwrap_err().to_string();
    assert!(err.contains("checksum mismatch"), "got: {err}");
}

#[test]
fn test_corrupt_blob_count_is_rejected_before_allocating() {
    let path = temp_path("corrupt_count");
    let mut w = BlobWriter::create(&path, Box::new(StoreCompressor)).unwrap();
    w.store(1, "a", b"payload").unwrap();
    w.finish().unwrap();

    // blob_count lives at header bytes 12..20.
    let mut bytes = fs::read(&path).unwrap();
    bytes[12..20].copy_from_slice(&u64::MAX.to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    let err = BlobReader::open(&path, Arc::new(StoreCompressor)).err().unwrap().to_string();
    assert!(err.contains("corrupt archive"), "got: {err}");
}

#[test]
fn test_corrupt_index_entry_fails_index_checksum() {
    let path = temp_path("corrupt_index");
    let mut w = BlobWriter::create(&path, Box::new(ZstdCompressor::default())).unwrap();
    w.store(1, "a", &pseudo_random_bytes(128, 3)).unwrap();
    w.finish().unwrap();

    // Inflate raw_len (entry bytes 20..24) of the single index entry.
    let mut bytes = fs::read(&path).unwrap();
    let entry = bytes.len() - 8 - 40;
    bytes[entry + 20..entry + 24].copy_from_slice(&u32::MAX.to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    let err = BlobReader::open(&path, Arc::new(ZstdCompressor::default()))
        .err()
        .unwrap()
        .to_string();
    assert!(err.contains("index checksum mismatch"), "got: {err}");
}

#[test]
fn test_empty_archive() {
    let path = temp_path("empty");
    let w = BlobWriter::create(&path, Box::new(Lz4Compressor)).unwrap();
    assert_eq!(w.finish().unwrap(), 0);
    let mut r = BlobReader::open(&path, Arc::new(Lz4Compressor)).unwrap();
    assert!(r.fetch_all().unwrap().is_empty());
    assert_eq!(r.ratio(), 1.0);
}

// ── driver tests ──────────────────────────────────────────────────────────

#[test]
fn test_minimize_files_round_trip_exactly() {
    let dir = temp_dir("minimize_files");
    let reference = dir.join("ref.png");
    let target = dir.join("tgt.png");
    save_frame(&panned_frame(64, 48, 3, 0), &reference).unwrap();
    save_frame(&panned_frame(64, 48, 3, 3), &target).unwrap();

    let params = CodecParams::for_channels(3).with_policy(MatchPolicy::Minimize);
    let art = driver::encode_files(&reference, &target, &dir.join("out"), &params, ColorMode::Rgb).unwrap();
    assert!(art.metadata.ends_with("tgt.blockmeta"));
    assert!(art.residual.ends_with("tgt.residual.png"));

    let out = dir.join("decoded.png");
    driver::decode_files(&reference, &art.residual, &art.metadata, &out).unwrap();
    assert_eq!(
        load_frame(&out, ColorMode::Rgb).unwrap(),
        load_frame(&target, ColorMode::Rgb).unwrap()
    );
}

#[test]
fn test_threshold_files_keep_raw_fallback_blocks() {
    let dir = temp_dir("threshold_files");
    let reference = dir.join("ref.png");
    let target = dir.join("tgt.png");
    save_frame(&Frame::filled(16, 16, 1, 0).unwrap(), &reference).unwrap();
    save_frame(&Frame::filled(16, 16, 1, 255).unwrap(), &target).unwrap();

    let params = CodecParams {
        block_size: 8,
        radius: 4,
        threshold: 10,
        policy: MatchPolicy::ThresholdAccept,
    };
    let art = driver::encode_files(&reference, &target, &dir, &params, ColorMode::Luma).unwrap();
    let (header, records) = driver::read_metadata(&art.metadata).unwrap();
    assert_eq!(header.params(), params);
    assert_eq!(records, vec![MatchRecord::NONE; 4]);
    assert_eq!(
        load_frame(&art.residual, ColorMode::Luma).unwrap(),
        Frame::filled(16, 16, 1, 255).unwrap()
    );

    let out = dir.join("decoded.png");
    driver::decode_files(&reference, &art.residual, &art.metadata, &out).unwrap();
    assert_eq!(
        load_frame(&out, ColorMode::Luma).unwrap(),
        Frame::filled(16, 16, 1, 255).unwrap()
    );
}

#[test]
fn test_decode_rejects_residual_of_other_size() {
    let dir = temp_dir("wrong_residual");
    let reference = dir.join("ref.png");
    save_frame(&panned_frame(32, 32, 1, 0), &reference).unwrap();
    save_frame(&panned_frame(32, 32, 1, 1), &dir.join("tgt.png")).unwrap();
    let art = driver::encode_files(
        &reference,
        &dir.join("tgt.png"),
        &dir,
        &CodecParams::default(),
        ColorMode::Luma,
    )
    .unwrap();

    save_frame(&panned_frame(16, 16, 1, 0), &art.residual).unwrap();
    let err = driver::decode_files(&reference, &art.residual, &art.metadata, &dir.join("x.png"))
        .unwrap_err()
        .to_string();
    assert!(err.contains("metadata describes a 32x32 frame"), "got: {err}");
}

#[test]
fn test_sequence_encode_pack_unpack() {
    let dir = temp_dir("sequence");
    let frames_dir = dir.join("frames");
    fs::create_dir_all(&frames_dir).unwrap();
    for t in 0..4 {
        save_frame(&panned_frame(48, 32, 1, t), &frames_dir.join(format!("bbb_{t:03}.png"))).unwrap();
    }
    fs::write(frames_dir.join("notes.txt"), b"not a frame").unwrap();

    let params = CodecParams::default().with_policy(MatchPolicy::Minimize);
    let artifacts = driver::encode_sequence(&frames_dir, &dir.join("out"), &params, ColorMode::Luma).unwrap();
    assert_eq!(artifacts.len(), 3);
    assert_eq!(artifacts.iter().map(|a| a.frame).collect::<Vec<_>>(), vec![1, 2, 3]);

    // Every frame decodes on its own against the key frame.
    let key = frames_dir.join("bbb_000.png");
    for (art, t) in artifacts.iter().zip(1..) {
        let out = dir.join(format!("decoded_{t}.png"));
        driver::decode_files(&key, &art.residual, &art.metadata, &out).unwrap();
        assert_eq!(
            load_frame(&out, ColorMode::Luma).unwrap(),
            panned_frame(48, 32, 1, t)
        );
    }

    let archive = temp_path("sequence");
    let count = driver::pack_artifacts(&artifacts, &archive, Box::new(ZstdCompressor::default())).unwrap();
    assert_eq!(count, 6);

    let mut r = BlobReader::open(&archive, Arc::new(ZstdCompressor::default())).unwrap();
    let ids: Vec<u64> = r.entries().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 1, 2, 2, 3, 3]);
    assert_eq!(r.fetch(2).unwrap().name, "bbb_002.blockmeta");

    let unpacked = dir.join("unpacked");
    let written = driver::unpack_archive(&archive, Arc::new(ZstdCompressor::default()), &unpacked).unwrap();
    assert_eq!(written.len(), 6);
    for art in &artifacts {
        let name = art.residual.file_name().unwrap();
        assert_eq!(fs::read(unpacked.join(name)).unwrap(), fs::read(&art.residual).unwrap());
    }
}

#[test]
fn test_sequence_keeps_dotted_frame_names_apart() {
    let dir = temp_dir("dotted");
    let frames_dir = dir.join("frames");
    fs::create_dir_all(&frames_dir).unwrap();
    for t in 0..3 {
        save_frame(&panned_frame(16, 16, 1, t), &frames_dir.join(format!("clip.{t:04}.png"))).unwrap();
    }

    let params = CodecParams::default().with_policy(MatchPolicy::Minimize);
    let artifacts = driver::encode_sequence(&frames_dir, &dir.join("out"), &params, ColorMode::Luma).unwrap();
    assert_eq!(artifacts.len(), 2);
    assert_ne!(artifacts[0].metadata, artifacts[1].metadata);
    assert!(artifacts[0].metadata.ends_with("clip.0001.blockmeta"));
    assert!(artifacts[1].residual.ends_with("clip.0002.residual.png"));

    let key = frames_dir.join("clip.0000.png");
    for (art, t) in artifacts.iter().zip(1..) {
        let out = dir.join(format!("decoded_{t}.png"));
        driver::decode_files(&key, &art.residual, &art.metadata, &out).unwrap();
        assert_eq!(load_frame(&out, ColorMode::Luma).unwrap(), panned_frame(16, 16, 1, t));
    }
}

#[test]
fn test_sequence_rejects_frames_sharing_a_stem() {
    let dir = temp_dir("shared_stem");
    save_frame(&panned_frame(16, 16, 1, 0), &dir.join("a.png")).unwrap();
    save_frame(&panned_frame(16, 16, 1, 1), &dir.join("b.jpg")).unwrap();
    save_frame(&panned_frame(16, 16, 1, 2), &dir.join("b.png")).unwrap();

    let err = driver::encode_sequence(&dir, &dir.join("out"), &CodecParams::default(), ColorMode::Luma)
        .unwrap_err()
        .to_string();
    assert!(err.contains("share the artifact name 'b'"), "got: {err}");
    assert!(!dir.join("out").join("b.blockmeta").exists());
}

#[test]
fn test_failed_residual_write_leaves_no_metadata() {
    let dir = temp_dir("failed_residual");
    let frame = panned_frame(16, 16, 1, 0);
    let enc = ResidualCodec::default().encode(&frame, &panned_frame(16, 16, 1, 1)).unwrap();

    // A directory where the residual image should go makes the save fail.
    fs::create_dir_all(dir.join("f.residual.png")).unwrap();
    let result = driver::write_artifacts(&enc, &CodecParams::default(), "f", 1, &dir);
    assert!(result.is_err());
    assert!(!dir.join("f.blockmeta").exists());
}

#[test]
fn test_sequence_with_mismatched_frame_fails() {
    let dir = temp_dir("sequence_mismatch");
    save_frame(&panned_frame(32, 32, 1, 0), &dir.join("a.png")).unwrap();
    save_frame(&panned_frame(32, 32, 1, 1), &dir.join("b.png")).unwrap();
    save_frame(&panned_frame(40, 32, 1, 2), &dir.join("c.png")).unwrap();

    let err = driver::encode_sequence(&dir, &dir.join("out"), &CodecParams::default(), ColorMode::Luma)
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("frame 2"), "got: {msg}");
    assert!(msg.contains("dimension mismatch"), "got: {msg}");
}

#[test]
fn test_in_memory_decode_matches_file_decode() {
    let reference = panned_frame(32, 24, 1, 0);
    let target = panned_frame(32, 24, 1, 2);
    let codec = ResidualCodec::new(CodecParams::default());
    let enc = codec.encode(&reference, &target).unwrap();

    let dir = temp_dir("in_memory");
    let art = driver::write_artifacts(&enc, codec.params(), "frame", 1, &dir).unwrap();
    let (_, records) = driver::read_metadata(&art.metadata).unwrap();
    assert_eq!(records, enc.metadata);
    assert_eq!(load_frame(&art.residual, ColorMode::Luma).unwrap(), enc.residual);
}
