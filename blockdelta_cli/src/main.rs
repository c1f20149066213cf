use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use blockdelta_codecs::{compressor_by_id, compressor_by_name};
use blockdelta_core::driver::{self, EncodedPaths, METADATA_EXT, RESIDUAL_SUFFIX};
use blockdelta_core::format::PACK_MAGIC;
use blockdelta_core::params::{DEFAULT_BLOCK_SIZE, DEFAULT_RADIUS};
use blockdelta_core::{BlobReader, CodecParams, ColorMode, MatchPolicy};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "blockdelta",
    about = "Block-matching inter-frame codec: encode frames against a key frame, decode them back, pack artifacts",
    version
)]
struct Cli {
    /// Worker threads for block and frame parallelism (default: all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
    /// Log progress at info level
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log at debug level (per-frame and per-blob detail)
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CodecArgs {
    /// Match policy: threshold | minimize
    #[arg(short, long, default_value = "threshold")]
    policy: String,
    /// Block side in pixels; frame dimensions must be multiples of it
    #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,
    /// Search radius around each block's own position
    #[arg(short, long, default_value_t = DEFAULT_RADIUS)]
    radius: usize,
    /// SAD acceptance threshold (default: 90 for luma, 270 for rgb)
    #[arg(short, long)]
    threshold: Option<u64>,
    /// Color mode: luma | rgb
    #[arg(short, long, default_value = "luma")]
    color: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a target frame against a reference frame
    Encode {
        /// Reference (key) frame image
        reference: PathBuf,
        /// Frame to encode
        target: PathBuf,
        /// Directory for the .blockmeta and .residual.png artifacts
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Rebuild a frame from its reference, residual image and metadata
    Decode {
        /// Reference (key) frame image used at encode time
        reference: PathBuf,
        /// Residual image (.residual.png)
        residual: PathBuf,
        /// Metadata file (.blockmeta)
        metadata: PathBuf,
        /// Output image path; format follows the extension
        output: PathBuf,
    },
    /// Encode every frame of a directory against its first frame
    EncodeSeq {
        /// Directory of frames, ordered by file name
        dir: PathBuf,
        /// Directory for the artifacts
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,
        /// Also pack all artifacts into this archive
        #[arg(long)]
        pack: Option<PathBuf>,
        /// Archive compressor: store | zstd | lz4 | deflate
        #[arg(long, default_value = "zstd")]
        compressor: String,
        /// Compressor level (zstd 1–22, deflate 0–9)
        #[arg(long)]
        level: Option<i32>,
        #[command(flatten)]
        codec: CodecArgs,
    },
    /// Pack a directory of artifacts into an archive
    Pack {
        /// Directory holding <name>.blockmeta / <name>.residual.png pairs
        dir: PathBuf,
        /// Destination archive
        archive: PathBuf,
        /// Archive compressor: store | zstd | lz4 | deflate
        #[arg(long, default_value = "zstd")]
        compressor: String,
        /// Compressor level (zstd 1–22, deflate 0–9)
        #[arg(long)]
        level: Option<i32>,
    },
    /// Extract every blob of an archive into a directory
    Unpack {
        /// Source archive
        archive: PathBuf,
        /// Destination directory
        #[arg(default_value = ".")]
        out_dir: PathBuf,
    },
    /// Describe a .blockmeta file or an archive
    Inspect {
        /// File to inspect
        file: PathBuf,
        /// Print per-block (metadata) or per-blob (archive) details
        #[arg(long)]
        blocks: bool,
        /// Print metadata as JSON
        #[arg(long)]
        json: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init(threads: Option<usize>, verbose: bool, debug: bool) -> anyhow::Result<()> {
    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .context("initializing thread pool")?;
    }

    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    debug!(threads = rayon::current_num_threads(), "worker pool ready");
    Ok(())
}

fn policy_from_name(name: &str) -> anyhow::Result<MatchPolicy> {
    match name {
        "threshold" | "t" => Ok(MatchPolicy::ThresholdAccept),
        "minimize" | "min" | "m" => Ok(MatchPolicy::Minimize),
        other => anyhow::bail!("unknown policy '{}'. Valid options: threshold, minimize", other),
    }
}

fn color_from_name(name: &str) -> anyhow::Result<ColorMode> {
    match name {
        "luma" | "gray" | "l" => Ok(ColorMode::Luma),
        "rgb" => Ok(ColorMode::Rgb),
        other => anyhow::bail!("unknown color mode '{}'. Valid options: luma, rgb", other),
    }
}

impl CodecArgs {
    fn resolve(&self) -> anyhow::Result<(CodecParams, ColorMode)> {
        let color = color_from_name(&self.color)?;
        let defaults = CodecParams::for_channels(color.channels());
        let params = CodecParams {
            block_size: self.block_size,
            radius: self.radius,
            threshold: self.threshold.unwrap_or(defaults.threshold),
            policy: policy_from_name(&self.policy)?,
        };
        Ok((params, color))
    }
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn artifact_size(art: &EncodedPaths) -> anyhow::Result<u64> {
    Ok(fs::metadata(&art.metadata)?.len() + fs::metadata(&art.residual)?.len())
}

/// Pair every `<stem>.blockmeta` of `dir` with its `<stem>.residual.png`,
/// sorted by stem; ids follow that order starting at 1.
fn collect_artifacts(dir: &Path) -> anyhow::Result<Vec<EncodedPaths>> {
    let mut metas: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(METADATA_EXT))
        .collect();
    metas.sort();

    metas
        .into_iter()
        .enumerate()
        .map(|(i, metadata)| {
            let stem = metadata
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| anyhow::anyhow!("unnamed metadata file {}", metadata.display()))?;
            let residual = dir.join(format!("{stem}.{RESIDUAL_SUFFIX}"));
            if !residual.is_file() {
                anyhow::bail!(
                    "{} has no matching residual {}",
                    metadata.display(),
                    residual.display()
                );
            }
            Ok(EncodedPaths {
                frame: i + 1,
                metadata,
                residual,
            })
        })
        .collect()
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_encode(reference: PathBuf, target: PathBuf, out_dir: PathBuf, codec: CodecArgs) -> anyhow::Result<()> {
    let (params, color) = codec.resolve()?;
    let t0 = Instant::now();
    let art = driver::encode_files(&reference, &target, &out_dir, &params, color)?;
    let elapsed = t0.elapsed();

    let (header, records) = driver::read_metadata(&art.metadata)?;
    let matched = records.iter().filter(|r| !r.is_none()).count();
    let raw = fs::metadata(&target)?.len();

    eprintln!("  policy      : {}", params.policy.name());
    eprintln!("  frame       : {}x{}x{}", header.width, header.height, header.channels);
    eprintln!("  blocks      : {} ({} matched)", records.len(), matched);
    eprintln!("  target      : {}", human_bytes(raw));
    eprintln!("  artifacts   : {}", human_bytes(artifact_size(&art)?));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    println!("{}", art.metadata.display());
    println!("{}", art.residual.display());
    Ok(())
}

fn run_decode(reference: PathBuf, residual: PathBuf, metadata: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let t0 = Instant::now();
    let out = driver::decode_files(&reference, &residual, &metadata, &output)?;
    eprintln!("  elapsed     : {:.3}s", t0.elapsed().as_secs_f64());
    println!("{}", out.display());
    Ok(())
}

fn run_pack(artifacts: &[EncodedPaths], archive: &Path, compressor: &str, level: Option<i32>) -> anyhow::Result<()> {
    let compressor = compressor_by_name(compressor, level)?;
    let name = compressor.name();
    let count = driver::pack_artifacts(artifacts, archive, compressor)?;

    let raw: u64 = artifacts
        .iter()
        .map(artifact_size)
        .sum::<anyhow::Result<u64>>()?;
    let packed = fs::metadata(archive)?.len();
    eprintln!("  compressor  : {}", name);
    eprintln!("  blobs       : {}", count);
    eprintln!("  artifacts   : {}", human_bytes(raw));
    eprintln!("  archive     : {}", human_bytes(packed));
    Ok(())
}

fn run_encode_seq(
    dir: PathBuf,
    out_dir: PathBuf,
    pack: Option<PathBuf>,
    compressor: &str,
    level: Option<i32>,
    codec: CodecArgs,
) -> anyhow::Result<()> {
    let (params, color) = codec.resolve()?;
    let t0 = Instant::now();
    let artifacts = driver::encode_sequence(&dir, &out_dir, &params, color)?;
    let elapsed = t0.elapsed();

    for art in &artifacts {
        println!("{}\t{}\t{}", art.frame, art.metadata.display(), art.residual.display());
    }
    eprintln!("  frames      : {} (+1 key frame)", artifacts.len());
    eprintln!("  policy      : {}", params.policy.name());
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());

    if let Some(archive) = pack {
        run_pack(&artifacts, &archive, compressor, level)?;
    }
    Ok(())
}

fn run_unpack(archive: PathBuf, out_dir: PathBuf) -> anyhow::Result<()> {
    let compressor = compressor_by_id(BlobReader::peek_compressor_id(&archive)?)?;
    let written = driver::unpack_archive(&archive, compressor, &out_dir)?;
    for path in &written {
        println!("{}", path.display());
    }
    eprintln!("  files       : {}", written.len());
    Ok(())
}

fn inspect_metadata(file: &Path, show_blocks: bool, json: bool) -> anyhow::Result<()> {
    let (header, records) = driver::read_metadata(file)?;
    let matched = records.iter().filter(|r| !r.is_none()).count();

    if json {
        let doc = serde_json::json!({
            "version": header.version,
            "policy": header.policy,
            "channels": header.channels,
            "block_size": header.block_size,
            "width": header.width,
            "height": header.height,
            "radius": header.radius,
            "threshold": header.threshold,
            "records": records,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("=== Metadata: {:?} ===", file);
    println!();
    println!("  format version : {}", header.version);
    println!("  policy         : {}", header.policy.name());
    println!("  frame          : {}x{}x{}", header.width, header.height, header.channels);
    println!("  block size     : {}", header.block_size);
    println!("  radius         : {}", header.radius);
    println!("  threshold      : {}", header.threshold);
    println!("  blocks         : {}", records.len());
    println!("  matched        : {} ({:.1}%)", matched, 100.0 * matched as f64 / records.len().max(1) as f64);
    println!("  checksum       : {:016x}", header.checksum);

    if show_blocks {
        let bs = header.block_size.max(1) as usize;
        let per_row = (header.width as usize / bs).max(1);
        println!();
        println!("  {:>8}  {:>12}  {:>12}", "block", "position", "match");
        println!("  {}", "-".repeat(36));
        for (i, r) in records.iter().enumerate() {
            let pos = format!("({}, {})", (i % per_row) * bs, (i / per_row) * bs);
            let found = if r.is_none() {
                "-".to_string()
            } else {
                format!("({}, {})", r.x, r.y)
            };
            println!("  {:>8}  {:>12}  {:>12}", i, pos, found);
        }
    }
    Ok(())
}

fn inspect_archive(file: &Path, show_blocks: bool) -> anyhow::Result<()> {
    let compressor = compressor_by_id(BlobReader::peek_compressor_id(file)?)?;
    let reader = BlobReader::open(file, compressor.clone())?;
    let file_size = fs::metadata(file)?.len();

    println!("=== Archive: {:?} ===", file);
    println!();
    println!("  format version : {}", reader.header.version);
    println!("  compressor     : {} (id={})", compressor.name(), reader.header.compressor_id);
    println!("  blobs          : {}", reader.blob_count());
    println!("  raw size       : {}", human_bytes(reader.raw_size()));
    println!("  packed         : {}", human_bytes(reader.packed_size()));
    println!("  file on disk   : {}", human_bytes(file_size));
    println!("  ratio          : {:.2}x", reader.ratio());
    println!("  flags          : 0x{:016x}", reader.header.flags);

    if show_blocks {
        println!();
        println!(
            "  {:>6}  {:>6}  {:>12}  {:>12}  {:>12}  {:>16}",
            "blob", "id", "offset", "packed", "raw", "checksum"
        );
        println!("  {}", "-".repeat(72));
        for (i, e) in reader.entries().iter().enumerate() {
            println!(
                "  {:>6}  {:>6}  {:>12}  {:>12}  {:>12}  {:016x}",
                i,
                e.id,
                e.offset,
                human_bytes(e.packed_len as u64),
                human_bytes(e.raw_len as u64),
                e.checksum
            );
        }
    }
    Ok(())
}

fn run_inspect(file: PathBuf, show_blocks: bool, json: bool) -> anyhow::Result<()> {
    let mut magic = [0u8; 8];
    let n = File::open(&file)
        .and_then(|mut f| f.read(&mut magic))
        .with_context(|| format!("reading {}", file.display()))?;
    if n == magic.len() && &magic == PACK_MAGIC {
        if json {
            anyhow::bail!("--json is only supported for .{} files", METADATA_EXT);
        }
        inspect_archive(&file, show_blocks)
    } else {
        inspect_metadata(&file, show_blocks, json)
    }
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init(cli.threads, cli.verbose, cli.debug)?;
    match cli.command {
        Commands::Encode {
            reference,
            target,
            out_dir,
            codec,
        } => run_encode(reference, target, out_dir, codec),
        Commands::Decode {
            reference,
            residual,
            metadata,
            output,
        } => run_decode(reference, residual, metadata, output),
        Commands::EncodeSeq {
            dir,
            out_dir,
            pack,
            compressor,
            level,
            codec,
        } => run_encode_seq(dir, out_dir, pack, &compressor, level, codec),
        Commands::Pack {
            dir,
            archive,
            compressor,
            level,
        } => {
            let artifacts = collect_artifacts(&dir)?;
            if artifacts.is_empty() {
                anyhow::bail!("no .{} files found in {}", METADATA_EXT, dir.display());
            }
            run_pack(&artifacts, &archive, &compressor, level)
        }
        Commands::Unpack { archive, out_dir } => run_unpack(archive, out_dir),
        Commands::Inspect { file, blocks, json } => run_inspect(file, blocks, json),
    }
}
