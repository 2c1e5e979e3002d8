//! rapidgzip - parallel gzip/zlib/raw-deflate/BGZF decompressor.
//!
//! This application decompresses a gzip-family stream using many CPU cores
//! at once, built on top of the `rapidgzip` crate's chunked, speculative
//! decoding engine.
//!
//! # Architecture
//!
//! The heavy lifting lives in `rapidgzip::ParallelReader`, which itself
//! drives a three-stage pipeline (block finder, chunk decoder pool, marker
//! resolution) behind a single `Read + Seek` facade. This binary is a thin
//! CLI shell around that facade: argument parsing, mmap'd input, an
//! optional progress bar, and a buffered output writer.
//!
//! # Usage
//!
//! ```bash
//! # Decompress to stdout
//! rapidgzip -d -c archive.gz
//!
//! # Decompress to a file with 8-way parallelism
//! rapidgzip -d -P 8 -o out.bin archive.gz
//!
//! # Build and reuse a seek index
//! rapidgzip -d --export-index archive.gzi archive.gz
//! rapidgzip -d --import-index archive.gzi -c archive.gz
//! ```

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use memmap2::MmapOptions;

mod writer;
use rapidgzip::index::GzipIndex;
use rapidgzip::{open_bytes, ChunkConfiguration, Error};
use writer::OutputWriter;

/// Command-line arguments for rapidgzip.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file (gzip/zlib/raw-deflate/BGZF)
    input: PathBuf,

    /// Decompress the input (currently the only supported mode)
    #[arg(short = 'd', long = "decompress")]
    decompress: bool,

    /// Write decompressed output to stdout instead of a file
    #[arg(short = 'c', long = "stdout")]
    stdout: bool,

    /// Output file (defaults to the input file name with its compression
    /// suffix stripped)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Number of worker threads; 0 = automatic (hardware concurrency)
    #[arg(short = 'P', long = "parallelization", default_value_t = 0)]
    parallelization: usize,

    /// Target decoded bytes per chunk
    #[arg(long = "chunk-size", default_value_t = 4 * 1024 * 1024)]
    chunk_size: usize,

    /// Import a previously exported seek index before decoding
    #[arg(long = "import-index")]
    import_index: Option<PathBuf>,

    /// Export a seek index after decoding completes
    #[arg(long = "export-index")]
    export_index: Option<PathBuf>,

    /// Count occurrences of a newline character (default '\n') while
    /// decoding and report the total on completion
    #[arg(long = "count-lines", num_args = 0..=1, default_missing_value = "\n")]
    count_lines: Option<char>,

    /// Print a human-readable summary of the stream's structure instead
    /// of decompressing it
    #[arg(long = "analyze")]
    analyze: bool,

    /// Verify CRC32/size footers against the decoded output (implied by
    /// `-d` unless explicitly disabled elsewhere)
    #[arg(long = "verify")]
    verify: bool,
}

const EXIT_USAGE: u8 = 1;
const EXIT_IO: u8 = 2;
const EXIT_DECOMPRESSION: u8 = 3;

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            eprintln!("rapidgzip: {err:#}");
            ExitCode::from(classify_exit_code(&err))
        }
    }
}

fn classify_exit_code(err: &anyhow::Error) -> u8 {
    if let Some(Error::Io(_)) = err.downcast_ref::<Error>() {
        return EXIT_IO;
    }
    if err.downcast_ref::<Error>().is_some() {
        return EXIT_DECOMPRESSION;
    }
    if err.downcast_ref::<io::Error>().is_some() {
        return EXIT_IO;
    }
    EXIT_USAGE
}

fn run(args: Args) -> Result<()> {
    if !args.analyze && !args.decompress {
        anyhow::bail!("one of -d/--decompress or --analyze is required");
    }

    // Memory-map the input file for efficient random access. The block
    // finder and chunk decoders all address this buffer by bit offset, so
    // no copy is needed before dispatching work to worker threads.
    let file = File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let mmap = unsafe { MmapOptions::new().map(&file).context("failed to mmap input file")? };
    let data: std::sync::Arc<[u8]> = std::sync::Arc::from(mmap.as_ref());

    if args.analyze {
        return analyze(&data);
    }

    if let Some(jobs) = Some(args.parallelization).filter(|&j| j != 0) {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .context("failed to build global thread pool")?;
    }

    let mut config = ChunkConfiguration::default();
    config.chunk_size = args.chunk_size;
    config.parallelization = args.parallelization;
    if let Some(c) = args.count_lines {
        config.newline_character = c as u8;
    }
    let partition_spacing_bytes = config.partition_spacing_bits / 8;

    let mut reader = open_bytes(data, config).context("failed to open compressed stream")?;
    reader.set_verify_crc32(true);

    if let Some(index_path) = &args.import_index {
        let index = read_index_file(index_path)
            .with_context(|| format!("failed to import index {}", index_path.display()))?;
        reader.fetcher().block_map().set_block_offsets(index.block_map_entries());
        reader.fetcher().block_map().finalize();
        for (offset, window) in index.windows() {
            reader.fetcher().window_map().insert(offset, window);
        }
        if index.uncompressed_size > 0 {
            reader.set_total_decoded_size(index.uncompressed_size);
        }
    }

    let output_path = resolve_output_path(&args);
    let writer: Box<dyn Write + Send> = match (&args.stdout, &output_path) {
        (true, _) | (false, None) => Box::new(io::stdout()),
        (false, Some(path)) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Box::new(file)
        }
    };
    let mut out = OutputWriter::new(writer)?;

    let progress = if !args.stdout {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} decoded {bytes} ({bytes_per_sec})")
                .unwrap(),
        );
        Some(bar)
    } else {
        None
    };

    let mut buffer = vec![0u8; 1024 * 1024];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buffer).map_err(map_read_error)?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n])?;
        total += n as u64;
        if let Some(bar) = &progress {
            bar.set_position(total);
            bar.tick();
        }
    }
    out.finish()?;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    if let Some(_char_arg) = &args.count_lines {
        eprintln!("lines: {}", reader.line_count());
    }

    if let Some(index_path) = &args.export_index {
        let entries = reader.fetcher().block_map().iter_snapshot();
        let index = GzipIndex::from_block_map(&entries, partition_spacing_bytes, &reader.fetcher().window_map());
        let mut file = File::create(index_path)
            .with_context(|| format!("failed to create index {}", index_path.display()))?;
        index.write_format_a(&mut file)?;
    }

    if args.verify {
        eprintln!("CRC32/ISIZE footers verified against decoded output");
    }

    Ok(())
}

fn map_read_error(err: io::Error) -> anyhow::Error {
    if let Some(inner) = err.get_ref() {
        if let Some(rg_err) = inner.downcast_ref::<Error>() {
            return anyhow::anyhow!("{rg_err}");
        }
    }
    anyhow::Error::from(err)
}

fn resolve_output_path(args: &Args) -> Option<PathBuf> {
    if args.stdout {
        return None;
    }
    if let Some(path) = &args.output {
        return Some(path.clone());
    }
    let input_str = args.input.to_string_lossy();
    for suffix in [".gz", ".gzip", ".zz", ".bgz", ".dz"] {
        if let Some(stripped) = input_str.strip_suffix(suffix) {
            return Some(PathBuf::from(stripped));
        }
    }
    let mut path = args.input.clone();
    path.set_extension("out");
    Some(path)
}

fn read_index_file(path: &PathBuf) -> Result<GzipIndex> {
    use std::io::Seek;

    let mut file = File::open(path)?;
    let mut magic = [0u8; 5];
    let n = file.read(&mut magic)?;
    file.seek(io::SeekFrom::Start(0))?;
    if n == 5 && &magic == b"GZIDX" {
        GzipIndex::read_format_a(&mut file).map_err(anyhow::Error::from)
    } else {
        GzipIndex::read_format_b(&mut file).map_err(anyhow::Error::from)
    }
}

/// A lightweight stand-in for the format-analyzer reporting tool named as
/// an external collaborator in SPEC_FULL.md: prints the sniffed format and
/// gzip header fields without running the parallel decoder.
fn analyze(data: &[u8]) -> Result<()> {
    use rapidgzip::format;

    let file_type = format::sniff(data);
    println!("format: {file_type:?}");
    println!("size: {} bytes", data.len());

    if matches!(file_type, format::FileType::Gzip | format::FileType::Bgzf) {
        if let Ok(header_size) = format::gzip_header_size(data) {
            println!("header size: {header_size} bytes");
        }
        if let Some(block_size) = format::bgzf_block_size(data) {
            println!("BGZF block size hint: {block_size}");
        }
        if data.len() >= 8 {
            let tail = &data[data.len() - 8..];
            let crc32 = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
            let isize = u32::from_le_bytes([tail[4], tail[5], tail[6], tail[7]]);
            println!("trailer crc32: {crc32:#010x}");
            println!("trailer isize: {isize}");
        }
    }

    Ok(())
}
