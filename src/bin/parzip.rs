/// parzip – parallel gzip-chunk compression tool.
///
///   parzip compress file.txt file.txt.pgz      → compress
///   parzip decompress file.txt.pgz file.txt    → decompress
///   cat file | parzip compress > file.pgz      → stdin to stdout
///   parzip compress -t 4 -b 262144 big.log out.pgz
use std::env;
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::process::{self, ExitCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parzip::chunk::{ByteChunkReader, ByteChunkWriter};
use parzip::framing::{FramedChunkReader, FramedChunkWriter};
use parzip::gzip::{GzipCompressor, GzipDecompressor};
use parzip::pipeline::StreamPipeline;
use parzip::PipelineResult;

const DEFAULT_THREADS: usize = 16;
const DEFAULT_WORK_LIMIT: usize = 16;
const DEFAULT_BUFFER: usize = 1024 * 1024;

fn usage() {
    eprintln!("parzip - parallel chunk-at-a-time gzip compression");
    eprintln!();
    eprintln!("Usage: parzip <compress|decompress> [OPTIONS] [INPUT] [OUTPUT]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -t, --threads N    Number of worker threads (default: {DEFAULT_THREADS})");
    eprintln!("  -m, --max N        Max chunks buffered ahead of the workers (default: {DEFAULT_WORK_LIMIT})");
    eprintln!("  -b, --buffer N     Chunk size in bytes for compression (default: {DEFAULT_BUFFER})");
    eprintln!("  -v, --verbose      Report progress to stderr");
    eprintln!("  -h, --help         Show this help");
    eprintln!();
    eprintln!("Without INPUT/OUTPUT, reads from stdin and writes to stdout.");
}

#[derive(Debug)]
enum Mode {
    Compress,
    Decompress,
}

#[derive(Debug)]
struct Opts {
    mode: Mode,
    threads: usize,
    work_limit: usize,
    buffer: usize,
    verbose: bool,
    files: Vec<String>,
}

fn parse_args() -> Opts {
    let args: Vec<String> = env::args().skip(1).collect();

    let mode = match args.first().map(String::as_str) {
        Some("compress") | Some("c") => Mode::Compress,
        Some("decompress") | Some("d") => Mode::Decompress,
        Some("-h") | Some("--help") => {
            usage();
            process::exit(0);
        }
        Some(other) => {
            eprintln!("parzip: unknown command '{other}'");
            usage();
            process::exit(1);
        }
        None => {
            usage();
            process::exit(1);
        }
    };

    let mut opts = Opts {
        mode,
        threads: DEFAULT_THREADS,
        work_limit: DEFAULT_WORK_LIMIT,
        buffer: DEFAULT_BUFFER,
        verbose: false,
        files: Vec::new(),
    };

    let mut i = 1;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "-v" | "--verbose" => opts.verbose = true,
            "-h" | "--help" => {
                usage();
                process::exit(0);
            }
            "-t" | "--threads" => opts.threads = numeric_arg(&args, &mut i, "-t"),
            "-m" | "--max" => opts.work_limit = numeric_arg(&args, &mut i, "-m"),
            "-b" | "--buffer" => opts.buffer = numeric_arg(&args, &mut i, "-b"),
            s if s.starts_with('-') => {
                eprintln!("parzip: unknown flag '{s}'");
                process::exit(1);
            }
            _ => opts.files.push(arg.clone()),
        }
        i += 1;
    }

    if opts.files.len() > 2 {
        eprintln!("parzip: too many file arguments");
        process::exit(1);
    }

    opts
}

fn numeric_arg(args: &[String], i: &mut usize, flag: &str) -> usize {
    *i += 1;
    let Some(value) = args.get(*i) else {
        eprintln!("parzip: missing argument for {flag}");
        process::exit(1);
    };
    match value.parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            eprintln!("parzip: invalid value '{value}' for {flag}");
            process::exit(1);
        }
    }
}

/// Human-readable byte count for progress output.
fn readable_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn build_pipeline(opts: &Opts) -> PipelineResult<StreamPipeline> {
    let pipeline = StreamPipeline::new(opts.threads, Some(opts.work_limit))?;
    let mut pipeline = match opts.mode {
        Mode::Compress => pipeline
            .reader(ByteChunkReader::new(opts.buffer)?)
            .writer(FramedChunkWriter)
            .converter(GzipCompressor::default()),
        Mode::Decompress => pipeline
            .reader(FramedChunkReader)
            .writer(ByteChunkWriter)
            .converter(GzipDecompressor),
    };

    if opts.verbose {
        let read_total = Arc::new(AtomicU64::new(0));
        let read_probe = Arc::clone(&read_total);
        pipeline = pipeline
            .on_read(move |progress| {
                read_probe.store(progress.bytes, Ordering::Relaxed);
            })
            .on_write(move |progress| {
                eprint!(
                    "\rread {}, wrote {} ({} buffered)   ",
                    readable_size(read_total.load(Ordering::Relaxed)),
                    readable_size(progress.bytes),
                    progress.pending
                );
            });
    }

    Ok(pipeline)
}

fn process(opts: &Opts) -> Result<(), String> {
    let mut pipeline = build_pipeline(opts).map_err(|e| e.to_string())?;

    let result = match (opts.files.first(), opts.files.get(1)) {
        (Some(input), Some(output)) => {
            let in_file = fs::File::open(input).map_err(|e| format!("{input}: {e}"))?;
            let out_file = fs::File::create(output).map_err(|e| format!("{output}: {e}"))?;
            let mut reader = BufReader::new(in_file);
            let mut writer = BufWriter::new(out_file);
            let result = pipeline.run(&mut reader, &mut writer);

            if opts.verbose && result.is_ok() {
                let in_size = fs::metadata(input).map(|m| m.len()).unwrap_or(0);
                let out_size = fs::metadata(output).map(|m| m.len()).unwrap_or(0);
                eprintln!(
                    "\r{input}: {} -> {}                    ",
                    readable_size(in_size),
                    readable_size(out_size)
                );
            }
            result.map_err(|e| format!("{input}: {e}"))
        }
        (Some(input), None) => {
            let in_file = fs::File::open(input).map_err(|e| format!("{input}: {e}"))?;
            let mut reader = BufReader::new(in_file);
            let mut writer = BufWriter::new(io::stdout().lock());
            pipeline
                .run(&mut reader, &mut writer)
                .map_err(|e| format!("{input}: {e}"))
        }
        _ => {
            // io::stdin() rather than its lock so the reader is Send.
            let mut reader = BufReader::new(io::stdin());
            let mut writer = BufWriter::new(io::stdout().lock());
            pipeline
                .run(&mut reader, &mut writer)
                .map_err(|e| format!("stdin: {e}"))
        }
    };

    if opts.verbose {
        eprintln!();
    }
    result
}

fn main() -> ExitCode {
    env_logger::init();
    let opts = parse_args();
    match process(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("parzip: {e}");
            ExitCode::FAILURE
        }
    }
}
