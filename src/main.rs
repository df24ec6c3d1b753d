#![forbid(unsafe_code)]

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gzdecode::DecompressOptions;

/// Decompress a single-member .gz file.
#[derive(Parser, Debug)]
#[command(name = "gzdecode", version, about)]
struct Args {
    /// Input .gz file
    input: PathBuf,

    /// Write output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log header fields and block boundaries to stderr
    #[arg(long)]
    debug: bool,

    /// More log output (-v: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Check the CRC-32/ISIZE trailer and header CRC
    #[arg(long)]
    verify: bool,

    /// Accept any XFL byte in the header
    #[arg(long)]
    lenient: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match (args.debug, args.verbose) {
        (_, v) if v > 0 => Level::TRACE,
        (true, _) => Level::DEBUG,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    let input = std::fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;

    let options = DecompressOptions::default()
        .with_verify_checksums(args.verify)
        .with_strict_extra_flags(!args.lenient);

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut sink = BufWriter::new(sink);

    let member = gzdecode::decompress_to(&input, &mut sink, options)
        .with_context(|| format!("failed to decompress {}", args.input.display()))?;
    sink.flush()?;

    info!(
        name = ?member.header.name,
        size = member.size,
        crc32 = member.crc32,
        "done"
    );

    Ok(())
}
