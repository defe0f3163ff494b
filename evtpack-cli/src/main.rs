//! evtpack CLI application.
//!
//! Packs CSV event dumps into EVT3-tagged packed files and back.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use evtpack_core::{
    decode_file, output, read_header, CsvEventSource, EncodeOptions, EventSource, EventStream,
    FieldOrder, FileHeader, OverflowPolicy, StreamEncoder, TimeWindow,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

/// Packed event file tool for event camera recordings.
///
/// Converts CSV event dumps to a compact 64-bit-per-event binary format with
/// an EVT3 header, and back.
#[derive(Parser, Debug)]
#[command(name = "evtpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log more (info level). RUST_LOG overrides this.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack a CSV event file into a packed event file
    Pack(PackArgs),
    /// Unpack a packed event file into CSV
    Unpack(UnpackArgs),
    /// Print the header of a packed event file
    Info {
        /// Packed event file
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
    /// Pack, decode again and verify the events survived unchanged
    Roundtrip(PackArgs),
}

#[derive(Args, Debug)]
struct PackArgs {
    /// Input CSV file (must contain a %geometry line)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output packed event file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Field order of the CSV input.
    ///
    /// Format: comma-separated field names (x, y, p, t)
    ///
    /// Examples:
    /// - "x,y,p,t" (default)
    /// - "t,x,y,p" (timestamp first)
    #[arg(short, long, default_value = "x,y,p,t")]
    format: String,

    /// First timestamp to keep, in microseconds
    #[arg(long, default_value_t = 0)]
    start: u64,

    /// Last timestamp to keep, in microseconds (0 = up to the last event)
    #[arg(long, default_value_t = 0)]
    end: u64,

    /// Only load events with t below this value, in microseconds (0 = all)
    #[arg(long, default_value_t = 0, value_name = "US")]
    max_duration: u64,

    /// Mask out-of-range fields instead of failing
    #[arg(long)]
    mask_overflow: bool,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args, Debug)]
struct UnpackArgs {
    /// Input packed event file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output CSV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Field order for CSV output
    #[arg(short, long, default_value = "x,y,p,t")]
    format: String,

    /// Suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Pack(args) => {
            pack(&args)?;
        }
        Command::Unpack(args) => unpack(&args)?,
        Command::Info { input } => info(&input)?,
        Command::Roundtrip(args) => roundtrip(&args)?,
    }

    Ok(())
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style);
    }
    pb
}

fn parse_order(format: &str) -> Result<FieldOrder> {
    FieldOrder::from_str(format).context("Invalid field format. Use comma-separated: x,y,p,t")
}

fn file_name(path: &Path) -> &std::ffi::OsStr {
    path.file_name().unwrap_or_default()
}

/// Loads the CSV input and writes the packed file. Returns the selected events.
fn pack(args: &PackArgs) -> Result<EventStream> {
    let field_order = parse_order(&args.format)?;
    let progress = spinner(args.quiet);
    let start_time = Instant::now();

    progress.set_message(format!("Loading {:?}...", file_name(&args.input)));
    let mut source = CsvEventSource::open(&args.input, field_order)
        .with_context(|| format!("Failed to open {:?}", args.input))?;
    let stream = source
        .load_events(args.max_duration)
        .context("Failed to load CSV events")?;

    let overflow = if args.mask_overflow {
        OverflowPolicy::Mask
    } else {
        OverflowPolicy::Reject
    };
    let window = TimeWindow::new(args.start, args.end);
    let encoder = StreamEncoder::new(EncodeOptions::new(window, overflow));

    progress.set_message(format!("Writing {:?}...", file_name(&args.output)));
    let summary = encoder
        .write_file(&args.output, &stream)
        .context("Failed to write packed event file")?;

    let elapsed = start_time.elapsed();
    progress.finish_with_message(format!(
        "Done! Packed {} of {} events in {:.2}s",
        summary.events_written,
        stream.len(),
        elapsed.as_secs_f64()
    ));

    if !args.quiet {
        eprintln!();
        eprintln!("Summary:");
        eprintln!("  Input:        {:?}", args.input);
        eprintln!("  Output:       {:?}", args.output);
        eprintln!("  Events:       {}", summary.events_written);
        eprintln!(
            "  Sensor:       {}x{}",
            summary.header.width, summary.header.height
        );
        eprintln!(
            "  Duration:     {:.6}s",
            summary.header.duration as f64 / 1e6
        );
        eprintln!("  Bytes:        {}", summary.bytes_written);
    }

    let end = window.resolve_end(stream.max_timestamp());
    let selected = stream
        .events
        .into_iter()
        .filter(|e| e.timestamp >= window.start && e.timestamp <= end)
        .collect();
    Ok(EventStream::new(selected, stream.metadata))
}

fn unpack(args: &UnpackArgs) -> Result<()> {
    let field_order = parse_order(&args.format)?;
    let progress = spinner(args.quiet);
    let start_time = Instant::now();

    progress.set_message(format!("Decoding {:?}...", file_name(&args.input)));
    let result = decode_file(&args.input).context("Failed to decode packed event file")?;

    progress.set_message(format!("Writing {:?}...", file_name(&args.output)));
    output::write_csv(&args.output, &result.stream, field_order)
        .context("Failed to write CSV output")?;

    let elapsed = start_time.elapsed();
    progress.finish_with_message(format!(
        "Done! Unpacked {} events in {:.2}s (sensor: {}x{})",
        result.stream.len(),
        elapsed.as_secs_f64(),
        result.stream.metadata.width,
        result.stream.metadata.height
    ));

    if !args.quiet {
        let events_per_sec = result.stream.len() as f64 / elapsed.as_secs_f64();
        eprintln!();
        eprintln!("Summary:");
        eprintln!("  Input:        {:?}", args.input);
        eprintln!("  Output:       {:?}", args.output);
        eprintln!("  Events:       {}", result.stream.len());
        eprintln!("  Throughput:   {:.0} events/s", events_per_sec);
    }

    Ok(())
}

fn print_header(header: &FileHeader) {
    println!(
        "signature:       {}",
        String::from_utf8_lossy(&header.signature)
    );
    println!("file size:       {}", header.file_size);
    println!("header length:   {}", header.header_length);
    println!("event count:     {}", header.event_count);
    println!("duration [us]:   {}", header.duration);
    println!("timestamp [us]:  {}", header.time_stamp);
    println!("image size [h,w] [{}, {}]", header.height, header.width);
}

fn info(input: &Path) -> Result<()> {
    let header =
        read_header(input).with_context(|| format!("Failed to read header of {:?}", input))?;
    print_header(&header);
    Ok(())
}

fn roundtrip(args: &PackArgs) -> Result<()> {
    let packed = pack(args)?;
    let result = decode_file(&args.output).context("Failed to decode packed event file")?;

    if result.stream.metadata != packed.metadata {
        anyhow::bail!(
            "Sensor geometry changed: {:?} -> {:?}",
            packed.metadata,
            result.stream.metadata
        );
    }
    if args.mask_overflow {
        log::info!("Overflow masking enabled; skipping event comparison");
    } else if let Some(index) = packed
        .events
        .iter()
        .zip(&result.stream.events)
        .position(|(a, b)| a != b)
    {
        anyhow::bail!(
            "Event {} differs after decoding: {:?} -> {:?}",
            index,
            packed.events[index],
            result.stream.events[index]
        );
    } else if packed.len() != result.stream.len() {
        anyhow::bail!(
            "Event count changed: {} -> {}",
            packed.len(),
            result.stream.len()
        );
    }

    print_header(&result.header);
    println!("round trip:      ok ({} events)", result.stream.len());
    Ok(())
}
