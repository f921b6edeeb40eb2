//! Prints the layout of a PCM WAV file

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use wavresample::audio::WavReader;
use wavresample::init_logging;

#[derive(Parser, Debug)]
#[command(name = "wavinfo")]
#[command(about = "Print channel count, sample rate and length of a PCM WAV file")]
struct Args {
    /// WAV file to inspect
    file: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let reader = WavReader::open(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let format = reader.format();

    println!("File: {}", args.file.display());
    println!("Channels: {}", format.channel_count);
    println!("Sample rate: {} Hz", format.sample_rate);
    println!("Bits per sample: {}", format.bits_per_sample);
    println!("Samples: {}", reader.sample_count());
    println!("Duration: {:.3}s", reader.sample_count() as f64 / format.sample_rate);

    Ok(())
}
