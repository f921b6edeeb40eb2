//! WavResample - PCM WAV Sample-Rate Converter

use anyhow::Context;
use clap::Parser;
use std::process;
use wavresample::{init_logging, Args, CancelToken, Config, ResampleError};

fn main() {
    let args = Args::parse();

    init_logging(args.verbose);

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    if args.verbose {
        println!("{}", wavresample::get_library_info());
        println!();
    }

    let config = Config::from_args_and_config(args)?;

    if !config.input_path.exists() {
        return Err(ResampleError::config(format!(
            "Input file does not exist: {}", config.input_path.display()
        )).into());
    }

    println!("=== WAV Sample Rate Converter ===");
    println!("Input: {}", config.input_path.display());
    println!("Output: {}", config.output_path.display());
    println!("Target rate: {} Hz", config.target_sample_rate());
    if config.verbose() {
        println!("Block size: {}", config.block_capacity());
    }
    println!("=================================\n");

    let report = wavresample::convert_file(&config, &CancelToken::new()).with_context(|| format!(
        "converting {} to {}", config.input_path.display(), config.output_path.display()
    ))?;

    println!("=== Conversion Complete ===");
    println!("Format: {} -> {}", report.source_format, report.dest_format);
    println!("Samples: {} -> {}", report.source_samples, report.output_samples);
    println!("Converter time: {:.3}s", report.converter_time.as_secs_f64());
    println!("RTF: {:.3}", report.real_time_factor());
    if config.verbose() {
        println!("Blocks: {}", report.blocks);
        println!("Idle blocks after input end: {}", report.idle_blocks);
    }

    Ok(())
}
