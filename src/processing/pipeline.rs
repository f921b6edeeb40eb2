//! Streaming conversion pipeline
//!
//! Drives fixed-size blocks from a [`WavReader`] through one converter per
//! channel into a [`WavWriter`]. The loop ends when the expected output
//! length has been written, not when the source runs out: converters keep
//! draining buffered samples while the pipeline feeds them silence.

use std::fs;
use std::io::{Read, Seek, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use log::{debug, info, warn};

use crate::audio::wav::encode_channel_into;
use crate::audio::{
    AudioFormat, ConverterFactory, ConverterPort, LinearConverter, SampleBlockBuffer, WavReader, WavWriter,
};
use crate::config::Config;
use crate::error::{ResampleError, Result};

/// Upper bound on `channels * block_capacity` held by one block buffer.
pub const MAX_BLOCK_SAMPLES: usize = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Streaming,
    Finalized,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub target_sample_rate: f64,
    pub block_capacity: usize,
    /// Zero-output iterations tolerated after the source is exhausted.
    pub max_idle_blocks: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            target_sample_rate: 96000.0,
            block_capacity: 1024,
            max_idle_blocks: 64,
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            target_sample_rate: config.target_sample_rate(),
            block_capacity: config.block_capacity(),
            max_idle_blocks: config.max_idle_blocks(),
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<()> {
        if self.block_capacity == 0 {
            return Err(ResampleError::config("Block capacity must be greater than 0"));
        }
        if self.max_idle_blocks == 0 {
            return Err(ResampleError::config("Max idle blocks must be at least 1"));
        }
        Ok(())
    }
}

/// Cooperative cancellation flag checked at every block boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Output-length accounting for one run.
#[derive(Debug, Clone)]
pub struct ConversionSession {
    pub source_format: AudioFormat,
    pub dest_format: AudioFormat,
    pub source_sample_count: u64,
    pub total_expected_output_samples: u64,
    remaining_output_samples: u64,
}

impl ConversionSession {
    pub fn new(source_format: AudioFormat, source_sample_count: u64, dest_sample_rate: f64) -> Result<Self> {
        let dest_format = source_format.with_sample_rate(dest_sample_rate)?;
        let total = Self::expected_output_len(source_sample_count, source_format.sample_rate, dest_sample_rate);

        Ok(Self {
            source_format,
            dest_format,
            source_sample_count,
            total_expected_output_samples: total,
            remaining_output_samples: total,
        })
    }

    /// `floor(count * dest_rate / source_rate)`, exact for integral rates.
    pub fn expected_output_len(source_sample_count: u64, source_rate: f64, dest_rate: f64) -> u64 {
        let integral = |r: f64| r.fract() == 0.0 && r > 0.0 && r <= u64::MAX as f64;
        if integral(source_rate) && integral(dest_rate) {
            (source_sample_count as u128 * dest_rate as u128 / source_rate as u128) as u64
        } else {
            (source_sample_count as f64 * dest_rate / source_rate).floor() as u64
        }
    }

    pub fn remaining_output_samples(&self) -> u64 {
        self.remaining_output_samples
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_output_samples == 0
    }

    /// Portion of `produced` that still belongs in the output.
    pub fn clamp(&self, produced: usize) -> usize {
        (produced as u64).min(self.remaining_output_samples) as usize
    }

    pub fn consume(&mut self, count: usize) {
        debug_assert!(count as u64 <= self.remaining_output_samples);
        self.remaining_output_samples -= count as u64;
    }
}

#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub source_format: AudioFormat,
    pub dest_format: AudioFormat,
    pub source_samples: u64,
    pub output_samples: u64,
    pub blocks: u64,
    pub idle_blocks: usize,
    /// Time spent inside converter calls.
    pub converter_time: Duration,
    pub processing_time: Duration,
}

impl ConversionReport {
    pub fn input_duration_seconds(&self) -> f64 {
        self.source_samples as f64 / self.source_format.sample_rate
    }

    pub fn real_time_factor(&self) -> f64 {
        let duration = self.input_duration_seconds();
        if duration > 0.0 {
            self.processing_time.as_secs_f64() / duration
        } else {
            0.0
        }
    }
}

pub struct ConversionPipeline<R: Read, W: Write + Seek, C: ConverterPort> {
    reader: WavReader<R>,
    writer: Option<WavWriter<W>>,
    converters: Vec<C>,
    block: SampleBlockBuffer,
    encoded: Vec<u8>,
    session: ConversionSession,
    options: PipelineOptions,
    cancel: CancelToken,
    state: PipelineState,
    source_exhausted: bool,
    idle_blocks: usize,
    blocks: u64,
    converter_time: Duration,
    started: Instant,
}

impl<R: Read, W: Write + Seek, C: ConverterPort> ConversionPipeline<R, W, C> {
    /// Derive the session from the source, build one converter per channel,
    /// then open the destination with the inherited layout.
    pub fn new<F, O>(reader: WavReader<R>, open_destination: O, factory: &F, options: PipelineOptions) -> Result<Self>
    where
        F: ConverterFactory<Converter = C>,
        O: FnOnce(AudioFormat) -> Result<WavWriter<W>>,
    {
        options.validate()?;
        let session = ConversionSession::new(*reader.format(), reader.sample_count(), options.target_sample_rate)?;
        let channels = session.source_format.channel_count;
        if channels.saturating_mul(options.block_capacity) > MAX_BLOCK_SAMPLES {
            return Err(ResampleError::config(format!(
                "{} channels x {} samples per block exceeds the {} sample buffer limit",
                channels, options.block_capacity, MAX_BLOCK_SAMPLES
            )));
        }

        let block = SampleBlockBuffer::new(channels, options.block_capacity)?;
        let converters = (0..channels)
            .map(|_| factory.create(session.source_format.sample_rate, session.dest_format.sample_rate, options.block_capacity))
            .collect::<Result<Vec<_>>>()?;

        let writer = open_destination(session.dest_format)?;
        info!(
            "Converting {} -> {}: {} samples per channel expected",
            session.source_format, session.dest_format, session.total_expected_output_samples
        );

        Ok(Self {
            reader,
            writer: Some(writer),
            converters,
            block,
            encoded: Vec::new(),
            session,
            options,
            cancel: CancelToken::new(),
            state: PipelineState::Init,
            source_exhausted: false,
            idle_blocks: 0,
            blocks: 0,
            converter_time: Duration::ZERO,
            started: Instant::now(),
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn session(&self) -> &ConversionSession {
        &self.session
    }

    /// Run one block iteration. Returns `false` once every expected sample is written.
    pub fn step(&mut self) -> Result<bool> {
        let writer = self.writer.as_mut()
            .ok_or_else(|| ResampleError::processing("Pipeline already finalized"))?;
        if self.session.is_complete() {
            return Ok(false);
        }
        if self.cancel.is_cancelled() {
            return Err(ResampleError::Cancelled { samples_written: writer.samples_written() });
        }
        self.state = PipelineState::Streaming;

        // the block is left as silence once the source runs dry, so it is never read again
        if !self.source_exhausted {
            let read = self.reader.read_block(&mut self.block)?;
            if read < self.block.capacity() {
                self.block.zero_fill_from(read);
                self.source_exhausted = true;
                debug!(
                    "{} exhausted after {} samples; padding with silence",
                    self.reader.origin(), self.reader.sample_count()
                );
            }
        }

        let format = *writer.format();
        let frame_size = format.frame_size();
        let mut produced: Option<usize> = None;
        let mut count = 0;

        for (channel, converter) in self.converters.iter_mut().enumerate() {
            let started = Instant::now();
            let output = converter.process(self.block.channel(channel));
            self.converter_time += started.elapsed();

            match produced {
                None => {
                    produced = Some(output.len());
                    count = self.session.clamp(output.len());
                    self.encoded.resize(count * frame_size, 0);
                }
                Some(expected) if expected != output.len() => {
                    return Err(ResampleError::processing(format!(
                        "Converter for channel {} produced {} samples, channel 0 produced {}",
                        channel, output.len(), expected
                    )));
                }
                Some(_) => {}
            }

            encode_channel_into(&output[..count], channel, &format, &mut self.encoded);
        }

        writer.write_interleaved(&self.encoded)?;
        self.session.consume(count);
        self.blocks += 1;

        if count == 0 && self.source_exhausted {
            self.idle_blocks += 1;
            debug!(
                "Converter idle after end of input ({} of {}), {} samples outstanding",
                self.idle_blocks, self.options.max_idle_blocks, self.session.remaining_output_samples()
            );
            if self.idle_blocks > self.options.max_idle_blocks {
                return Err(ResampleError::processing(format!(
                    "Converter produced no output for {} blocks after the source ended; {} samples still expected",
                    self.idle_blocks, self.session.remaining_output_samples()
                )));
            }
        }

        Ok(!self.session.is_complete())
    }

    /// Rewrite the destination header. Only valid once streaming is complete.
    pub fn finalize(&mut self) -> Result<(ConversionReport, W)> {
        if !self.session.is_complete() {
            return Err(ResampleError::processing(format!(
                "Cannot finalize with {} samples still expected", self.session.remaining_output_samples()
            )));
        }
        let writer = self.writer.take()
            .ok_or_else(|| ResampleError::processing("Pipeline already finalized"))?;

        let written = writer.samples_written();
        if written != self.session.total_expected_output_samples {
            return Err(ResampleError::processing(format!(
                "Wrote {} samples to {}, expected {}",
                written, writer.origin(), self.session.total_expected_output_samples
            )));
        }

        let output = writer.finalize()?;
        self.state = PipelineState::Finalized;

        let report = ConversionReport {
            source_format: self.session.source_format,
            dest_format: self.session.dest_format,
            source_samples: self.session.source_sample_count,
            output_samples: written,
            blocks: self.blocks,
            idle_blocks: self.idle_blocks,
            converter_time: self.converter_time,
            processing_time: self.started.elapsed(),
        };
        Ok((report, output))
    }

    pub fn run(mut self) -> Result<(ConversionReport, W)> {
        while self.step()? {}
        self.finalize()
    }
}

/// Convert `config.input_path` into `config.output_path` with [`LinearConverter`].
///
/// On failure the un-finalized output is removed unless the config keeps it.
pub fn convert_file(config: &Config, cancel: &CancelToken) -> Result<ConversionReport> {
    let input = &config.input_path;
    let output = &config.output_path;

    if let (Ok(a), Ok(b)) = (fs::canonicalize(input), fs::canonicalize(output)) {
        if a == b {
            return Err(ResampleError::config(format!(
                "Input and output are the same file: {}", input.display()
            )));
        }
    }

    let reader = WavReader::open(input)?;
    let factory = |input_rate: f64, output_rate: f64, block: usize| LinearConverter::new(input_rate, output_rate, block);

    let mut created = false;
    let result = ConversionPipeline::new(
        reader,
        |format| {
            created = true;
            WavWriter::create(output, format)
        },
        &factory,
        PipelineOptions::from(config),
    )
    .and_then(|pipeline| pipeline.with_cancel_token(cancel.clone()).run());

    match result {
        Ok((report, _)) => Ok(report),
        Err(e) => {
            if created && config.remove_partial_output() {
                match fs::remove_file(output) {
                    Ok(()) => warn!("Removed partial output {}", output.display()),
                    Err(err) => warn!("Cannot remove partial output {}: {}", output.display(), err),
                }
            }
            Err(e)
        }
    }
}
