//! WAV container codec
//!
//! Parses and emits the minimal RIFF/WAVE PCM layout and converts between
//! packed little-endian integers and centered `f64` samples. Readers and
//! writers are generic over the underlying stream so files and in-memory
//! buffers go through the same code.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use log::{debug, info};
use crate::audio::{AudioFormat, SampleBlockBuffer};
use crate::error::{ResampleError, Result};

pub const RIFF_MAGIC: [u8; 4] = *b"RIFF";
pub const WAVE_MAGIC: [u8; 4] = *b"WAVE";
pub const FMT_MAGIC: [u8; 4] = *b"fmt ";
pub const DATA_MAGIC: [u8; 4] = *b"data";

pub const FORMAT_PCM: u16 = 1;

/// Outer header, `fmt ` chunk and `data` chunk header.
pub const CANONICAL_HEADER_SIZE: usize = 44;

const OUTER_HEADER_SIZE: usize = 12;
const CHUNK_HEADER_SIZE: usize = 8;
const FMT_CHUNK_SIZE: u32 = 16;
/// Bytes counted by the outer size field besides the data payload.
const RIFF_SIZE_OVERHEAD: u32 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: [u8; 4],
    pub size: u32,
}

impl ChunkHeader {
    fn parse(bytes: &[u8; CHUNK_HEADER_SIZE]) -> Self {
        Self {
            id: [bytes[0], bytes[1], bytes[2], bytes[3]],
            size: read_u32_le(bytes, 4),
        }
    }
}

fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn tag_name(tag: &[u8]) -> String {
    String::from_utf8_lossy(tag).into_owned()
}

/// Like `read_exact`, but reports how much was read before EOF instead of failing.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Scan forward to the chunk tagged `id`, skipping all others.
///
/// Every iteration consumes a chunk header, so the scan ends at the latest
/// when the stream does.
fn seek_chunk<R: Read>(reader: &mut R, origin: &str, id: &[u8; 4]) -> Result<u32> {
    let mut header = [0u8; CHUNK_HEADER_SIZE];
    loop {
        let got = read_full(reader, &mut header).map_err(|e| ResampleError::io(origin, e))?;
        if got < CHUNK_HEADER_SIZE {
            return Err(ResampleError::truncated(
                origin,
                format!("stream ended before the {:?} chunk was found", tag_name(id)),
            ));
        }

        let chunk = ChunkHeader::parse(&header);
        if &chunk.id == id {
            return Ok(chunk.size);
        }

        debug!("Skipping {:?} chunk ({} bytes) in {}", tag_name(&chunk.id), chunk.size, origin);
        skip_bytes(reader, origin, &chunk.id, chunk.size as u64, chunk.size)?;
    }
}

/// Drain `count` bytes of the chunk tagged `id` without buffering them.
fn skip_bytes<R: Read>(reader: &mut R, origin: &str, id: &[u8; 4], count: u64, declared: u32) -> Result<()> {
    let mut skip = (&mut *reader).take(count);
    let skipped = io::copy(&mut skip, &mut io::sink()).map_err(|e| ResampleError::io(origin, e))?;
    if skipped < count {
        return Err(ResampleError::truncated(origin, format!(
            "{:?} chunk declares {} bytes but only {} are present",
            tag_name(id), declared, declared as u64 - (count - skipped)
        )));
    }
    Ok(())
}

fn parse_fmt_chunk(payload: &[u8], origin: &str) -> Result<AudioFormat> {
    if payload.len() < FMT_CHUNK_SIZE as usize {
        return Err(ResampleError::format(origin, format!(
            "fmt chunk is {} bytes, expected at least {}", payload.len(), FMT_CHUNK_SIZE
        )));
    }

    let format_tag = read_u16_le(payload, 0);
    if format_tag != FORMAT_PCM {
        return Err(ResampleError::unsupported(origin, format!(
            "format tag {:#06x} is not PCM ({:#06x})", format_tag, FORMAT_PCM
        )));
    }

    let channels = read_u16_le(payload, 2);
    let sample_rate = read_u32_le(payload, 4);
    // byte rate (8) and block align (12) are derived values; not trusted
    let bits_per_sample = read_u16_le(payload, 14);

    AudioFormat::new(sample_rate as f64, channels as usize, bits_per_sample).map_err(|e| match e {
        ResampleError::Format { message, .. } => ResampleError::format(origin, message),
        ResampleError::UnsupportedFormat { message, .. } => ResampleError::unsupported(origin, message),
        other => other,
    })
}

fn unpack_le(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn pack_le(value: u64, out: &mut [u8]) {
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = (value >> (i * 8)) as u8;
    }
}

/// Unpack interleaved little-endian frames into the block's channel planes.
///
/// `block` must have `format.channel_count` channels. Returns the number of
/// frames decoded, bounded by the block capacity.
pub fn decode_block(raw: &[u8], format: &AudioFormat, block: &mut SampleBlockBuffer) -> usize {
    debug_assert_eq!(block.channels(), format.channel_count);
    let width = format.bytes_per_sample as usize;
    let sign = format.sign();
    let frames = (raw.len() / format.frame_size()).min(block.capacity());

    for (index, frame) in raw.chunks_exact(format.frame_size()).take(frames).enumerate() {
        for (channel, bytes) in frame.chunks_exact(width).enumerate() {
            block.set(index, channel, sign.decode(unpack_le(bytes)));
        }
    }

    frames
}

/// Write one channel's samples into its interleaved slots of `out`.
///
/// `out` holds whole frames; samples beyond its frame count are ignored.
pub fn encode_channel_into(samples: &[f64], channel: usize, format: &AudioFormat, out: &mut [u8]) {
    let width = format.bytes_per_sample as usize;
    let offset = channel * width;
    let sign = format.sign();

    for (frame, &value) in out.chunks_exact_mut(format.frame_size()).zip(samples) {
        pack_le(sign.encode(value), &mut frame[offset..offset + width]);
    }
}

/// Interleave `sample_count` samples of every channel into `out`, replacing its contents.
pub fn encode_block<C: AsRef<[f64]>>(
    channels: &[C],
    sample_count: usize,
    format: &AudioFormat,
    out: &mut Vec<u8>,
) -> Result<()> {
    if channels.len() != format.channel_count {
        return Err(ResampleError::processing(format!(
            "Channel count mismatch: got {} planes for {} channels", channels.len(), format.channel_count
        )));
    }
    if let Some((channel, plane)) = channels.iter().enumerate().find(|(_, c)| c.as_ref().len() < sample_count) {
        return Err(ResampleError::processing(format!(
            "Channel {} holds {} samples, {} requested", channel, plane.as_ref().len(), sample_count
        )));
    }

    out.clear();
    out.resize(sample_count * format.frame_size(), 0);
    for (channel, plane) in channels.iter().enumerate() {
        encode_channel_into(&plane.as_ref()[..sample_count], channel, format, out);
    }

    Ok(())
}

/// Full canonical header describing `data_size` payload bytes.
pub fn canonical_header(format: &AudioFormat, data_size: u32) -> [u8; CANONICAL_HEADER_SIZE] {
    let mut header = [0u8; CANONICAL_HEADER_SIZE];
    header[0..4].copy_from_slice(&RIFF_MAGIC);
    header[4..8].copy_from_slice(&data_size.saturating_add(RIFF_SIZE_OVERHEAD).to_le_bytes());
    header[8..12].copy_from_slice(&WAVE_MAGIC);

    header[12..16].copy_from_slice(&FMT_MAGIC);
    header[16..20].copy_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
    header[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    header[22..24].copy_from_slice(&(format.channel_count as u16).to_le_bytes());
    header[24..28].copy_from_slice(&format.header_sample_rate().to_le_bytes());
    header[28..32].copy_from_slice(&format.byte_rate().to_le_bytes());
    header[32..34].copy_from_slice(&format.block_align().to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());

    header[36..40].copy_from_slice(&DATA_MAGIC);
    header[40..44].copy_from_slice(&data_size.to_le_bytes());
    header
}

/// Streaming PCM reader positioned at the start of the data payload.
#[derive(Debug)]
pub struct WavReader<R> {
    inner: R,
    origin: String,
    format: AudioFormat,
    sample_count: u64,
    remaining_bytes: u64,
    raw: Vec<u8>,
}

impl WavReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ResampleError::io(format!("Cannot open audio file {}", path.display()), e))?;
        Self::new(BufReader::new(file), path.display().to_string())
    }
}

impl<R: Read> WavReader<R> {
    /// Parse the outer header, the `fmt ` chunk and the `data` chunk header.
    pub fn new<O: Into<String>>(mut inner: R, origin: O) -> Result<Self> {
        let origin = origin.into();

        let mut outer = [0u8; OUTER_HEADER_SIZE];
        let got = read_full(&mut inner, &mut outer).map_err(|e| ResampleError::io(origin.as_str(), e))?;
        if got < OUTER_HEADER_SIZE {
            return Err(ResampleError::truncated(origin, format!(
                "outer header is {} bytes, expected {}", got, OUTER_HEADER_SIZE
            )));
        }
        if outer[0..4] != RIFF_MAGIC[..] {
            return Err(ResampleError::bad_magic(origin, "outer container", &RIFF_MAGIC, &outer[0..4]));
        }
        if outer[8..12] != WAVE_MAGIC[..] {
            return Err(ResampleError::bad_magic(origin, "inner type", &WAVE_MAGIC, &outer[8..12]));
        }

        let fmt_size = seek_chunk(&mut inner, &origin, &FMT_MAGIC)?;
        // only the PCM fields are buffered; any extension is drained
        let head = (fmt_size as usize).min(FMT_CHUNK_SIZE as usize);
        let mut payload = [0u8; FMT_CHUNK_SIZE as usize];
        let got = read_full(&mut inner, &mut payload[..head])
            .map_err(|e| ResampleError::io(origin.as_str(), e))?;
        if got < head {
            return Err(ResampleError::truncated(origin, format!(
                "fmt chunk declares {} bytes but only {} are present", fmt_size, got
            )));
        }
        let format = parse_fmt_chunk(&payload[..head], &origin)?;
        skip_bytes(&mut inner, &origin, &FMT_MAGIC, (fmt_size - head as u32) as u64, fmt_size)?;

        let data_size = seek_chunk(&mut inner, &origin, &DATA_MAGIC)?;
        let frame_size = format.frame_size() as u64;
        // trailing partial frame is dropped
        let sample_count = data_size as u64 / frame_size;

        info!("Opened {}: {}, {} samples", origin, format, sample_count);

        Ok(Self {
            inner,
            origin,
            format,
            sample_count,
            remaining_bytes: sample_count * frame_size,
            raw: Vec::new(),
        })
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Samples per channel in the data chunk.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Samples per channel not yet read.
    pub fn remaining_samples(&self) -> u64 {
        self.remaining_bytes / self.format.frame_size() as u64
    }

    /// Decode up to `block.capacity()` samples per channel; returns how many were decoded.
    pub fn read_block(&mut self, block: &mut SampleBlockBuffer) -> Result<usize> {
        if block.channels() != self.format.channel_count {
            return Err(ResampleError::processing(format!(
                "Block has {} channels, {} carries {}",
                block.channels(), self.origin, self.format.channel_count
            )));
        }

        let frame_size = self.format.frame_size();
        let frames = (block.capacity() as u64).min(self.remaining_samples()) as usize;
        if frames == 0 {
            return Ok(0);
        }

        let len = frames * frame_size;
        self.raw.resize(len, 0);
        let got = read_full(&mut self.inner, &mut self.raw[..len])
            .map_err(|e| ResampleError::io(self.origin.as_str(), e))?;
        if got < len {
            return Err(ResampleError::truncated(self.origin.as_str(), format!(
                "data chunk ended {} bytes early", self.remaining_bytes - got as u64
            )));
        }
        self.remaining_bytes -= len as u64;

        Ok(decode_block(&self.raw[..len], &self.format, block))
    }
}

/// Streaming PCM writer; the header is a placeholder until [`WavWriter::finalize`].
#[derive(Debug)]
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    origin: String,
    format: AudioFormat,
    samples_written: u64,
    raw: Vec<u8>,
}

impl WavWriter<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P, format: AudioFormat) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ResampleError::io(format!("Cannot create output directory {}", parent.display()), e))?;
        }

        let file = File::create(path)
            .map_err(|e| ResampleError::io(format!("Cannot create output file {}", path.display()), e))?;
        Self::new(BufWriter::new(file), format, path.display().to_string())
    }
}

impl<W: Write + Seek> WavWriter<W> {
    /// Reserve the canonical header so streamed frames land at the payload offset.
    pub fn new<O: Into<String>>(mut inner: W, format: AudioFormat, origin: O) -> Result<Self> {
        let origin = origin.into();
        inner
            .write_all(&[0u8; CANONICAL_HEADER_SIZE])
            .map_err(|e| ResampleError::io(origin.as_str(), e))?;

        Ok(Self {
            inner,
            origin,
            format,
            samples_written: 0,
            raw: Vec::new(),
        })
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Samples per channel written so far.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Append already interleaved frames.
    pub fn write_interleaved(&mut self, raw: &[u8]) -> Result<()> {
        let frame_size = self.format.frame_size();
        if raw.len() % frame_size != 0 {
            return Err(ResampleError::processing(format!(
                "{} bytes is not a whole number of {}-byte frames", raw.len(), frame_size
            )));
        }

        self.inner.write_all(raw).map_err(|e| ResampleError::io(self.origin.as_str(), e))?;
        self.samples_written += (raw.len() / frame_size) as u64;
        Ok(())
    }

    pub fn write_block<C: AsRef<[f64]>>(&mut self, channels: &[C], sample_count: usize) -> Result<()> {
        let mut raw = std::mem::take(&mut self.raw);
        let result = encode_block(channels, sample_count, &self.format, &mut raw)
            .and_then(|_| self.write_interleaved(&raw));
        self.raw = raw;
        result
    }

    /// Rewrite the header to describe every sample written, then flush.
    pub fn finalize(mut self) -> Result<W> {
        let data_size = self.samples_written
            .checked_mul(self.format.frame_size() as u64)
            .filter(|size| *size <= (u32::MAX - RIFF_SIZE_OVERHEAD) as u64)
            .ok_or_else(|| ResampleError::unsupported(self.origin.as_str(), format!(
                "{} samples do not fit the 32-bit size fields", self.samples_written
            )))? as u32;

        let header = canonical_header(&self.format, data_size);
        self.inner
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.inner.write_all(&header))
            .and_then(|_| self.inner.flush())
            .map_err(|e| ResampleError::io(format!("Cannot finalize {}", self.origin), e))?;

        info!("Finalized {}: {} samples, {} data bytes", self.origin, self.samples_written, data_size);
        Ok(self.inner)
    }
}
