//! Audio Container Module
//!
//! Provides the PCM WAV codec, the sample layout description, the reusable
//! block buffer and the per-channel rate converter contract.

pub mod buffer;
pub mod converter;
pub mod format;
pub mod wav;

pub use buffer::SampleBlockBuffer;
pub use converter::{ConverterFactory, ConverterPort, LinearConverter};
pub use format::{AudioFormat, MAX_CHANNELS, SignConvention};
pub use wav::{WavReader, WavWriter, decode_block, encode_block};
