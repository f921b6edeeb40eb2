//! Sample layout description and the integer sign convention

use crate::error::{ResampleError, Result};

/// Most interleaved channels a stream may carry.
pub const MAX_CHANNELS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFormat {
    pub sample_rate: f64,
    pub channel_count: usize,
    pub bits_per_sample: u16,
    pub bytes_per_sample: u8,
}

impl AudioFormat {
    /// Build a format, rejecting bit depths that are not whole bytes in 8..=64.
    pub fn new(sample_rate: f64, channel_count: usize, bits_per_sample: u16) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ResampleError::format("format", format!("Invalid sample rate: {}", sample_rate)));
        }
        if channel_count == 0 {
            return Err(ResampleError::format("format", "Invalid channel count: 0"));
        }
        if channel_count > MAX_CHANNELS {
            return Err(ResampleError::unsupported(
                "format",
                format!("{} channels exceeds the limit of {}", channel_count, MAX_CHANNELS),
            ));
        }
        if bits_per_sample == 0 || bits_per_sample % 8 != 0 || bits_per_sample > 64 {
            return Err(ResampleError::unsupported(
                "format",
                format!("Unsupported bit depth: {}", bits_per_sample),
            ));
        }

        let format = Self {
            sample_rate,
            channel_count,
            bits_per_sample,
            bytes_per_sample: (bits_per_sample / 8) as u8,
        };

        // header rate and byte rate are 32-bit fields
        let rate = sample_rate.round();
        if rate > u32::MAX as f64 || rate * format.frame_size() as f64 > u32::MAX as f64 {
            return Err(ResampleError::unsupported(
                "format",
                format!("{} does not fit the 32-bit header rate fields", format),
            ));
        }

        Ok(format)
    }

    /// Same channel and bit layout at another rate.
    pub fn with_sample_rate(&self, sample_rate: f64) -> Result<Self> {
        Self::new(sample_rate, self.channel_count, self.bits_per_sample)
    }

    /// Bytes occupied by one sample of every channel.
    pub fn frame_size(&self) -> usize {
        self.channel_count * self.bytes_per_sample as usize
    }

    /// Sample rate as stored in the header field.
    pub fn header_sample_rate(&self) -> u32 {
        self.sample_rate.round() as u32
    }

    pub fn byte_rate(&self) -> u32 {
        self.header_sample_rate() * self.frame_size() as u32
    }

    pub fn block_align(&self) -> u16 {
        self.frame_size() as u16
    }

    pub fn sign(&self) -> SignConvention {
        SignConvention::new(self.bits_per_sample)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ch, {}Hz, {}-bit", self.channel_count, self.sample_rate, self.bits_per_sample)
    }
}

/// Maps packed unsigned integers to centered sample values and back
/// without relying on native sign extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignConvention {
    /// `2^bits`; one more than the largest packed value.
    pub neg_base: u128,
    /// `2^(bits-1)`; the top bit of the packed value.
    pub neg_mask: u64,
}

impl SignConvention {
    pub fn new(bits_per_sample: u16) -> Self {
        debug_assert!((8..=64).contains(&bits_per_sample));
        Self {
            neg_base: 1u128 << bits_per_sample,
            neg_mask: 1u64 << (bits_per_sample - 1),
        }
    }

    pub fn min_value(&self) -> f64 {
        -(self.neg_mask as f64)
    }

    pub fn max_value(&self) -> f64 {
        (self.neg_mask - 1) as f64
    }

    pub fn decode(&self, raw: u64) -> f64 {
        if raw & self.neg_mask != 0 {
            -((self.neg_base - raw as u128) as f64)
        } else {
            raw as f64
        }
    }

    /// Rounds to nearest and saturates before mapping negatives onto `neg_base + value`.
    pub fn encode(&self, value: f64) -> u64 {
        if !value.is_finite() {
            return 0;
        }
        let value = value.round().clamp(self.min_value(), self.max_value());
        if value >= 0.0 {
            // 2^63 - 1 is not representable in f64; keep 64-bit positives below the sign bit
            (value as u64).min(self.neg_mask - 1)
        } else {
            ((self.neg_base as f64 + value) as u64).max(self.neg_mask)
        }
    }
}
