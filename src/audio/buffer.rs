//! Fixed-capacity planar sample storage reused across conversion blocks

use crate::error::{ResampleError, Result};

/// One contiguous plane of `capacity` samples per channel.
#[derive(Debug, Clone)]
pub struct SampleBlockBuffer {
    samples: Vec<f64>,
    channels: usize,
    capacity: usize,
}

impl SampleBlockBuffer {
    pub fn new(channels: usize, capacity: usize) -> Result<Self> {
        if channels == 0 {
            return Err(ResampleError::config("Block buffer needs at least one channel"));
        }
        if capacity == 0 {
            return Err(ResampleError::config("Block capacity must be greater than 0"));
        }

        Ok(Self {
            samples: vec![0.0; channels * capacity],
            channels,
            capacity,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channel(&self, channel: usize) -> &[f64] {
        let start = channel * self.capacity;
        &self.samples[start..start + self.capacity]
    }

    pub fn channel_mut(&mut self, channel: usize) -> &mut [f64] {
        let start = channel * self.capacity;
        &mut self.samples[start..start + self.capacity]
    }

    pub fn set(&mut self, frame: usize, channel: usize, value: f64) {
        self.samples[channel * self.capacity + frame] = value;
    }

    /// Silence every channel from `frame` to the end of the block.
    pub fn zero_fill_from(&mut self, frame: usize) {
        if frame >= self.capacity {
            return;
        }
        for plane in self.samples.chunks_exact_mut(self.capacity) {
            plane[frame..].fill(0.0);
        }
    }
}
