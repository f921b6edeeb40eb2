//! Rate converter contract and the default streaming linear converter

use crate::error::{ResampleError, Result};

/// Per-channel streaming sample-rate converter.
///
/// One instance handles exactly one channel. Output cadence is not tied to
/// input: early calls may return nothing while the converter fills its
/// internal history.
pub trait ConverterPort {
    /// Feed one block and return the samples produced by it.
    ///
    /// The returned slice borrows the converter's own storage and is only
    /// valid until the next call.
    fn process(&mut self, input: &[f64]) -> &[f64];
}

/// Builds one converter per channel.
pub trait ConverterFactory {
    type Converter: ConverterPort;

    fn create(&self, input_rate: f64, output_rate: f64, max_input_block: usize) -> Result<Self::Converter>;
}

impl<F, C> ConverterFactory for F
where
    F: Fn(f64, f64, usize) -> Result<C>,
    C: ConverterPort,
{
    type Converter = C;

    fn create(&self, input_rate: f64, output_rate: f64, max_input_block: usize) -> Result<C> {
        self(input_rate, output_rate, max_input_block)
    }
}

/// Streaming linear interpolation.
///
/// Output sample `k` sits at input position `k * input_rate / output_rate`.
/// Interpolating needs the sample after that position, so the converter
/// lags its input by one sample. At identity ratio every output equals an
/// input sample exactly.
#[derive(Debug, Clone)]
pub struct LinearConverter {
    step: f64,
    max_input_block: usize,
    /// Absolute index of the next output sample.
    next_output: u64,
    /// Input samples consumed before the current block.
    consumed: u64,
    /// Last sample of the previous block.
    previous: f64,
    output: Vec<f64>,
}

impl LinearConverter {
    pub fn new(input_rate: f64, output_rate: f64, max_input_block: usize) -> Result<Self> {
        if !input_rate.is_finite() || input_rate <= 0.0 {
            return Err(ResampleError::config(format!("Invalid input rate: {}", input_rate)));
        }
        if !output_rate.is_finite() || output_rate <= 0.0 {
            return Err(ResampleError::config(format!("Invalid output rate: {}", output_rate)));
        }
        if max_input_block == 0 {
            return Err(ResampleError::config("Converter block size must be greater than 0"));
        }

        let step = input_rate / output_rate;
        let max_output = (max_input_block as f64 / step).ceil() as usize + 2;

        Ok(Self {
            step,
            max_input_block,
            next_output: 0,
            consumed: 0,
            previous: 0.0,
            output: Vec::with_capacity(max_output),
        })
    }

    /// Ratio of input to output rate.
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn max_input_block(&self) -> usize {
        self.max_input_block
    }
}

impl ConverterPort for LinearConverter {
    fn process(&mut self, input: &[f64]) -> &[f64] {
        debug_assert!(input.len() <= self.max_input_block);
        self.output.clear();
        if input.is_empty() {
            return &self.output;
        }

        let len = input.len() as i64;
        loop {
            // position relative to input[0]; index -1 is the previous block's tail
            let position = self.next_output as f64 * self.step - self.consumed as f64;
            let index = position.floor() as i64;
            if index + 1 >= len {
                break;
            }

            let fraction = position - index as f64;
            let a = if index < 0 { self.previous } else { input[index as usize] };
            let b = input[(index + 1) as usize];
            self.output.push(a + (b - a) * fraction);
            self.next_output += 1;
        }

        self.consumed += input.len() as u64;
        self.previous = input[input.len() - 1];
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_blocks(converter: &mut LinearConverter, data: &[f64], block: usize) -> Vec<f64> {
        let mut out = Vec::new();
        for chunk in data.chunks(block) {
            out.extend_from_slice(converter.process(chunk));
        }
        out
    }

    #[test]
    fn test_identity_rate_is_exact() {
        let mut converter = LinearConverter::new(8000.0, 8000.0, 4).unwrap();
        let first = converter.process(&[-32768.0, -1.0, 0.0, 32767.0]).to_vec();
        assert_eq!(first, vec![-32768.0, -1.0, 0.0]);
        let second = converter.process(&[0.0; 4]).to_vec();
        assert_eq!(second[0], 32767.0);
    }

    #[test]
    fn test_upsample_interpolates() {
        let mut converter = LinearConverter::new(8000.0, 16000.0, 4).unwrap();
        let out = converter.process(&[0.0, 2.0, 4.0, 6.0]).to_vec();
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_downsample_keeps_every_other() {
        let mut converter = LinearConverter::new(16000.0, 8000.0, 8).unwrap();
        let out = converter.process(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]).to_vec();
        assert_eq!(out, vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_block_split_does_not_change_output() {
        let data: Vec<f64> = (0..97).map(|i| ((i * 37) % 101) as f64 - 50.0).collect();

        let mut whole = LinearConverter::new(44100.0, 48000.0, 97).unwrap();
        let expected = whole.process(&data).to_vec();

        let mut split = LinearConverter::new(44100.0, 48000.0, 10).unwrap();
        let actual = run_blocks(&mut split, &data, 10);

        assert_eq!(expected.len(), actual.len());
        for (a, b) in expected.iter().zip(actual.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_output_storage_is_preallocated() {
        let mut converter = LinearConverter::new(8000.0, 96000.0, 64).unwrap();
        let capacity = converter.output.capacity();
        for _ in 0..20 {
            converter.process(&[1.0; 64]);
        }
        assert_eq!(converter.output.capacity(), capacity);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(LinearConverter::new(0.0, 8000.0, 4).is_err());
        assert!(LinearConverter::new(8000.0, f64::INFINITY, 4).is_err());
        assert!(LinearConverter::new(8000.0, 8000.0, 0).is_err());
    }

    #[test]
    fn test_closure_factory() {
        let factory = |i: f64, o: f64, n: usize| LinearConverter::new(i, o, n);
        let converter = factory.create(8000.0, 16000.0, 32).unwrap();
        assert_eq!(converter.step(), 0.5);
        assert_eq!(converter.max_input_block(), 32);
    }
}
