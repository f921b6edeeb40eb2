//! Configuration management for sample-rate conversion

use crate::error::{ResampleError, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest block the pipeline accepts per channel.
pub const MAX_BLOCK_CAPACITY: usize = 1 << 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input_path: PathBuf,
    #[serde(default)]
    pub output_path: PathBuf,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub target_sample_rate: f64,
    pub block_capacity: usize,
    pub max_idle_blocks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub remove_partial_output: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("input.wav"),
            output_path: PathBuf::from("output.wav"),
            conversion: ConversionConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 96000.0,
            block_capacity: 1024,
            max_idle_blocks: 64,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { remove_partial_output: true }
    }
}

impl Config {
    pub fn target_sample_rate(&self) -> f64 {
        self.conversion.target_sample_rate
    }

    pub fn block_capacity(&self) -> usize {
        self.conversion.block_capacity
    }

    pub fn max_idle_blocks(&self) -> usize {
        self.conversion.max_idle_blocks
    }

    pub fn remove_partial_output(&self) -> bool {
        self.output.remove_partial_output
    }

    pub fn verbose(&self) -> bool {
        self.logging.verbose
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "wavresample", about = "PCM WAV sample-rate converter", version, author)]
pub struct Args {
    #[arg(value_name = "INPUT", help = "Input audio file path (PCM WAV)")]
    pub input: PathBuf,

    #[arg(value_name = "OUTPUT", help = "Output audio file path")]
    pub output: PathBuf,

    #[arg(short = 'r', long = "rate", help = "Target sample rate in Hz [default: 96000]")]
    pub rate: Option<f64>,

    #[arg(short = 'b', long = "block-size", help = "Samples per channel fed to the converter per block [default: 1024]")]
    pub block_size: Option<usize>,

    #[arg(long = "max-idle-blocks", help = "Zero-output blocks tolerated after the input ends [default: 64]")]
    pub max_idle_blocks: Option<usize>,

    #[arg(short = 'c', long = "config", help = "Config file path (TOML format)")]
    pub config_file: Option<PathBuf>,

    #[arg(long = "keep-partial", help = "Keep the output file when conversion fails")]
    pub keep_partial: bool,

    #[arg(short = 'v', long = "verbose", help = "Enable verbose output mode")]
    pub verbose: bool,
}

impl Config {
    /// Create config from command line arguments and optional config file.
    ///
    /// Options given on the command line override the file; absent ones keep it.
    pub fn from_args_and_config(args: Args) -> Result<Self> {
        let mut config = if let Some(config_path) = &args.config_file {
            Self::from_file(config_path)?
        } else {
            Self::default()
        };

        config.input_path = args.input;
        config.output_path = args.output;
        if let Some(rate) = args.rate {
            config.conversion.target_sample_rate = rate;
        }
        if let Some(block_size) = args.block_size {
            config.conversion.block_capacity = block_size;
        }
        if let Some(max_idle) = args.max_idle_blocks {
            config.conversion.max_idle_blocks = max_idle;
        }
        if args.keep_partial {
            config.output.remove_partial_output = false;
        }
        if args.verbose {
            config.logging.verbose = true;
        }

        config.validate()?;

        Ok(config)
    }

    /// Load config from TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ResampleError::config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ResampleError::config(format!("Failed to parse config file: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        let rate = self.conversion.target_sample_rate;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ResampleError::config("Target sample rate must be greater than 0"));
        }
        if rate > u32::MAX as f64 {
            return Err(ResampleError::config("Target sample rate does not fit the header field"));
        }

        if self.conversion.block_capacity == 0 {
            return Err(ResampleError::config("Block size must be greater than 0"));
        }
        if self.conversion.block_capacity > MAX_BLOCK_CAPACITY {
            return Err(ResampleError::config(format!("Block size cannot exceed {}", MAX_BLOCK_CAPACITY)));
        }

        if self.conversion.max_idle_blocks == 0 {
            return Err(ResampleError::config("Max idle blocks must be at least 1"));
        }

        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ResampleError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ResampleError::config(format!("Failed to write config file: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.target_sample_rate(), 96000.0);
        assert_eq!(config.block_capacity(), 1024);
        assert_eq!(config.max_idle_blocks(), 64);
        assert!(config.remove_partial_output());
        assert!(!config.verbose());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.conversion.target_sample_rate = 0.0;
        assert!(config.validate().is_err());
        config.conversion.target_sample_rate = f64::NAN;
        assert!(config.validate().is_err());
        config.conversion.target_sample_rate = 1e12;
        assert!(config.validate().is_err());
        config.conversion.target_sample_rate = 48000.0;

        config.conversion.block_capacity = 0;
        assert!(config.validate().is_err());
        config.conversion.block_capacity = MAX_BLOCK_CAPACITY + 1;
        assert!(config.validate().is_err());
        config.conversion.block_capacity = 256;

        config.conversion.max_idle_blocks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.conversion.target_sample_rate = 44100.0;

        assert!(config.save_to_file(&config_path).is_ok());
        assert!(config_path.exists());

        let loaded_config = Config::from_file(&config_path).unwrap();
        assert_eq!(loaded_config.target_sample_rate(), 44100.0);
        assert_eq!(loaded_config.block_capacity(), config.block_capacity());
    }

    #[test]
    fn test_partial_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[conversion]\nblock_capacity = 512\n").unwrap();

        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.block_capacity(), 512);
        assert_eq!(config.target_sample_rate(), 96000.0);
        assert!(config.remove_partial_output());
    }

    #[test]
    fn test_args_override_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[conversion]\ntarget_sample_rate = 22050.0\nblock_capacity = 512\n").unwrap();

        let args = Args::try_parse_from([
            "wavresample", "in.wav", "out.wav",
            "-c", config_path.to_str().unwrap(),
            "-r", "32000", "--keep-partial",
        ]).unwrap();
        let config = Config::from_args_and_config(args).unwrap();

        assert_eq!(config.target_sample_rate(), 32000.0);
        assert_eq!(config.block_capacity(), 512);
        assert!(!config.remove_partial_output());
        assert_eq!(config.input_path, PathBuf::from("in.wav"));
        assert_eq!(config.output_path, PathBuf::from("out.wav"));
    }

    #[test]
    fn test_args_require_two_paths() {
        assert!(Args::try_parse_from(["wavresample"]).is_err());
        assert!(Args::try_parse_from(["wavresample", "in.wav"]).is_err());
    }

    #[test]
    fn test_invalid_args_rejected() {
        let args = Args::try_parse_from(["wavresample", "in.wav", "out.wav", "-b", "0"]).unwrap();
        assert!(Config::from_args_and_config(args).is_err());
    }
}
