//! Error Types

use std::io;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum ResampleError {
    /// Bad container magic or malformed chunk layout
    #[error("Format error in {origin}: {message}")]
    Format { origin: String, message: String },

    /// Stream ended before a required chunk or payload was read
    #[error("Truncated stream {origin}: {message}")]
    TruncatedStream { origin: String, message: String },

    /// Non-PCM format tag or a bit depth the codec cannot handle
    #[error("Unsupported format in {origin}: {message}")]
    UnsupportedFormat { origin: String, message: String },

    #[error("IO error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Config error: {message}")]
    Config { message: String },

    /// Internal consistency failure inside the conversion loop
    #[error("Processing error: {message}")]
    Processing { message: String },

    #[error("Conversion cancelled after {samples_written} output samples")]
    Cancelled { samples_written: u64 },
}

impl ResampleError {
    pub fn format<O: Into<String>, S: Into<String>>(origin: O, msg: S) -> Self {
        Self::Format { origin: origin.into(), message: msg.into() }
    }

    pub fn truncated<O: Into<String>, S: Into<String>>(origin: O, msg: S) -> Self {
        Self::TruncatedStream { origin: origin.into(), message: msg.into() }
    }

    pub fn unsupported<O: Into<String>, S: Into<String>>(origin: O, msg: S) -> Self {
        Self::UnsupportedFormat { origin: origin.into(), message: msg.into() }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self { Self::Config { message: msg.into() } }
    pub fn processing<S: Into<String>>(msg: S) -> Self { Self::Processing { message: msg.into() } }

    /// Wrap an I/O failure; an unexpected EOF becomes a truncated-stream error.
    pub fn io<C: Into<String>>(context: C, source: io::Error) -> Self {
        let context = context.into();
        if source.kind() == io::ErrorKind::UnexpectedEof {
            Self::truncated(context, "unexpected end of stream")
        } else {
            Self::Io { context, source }
        }
    }

    pub fn bad_magic<O: Into<String>>(origin: O, what: &str, expected: &[u8; 4], found: &[u8]) -> Self {
        Self::format(origin, format!(
            "{} tag mismatch: expected {:?}, found {:?}",
            what,
            String::from_utf8_lossy(expected),
            String::from_utf8_lossy(found)
        ))
    }
}

pub type Result<T> = std::result::Result<T, ResampleError>;
