//! Sample-Rate Conversion Pipeline

pub mod pipeline;

pub use pipeline::{
    CancelToken, ConversionPipeline, ConversionReport, ConversionSession,
    PipelineOptions, PipelineState, convert_file,
};
