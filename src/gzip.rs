//! Gzip converter plugins.
//!
//! The codec the pipeline was built to parallelize: each chunk is compressed
//! (or decompressed) as an independent gzip member, so worker threads never
//! share codec state. Backed by flate2.

use std::io::{ErrorKind, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::pipeline::Converter;
use crate::{PipelineError, PipelineResult};

/// Compresses each chunk into a standalone gzip member.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl GzipCompressor {
    /// Create a compressor with an explicit level (0-9).
    pub fn new(level: u32) -> Self {
        GzipCompressor {
            level: Compression::new(level),
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        GzipCompressor {
            level: Compression::default(),
        }
    }
}

impl Converter for GzipCompressor {
    fn convert(&self, data: Vec<u8>) -> PipelineResult<Vec<u8>> {
        if data.is_empty() {
            return Ok(data);
        }
        let mut encoder = GzEncoder::new(Vec::new(), self.level);
        encoder.write_all(&data)?;
        Ok(encoder.finish()?)
    }
}

/// Decompresses one gzip member back into its original bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipDecompressor;

impl Converter for GzipDecompressor {
    fn convert(&self, data: Vec<u8>) -> PipelineResult<Vec<u8>> {
        if data.is_empty() {
            return Ok(data);
        }
        let mut decoder = GzDecoder::new(data.as_slice());
        let mut output = Vec::new();
        decoder.read_to_end(&mut output).map_err(|e| {
            // flate2 reports corrupt streams as InvalidData/InvalidInput.
            if matches!(e.kind(), ErrorKind::InvalidData | ErrorKind::InvalidInput) {
                PipelineError::InvalidFormat
            } else {
                PipelineError::Io(e)
            }
        })?;
        Ok(output)
    }
}
