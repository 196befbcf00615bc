//! Fixed-size chunking of raw byte streams.
//!
//! The compression-side source plugin: splits an arbitrary stream into
//! chunks of a configured size (the final chunk may be shorter), each of
//! which becomes one transformation unit. The matching sink plugin appends
//! chunks verbatim.

use std::io::{ErrorKind, Read, Write};

use crate::pipeline::{ChunkReader, ChunkWriter};
use crate::{PipelineError, PipelineResult};

/// Splits the source into fixed-size chunks.
#[derive(Debug)]
pub struct ByteChunkReader {
    chunk_size: usize,
}

impl ByteChunkReader {
    /// Create a reader producing chunks of `chunk_size` bytes.
    ///
    /// Fails with a configuration error when the size is zero.
    pub fn new(chunk_size: usize) -> PipelineResult<Self> {
        if chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "chunk size can't be less than 1".into(),
            ));
        }
        Ok(ByteChunkReader { chunk_size })
    }
}

impl ChunkReader for ByteChunkReader {
    fn next_chunk(&mut self, input: &mut dyn Read) -> PipelineResult<Option<Vec<u8>>> {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut filled = 0;

        while filled < buffer.len() {
            match input.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        buffer.truncate(filled);
        Ok(Some(buffer))
    }
}

/// Appends chunks to the sink verbatim.
#[derive(Debug, Default)]
pub struct ByteChunkWriter;

impl ChunkWriter for ByteChunkWriter {
    fn write_chunk(&mut self, output: &mut dyn Write, chunk: &[u8]) -> PipelineResult<()> {
        output.write_all(chunk)?;
        Ok(())
    }
}
