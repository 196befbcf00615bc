//! Magic-delimited, length-prefixed framing.
//!
//! Transformed chunks vary in length, so a flat output stream needs explicit
//! boundaries for the decompression side to recover them. Each frame is:
//!
//! ```text
//! MAGIC (16 bytes) | length (u64 little-endian) | payload (length bytes)
//! ```
//!
//! repeated until end of stream. A stream that does not carry the magic
//! constant at an expected frame boundary is rejected with a format error,
//! never silently misinterpreted. There is exactly one magic value; framing
//! is not versioned.

use std::io::{ErrorKind, Read, Write};

use crate::pipeline::{ChunkReader, ChunkWriter};
use crate::{PipelineError, PipelineResult};

/// Frame marker shared by reader and writer.
pub const MAGIC: [u8; 16] = [
    0x01, 0x2d, 0x00, 0x8a, 0x22, 0xa7, 0x29, 0x4f, 0x9b, 0x9b, 0x0e, 0x85, 0x4c, 0xa9, 0xe3,
    0x7b,
];

/// Size of the length field.
const LEN_SIZE: usize = 8;

/// Reads framed chunks back out of a flat stream.
///
/// Yields one payload per frame; a clean end of stream at a frame boundary
/// ends the sequence. Zero-length payloads are legal even though
/// [`FramedChunkWriter`] never emits them.
#[derive(Debug, Default)]
pub struct FramedChunkReader;

impl ChunkReader for FramedChunkReader {
    fn next_chunk(&mut self, input: &mut dyn Read) -> PipelineResult<Option<Vec<u8>>> {
        let mut magic = [0u8; MAGIC.len()];
        if !read_frame_start(input, &mut magic)? {
            return Ok(None);
        }
        if magic != MAGIC {
            return Err(PipelineError::InvalidFormat);
        }

        let mut len = [0u8; LEN_SIZE];
        read_all(input, &mut len)?;
        let size = u64::from_le_bytes(len) as usize;

        let mut payload = vec![0u8; size];
        read_all(input, &mut payload)?;
        Ok(Some(payload))
    }
}

/// Writes each chunk as one frame.
///
/// Empty payloads produce no frame at all, so an empty run leaves the sink
/// untouched.
#[derive(Debug, Default)]
pub struct FramedChunkWriter;

impl ChunkWriter for FramedChunkWriter {
    fn write_chunk(&mut self, output: &mut dyn Write, chunk: &[u8]) -> PipelineResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        output.write_all(&MAGIC)?;
        output.write_all(&(chunk.len() as u64).to_le_bytes())?;
        output.write_all(chunk)?;
        Ok(())
    }
}

/// Fill `buf` from the stream, distinguishing a clean end of stream (no bytes
/// at all, returns `Ok(false)`) from a frame truncated mid-magic.
fn read_frame_start(input: &mut dyn Read, buf: &mut [u8]) -> PipelineResult<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(PipelineError::InvalidFormat),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Read exactly `buf.len()` bytes; a truncated frame is a format error.
fn read_all(input: &mut dyn Read, buf: &mut [u8]) -> PipelineResult<()> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            PipelineError::InvalidFormat
        } else {
            PipelineError::Io(e)
        }
    })
}
