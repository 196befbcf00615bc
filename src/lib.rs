//! Parallel, order-preserving stream transformation pipeline.
//!
//! Reads a sequence of byte chunks from a source, applies a pluggable
//! transformation to each chunk on a pool of worker threads, and writes the
//! results to a sink strictly in input order, even though workers finish out
//! of order. Built to parallelize gzip compression of large files, but the
//! transformation is an arbitrary [`pipeline::Converter`].
//!
//! **Pipeline topology:**
//!
//! ```text
//! source --reader--> [work pool] --workers(xN)--> [reorder buffer] --writer--> sink
//! ```
//!
//! The reader tags each chunk with a monotonically increasing offset and
//! respects an optional backpressure limit on the work pool. Workers pull
//! batches in arbitrary order and convert them. The writer drains the reorder
//! buffer strictly by ascending offset, so the sink always receives chunks in
//! the order they were read.
//!
//! Known limitations, by design: the reorder buffer is unbounded (a slow sink
//! grows it without limit), a failed run may leave a correctly ordered prefix
//! in the sink, and a permanently stalled source or sink stalls the run.

pub mod batch;
pub mod chunk;
pub mod framing;
pub mod gzip;
pub mod pipeline;
pub mod pool;
pub mod reorder;

#[cfg(test)]
mod validation;

/// Error type for pipeline operations.
#[derive(Debug)]
#[non_exhaustive]
pub enum PipelineError {
    /// A stream lacks the expected frame magic at a frame boundary, or a
    /// codec rejected its input as corrupt.
    InvalidFormat,
    /// Invalid construction parameter (thread count, work limit, chunk size).
    InvalidConfig(String),
    /// A run was started before the named plugin was configured.
    NotConfigured(&'static str),
    /// An operation that requires a non-empty buffer found it empty.
    EmptyBuffer,
    /// A converter plugin failed.
    Codec(String),
    /// I/O error from the source or sink.
    Io(std::io::Error),
    /// Every error recorded by the roles of a failed pipeline run.
    Aggregate(Vec<PipelineError>),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat => write!(
                f,
                "invalid stream format, are the reader/writer/converter types matched?"
            ),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::NotConfigured(what) => write!(f, "pipeline {} is not set up", what),
            Self::EmptyBuffer => write!(f, "buffer is empty"),
            Self::Codec(msg) => write!(f, "conversion failed: {}", msg),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Aggregate(errors) => {
                write!(f, "{} error(s) during pipeline run:", errors.len())?;
                for e in errors {
                    write!(f, " [{}]", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Aggregate(errors) => errors.first().map(|e| e as _),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
