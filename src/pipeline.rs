//! Pipeline orchestrator: one reader, N workers, one writer.
//!
//! [`StreamPipeline`] wires the work pool and the reorder buffer together
//! and drives three kinds of roles over them:
//!
//! - the **reader** pulls chunks from the source via a [`ChunkReader`],
//!   tags each with the next offset, and feeds the work pool, pausing while
//!   the pool is at the backpressure limit;
//! - each **worker** takes an arbitrary batch from the pool, applies the
//!   [`Converter`], and pushes the result into the reorder buffer;
//! - the **writer** flushes the reorder buffer to the sink via a
//!   [`ChunkWriter`], strictly by ascending offset.
//!
//! Reader and workers run on scoped threads; the writer role runs on the
//! calling thread, so [`StreamPipeline::run`] blocks until every role has
//! quiesced and the sink type does not need to be `Send`.
//!
//! A role never lets a failure escape its loop: errors are recorded in a
//! shared list and raise a run-wide failure flag, which is also the only
//! cooperative stop signal; every other role drains out within one polling
//! interval. After all roles stop, `run` reports the collected errors as one
//! [`PipelineError::Aggregate`].

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crossbeam_utils::Backoff;

use crate::batch::Batch;
use crate::pool::WorkPool;
use crate::reorder::ReorderBuffer;
use crate::{PipelineError, PipelineResult};

// ---------------------------------------------------------------------------
// Plugin contracts
// ---------------------------------------------------------------------------

/// Source plugin: a lazy, finite, forward-only sequence of byte chunks.
///
/// The pipeline imposes no meaning on chunk boundaries beyond "one
/// transformation unit". Called only from the reader role; never restarted
/// mid-run.
pub trait ChunkReader: Send {
    /// Pull the next chunk from the source. `Ok(None)` signals end of input.
    fn next_chunk(&mut self, input: &mut dyn Read) -> PipelineResult<Option<Vec<u8>>>;
}

/// Sink plugin: appends one chunk to the output stream.
///
/// Called once per chunk, in offset order, never concurrently with itself.
pub trait ChunkWriter: Send {
    /// Append a chunk to the sink.
    fn write_chunk(&mut self, output: &mut dyn Write, chunk: &[u8]) -> PipelineResult<()>;
}

/// Transformation plugin: a pure byte-buffer to byte-buffer function.
///
/// Invoked concurrently from multiple worker threads on different inputs;
/// implementations must not share mutable state across calls.
pub trait Converter: Sync {
    /// Transform one chunk.
    fn convert(&self, data: Vec<u8>) -> PipelineResult<Vec<u8>>;
}

impl<F> Converter for F
where
    F: Fn(Vec<u8>) -> PipelineResult<Vec<u8>> + Sync,
{
    fn convert(&self, data: Vec<u8>) -> PipelineResult<Vec<u8>> {
        self(data)
    }
}

// ---------------------------------------------------------------------------
// Progress events
// ---------------------------------------------------------------------------

/// Snapshot fired from a role after it handles a chunk.
///
/// Best-effort diagnostics, not part of the pipeline's correctness. Read
/// progress reports the work pool depth; write progress reports the reorder
/// buffer depth.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    /// Cumulative payload bytes the role has handled this run.
    pub bytes: u64,
    /// Depth of the role's pending container at the time of the event.
    pub pending: usize,
}

/// Progress callback. Fired from pipeline threads; handlers must be fast and
/// must not block.
pub type ProgressFn = Box<dyn Fn(Progress) + Send + Sync>;

// ---------------------------------------------------------------------------
// Shared run state
// ---------------------------------------------------------------------------

/// Coordination state for a single run. Built fresh per run and dropped at
/// the end, so nothing leaks between runs of a reused pipeline.
struct RunState {
    pool: WorkPool,
    reorder: ReorderBuffer,
    errors: Mutex<Vec<PipelineError>>,
    failed: AtomicBool,
    reading: AtomicBool,
    workers: AtomicUsize,
    /// Next offset the writer will flush.
    next_offset: AtomicU64,
}

impl RunState {
    fn new(workers: usize) -> Self {
        RunState {
            pool: WorkPool::new(),
            reorder: ReorderBuffer::new(),
            errors: Mutex::new(Vec::new()),
            failed: AtomicBool::new(false),
            reading: AtomicBool::new(true),
            workers: AtomicUsize::new(workers),
            next_offset: AtomicU64::new(0),
        }
    }

    /// Record a role failure and raise the run-wide stop flag.
    fn record(&self, error: PipelineError) {
        self.errors.lock().unwrap().push(error);
        self.failed.store(true, Ordering::Release);
    }

    fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn reading(&self) -> bool {
        self.reading.load(Ordering::Acquire)
    }

    fn working(&self) -> bool {
        self.workers.load(Ordering::Acquire) > 0
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Parallel order-preserving stream pipeline.
///
/// Configure with the builder-style setters, then call
/// [`StreamPipeline::run`]. The value is reusable: each run builds its own
/// containers and counters.
///
/// ```no_run
/// use std::io::Cursor;
/// use parzip::chunk::ByteChunkReader;
/// use parzip::framing::FramedChunkWriter;
/// use parzip::gzip::GzipCompressor;
/// use parzip::pipeline::StreamPipeline;
///
/// # fn main() -> parzip::PipelineResult<()> {
/// let mut sink = Vec::new();
/// StreamPipeline::new(4, Some(16))?
///     .reader(ByteChunkReader::new(1024 * 1024)?)
///     .writer(FramedChunkWriter)
///     .converter(GzipCompressor::default())
///     .run(&mut Cursor::new(b"payload".to_vec()), &mut sink)?;
/// # Ok(())
/// # }
/// ```
pub struct StreamPipeline {
    threads: usize,
    work_limit: Option<usize>,
    reader: Option<Box<dyn ChunkReader>>,
    writer: Option<Box<dyn ChunkWriter>>,
    converter: Option<Box<dyn Converter + Send>>,
    on_read: Option<ProgressFn>,
    on_write: Option<ProgressFn>,
}

impl StreamPipeline {
    /// Create a pipeline with `threads` worker threads and an optional
    /// backpressure limit on the work pool depth.
    ///
    /// Fails synchronously with a configuration error when `threads` is zero
    /// or the limit is present but zero.
    pub fn new(threads: usize, work_limit: Option<usize>) -> PipelineResult<Self> {
        if threads == 0 {
            return Err(PipelineError::InvalidConfig(
                "thread count can't be less than 1".into(),
            ));
        }
        if work_limit == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "work limit can't be less than 1".into(),
            ));
        }
        Ok(StreamPipeline {
            threads,
            work_limit,
            reader: None,
            writer: None,
            converter: None,
            on_read: None,
            on_write: None,
        })
    }

    /// Set the source plugin.
    pub fn reader(mut self, reader: impl ChunkReader + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    /// Set the sink plugin.
    pub fn writer(mut self, writer: impl ChunkWriter + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }

    /// Set the transformation. Without one, chunks pass through unchanged.
    pub fn converter(mut self, converter: impl Converter + Send + 'static) -> Self {
        self.converter = Some(Box::new(converter));
        self
    }

    /// Observe read progress (cumulative bytes read, work pool depth).
    pub fn on_read(mut self, handler: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.on_read = Some(Box::new(handler));
        self
    }

    /// Observe write progress (cumulative bytes written, buffered depth).
    pub fn on_write(mut self, handler: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.on_write = Some(Box::new(handler));
        self
    }

    /// Run the pipeline from `input` to `output`, blocking until every role
    /// has quiesced.
    ///
    /// Fails synchronously with a usage error when the reader or writer
    /// plugin is missing. Runtime failures from any role are collected and
    /// reported as one [`PipelineError::Aggregate`] after all roles stop; on
    /// failure the sink may hold a correctly ordered prefix of the output.
    pub fn run<R, W>(&mut self, input: &mut R, output: &mut W) -> PipelineResult<()>
    where
        R: Read + Send,
        W: Write,
    {
        let reader = match self.reader.as_mut() {
            Some(reader) => reader,
            None => return Err(PipelineError::NotConfigured("reader")),
        };
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => return Err(PipelineError::NotConfigured("writer")),
        };
        let converter = self.converter.as_deref();
        let on_read = self.on_read.as_deref();
        let on_write = self.on_write.as_deref();
        let work_limit = self.work_limit;

        let state = RunState::new(self.threads);

        log::debug!("pipeline: starting 1 reader, {} workers, 1 writer", self.threads);
        std::thread::scope(|scope| {
            let state = &state;

            scope.spawn(move || read_role(reader.as_mut(), input, state, work_limit, on_read));

            for _ in 0..self.threads {
                scope.spawn(move || work_role(state, converter));
            }

            write_role(writer.as_mut(), output, state, on_write);
        });

        let errors = state.errors.into_inner().unwrap();
        if errors.is_empty() {
            log::debug!("pipeline: completed");
            Ok(())
        } else {
            log::debug!("pipeline: failed with {} error(s)", errors.len());
            Err(PipelineError::Aggregate(errors))
        }
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Reader role: pull chunks, assign offsets, feed the pool.
///
/// The single reader is the only offset source; contiguity of offsets is what
/// lets the writer treat the buffer minimum as the only flush candidate.
fn read_role<R: Read>(
    reader: &mut dyn ChunkReader,
    input: &mut R,
    state: &RunState,
    work_limit: Option<usize>,
    on_read: Option<&(dyn Fn(Progress) + Send + Sync)>,
) {
    log::debug!("reader: started");
    let backoff = Backoff::new();
    let mut offset = 0u64;
    let mut bytes = 0u64;

    while !state.failed() {
        if let Some(limit) = work_limit {
            let depth = state.pool.len();
            if depth >= limit {
                log::trace!("reader: {} batches in work, waiting for < {}", depth, limit);
                backoff.snooze();
                continue;
            }
        }

        let chunk = match reader.next_chunk(input) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                state.record(e);
                break;
            }
        };

        bytes += chunk.len() as u64;
        log::trace!("reader: got batch {} ({} bytes)", offset, chunk.len());
        state.pool.put(Batch::new(offset, chunk));
        offset += 1;
        backoff.reset();

        if let Some(handler) = on_read {
            handler(Progress {
                bytes,
                pending: state.pool.len(),
            });
        }
    }

    state.reading.store(false, Ordering::Release);
    log::debug!("reader: stopped after {} batches, {} bytes", offset, bytes);
}

/// Worker role: take an arbitrary batch, convert it, push it onward.
fn work_role(state: &RunState, converter: Option<&(dyn Converter + Send)>) {
    log::debug!("worker: started");
    let backoff = Backoff::new();

    while !state.failed() {
        let mut batch = match state.pool.take() {
            Some(batch) => batch,
            None => {
                if !state.reading() && state.pool.is_empty() {
                    break;
                }
                backoff.snooze();
                continue;
            }
        };
        backoff.reset();

        log::trace!("worker: converting batch {}", batch.offset());
        if let Some(converter) = converter {
            match converter.convert(batch.take_payload()) {
                Ok(payload) => batch.set_payload(payload),
                Err(e) => {
                    state.record(e);
                    break;
                }
            }
        }
        state.reorder.push(batch);
    }

    state.workers.fetch_sub(1, Ordering::AcqRel);
    log::debug!("worker: stopped");
}

/// Writer role: flush the reorder buffer to the sink strictly in offset
/// order. Runs on the thread that called [`StreamPipeline::run`].
fn write_role<W: Write>(
    writer: &mut dyn ChunkWriter,
    output: &mut W,
    state: &RunState,
    on_write: Option<&(dyn Fn(Progress) + Send + Sync)>,
) {
    log::debug!("writer: started");
    let backoff = Backoff::new();
    let mut bytes = 0u64;

    while !state.failed() {
        let expected = state.next_offset.load(Ordering::Acquire);

        match state.reorder.peek_min() {
            Some(offset) if offset == expected => {
                // The writer is the only consumer, so the batch it just
                // peeked is still there.
                let batch = match state.reorder.try_pop_min() {
                    Some(batch) => batch,
                    None => continue,
                };
                debug_assert_eq!(batch.offset(), expected);

                if let Err(e) = writer.write_chunk(output, batch.payload()) {
                    state.record(e);
                    break;
                }
                bytes += batch.size() as u64;
                state.next_offset.fetch_add(1, Ordering::AcqRel);
                backoff.reset();
                log::trace!("writer: flushed batch {}", offset);

                if let Some(handler) = on_write {
                    handler(Progress {
                        bytes,
                        pending: state.reorder.len(),
                    });
                }
            }
            Some(offset) => {
                // A later offset arrived before the expected one; offsets are
                // contiguous, so the expected batch is still in flight.
                log::trace!("writer: batch {} not in order, waiting for {}", offset, expected);
                backoff.snooze();
            }
            None => {
                if !state.reading() && !state.working() && state.reorder.is_empty() {
                    break;
                }
                backoff.snooze();
            }
        }
    }

    if let Err(e) = output.flush() {
        state.record(e.into());
    }
    log::debug!("writer: stopped after {} bytes", bytes);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
