/// Cross-component validation for the pipeline.
///
/// These tests verify:
/// 1. **Round-trip correctness** through the gzip converters under every
///    worker-count / backpressure combination
/// 2. **Order preservation** independent of worker count
/// 3. **Backpressure bound** at the instant each read-progress event fires
/// 4. **Edge cases** - empty input, mismatched streams
/// 5. **Failure aggregation** across concurrently failing roles
#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    use crate::chunk::{ByteChunkReader, ByteChunkWriter};
    use crate::framing::{FramedChunkReader, FramedChunkWriter};
    use crate::gzip::{GzipCompressor, GzipDecompressor};
    use crate::pipeline::{ChunkReader, StreamPipeline};
    use crate::{PipelineError, PipelineResult};

    // ---------------------------------------------------------------
    // Helpers: test vectors and pipeline wiring
    // ---------------------------------------------------------------

    /// Repetitive text with structure (compresses well).
    fn data_repeating_text(n: usize) -> Vec<u8> {
        b"the quick brown fox jumps over the lazy dog. "
            .iter()
            .cycle()
            .take(n)
            .copied()
            .collect()
    }

    /// Binary data with some structure (sawtooth).
    fn data_sawtooth(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i % 256) as u8).collect()
    }

    fn compress(input: &[u8], threads: usize, limit: Option<usize>, chunk: usize) -> Vec<u8> {
        let mut output = Vec::new();
        StreamPipeline::new(threads, limit)
            .unwrap()
            .reader(ByteChunkReader::new(chunk).unwrap())
            .writer(FramedChunkWriter)
            .converter(GzipCompressor::default())
            .run(&mut Cursor::new(input.to_vec()), &mut output)
            .unwrap();
        output
    }

    fn decompress(input: &[u8], threads: usize, limit: Option<usize>) -> Vec<u8> {
        let mut output = Vec::new();
        StreamPipeline::new(threads, limit)
            .unwrap()
            .reader(FramedChunkReader)
            .writer(ByteChunkWriter)
            .converter(GzipDecompressor)
            .run(&mut Cursor::new(input.to_vec()), &mut output)
            .unwrap();
        output
    }

    // ---------------------------------------------------------------
    // 1. Round-trip under every thread/backpressure combination
    // ---------------------------------------------------------------

    #[test]
    fn test_round_trip_thread_and_limit_grid() {
        let input = data_repeating_text(64 * 1024);
        for threads in [1, 2, 4, 8, 16] {
            for limit in [None, Some(2), Some(8)] {
                let compressed = compress(&input, threads, limit, 4 * 1024);
                let restored = decompress(&compressed, threads, limit);
                assert_eq!(
                    restored, input,
                    "round-trip failed with {} threads, limit {:?}",
                    threads, limit
                );
            }
        }
    }

    #[test]
    fn test_round_trip_binary_data() {
        let input = data_sawtooth(100_000);
        let compressed = compress(&input, 8, Some(4), 7_000);
        assert_eq!(decompress(&compressed, 8, Some(4)), input);
    }

    #[test]
    fn test_round_trip_input_smaller_than_one_chunk() {
        let input = b"tiny".to_vec();
        let compressed = compress(&input, 4, None, 64 * 1024);
        assert_eq!(decompress(&compressed, 4, None), input);
    }

    #[test]
    fn test_compressed_output_is_framed() {
        let compressed = compress(&data_repeating_text(10_000), 4, None, 1024);
        assert_eq!(&compressed[..16], &crate::framing::MAGIC);
    }

    // ---------------------------------------------------------------
    // 2. Order preservation
    // ---------------------------------------------------------------

    /// With an identity conversion, the sink must equal the source byte for
    /// byte no matter how many workers race on the pool.
    #[test]
    fn test_order_preserved_across_worker_counts() {
        // Every 8-byte chunk is distinct, so any reordering corrupts output.
        let input: Vec<u8> = (0u64..4_000).flat_map(|i| i.to_le_bytes()).collect();

        for threads in [1, 2, 4, 8, 16] {
            let mut output = Vec::new();
            StreamPipeline::new(threads, Some(4))
                .unwrap()
                .reader(ByteChunkReader::new(8).unwrap())
                .writer(ByteChunkWriter)
                .converter(|data: Vec<u8>| -> PipelineResult<Vec<u8>> { Ok(data) })
                .run(&mut Cursor::new(input.clone()), &mut output)
                .unwrap();
            assert_eq!(output, input, "order broken with {} workers", threads);
        }
    }

    // ---------------------------------------------------------------
    // 3. Progress and backpressure
    // ---------------------------------------------------------------

    #[test]
    fn test_pool_depth_never_exceeds_limit_at_read_progress() {
        const LIMIT: usize = 4;
        let violated = Arc::new(AtomicBool::new(false));
        let events = Arc::new(AtomicUsize::new(0));

        let mut output = Vec::new();
        let violated_probe = Arc::clone(&violated);
        let events_probe = Arc::clone(&events);
        StreamPipeline::new(2, Some(LIMIT))
            .unwrap()
            .reader(ByteChunkReader::new(512).unwrap())
            .writer(FramedChunkWriter)
            .converter(GzipCompressor::default())
            .on_read(move |progress| {
                events_probe.fetch_add(1, Ordering::Relaxed);
                if progress.pending > LIMIT {
                    violated_probe.store(true, Ordering::Relaxed);
                }
            })
            .run(&mut Cursor::new(data_repeating_text(256 * 1024)), &mut output)
            .unwrap();

        assert!(events.load(Ordering::Relaxed) > 0, "no read progress fired");
        assert!(!violated.load(Ordering::Relaxed), "pool depth exceeded limit");
    }

    #[test]
    fn test_write_progress_reports_cumulative_bytes() {
        let input = data_repeating_text(32 * 1024);
        let written = Arc::new(AtomicUsize::new(0));

        let mut output = Vec::new();
        let written_probe = Arc::clone(&written);
        StreamPipeline::new(4, None)
            .unwrap()
            .reader(ByteChunkReader::new(1024).unwrap())
            .writer(ByteChunkWriter)
            .converter(|data: Vec<u8>| -> PipelineResult<Vec<u8>> { Ok(data) })
            .on_write(move |progress| {
                written_probe.store(progress.bytes as usize, Ordering::Relaxed);
            })
            .run(&mut Cursor::new(input.clone()), &mut output)
            .unwrap();

        assert_eq!(written.load(Ordering::Relaxed), input.len());
    }

    // ---------------------------------------------------------------
    // 4. Edge cases
    // ---------------------------------------------------------------

    #[test]
    fn test_empty_input_produces_empty_sink() {
        let compressed = compress(&[], 4, Some(4), 1024);
        assert!(compressed.is_empty(), "empty source must write no frames");
        assert!(decompress(&compressed, 4, None).is_empty());
    }

    #[test]
    fn test_decompressing_unframed_stream_fails() {
        // Raw (unframed) bytes fed to the framed reader: the format error
        // surfaces through the aggregate and nothing reaches the sink.
        let mut output = Vec::new();
        let result = StreamPipeline::new(2, None)
            .unwrap()
            .reader(FramedChunkReader)
            .writer(ByteChunkWriter)
            .converter(GzipDecompressor)
            .run(&mut Cursor::new(vec![0xabu8; 256]), &mut output);

        match result {
            Err(PipelineError::Aggregate(errors)) => {
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, PipelineError::InvalidFormat)));
            }
            other => panic!("expected aggregate error, got {:?}", other),
        }
        assert!(output.is_empty());
    }

    // ---------------------------------------------------------------
    // 5. Failure aggregation across roles
    // ---------------------------------------------------------------

    /// Reader plugin that yields one chunk, then meets the converter at a
    /// barrier before failing, so both roles are mid-operation when the
    /// first error lands and both must be recorded.
    struct SynchronizedFailingReader {
        barrier: Arc<Barrier>,
        yielded: bool,
    }

    impl ChunkReader for SynchronizedFailingReader {
        fn next_chunk(&mut self, _input: &mut dyn Read) -> PipelineResult<Option<Vec<u8>>> {
            if !self.yielded {
                self.yielded = true;
                return Ok(Some(vec![1, 2, 3]));
            }
            self.barrier.wait();
            Err(PipelineError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "source torn down",
            )))
        }
    }

    #[test]
    fn test_errors_from_two_roles_are_both_reported() {
        let barrier = Arc::new(Barrier::new(2));

        let converter_barrier = Arc::clone(&barrier);
        let mut output = Vec::new();
        let result = StreamPipeline::new(1, None)
            .unwrap()
            .reader(SynchronizedFailingReader {
                barrier,
                yielded: false,
            })
            .writer(ByteChunkWriter)
            .converter(move |_: Vec<u8>| -> PipelineResult<Vec<u8>> {
                converter_barrier.wait();
                Err(PipelineError::Codec("converter gave up".into()))
            })
            .run(&mut Cursor::new(Vec::new()), &mut output);

        match result {
            Err(PipelineError::Aggregate(errors)) => {
                assert_eq!(errors.len(), 2, "expected both role errors: {:?}", errors);
                assert!(errors.iter().any(|e| matches!(e, PipelineError::Io(_))));
                assert!(errors.iter().any(|e| matches!(e, PipelineError::Codec(_))));
            }
            other => panic!("expected aggregate error, got {:?}", other),
        }
    }
}
