//! The unit of work flowing through the pipeline.

/// A chunk of bytes tagged with its position in the logical stream.
///
/// The offset is assigned exactly once, by the reader role, and is strictly
/// increasing from 0 within a run. The payload is owned exclusively by
/// whichever stage currently holds the batch; workers replace it in place
/// with the converted result.
#[derive(Debug, Clone)]
pub struct Batch {
    offset: u64,
    payload: Vec<u8>,
}

impl Batch {
    /// Create a batch at the given stream offset.
    pub fn new(offset: u64, payload: Vec<u8>) -> Self {
        Batch { offset, payload }
    }

    /// Position of this batch in the logical output sequence.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The batch's byte payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }

    /// Take the payload out, leaving an empty buffer behind.
    pub fn take_payload(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.payload)
    }

    /// Replace the payload in place (the worker's converted result).
    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.payload = payload;
    }

    /// Consume the batch, yielding its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

// Batches are ordered by offset alone; payload contents never participate.

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
    }
}

impl Eq for Batch {}

impl PartialOrd for Batch {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Batch {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.offset.cmp(&other.offset)
    }
}
