//! Mock sink implementations for exercising the delivery engine without Redis

use async_trait::async_trait;
use logstash_pipeline::sink::{BatchSink, SinkError};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// In-memory [`BatchSink`] that records every push attempt and can be switched
/// into a failing mode to simulate an unreachable store.
pub struct MockSink {
    pushes: Mutex<Vec<Vec<Vec<u8>>>>,
    failing: AtomicBool,
}

impl MockSink {
    /// A sink that accepts every batch.
    pub fn accepting() -> MockSink {
        MockSink {
            pushes: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// A sink that rejects every batch as if the store were down.
    pub fn always_failing() -> MockSink {
        MockSink {
            pushes: Mutex::new(Vec::new()),
            failing: AtomicBool::new(true),
        }
    }

    /// Flips the sink between accepting and failing at runtime.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of every push attempt, successful or not, in call order.
    pub fn pushes(&self) -> Vec<Vec<Vec<u8>>> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }

    pub fn total_records(&self) -> usize {
        self.pushes.lock().unwrap().iter().map(Vec::len).sum()
    }
}

#[async_trait]
impl BatchSink for MockSink {
    async fn push_batch(&self, records: &[Vec<u8>]) -> Result<(), SinkError> {
        self.pushes.lock().unwrap().push(records.to_vec());
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable(Box::new(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))));
        }
        Ok(())
    }
}
