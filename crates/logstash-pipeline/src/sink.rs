use async_trait::async_trait;

/// Delivery failure, as the engine needs to distinguish it for reporting.
///
/// Sources are boxed so implementations can wrap whatever client error they carry
/// without leaking it through the trait.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// No connection could be acquired (pool exhausted or store unreachable).
    #[error("connection acquisition failed: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// A connection was acquired but the write itself failed.
    #[error("batch write failed: {0}")]
    Write(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Destination for encoded batches.
///
/// The delivery engine depends on this narrow capability instead of any concrete
/// store client; [`crate::redis::RedisListSink`] is the production implementation and
/// test suites substitute their own. A call either appends every record in order or
/// fails as a unit; partial delivery is not part of the contract.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn push_batch(&self, records: &[Vec<u8>]) -> Result<(), SinkError>;
}
