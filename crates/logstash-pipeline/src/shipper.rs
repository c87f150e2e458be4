use crate::batch::Batch;
use crate::config::{QueueLimit, ShipperConfig};
use crate::encoder::Encoder;
use crate::event::{Level, LogEvent};
use crate::queue::EventQueue;
use crate::sink::{BatchSink, SinkError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Producer-side handle to the shipper. Cheap to clone; safe to use from any thread.
///
/// `submit` never blocks on the network and never returns an error: events below the
/// severity threshold are filtered out, and when a queue limit is configured the
/// handle sheds load instead of growing the backlog past it.
#[derive(Debug, Clone)]
pub struct ShipperHandle {
    queue: Arc<EventQueue>,
    threshold: Level,
    limit: Option<QueueLimit>,
    discarded: Arc<AtomicU64>,
}

impl ShipperHandle {
    pub fn submit(&self, event: LogEvent) {
        if event.level < self.threshold {
            return;
        }
        if let Some(limit) = &self.limit {
            let depth = self.queue.len();
            let remaining = limit.capacity.saturating_sub(depth);
            if depth >= limit.capacity
                || (remaining < limit.discard_threshold && event.level <= Level::Info)
            {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                trace!(depth, "Discarding event, queue is over its configured limit");
                return;
            }
        }
        self.queue.enqueue(event);
    }

    /// Number of events waiting to be drained by the next tick.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Events shed by the queue limit since startup.
    pub fn discarded_events(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

/// The delivery engine: drains the queue once per tick, encodes into the batch
/// buffer, and pushes full (or forced) batches to the sink.
///
/// Exactly one worker task runs [`ShipperService::run`]; ticks are strictly
/// sequential, so the batch buffer needs no synchronization. Shutdown is requested
/// through the cancellation token; the owner should await the worker before tearing
/// down the sink's connection pool, and anything still queued or batched at that
/// point is discarded.
pub struct ShipperService {
    queue: Arc<EventQueue>,
    encoder: Encoder,
    batch: Batch,
    sink: Arc<dyn BatchSink>,
    flush_period: Duration,
    always_batch: bool,
    purge_on_failure: bool,
    cancel: CancellationToken,
}

impl ShipperService {
    /// Builds the service and its producer handle.
    ///
    /// A zero batch size or flush period cannot be scheduled; both are clamped to
    /// their smallest usable value with a warning.
    pub fn new(
        config: &ShipperConfig,
        sink: Arc<dyn BatchSink>,
        cancel: CancellationToken,
    ) -> (ShipperService, ShipperHandle) {
        let batch_size = config.batch_size.max(1);
        if batch_size != config.batch_size {
            warn!(configured = config.batch_size, "Clamping batch size to 1");
        }
        let flush_period = config.flush_period.max(Duration::from_millis(1));
        if flush_period != config.flush_period {
            warn!(
                configured_ms = config.flush_period.as_millis() as u64,
                "Clamping flush period to 1ms"
            );
        }

        let queue = Arc::new(EventQueue::new());
        let handle = ShipperHandle {
            queue: Arc::clone(&queue),
            threshold: config.threshold,
            limit: config.queue_limit,
            discarded: Arc::new(AtomicU64::new(0)),
        };
        let service = ShipperService {
            queue,
            encoder: Encoder::new(config.source_host.as_deref(), config.user_fields.as_deref()),
            batch: Batch::new(batch_size),
            sink,
            flush_period,
            always_batch: config.always_batch,
            purge_on_failure: config.purge_on_failure,
            cancel,
        };
        (service, handle)
    }

    /// Runs the periodic delivery loop until the cancellation token fires.
    pub async fn run(mut self) {
        let cancel = self.cancel.clone();
        let mut flush_interval = interval(self.flush_period);
        flush_interval.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                _ = flush_interval.tick() => {
                    self.tick().await;
                }
                _ = cancel.cancelled() => {
                    let undelivered = self.queue.len() + self.batch.len();
                    if undelivered > 0 {
                        debug!(undelivered, "Discarding undelivered events at shutdown");
                    }
                    debug!("Delivery worker stopped");
                    break;
                }
            }
        }
    }

    async fn tick(&mut self) {
        // A full buffer left over from a failed push goes out before anything new.
        if self.batch.is_full() && !self.push_batch().await {
            return;
        }

        let mut pending = self.queue.drain_all();
        while let Some(event) = pending.pop_front() {
            match self.encoder.encode(&event) {
                Ok(record) => {
                    self.batch.append(record);
                    if self.batch.is_full() && !self.push_batch().await {
                        // With purge enabled the rest of the drain is part of the
                        // backlog being dropped; otherwise it goes back unconsumed.
                        if !self.purge_on_failure {
                            self.queue.requeue_front(pending);
                        }
                        return;
                    }
                }
                Err(error) => warn!(%error, "Dropping event that failed to encode"),
            }
        }

        if !self.always_batch && !self.batch.is_empty() {
            self.push_batch().await;
        }
    }

    /// Pushes the batch's filled prefix. Returns whether the push succeeded;
    /// on failure the purge policy has already been applied.
    async fn push_batch(&mut self) -> bool {
        match self.sink.push_batch(self.batch.records()).await {
            Ok(()) => {
                trace!(records = self.batch.len(), "Delivered batch");
                self.batch.clear();
                true
            }
            Err(e) => {
                match &e {
                    SinkError::Unavailable(_) => error!(error = %e, "Could not reach the store"),
                    SinkError::Write(_) => {
                        error!(error = %e, "Batch write failed, connection discarded");
                    }
                }
                if self.purge_on_failure {
                    let dropped = self.batch.len() + self.queue.purge();
                    self.batch.clear();
                    warn!(dropped, "Purged batch and queue after delivery failure");
                }
                false
            }
        }
    }
}
