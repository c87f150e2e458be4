//! Batching pipeline that ships logstash-format JSON events to a Redis list.
//!
//! Producers hand [`LogEvent`]s to a cloneable [`ShipperHandle`]; a single
//! [`ShipperService`] worker drains them on a fixed period, encodes each one
//! through the [`Encoder`], and pushes size-bounded batches to a [`BatchSink`]
//! (in production the pooled [`RedisListSink`]). Submission never touches the
//! network, so the handle is safe to call from latency-sensitive paths.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod config;
pub mod encoder;
pub mod event;
pub mod queue;
pub mod redis;
pub mod shipper;
pub mod sink;

pub use config::{BorrowOrder, PoolSettings, QueueLimit, RedisSettings, ShipperConfig};
pub use encoder::{EncodeError, Encoder};
pub use event::{ExceptionInfo, Level, LogEvent, ParseLevelError};
pub use redis::{build_pool, RedisListSink};
pub use shipper::{ShipperHandle, ShipperService};
pub use sink::{BatchSink, SinkError};
