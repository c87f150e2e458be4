#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use logstash_pipeline::{
    build_pool, ExceptionInfo, Level, LogEvent, RedisListSink, ShipperConfig, ShipperHandle,
    ShipperService,
};

/// Extra wait past one flush period so the final drain tick can run before shutdown.
const SHUTDOWN_FLUSH_SLACK: Duration = Duration::from_millis(50);

/// One stdin line in the forwarder's NDJSON input format. Only `message` is
/// required; everything else falls back to capture-time defaults.
#[derive(Debug, Deserialize)]
struct InboundRecord {
    #[serde(default)]
    timestamp_millis: Option<i64>,
    #[serde(default)]
    logger: Option<String>,
    #[serde(default)]
    level: Option<Level>,
    message: String,
    #[serde(default)]
    thread: Option<String>,
    #[serde(default)]
    mdc: HashMap<String, String>,
    #[serde(default)]
    exception: Option<ExceptionInfo>,
}

impl InboundRecord {
    fn into_event(self) -> LogEvent {
        let mut event = LogEvent::new(self.level.unwrap_or(Level::Info), self.message);
        if let Some(timestamp_millis) = self.timestamp_millis {
            event = event.with_timestamp_millis(timestamp_millis);
        }
        if let Some(logger) = self.logger {
            event = event.with_logger(logger);
        }
        if let Some(thread) = self.thread {
            event = event.with_thread(thread);
        }
        event.mdc = self.mdc;
        event.exception = self.exception;
        event
    }
}

#[tokio::main]
pub async fn main() {
    let log_level = env::var("SHIPPER_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(log_level).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match ShipperConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error creating config on forwarder startup: {e}");
            return;
        }
    };

    let pool = match build_pool(&config) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Error creating Redis connection pool: {e}");
            return;
        }
    };

    let sink = Arc::new(RedisListSink::new(pool.clone(), config.key.clone()));
    info!(
        key = sink.key(),
        batch_size = config.batch_size,
        flush_period_ms = config.flush_period.as_millis() as u64,
        "Forwarder started, reading events from stdin"
    );

    let cancel_token = CancellationToken::new();
    let (service, handle) = ShipperService::new(&config, sink, cancel_token.clone());
    let flush_period = config.flush_period;
    let worker = tokio::spawn(service.run());

    read_stdin(handle).await;

    // Leave the worker one full period so the final drain can go out.
    sleep(flush_period + SHUTDOWN_FLUSH_SLACK).await;
    cancel_token.cancel();
    if let Err(e) = worker.await {
        error!("Delivery worker did not shut down cleanly: {e}");
    }
    pool.close();
    info!("Forwarder stopped");
}

/// Feeds stdin lines into the shipper until EOF or an interrupt.
async fn read_stdin(handle: ShipperHandle) {
    let mut lines = BufReader::new(stdin()).lines();
    let mut accepted: u64 = 0;

    loop {
        tokio::select! {
            maybe_line = lines.next_line() => {
                match maybe_line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<InboundRecord>(line) {
                            Ok(record) => {
                                handle.submit(record.into_event());
                                accepted += 1;
                            }
                            Err(e) => warn!("Skipping malformed input line: {e}"),
                        }
                    }
                    Ok(None) => {
                        info!(accepted, "Input closed");
                        return;
                    }
                    Err(e) => {
                        error!("Error reading stdin: {e}");
                        return;
                    }
                }
            }
            _ = signal::ctrl_c() => {
                info!(accepted, "Interrupt received");
                return;
            }
        }
    }
}
