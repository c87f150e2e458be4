use crate::event::Level;
use std::env;
use std::time::Duration;

pub const DEFAULT_REDIS_HOST: &str = "localhost";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_REDIS_DATABASE: i64 = 0;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_FLUSH_PERIOD_MS: u64 = 500;
pub const DEFAULT_POOL_MAX_CONNECTIONS: usize = 8;

/// Connection settings for the Redis store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub database: i64,
    pub password: Option<String>,
    /// Connect timeout for establishing new pooled connections.
    pub connect_timeout: Duration,
}

impl Default for RedisSettings {
    fn default() -> Self {
        RedisSettings {
            host: DEFAULT_REDIS_HOST.to_string(),
            port: DEFAULT_REDIS_PORT,
            database: DEFAULT_REDIS_DATABASE,
            password: None,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

/// Which end of the idle set a borrow takes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowOrder {
    Lifo,
    Fifo,
}

/// Pass-through tuning for the connection pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum total connections the pool will hold.
    pub max_connections: usize,
    /// How long an acquisition may wait for a free connection. `None` blocks until
    /// one becomes available (the block-when-exhausted behavior).
    pub max_wait: Option<Duration>,
    pub borrow_order: BorrowOrder,
    /// Budget for the health check a borrowed connection goes through.
    pub recycle_timeout: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            max_connections: DEFAULT_POOL_MAX_CONNECTIONS,
            max_wait: None,
            borrow_order: BorrowOrder::Lifo,
            recycle_timeout: None,
        }
    }
}

/// Producer-side rate-limiting guard (the optional outer wrapper).
///
/// The queue itself stays unbounded; when a limit is configured, `submit` refuses to
/// grow the backlog past `capacity` and starts shedding INFO-and-below once the
/// remaining headroom falls under `discard_threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLimit {
    pub capacity: usize,
    pub discard_threshold: usize,
}

impl QueueLimit {
    pub fn new(capacity: usize) -> Self {
        QueueLimit {
            capacity,
            discard_threshold: capacity / 5,
        }
    }

    pub fn with_discard_threshold(mut self, discard_threshold: usize) -> Self {
        self.discard_threshold = discard_threshold;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ShipperConfig {
    pub redis: RedisSettings,
    pub pool: PoolSettings,
    /// Redis list key records are appended to. Required; there is no default.
    pub key: String,
    /// Records per batch.
    pub batch_size: usize,
    /// Scheduler tick period.
    pub flush_period: Duration,
    /// Hold partial batches until a later tick fills them.
    pub always_batch: bool,
    /// Clear batch and queue whenever delivery fails.
    pub purge_on_failure: bool,
    /// Minimum severity to ship.
    pub threshold: Level,
    pub queue_limit: Option<QueueLimit>,
    /// Overrides the `host` field of encoded records when non-blank.
    pub source_host: Option<String>,
    /// Static `key:value,key:value` fields merged into every record.
    pub user_fields: Option<String>,
}

impl ShipperConfig {
    pub fn new(key: impl Into<String>) -> Self {
        ShipperConfig {
            redis: RedisSettings::default(),
            pool: PoolSettings::default(),
            key: key.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_period: Duration::from_millis(DEFAULT_FLUSH_PERIOD_MS),
            always_batch: true,
            purge_on_failure: true,
            threshold: Level::Info,
            queue_limit: None,
            source_host: None,
            user_fields: None,
        }
    }

    /// Loads configuration from `SHIPPER_*` environment variables.
    ///
    /// `SHIPPER_KEY` is the only required variable; everything else falls back to its
    /// default, including when a value fails to parse.
    pub fn from_env() -> Result<ShipperConfig, Box<dyn std::error::Error>> {
        let key = env::var("SHIPPER_KEY")
            .map_err(|_| anyhow::anyhow!("SHIPPER_KEY environment variable is not set"))?;

        let redis = RedisSettings {
            host: env::var("SHIPPER_REDIS_HOST")
                .unwrap_or_else(|_| DEFAULT_REDIS_HOST.to_string()),
            port: env::var("SHIPPER_REDIS_PORT")
                .ok()
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(DEFAULT_REDIS_PORT),
            database: env::var("SHIPPER_REDIS_DB")
                .ok()
                .and_then(|value| value.parse::<i64>().ok())
                .unwrap_or(DEFAULT_REDIS_DATABASE),
            password: env::var("SHIPPER_REDIS_PASSWORD")
                .ok()
                .filter(|value| !value.is_empty()),
            connect_timeout: Duration::from_millis(
                env::var("SHIPPER_REDIS_TIMEOUT_MS")
                    .ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
            ),
        };

        let pool = PoolSettings {
            max_connections: env::var("SHIPPER_POOL_MAX_CONNECTIONS")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(DEFAULT_POOL_MAX_CONNECTIONS),
            max_wait: env::var("SHIPPER_POOL_MAX_WAIT_MS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_millis),
            borrow_order: match env::var("SHIPPER_POOL_BORROW_ORDER")
                .map(|value| value.to_lowercase())
                .as_deref()
            {
                Ok("fifo") => BorrowOrder::Fifo,
                _ => BorrowOrder::Lifo,
            },
            recycle_timeout: env::var("SHIPPER_POOL_RECYCLE_TIMEOUT_MS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_millis),
        };

        let queue_capacity = env::var("SHIPPER_QUEUE_CAPACITY")
            .ok()
            .and_then(|value| value.parse::<usize>().ok());
        let discard_threshold = env::var("SHIPPER_DISCARD_THRESHOLD")
            .ok()
            .and_then(|value| value.parse::<usize>().ok());
        let queue_limit = queue_capacity.map(|capacity| QueueLimit {
            capacity,
            discard_threshold: discard_threshold.unwrap_or(capacity / 5),
        });

        Ok(ShipperConfig {
            redis,
            pool,
            key,
            batch_size: env::var("SHIPPER_BATCH_SIZE")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(DEFAULT_BATCH_SIZE),
            flush_period: Duration::from_millis(
                env::var("SHIPPER_FLUSH_PERIOD_MS")
                    .ok()
                    .and_then(|value| value.parse::<u64>().ok())
                    .unwrap_or(DEFAULT_FLUSH_PERIOD_MS),
            ),
            always_batch: env::var("SHIPPER_ALWAYS_BATCH")
                .map(|value| value.to_lowercase() != "false")
                .unwrap_or(true),
            purge_on_failure: env::var("SHIPPER_PURGE_ON_FAILURE")
                .map(|value| value.to_lowercase() != "false")
                .unwrap_or(true),
            threshold: env::var("SHIPPER_THRESHOLD_LEVEL")
                .ok()
                .and_then(|value| value.parse::<Level>().ok())
                .unwrap_or(Level::Info),
            queue_limit,
            source_host: env::var("SHIPPER_SOURCE_HOST").ok(),
            user_fields: env::var("SHIPPER_USER_FIELDS").ok(),
        })
    }
}
