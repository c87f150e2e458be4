use crate::config::{BorrowOrder, RedisSettings, ShipperConfig};
use crate::sink::{BatchSink, SinkError};
use async_trait::async_trait;
use deadpool::managed::QueueMode;
use deadpool_redis::redis::{AsyncCommands, RedisError};
use deadpool_redis::{
    Config, Connection, ConnectionAddr, ConnectionInfo, CreatePoolError, Pool, PoolConfig,
    RedisConnectionInfo, Runtime,
};
use tracing::trace;

/// Builds the connection pool for the configured store.
///
/// Tuning is pass-through: max connections, borrow order and the wait/create/recycle
/// timeouts map directly onto the pool's own knobs. The pool health-checks a
/// connection when it is borrowed; there is no separate idle-eviction loop to tune.
pub fn build_pool(config: &ShipperConfig) -> Result<Pool, CreatePoolError> {
    let mut pool_config = PoolConfig::new(config.pool.max_connections);
    pool_config.timeouts.create = Some(config.redis.connect_timeout);
    pool_config.timeouts.wait = config.pool.max_wait;
    pool_config.timeouts.recycle = config.pool.recycle_timeout;
    pool_config.queue_mode = match config.pool.borrow_order {
        BorrowOrder::Lifo => QueueMode::Lifo,
        BorrowOrder::Fifo => QueueMode::Fifo,
    };

    let factory = Config {
        url: None,
        connection: Some(connection_info(&config.redis)),
        pool: Some(pool_config),
    };
    factory.create_pool(Some(Runtime::Tokio1))
}

/// Connection parameters go to the client as structured values, never through a
/// URL, so credentials with reserved characters need no escaping.
fn connection_info(settings: &RedisSettings) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(settings.host.clone(), settings.port),
        redis: RedisConnectionInfo {
            db: settings.database,
            password: settings.password.clone(),
            ..RedisConnectionInfo::default()
        },
    }
}

/// Appends encoded batches to a Redis list.
///
/// A healthy connection goes back to the pool when the lease drops; a connection that
/// failed at the protocol/transport level is taken out of the pool instead so it can
/// never be reused.
pub struct RedisListSink {
    pool: Pool,
    key: String,
}

impl RedisListSink {
    pub fn new(pool: Pool, key: impl Into<String>) -> Self {
        RedisListSink {
            pool,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

#[async_trait]
impl BatchSink for RedisListSink {
    async fn push_batch(&self, records: &[Vec<u8>]) -> Result<(), SinkError> {
        // RPUSH requires at least one value.
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|error| SinkError::Unavailable(Box::new(error)))?;

        let result: Result<i64, RedisError> = conn.rpush(&self.key, records).await;
        match result {
            Ok(list_len) => {
                trace!(key = %self.key, records = records.len(), list_len, "Appended batch");
                Ok(())
            }
            Err(error) => {
                if is_connection_error(&error) {
                    // Removed from the pool permanently; dropping it closes the socket.
                    let _ = Connection::take(conn);
                }
                Err(SinkError::Write(Box::new(error)))
            }
        }
    }
}

fn is_connection_error(error: &RedisError) -> bool {
    error.is_io_error()
        || error.is_connection_dropped()
        || error.is_connection_refusal()
        || error.is_timeout()
}
