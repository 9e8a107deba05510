//! Redis-backed permission scope store.
//!
//! The store owns one multiplexed connection, opened at startup and
//! shared by every invocation (clones of a multiplexed connection reuse
//! the same socket). It is handed to the tools explicitly instead of living
//! in a global.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use crate::config::CacheConfig;
use crate::scope::ScopeStore;

pub struct RedisScopeStore {
    conn: MultiplexedConnection,
}

impl RedisScopeStore {
    /// Connect using `cache.url` when set, otherwise host/port/password.
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        let client = match &config.url {
            Some(url) => redis::Client::open(url.as_str())
                .with_context(|| "Invalid cache URL (REDIS_URL / cache.url)")?,
            None => redis::Client::open(connection_info(config))
                .with_context(|| format!("Invalid cache address {}:{}", config.host, config.port))?,
        };

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .with_context(|| "Failed to connect to the permission cache")?;

        tracing::info!("connected to permission cache");
        Ok(Self { conn })
    }
}

fn connection_info(config: &CacheConfig) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            password: config.password.clone().filter(|p| !p.is_empty()),
            ..Default::default()
        },
    }
}

#[async_trait]
impl ScopeStore for RedisScopeStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .with_context(|| format!("Failed to read permission scope {}", key))?;
        Ok(value)
    }
}
