//! Redis-backed cache store.
//!
//! Each [`RedisStore`] talks to exactly one Redis instance through a
//! multiplexed [`ConnectionManager`], which reconnects on its own after the
//! instance comes back. Every command is bounded by the configured timeout.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{Cmd, FromRedisValue, RedisError};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::traits::{CacheStore, FieldMap, ListEnd};

/// Address and credentials of one Redis instance.
#[derive(Clone, PartialEq, Eq)]
pub struct RedisEndpoint {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Optional `AUTH` password.
    pub password: Option<String>,
    /// Logical database index.
    pub database: i64,
}

impl RedisEndpoint {
    /// An endpoint on `host:port` with no password and database 0.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            password: None,
            database: 0,
        }
    }

    /// Connection URL understood by [`redis::Client::open`].
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{password}@{}:{}/{}",
                self.host, self.port, self.database
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

// Keep the password out of logs.
impl fmt::Display for RedisEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.database)
    }
}

impl fmt::Debug for RedisEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .finish()
    }
}

/// Open a connection manager to `endpoint`, giving up after `timeout`.
pub(crate) async fn connect(
    endpoint: &RedisEndpoint,
    timeout: Duration,
) -> Result<ConnectionManager, RedisError> {
    let client = redis::Client::open(endpoint.url())?;
    match tokio::time::timeout(timeout, client.get_connection_manager()).await {
        Ok(conn) => conn,
        Err(_) => Err(RedisError::from(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("connecting to {endpoint} timed out after {timeout:?}"),
        ))),
    }
}

/// Run `fut` under `timeout`, mapping an elapsed timer to an IO timeout error.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    fut: impl Future<Output = Result<T, RedisError>>,
) -> Result<T, RedisError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(RedisError::from(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("command timed out after {timeout:?}"),
        ))),
    }
}

/// A [`CacheStore`] on one Redis instance.
#[derive(Clone)]
pub struct RedisStore {
    endpoint: RedisEndpoint,
    conn: ConnectionManager,
    timeout: Duration,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to `endpoint`. `timeout` bounds the connect and every command.
    pub async fn connect(endpoint: RedisEndpoint, timeout: Duration) -> Result<Self, StoreError> {
        let conn = connect(&endpoint, timeout).await?;
        info!(%endpoint, "connected to redis");
        Ok(Self {
            endpoint,
            conn,
            timeout,
        })
    }

    /// The instance this store talks to.
    pub fn endpoint(&self) -> &RedisEndpoint {
        &self.endpoint
    }

    /// Send `PING` and wait for the reply.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let reply: String = self.run("", "string", redis::cmd("PING")).await?;
        debug!(endpoint = %self.endpoint, %reply, "ping");
        Ok(())
    }

    async fn run<T: FromRedisValue>(
        &self,
        key: &str,
        expected: &'static str,
        cmd: Cmd,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.clone();
        bounded(self.timeout, async move { cmd.query_async(&mut conn).await })
            .await
            .map_err(|e| {
                if e.code() == Some("WRONGTYPE") {
                    StoreError::WrongType {
                        key: key.to_string(),
                        expected,
                    }
                } else {
                    StoreError::from(e)
                }
            })
    }
}

#[async_trait::async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.run(key, "string", cmd).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }
        let _: () = self.run(key, "string", cmd).await?;
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut cmd = redis::cmd("INCRBY");
        cmd.arg(key).arg(delta);
        match self.run(key, "string", cmd).await {
            Err(StoreError::Backend(msg)) if msg.contains("not an integer") => {
                Err(StoreError::NotAnInteger(key.to_string()))
            }
            other => other,
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut cmd = redis::cmd("PEXPIRE");
        cmd.arg(key).arg(ttl.as_millis() as u64);
        let set: i64 = self.run(key, "any", cmd).await?;
        Ok(set == 1)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let removed: i64 = self.run(key, "any", cmd).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(key);
        let count: i64 = self.run(key, "any", cmd).await?;
        Ok(count > 0)
    }

    async fn hash_put_all(&self, key: &str, fields: &FieldMap) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        let _: i64 = self.run(key, "hash", cmd).await?;
        Ok(())
    }

    async fn hash_put(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key).arg(field).arg(value);
        let _: i64 = self.run(key, "hash", cmd).await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<FieldMap, StoreError> {
        let mut cmd = redis::cmd("HGETALL");
        cmd.arg(key);
        self.run(key, "hash", cmd).await
    }

    async fn list_push_all(
        &self,
        key: &str,
        values: &[String],
        end: ListEnd,
    ) -> Result<u64, StoreError> {
        if values.is_empty() {
            return self.list_len(key).await;
        }
        let mut cmd = redis::cmd(match end {
            ListEnd::Left => "LPUSH",
            ListEnd::Right => "RPUSH",
        });
        cmd.arg(key);
        for value in values {
            cmd.arg(value);
        }
        self.run(key, "list", cmd).await
    }

    async fn list_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        let mut cmd = redis::cmd("LRANGE");
        cmd.arg(key).arg(start).arg(stop);
        self.run(key, "list", cmd).await
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        let mut cmd = redis::cmd("LLEN");
        cmd.arg(key);
        self.run(key, "list", cmd).await
    }
}
