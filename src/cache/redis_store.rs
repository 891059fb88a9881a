//! Redis-backed cache store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Client;
use tracing::debug;

use super::{CacheError, CacheKey, CacheStore, KeyPattern};

/// Cache store over a Redis server.
///
/// Every operation opens its own connection; nothing is pipelined or
/// wrapped in MULTI.
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    /// Create a store from a connection string (e.g. `redis://127.0.0.1/`).
    ///
    /// The server is not contacted until the first operation.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, CacheError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &CacheKey, value: String) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("SET")
            .arg(key.to_string())
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let mut conn = self.conn().await?;
        let deleted: u64 = redis::cmd("DEL")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn hget(&self, key: &CacheKey, field: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = redis::cmd("HGET")
            .arg(key.to_string())
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn hset(&self, key: &CacheKey, fields: Vec<(String, String)>) -> Result<(), CacheError> {
        // HSET with no field/value pairs is a syntax error.
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key.to_string());
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        let _: u64 = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &CacheKey) -> Result<BTreeMap<String, String>, CacheError> {
        let mut conn = self.conn().await?;
        let values: BTreeMap<String, String> = redis::cmd("HGETALL")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn hdel(&self, key: &CacheKey, fields: &[String]) -> Result<u64, CacheError> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let removed: u64 = redis::cmd("HDEL")
            .arg(key.to_string())
            .arg(fields)
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn hkeys(&self, key: &CacheKey) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn().await?;
        let fields: Vec<String> = redis::cmd("HKEYS")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(fields)
    }

    async fn lpush(&self, key: &CacheKey, value: String) -> Result<u64, CacheError> {
        let mut conn = self.conn().await?;
        let len: u64 = redis::cmd("LPUSH")
            .arg(key.to_string())
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn rpush(&self, key: &CacheKey, value: String) -> Result<u64, CacheError> {
        let mut conn = self.conn().await?;
        let len: u64 = redis::cmd("RPUSH")
            .arg(key.to_string())
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn lpop(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        let value: Option<String> = redis::cmd("LPOP")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn lrange(
        &self,
        key: &CacheKey,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn().await?;
        let values: Vec<String> = redis::cmd("LRANGE")
            .arg(key.to_string())
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn lset(&self, key: &CacheKey, index: isize, value: String) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("LSET")
            .arg(key.to_string())
            .arg(index)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn ltrim(&self, key: &CacheKey, start: isize, stop: isize) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("LTRIM")
            .arg(key.to_string())
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn lrem(&self, key: &CacheKey, count: isize, value: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn().await?;
        let removed: u64 = redis::cmd("LREM")
            .arg(key.to_string())
            .arg(count)
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn llen(&self, key: &CacheKey) -> Result<u64, CacheError> {
        let mut conn = self.conn().await?;
        let len: u64 = redis::cmd("LLEN")
            .arg(key.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn keys(&self, pattern: &KeyPattern) -> Result<Vec<CacheKey>, CacheError> {
        let mut conn = self.conn().await?;
        let mut wires: Vec<String> = redis::cmd("KEYS")
            .arg(pattern.to_string())
            .query_async(&mut conn)
            .await?;
        wires.sort();

        let mut keys = Vec::with_capacity(wires.len());
        for wire in wires {
            match wire.parse::<CacheKey>() {
                Ok(key) => keys.push(key),
                Err(_) => debug!(key = %wire, "Skipping unparseable cache key"),
            }
        }
        Ok(keys)
    }

    async fn delete_pattern(&self, pattern: &KeyPattern) -> Result<u64, CacheError> {
        let mut conn = self.conn().await?;
        let wires: Vec<String> = redis::cmd("KEYS")
            .arg(pattern.to_string())
            .query_async(&mut conn)
            .await?;
        if wires.is_empty() {
            return Ok(0);
        }
        let deleted: u64 = redis::cmd("DEL")
            .arg(&wires)
            .query_async(&mut conn)
            .await?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_url() {
        assert!(RedisCache::new("not a url").is_err());
    }

    #[test]
    fn test_new_does_not_connect() {
        assert!(RedisCache::new("redis://127.0.0.1:1/").is_ok());
    }
}
