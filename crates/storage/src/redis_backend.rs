//! Remote Redis backend over a multiplexed connection manager.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use arcp_domain::error::{Error, Result};

use crate::backend::KvBackend;

pub struct RedisBackend {
    manager: ConnectionManager,
}

impl RedisBackend {
    /// Open a client and establish the managed connection. Fails fast when
    /// the server is unreachable; the adapter handles retry throttling.
    pub async fn connect(url: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).map_err(|e| Error::Storage(format!("redis client: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Storage(format!("redis connect: {e}")))?;
        Ok(Self { manager })
    }
}

fn storage_err(op: &str, e: redis::RedisError) -> Error {
    Error::Storage(format!("redis {op}: {e}"))
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn hset(&self, bucket: &str, key: &str, value: &str) -> Result<()> {
        let mut con = self.manager.clone();
        let _: () = con
            .hset(bucket, key, value)
            .await
            .map_err(|e| storage_err("hset", e))?;
        Ok(())
    }

    async fn hget(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        let mut con = self.manager.clone();
        con.hget(bucket, key)
            .await
            .map_err(|e| storage_err("hget", e))
    }

    async fn hkeys(&self, bucket: &str) -> Result<Vec<String>> {
        let mut con = self.manager.clone();
        con.hkeys(bucket).await.map_err(|e| storage_err("hkeys", e))
    }

    async fn hdel(&self, bucket: &str, key: &str) -> Result<bool> {
        let mut con = self.manager.clone();
        let removed: i64 = con
            .hdel(bucket, key)
            .await
            .map_err(|e| storage_err("hdel", e))?;
        Ok(removed > 0)
    }

    async fn h_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let mut con = self.manager.clone();
        con.hexists(bucket, key)
            .await
            .map_err(|e| storage_err("hexists", e))
    }

    async fn ping(&self) -> Result<()> {
        let mut con = self.manager.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut con)
            .await
            .map_err(|e| storage_err("ping", e))?;
        Ok(())
    }
}
