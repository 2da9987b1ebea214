//! Redis 연결.
//!
//! 토큰 폐기 목록처럼 TTL로 자동 만료되는 키만 다룹니다.

use std::time::Duration;

use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use tracing::{debug, instrument};
use warden_core::RedisConfig;

use crate::error::{Backend, DataError, Result};

/// 다중화 연결 핸들. 복제해도 같은 연결을 공유합니다.
#[derive(Clone)]
pub struct RedisCache {
    connection: MultiplexedConnection,
}

impl RedisCache {
    #[instrument(skip_all)]
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DataError::Unavailable(Backend::Redis, e.to_string()))?;

        let connection = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_secs),
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| DataError::Timeout(Backend::Redis))??;

        debug!("Redis connection ready");
        Ok(Self { connection })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.connection.clone()
    }

    /// PING 응답이 PONG인지 확인합니다.
    pub async fn ping(&self) -> Result<()> {
        let reply: String = redis::cmd("PING").query_async(&mut self.conn()).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(DataError::Cache(format!("unexpected PING reply: {}", reply)))
        }
    }

    /// `SET key value EX ttl`. TTL은 최소 1초.
    #[instrument(skip_all)]
    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let _: () = self.conn().set_ex(key, value, ttl_secs.max(1)).await?;
        Ok(())
    }

    /// `SET key value NX EX ttl`.
    ///
    /// 이번 호출이 키를 만들었으면 `true`, 이미 있었으면 `false`.
    #[instrument(skip_all)]
    pub async fn set_nx_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<bool> {
        let created: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs.max(1))
            .query_async(&mut self.conn())
            .await?;

        Ok(created.is_some())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.conn().exists(key).await?)
    }
}
