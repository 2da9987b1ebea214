//! PostgreSQL 연결 풀.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, instrument};
use warden_core::DatabaseConfig;

use crate::error::{Backend, DataError, Result};

/// 사용자/RBAC 테이블이 있는 데이터베이스.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 연결 풀을 만들고 첫 연결을 확인합니다.
    #[instrument(skip_all, fields(max_connections = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| match e {
                sqlx::Error::PoolTimedOut => DataError::Timeout(Backend::Postgres),
                other => DataError::Unavailable(Backend::Postgres, other.to_string()),
            })?;

        debug!("PostgreSQL pool ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// `migrations/`의 스키마를 적용합니다. 이미 적용된 버전은 건너뜁니다.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// `SELECT 1` 왕복으로 연결을 확인합니다.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
