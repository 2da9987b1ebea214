//! 저장소 계층 오류 타입.
//!
//! 상위 계층은 어떤 백엔드에서 실패했는지만 알면 되므로 드라이버 오류는
//! 메시지 문자열로 보존합니다.

use std::fmt;

use thiserror::Error;

/// 저장소 백엔드 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Postgres,
    Redis,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Postgres => write!(f, "PostgreSQL"),
            Backend::Redis => write!(f, "Redis"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DataError {
    /// 백엔드에 연결할 수 없음
    #[error("{0} unavailable: {1}")]
    Unavailable(Backend, String),

    /// 백엔드 응답 시간 초과 (풀 대기 포함)
    #[error("{0} timed out")]
    Timeout(Backend),

    #[error("user {0} not found")]
    UserNotFound(i64),

    /// 고유 제약 조건 위반 (예: 이메일 중복)
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("query failed: {0}")]
    Query(String),

    /// 폐기 목록 저장소 명령 실패
    #[error("revocation store error: {0}")]
    Cache(String),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DataError {
    /// 재시도하면 성공할 수 있는 장애인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::Unavailable(..) | DataError::Timeout(_) | DataError::Cache(_)
        )
    }
}

/// PostgreSQL `unique_violation`
const PG_UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DataError::Timeout(Backend::Postgres),
            sqlx::Error::Io(e) => DataError::Unavailable(Backend::Postgres, e.to_string()),
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) =>
            {
                DataError::Conflict(db_err.message().to_string())
            }
            other => DataError::Query(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            DataError::Timeout(Backend::Redis)
        } else if err.is_connection_refusal() || err.is_connection_dropped() {
            DataError::Unavailable(Backend::Redis, err.to_string())
        } else {
            DataError::Cache(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
