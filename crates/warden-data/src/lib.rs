//! 데이터 접근 및 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - PostgreSQL 연결 풀 및 마이그레이션
//! - 사용자/역할/권한 저장소
//! - Redis 캐시 연결

pub mod error;
pub mod storage;

pub use error::{Backend, DataError, Result};

// 저장소 타입 재내보내기
pub use storage::memory::MemoryUserStore;
pub use storage::postgres::Database;
pub use storage::redis::RedisCache;
pub use storage::user::{
    PgUserStore, UserPage, UserQuery, UserStore, UserUpdate, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
