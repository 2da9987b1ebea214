//! 영속 저장소.
//!
//! - PostgreSQL 연결 풀 및 마이그레이션
//! - Redis 캐시 연결
//! - 사용자/RBAC 저장소 (PostgreSQL, 메모리)

pub mod memory;
pub mod postgres;
pub mod redis;
pub mod user;
