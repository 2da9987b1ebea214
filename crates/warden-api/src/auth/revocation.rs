//! Refresh Token 폐기 목록.
//!
//! 키는 `blacklisted_token:` 접두사와 토큰 원문이며 TTL로 자동 만료됩니다.
//! 캐시가 비워지면 아직 만료되지 않은 폐기 토큰이 다시 유효해질 수 있습니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use warden_data::{DataError, RedisCache};

/// 폐기 키 접두사.
pub const REVOCATION_KEY_PREFIX: &str = "blacklisted_token:";

const REVOKED_MARKER: &str = "1";

fn revocation_key(token: &str) -> String {
    format!("{}{}", REVOCATION_KEY_PREFIX, token)
}

/// 폐기 저장소 인터페이스.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// 토큰을 폐기합니다. 이미 폐기된 토큰이어도 성공합니다.
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), DataError>;

    /// 토큰이 폐기되었는지 확인합니다.
    async fn is_revoked(&self, token: &str) -> Result<bool, DataError>;

    /// 아직 폐기되지 않은 경우에만 폐기합니다.
    ///
    /// 이번 호출이 폐기한 경우 `true`, 이미 폐기되어 있었으면 `false`.
    async fn try_revoke(&self, token: &str, ttl: Duration) -> Result<bool, DataError>;

    /// 저장소 연결을 확인합니다.
    async fn ping(&self) -> Result<(), DataError>;
}

/// Redis 기반 폐기 저장소.
#[derive(Clone)]
pub struct RedisRevocationStore {
    cache: Arc<RedisCache>,
}

impl RedisRevocationStore {
    pub fn new(cache: Arc<RedisCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), DataError> {
        self.cache
            .set_with_ttl(&revocation_key(token), REVOKED_MARKER, ttl.as_secs())
            .await
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, DataError> {
        self.cache.exists(&revocation_key(token)).await
    }

    async fn try_revoke(&self, token: &str, ttl: Duration) -> Result<bool, DataError> {
        self.cache
            .set_nx_with_ttl(&revocation_key(token), REVOKED_MARKER, ttl.as_secs())
            .await
    }

    async fn ping(&self) -> Result<(), DataError> {
        self.cache.ping().await
    }
}

// 만료 항목은 쓰기 시점에 정리
fn prune_expired(entries: &mut HashMap<String, Instant>, now: Instant) {
    entries.retain(|_, expires| *expires > now);
}

/// 메모리 기반 폐기 저장소 (테스트/로컬 개발용).
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 만료되지 않은 항목 수.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|expires| **expires > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), DataError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        prune_expired(&mut entries, now);
        entries.insert(revocation_key(token), now + ttl.max(Duration::from_secs(1)));
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, DataError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let key = revocation_key(token);

        match entries.get(&key) {
            Some(expires) if *expires > now => Ok(true),
            Some(_) => {
                entries.remove(&key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn try_revoke(&self, token: &str, ttl: Duration) -> Result<bool, DataError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        prune_expired(&mut entries, now);
        let key = revocation_key(token);

        if matches!(entries.get(&key), Some(expires) if *expires > now) {
            return Ok(false);
        }
        entries.insert(key, now + ttl.max(Duration::from_secs(1)));
        Ok(true)
    }

    async fn ping(&self) -> Result<(), DataError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocation_key() {
        assert_eq!(revocation_key("abc.def"), "blacklisted_token:abc.def");
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = MemoryRevocationStore::new();
        assert!(!store.is_revoked("token").await.unwrap());

        store.revoke("token", Duration::from_secs(60)).await.unwrap();
        store.revoke("token", Duration::from_secs(60)).await.unwrap();
        assert!(store.is_revoked("token").await.unwrap());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_try_revoke_only_once() {
        let store = MemoryRevocationStore::new();
        assert!(store.try_revoke("token", Duration::from_secs(60)).await.unwrap());
        assert!(!store.try_revoke("token", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_with_ttl() {
        let store = MemoryRevocationStore::new();
        store.revoke("token", Duration::from_secs(30)).await.unwrap();
        assert!(store.is_revoked("token").await.unwrap());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!store.is_revoked("token").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_prune_expired_entries() {
        let store = MemoryRevocationStore::new();
        store.revoke("old-1", Duration::from_secs(30)).await.unwrap();
        store.revoke("old-2", Duration::from_secs(30)).await.unwrap();
        store.revoke("long", Duration::from_secs(600)).await.unwrap();
        assert_eq!(store.entries.lock().await.len(), 3);

        tokio::time::advance(Duration::from_secs(31)).await;
        store.revoke("new", Duration::from_secs(30)).await.unwrap();
        assert_eq!(store.entries.lock().await.len(), 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(store.try_revoke("fresh", Duration::from_secs(30)).await.unwrap());
        let entries = store.entries.lock().await;
        assert_eq!(entries.len(), 2);
        assert!(entries.contains_key(&revocation_key("long")));
        assert!(entries.contains_key(&revocation_key("fresh")));
    }

    #[tokio::test]
    #[ignore] // Redis 연결 필요
    async fn test_redis_store_revokes_once() {
        let config = warden_core::RedisConfig {
            url: std::env::var("WARDEN__REDIS__URL")
                .unwrap_or_else(|_| warden_core::RedisConfig::default().url),
            ..Default::default()
        };
        let cache = RedisCache::connect(&config).await.unwrap();
        let store = RedisRevocationStore::new(Arc::new(cache));
        let token = format!(
            "refresh-{}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );

        store.ping().await.unwrap();
        assert!(!store.is_revoked(&token).await.unwrap());
        assert!(store.try_revoke(&token, Duration::from_secs(60)).await.unwrap());
        assert!(!store.try_revoke(&token, Duration::from_secs(60)).await.unwrap());
        assert!(store.is_revoked(&token).await.unwrap());

        // 이미 폐기된 토큰을 다시 폐기해도 오류 없음
        store.revoke(&token, Duration::from_secs(60)).await.unwrap();
        assert!(store.is_revoked(&token).await.unwrap());
    }
}
