//! 핸들러 간 공유 상태.

use std::sync::Arc;

use warden_data::{DataError, Database, RedisCache};

use crate::auth::AuthService;
use crate::services::UserService;

/// 애플리케이션 공유 상태.
///
/// `Arc<AppState>`로 라우터에 주입됩니다. 저장소 연결은 readiness 검사에만
/// 쓰이며, 테스트 상태에서는 비어 있습니다.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub database: Option<Database>,
    pub cache: Option<Arc<RedisCache>>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, users: Arc<UserService>) -> Self {
        Self {
            auth,
            users,
            database: None,
            cache: None,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_cache(mut self, cache: Arc<RedisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// PostgreSQL 확인. 설정되지 않았으면 `None`.
    pub async fn check_database(&self) -> Option<Result<(), DataError>> {
        match &self.database {
            Some(database) => Some(database.ping().await),
            None => None,
        }
    }

    /// 폐기 목록 저장소(Redis) 확인. 설정되지 않았으면 `None`.
    pub async fn check_cache(&self) -> Option<Result<(), DataError>> {
        match &self.cache {
            Some(cache) => Some(cache.ping().await),
            None => None,
        }
    }
}

/// 메모리 저장소와 최소 bcrypt 비용으로 구성한 테스트 상태.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state(users: Arc<warden_data::MemoryUserStore>) -> AppState {
    use crate::auth::MemoryRevocationStore;
    use warden_core::{JwtConfig, SecurityConfig};

    let jwt = JwtConfig::new(
        "test-access-secret-key-minimum-32-characters",
        "test-refresh-secret-key-minimum-32-characters",
    );
    let security = SecurityConfig {
        bcrypt_cost: warden_core::MIN_BCRYPT_COST,
        ..Default::default()
    };
    let auth = AuthService::from_config(
        &jwt,
        &security,
        users.clone(),
        Arc::new(MemoryRevocationStore::new()),
    )
    .expect("test auth service");

    AppState::new(Arc::new(auth), Arc::new(UserService::new(users)))
}
