//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/v1/auth` - 로그인, 토큰 갱신, 로그아웃, 현재 사용자
//! - `/api/v1/profile` - 본인 프로필 조회/수정, 비밀번호 변경
//! - `/api/v1/users` - 사용자 목록/검색/조회/수정/삭제, 계정 잠금 해제

pub mod auth;
pub mod health;
pub mod profile;
pub mod users;

pub use auth::{auth_router, LoginRequest, RefreshTokenRequest};
pub use health::{
    health_router, ComponentHealth, ComponentStatus, HealthResponse, CheckStatus, ServiceStatus,
};
pub use profile::{profile_router, ChangePasswordRequest, UpdateProfileRequest};
pub use users::{users_router, EmailSearchParams, ListUsersParams, UpdateUserRequest};

use axum::{middleware, Router};
use std::sync::Arc;
use warden_core::RateLimitSettings;

use crate::middleware::{rate_limit_middleware, RateLimitConfig, RateLimitState};
use crate::state::AppState;

/// 라우터에 적용되는 요청 한도 상태.
#[derive(Clone)]
pub struct RateLimits {
    /// 모든 `/api/v1` 경로에 적용
    pub general: RateLimitState,
    /// `POST /api/v1/auth/login`에 추가로 적용
    pub login: RateLimitState,
}

impl RateLimits {
    /// 설정에서 생성. 비활성화되어 있으면 `None`.
    pub fn from_settings(settings: &RateLimitSettings) -> Option<Self> {
        if !settings.enabled {
            return None;
        }
        Some(Self {
            general: RateLimitState::new(
                "api",
                RateLimitConfig::per_minute(settings.requests_per_minute),
            ),
            login: RateLimitState::new(
                "login",
                RateLimitConfig::login(settings.login_requests_per_minute),
            ),
        })
    }
}

/// 전체 API 라우터 생성.
///
/// 모든 서브 라우터를 조합하여 하나의 라우터로 반환합니다.
/// 헬스 체크 경로에는 요청 한도가 적용되지 않습니다.
pub fn create_api_router(rate_limits: Option<RateLimits>) -> Router<Arc<AppState>> {
    let (general, login) = match rate_limits {
        Some(limits) => (Some(limits.general), Some(limits.login)),
        None => (None, None),
    };

    let api = Router::new()
        .nest("/auth", auth_router(login))
        .nest("/profile", profile_router())
        .nest("/users", users_router());

    let api = match general {
        Some(state) => api.layer(middleware::from_fn_with_state(state, rate_limit_middleware)),
        None => api,
    };

    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1", api)
}
