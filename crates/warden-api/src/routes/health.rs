//! 헬스 체크 endpoint.
//!
//! - `GET /health` - liveness. 프로세스가 응답하면 200
//! - `GET /health/ready` - readiness. PostgreSQL과 폐기 목록 저장소를 확인

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;
use warden_data::DataError;

use crate::state::AppState;

/// 전체 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Healthy,
    /// 하나 이상의 의존성 장애. 로그인/갱신이 실패할 수 있음
    Degraded,
}

/// 개별 의존성 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Up,
    Down,
    NotConfigured,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    fn from_check(component: &str, check: Option<Result<(), DataError>>) -> Self {
        match check {
            None => Self {
                status: CheckStatus::NotConfigured,
                message: None,
            },
            Some(Ok(())) => Self {
                status: CheckStatus::Up,
                message: None,
            },
            Some(Err(e)) => {
                // 드라이버 메시지는 응답에 노출하지 않음
                warn!(component, error = %e, "Readiness check failed");
                Self {
                    status: CheckStatus::Down,
                    message: Some("connection failed".to_string()),
                }
            }
        }
    }

    fn is_down(&self) -> bool {
        self.status == CheckStatus::Down
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub database: ComponentStatus,
    /// 폐기 목록 저장소. 장애 시 refresh/logout이 500으로 실패
    pub redis: ComponentStatus,
}

/// readiness 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub version: String,
    pub uptime_secs: i64,
    /// RFC 3339
    pub timestamp: String,
    pub components: ComponentHealth,
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "서버 응답 가능")),
    tag = "health"
)]
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /health/ready
#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "모든 의존성 정상", body = HealthResponse),
        (status = 503, description = "의존성 장애", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (database, cache) = tokio::join!(state.check_database(), state.check_cache());

    let components = ComponentHealth {
        database: ComponentStatus::from_check("database", database),
        redis: ComponentStatus::from_check("redis", cache),
    };

    let (status_code, status) = if components.database.is_down() || components.redis.is_down() {
        (StatusCode::SERVICE_UNAVAILABLE, ServiceStatus::Degraded)
    } else {
        (StatusCode::OK, ServiceStatus::Healthy)
    };

    let response = HealthResponse {
        status,
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components,
    };

    (status_code, Json(response))
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}
