//! 인증, 세션, RBAC REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 토큰 발급/검증, 비밀번호 검증, 권한 계산을 묶은 인증 서비스
//! - Axum 기반 REST API
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: JWT 인증 및 권한 관리
//! - [`services`]: 사용자 관리 서비스
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;

pub use auth::{AuthError, AuthService, Claims, JwtAuth, JwtAuthError, LoginResponse, UserInfo};
pub use error::{ApiError, ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use routes::*;
pub use services::{UserError, UserList, UserService};
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
