//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{LoginResponse, TokenPair, UserInfo};
use crate::error::ApiErrorResponse;
use crate::routes::{
    ChangePasswordRequest, CheckStatus, ComponentHealth, ComponentStatus, HealthResponse,
    LoginRequest, RefreshTokenRequest, ServiceStatus, UpdateProfileRequest, UpdateUserRequest,
};
use crate::services::UserList;

// ==================== OpenAPI 문서 정의 ====================

/// Warden API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Warden Auth API",
        description = r#"
# Warden 인증/세션/RBAC REST API

## 주요 기능

- **인증**: 이메일/비밀번호 로그인, Access/Refresh Token 발급
- **세션**: Refresh Token 순환 갱신 및 로그아웃 시 폐기
- **RBAC**: 역할과 직접 오버라이드로부터 계산된 권한을 토큰에 포함
- **계정 보호**: 연속 로그인 실패 시 일정 시간 계정 잠금

## 인증

보호된 엔드포인트는 `Authorization: Bearer <access_token>` 헤더가 필요합니다.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 로그인, 토큰 갱신, 로그아웃"),
        (name = "profile", description = "프로필 - 본인 정보 조회/수정, 비밀번호 변경"),
        (name = "users", description = "사용자 관리 - 목록, 검색, 수정, 삭제, 계정 잠금 해제")
    ),
    components(
        schemas(
            // ===== Health =====
            HealthResponse,
            ServiceStatus,
            ComponentHealth,
            ComponentStatus,
            CheckStatus,

            // ===== Common =====
            ApiErrorResponse,

            // ===== Auth =====
            LoginRequest,
            RefreshTokenRequest,
            LoginResponse,
            TokenPair,
            UserInfo,

            // ===== Profile =====
            ChangePasswordRequest,
            UpdateProfileRequest,

            // ===== Users =====
            UpdateUserRequest,
            UserList,
        )
    ),
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::logout,
        crate::routes::auth::me,

        // ===== Profile =====
        crate::routes::profile::get_profile,
        crate::routes::profile::update_profile,
        crate::routes::profile::change_password,

        // ===== Users =====
        crate::routes::users::list_users,
        crate::routes::users::find_user_by_email,
        crate::routes::users::get_user,
        crate::routes::users::update_user,
        crate::routes::users::delete_user,
        crate::routes::users::unlock_user,
    )
)]
pub struct ApiDoc;

// ==================== Swagger UI 라우터 ====================

/// Swagger UI 라우터 생성.
///
/// 다음 경로에 문서 UI를 마운트합니다:
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}
