//! 인증 endpoint.
//!
//! 로그인, 토큰 갱신, 로그아웃, 현재 사용자 조회를 제공합니다.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/auth/login` - 로그인
//! - `POST /api/v1/auth/refresh` - 토큰 갱신
//! - `POST /api/v1/auth/logout` - 로그아웃 (Refresh Token 폐기)
//! - `GET /api/v1/auth/me` - 현재 사용자 정보

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;
use validator::ValidateEmail;

use crate::auth::{JwtAuth, LoginResponse, UserInfo};
use crate::error::{auth_error, bad_request, refresh_error, ApiError, ApiErrorResponse, ApiResult};
use crate::middleware::{rate_limit_middleware, RateLimitState};
use crate::state::AppState;

// ==================== 요청 타입 ====================

/// 로그인 요청.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// 필수 필드와 이메일 형식을 확인합니다.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.email.trim().is_empty() {
            return Err("email is required");
        }
        if self.password.is_empty() {
            return Err("password is required");
        }
        if !self.email.validate_email() {
            return Err("email is not a valid address");
        }
        Ok(())
    }
}

/// Refresh Token을 담는 요청 (갱신, 로그아웃 공용).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: String,
}

impl RefreshTokenRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.refresh_token.trim().is_empty() {
            return Err("refresh_token is required");
        }
        Ok(())
    }
}

/// JSON 본문 추출 실패를 400으로 변환합니다.
pub(crate) fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Rejected request body");
            Err(bad_request("request body is not valid JSON"))
        }
    }
}

// ==================== 핸들러 ====================

/// 로그인.
///
/// POST /api/v1/auth/login
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공", body = LoginResponse),
        (status = 400, description = "잘못된 요청", body = ApiErrorResponse),
        (status = 401, description = "이메일 또는 비밀번호 불일치", body = ApiErrorResponse),
        (status = 403, description = "비활성 또는 잠긴 계정", body = ApiErrorResponse),
        (status = 429, description = "요청 한도 초과", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let request = json_body(payload)?;
    request.validate().map_err(bad_request)?;

    let response = state
        .auth
        .login(&request.email, &request.password)
        .await
        .map_err(auth_error)?;

    Ok(Json(response))
}

/// 토큰 갱신.
///
/// 사용한 Refresh Token은 폐기되고 새 토큰 쌍이 발급됩니다.
///
/// POST /api/v1/auth/refresh
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "갱신 성공", body = LoginResponse),
        (status = 400, description = "잘못된 요청", body = ApiErrorResponse),
        (status = 401, description = "유효하지 않은 토큰", body = ApiErrorResponse),
        (status = 403, description = "비활성 또는 잠긴 계정", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let request = json_body(payload)?;
    request.validate().map_err(bad_request)?;

    let response = state
        .auth
        .refresh_token(&request.refresh_token)
        .await
        .map_err(refresh_error)?;

    Ok(Json(response))
}

/// 로그아웃.
///
/// POST /api/v1/auth/logout
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    request_body = RefreshTokenRequest,
    responses(
        (status = 204, description = "로그아웃 성공"),
        (status = 400, description = "잘못된 요청", body = ApiErrorResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    JwtAuth(_claims): JwtAuth,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let request = json_body(payload)?;
    request.validate().map_err(bad_request)?;

    state
        .auth
        .logout(&request.refresh_token)
        .await
        .map_err(auth_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// 현재 사용자 정보.
///
/// GET /api/v1/auth/me
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "조회 성공", body = UserInfo),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
) -> ApiResult<Json<UserInfo>> {
    let user = state
        .auth
        .get_current_user(claims.user_id)
        .await
        .map_err(auth_error)?;

    Ok(Json(user))
}

/// 인증 라우터 생성.
///
/// `login_limit`이 주어지면 로그인 경로에만 별도의 요청 한도를 적용합니다.
pub fn auth_router(login_limit: Option<RateLimitState>) -> Router<Arc<AppState>> {
    let login_route = match login_limit {
        Some(limit) => {
            post(login).route_layer(middleware::from_fn_with_state(limit, rate_limit_middleware))
        }
        None => post(login),
    };

    Router::new()
        .route("/login", login_route)
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
}
