//! Axum용 JWT 인증 추출기.
//!
//! `Authorization: Bearer <token>` 헤더를 엄격하게 파싱한 뒤 Access Token을 검증합니다.
//! 헤더가 없거나 형식이 틀리면 토큰 파싱 전에 거부됩니다.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use super::Claims;
use crate::error::{ApiError, ApiErrorResponse};
use crate::state::AppState;

/// JWT 인증 추출기.
///
/// # 사용 예시
///
/// ```rust,ignore
/// async fn protected_handler(
///     JwtAuth(claims): JwtAuth,
/// ) -> impl IntoResponse {
///     format!("Authenticated user: {}", claims.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JwtAuth(pub Claims);

/// JWT 인증 에러.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JwtAuthError {
    #[error("인증 토큰이 필요합니다")]
    MissingToken,
    #[error("잘못된 Authorization 헤더 형식")]
    InvalidAuthHeader,
    #[error("유효하지 않은 토큰")]
    InvalidToken,
    #[error("권한이 부족합니다")]
    InsufficientPermission,
    #[error("접근이 거부되었습니다")]
    AccessDenied,
}

impl JwtAuthError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            JwtAuthError::MissingToken => (StatusCode::UNAUTHORIZED, "MISSING_TOKEN"),
            JwtAuthError::InvalidAuthHeader => (StatusCode::UNAUTHORIZED, "INVALID_AUTH_HEADER"),
            JwtAuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            JwtAuthError::InsufficientPermission => {
                (StatusCode::FORBIDDEN, "INSUFFICIENT_PERMISSION")
            }
            JwtAuthError::AccessDenied => (StatusCode::FORBIDDEN, "ACCESS_DENIED"),
        }
    }

    /// 핸들러 에러 형식으로 변환.
    pub fn into_api_error(self) -> ApiError {
        let (status, code) = self.status_and_code();
        (status, Json(ApiErrorResponse::new(code, self.to_string())))
    }
}

impl IntoResponse for JwtAuthError {
    fn into_response(self) -> Response {
        self.into_api_error().into_response()
    }
}

/// `Authorization` 헤더 값에서 Bearer 토큰을 꺼냅니다.
///
/// 스킴은 정확히 `Bearer`여야 하며 토큰은 비어 있지 않고 공백을 포함하지 않아야 합니다.
fn parse_bearer(header: &str) -> Result<&str, JwtAuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(JwtAuthError::InvalidAuthHeader)?;

    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(JwtAuthError::InvalidAuthHeader);
    }
    Ok(token)
}

impl FromRequestParts<Arc<AppState>> for JwtAuth {
    type Rejection = JwtAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(JwtAuthError::MissingToken)?
            .to_str()
            .map_err(|_| JwtAuthError::InvalidAuthHeader)?;

        let token = parse_bearer(header)?;

        // 만료/변조/형식 오류는 응답에서 구분하지 않음
        let claims = state.auth.validate_token(token).map_err(|e| {
            debug!(error = %e, "Access token rejected");
            JwtAuthError::InvalidToken
        })?;

        Ok(JwtAuth(claims))
    }
}

/// 요구 권한 확인.
///
/// 와일드카드 권한(`admin:all`, `super_admin:all`)은 모든 요구를 만족합니다.
pub fn require_permission(claims: &Claims, required: &str) -> Result<(), JwtAuthError> {
    if claims.has_permission(required) {
        Ok(())
    } else {
        Err(JwtAuthError::InsufficientPermission)
    }
}

/// 본인 리소스이거나 요구 권한이 있으면 통과.
///
/// 둘 다 아니면 `AccessDenied` (403 `ACCESS_DENIED`).
pub fn require_ownership_or_permission(
    claims: &Claims,
    owner_id: i64,
    required: &str,
) -> Result<(), JwtAuthError> {
    if claims.user_id == owner_id || claims.has_permission(required) {
        Ok(())
    } else {
        Err(JwtAuthError::AccessDenied)
    }
}
