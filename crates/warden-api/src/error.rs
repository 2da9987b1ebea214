//! API 에러 응답.
//!
//! 모든 실패 응답은 `{code, message, details?, timestamp}` 형식의 JSON입니다.
//! 인증 실패는 고정된 메시지로만 응답하고 내부 원인은 로그에만 남깁니다.

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::AuthError;
use crate::services::UserError;

/// 에러 응답 본문.
///
/// ```json
/// { "code": "ACCOUNT_LOCKED", "message": "account is locked", "timestamp": 1738300800 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 기계 판독용 코드 (예: "INVALID_TOKEN", "RATE_LIMITED")
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Unix timestamp (초)
    pub timestamp: i64,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_details(code: impl Into<String>, message: impl Into<String>, details: Value) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

/// 핸들러 에러 타입.
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

pub type ApiResult<T> = Result<T, ApiError>;

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(ApiErrorResponse::new(code, message)))
}

/// 400 INVALID_REQUEST.
pub fn bad_request(message: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
}

/// 인증 서비스 에러를 HTTP 응답으로 변환합니다.
///
/// 토큰 갱신 경로는 [`refresh_error`]를 사용합니다.
pub fn auth_error(err: AuthError) -> ApiError {
    let (status, code) = match &err {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
        AuthError::UserInactive => (StatusCode::FORBIDDEN, "USER_INACTIVE"),
        AuthError::AccountLocked => (StatusCode::FORBIDDEN, "ACCOUNT_LOCKED"),
        AuthError::TokenNotFound => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
        AuthError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
        AuthError::WeakPassword(_) => (StatusCode::BAD_REQUEST, "WEAK_PASSWORD"),
        AuthError::Internal(cause) => {
            error!(cause = %cause, "Internal error while handling auth request");
            return api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal server error",
            );
        }
    };

    api_error(status, code, err.to_string())
}

/// 사용자 관리 에러를 HTTP 응답으로 변환합니다.
pub fn user_error(err: UserError) -> ApiError {
    let (status, code) = match &err {
        UserError::NotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
        UserError::EmailExists => (StatusCode::CONFLICT, "EMAIL_EXISTS"),
        UserError::Internal(cause) => {
            error!(cause = %cause, "Internal error while handling user request");
            return api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "internal server error",
            );
        }
    };

    api_error(status, code, err.to_string())
}

/// 토큰 갱신 실패 변환. 삭제된 사용자의 토큰은 유효하지 않은 토큰과 같은 401.
pub fn refresh_error(err: AuthError) -> ApiError {
    match err {
        AuthError::UserNotFound => auth_error(AuthError::TokenNotFound),
        other => auth_error(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let body = ApiErrorResponse::new("INVALID_TOKEN", "invalid or expired token");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["code"], "INVALID_TOKEN");
        assert_eq!(json["message"], "invalid or expired token");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
        assert!(json.get("details").is_none());

        let limited = ApiErrorResponse::with_details(
            "RATE_LIMITED",
            "too many requests",
            serde_json::json!({ "retry_after": 12 }),
        );
        assert_eq!(serde_json::to_value(&limited).unwrap()["details"]["retry_after"], 12);
    }

    #[test]
    fn test_auth_error_status_mapping() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            (AuthError::UserInactive, StatusCode::FORBIDDEN, "USER_INACTIVE"),
            (AuthError::AccountLocked, StatusCode::FORBIDDEN, "ACCOUNT_LOCKED"),
            (AuthError::TokenNotFound, StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            (AuthError::UserNotFound, StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            (AuthError::WeakPassword("too short"), StatusCode::BAD_REQUEST, "WEAK_PASSWORD"),
        ];

        for (err, status, code) in cases {
            let (actual_status, Json(body)) = auth_error(err);
            assert_eq!(actual_status, status);
            assert_eq!(body.code, code);
        }
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let (status, Json(body)) =
            auth_error(AuthError::Internal("connection refused: 10.0.0.5:5432".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "internal server error");
        assert!(!serde_json::to_string(&body).unwrap().contains("5432"));
    }

    #[test]
    fn test_refresh_error_collapses_user_not_found() {
        let (status, Json(body)) = refresh_error(AuthError::UserNotFound);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "INVALID_TOKEN");

        let (status, _) = refresh_error(AuthError::UserInactive);
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_user_error_status_mapping() {
        let (status, Json(body)) = user_error(UserError::EmailExists);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "EMAIL_EXISTS");

        let (status, Json(body)) = user_error(UserError::NotFound);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "USER_NOT_FOUND");

        let (status, Json(body)) = user_error(UserError::Internal("pool timed out".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "internal server error");
    }

    #[test]
    fn test_bad_request() {
        let (status, Json(body)) = bad_request("email is required");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "INVALID_REQUEST");
    }
}
