//! 프로필 endpoint.
//!
//! 인증된 사용자가 자신의 프로필을 조회/수정하고 비밀번호를 변경합니다.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use warden_data::UserUpdate;

use super::auth::json_body;
use super::users::validate_profile_fields;
use crate::auth::{JwtAuth, UserInfo};
use crate::error::{auth_error, bad_request, user_error, ApiErrorResponse, ApiResult};
use crate::state::AppState;

/// 비밀번호 변경 요청.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

impl ChangePasswordRequest {
    /// 필수 필드 확인. 강도 검사는 현재 비밀번호 확인 후 서비스에서 수행합니다.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.current_password.is_empty() {
            return Err("current_password is required");
        }
        if self.new_password.is_empty() {
            return Err("new_password is required");
        }
        Ok(())
    }
}

/// 본인 프로필 수정 요청. 생략한 필드는 변경하지 않습니다.
///
/// 활성 상태는 여기서 바꿀 수 없습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_profile_fields(
            self.email.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        )?;
        if self.email.is_none() && self.first_name.is_none() && self.last_name.is_none() {
            return Err("no fields to update");
        }
        Ok(())
    }
}

impl From<UpdateProfileRequest> for UserUpdate {
    fn from(request: UpdateProfileRequest) -> Self {
        UserUpdate {
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
            is_active: None,
        }
    }
}

/// 본인 프로필 조회.
///
/// GET /api/v1/profile
#[utoipa::path(
    get,
    path = "/api/v1/profile",
    responses(
        (status = 200, description = "조회 성공", body = UserInfo),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "profile"
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
) -> ApiResult<Json<UserInfo>> {
    let user = state
        .users
        .get_user(claims.user_id)
        .await
        .map_err(user_error)?;
    Ok(Json(user))
}

/// 본인 프로필 수정.
///
/// PUT /api/v1/profile
#[utoipa::path(
    put,
    path = "/api/v1/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 204, description = "수정 성공"),
        (status = 400, description = "잘못된 요청", body = ApiErrorResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 409, description = "이메일 중복", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "profile"
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let request = json_body(payload)?;
    request.validate().map_err(bad_request)?;

    state
        .users
        .update_user(claims.user_id, &request.into())
        .await
        .map_err(user_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// 비밀번호 변경.
///
/// PUT /api/v1/profile/password
#[utoipa::path(
    put,
    path = "/api/v1/profile/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "변경 성공"),
        (status = 400, description = "잘못된 요청 또는 약한 비밀번호", body = ApiErrorResponse),
        (status = 401, description = "인증 필요 또는 현재 비밀번호 불일치", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "profile"
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let request = json_body(payload)?;
    request.validate().map_err(bad_request)?;

    state
        .auth
        .change_password(
            claims.user_id,
            &request.current_password,
            &request.new_password,
        )
        .await
        .map_err(auth_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// 프로필 라우터 생성.
pub fn profile_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/password", put(change_password))
}
