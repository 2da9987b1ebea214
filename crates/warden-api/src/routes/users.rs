//! 사용자 관리 endpoint.
//!
//! 목록/검색/삭제는 `users:*` 권한이 필요하고, 단건 조회와 수정은 본인이면
//! 권한 없이 허용됩니다. 와일드카드 권한은 모든 요구를 만족합니다.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};
use validator::ValidateEmail;
use warden_data::{UserQuery, UserUpdate};

use super::auth::json_body;
use crate::auth::{
    require_ownership_or_permission, require_permission, JwtAuth, JwtAuthError, UserInfo,
};
use crate::error::{auth_error, bad_request, user_error, ApiErrorResponse, ApiResult};
use crate::services::UserList;
use crate::state::AppState;

/// 목록/검색/단건 조회 권한.
pub const READ_PERMISSION: &str = "users:read";

/// 수정/잠금 해제 권한.
pub const UPDATE_PERMISSION: &str = "users:update";

/// 삭제 권한.
pub const DELETE_PERMISSION: &str = "users:delete";

/// 이메일 최대 길이 (users.email 컬럼)
const MAX_EMAIL_LEN: usize = 255;

/// 이름 최대 길이 (users.first_name/last_name 컬럼)
const MAX_NAME_LEN: usize = 100;

// ==================== 요청 타입 ====================

/// 사용자 목록 조회 조건.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListUsersParams {
    /// 페이지 크기 (1-100, 범위 밖이면 10)
    pub limit: Option<u32>,
    /// 건너뛸 사용자 수 (기본값: 0)
    pub offset: Option<u32>,
    /// 역할 이름 필터
    pub role: Option<String>,
    /// 활성 상태 필터
    pub active: Option<bool>,
}

impl ListUsersParams {
    pub fn into_query(self) -> UserQuery {
        UserQuery {
            role: self.role.filter(|r| !r.trim().is_empty()),
            active: self.active,
            ..Default::default()
        }
        .with_page(self.limit, self.offset)
    }
}

/// 이메일 검색 조건.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct EmailSearchParams {
    /// 정확히 일치하는 이메일 (대소문자 구분)
    #[serde(default)]
    pub email: String,
}

/// 사용자 수정 요청. 생략한 필드는 변경하지 않습니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// `users:update` 권한이 있어야 변경할 수 있습니다
    pub is_active: Option<bool>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_profile_fields(
            self.email.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        )?;
        if self.is_active.is_none()
            && self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
        {
            return Err("no fields to update");
        }
        Ok(())
    }
}

impl From<UpdateUserRequest> for UserUpdate {
    fn from(request: UpdateUserRequest) -> Self {
        UserUpdate {
            email: request.email,
            first_name: request.first_name,
            last_name: request.last_name,
            is_active: request.is_active,
        }
    }
}

/// 프로필 필드 형식 확인 (본인 프로필 수정과 공용).
pub(crate) fn validate_profile_fields(
    email: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<(), &'static str> {
    if let Some(email) = email {
        if email.len() > MAX_EMAIL_LEN || !email.validate_email() {
            return Err("email is not a valid address");
        }
    }
    for name in [first_name, last_name].into_iter().flatten() {
        if name.trim().is_empty() {
            return Err("name must not be blank");
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err("name is too long");
        }
    }
    Ok(())
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    match params {
        Ok(Query(params)) => Ok(params),
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Rejected query string");
            Err(bad_request("query string is not valid"))
        }
    }
}

// ==================== 핸들러 ====================

/// 사용자 목록 조회.
///
/// GET /api/v1/users?limit=10&offset=0&role=admin&active=true
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(ListUsersParams),
    responses(
        (status = 200, description = "조회 성공", body = UserList),
        (status = 400, description = "잘못된 조회 조건", body = ApiErrorResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 403, description = "권한 부족", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    params: Result<Query<ListUsersParams>, QueryRejection>,
) -> ApiResult<Json<UserList>> {
    require_permission(&claims, READ_PERMISSION).map_err(|e| e.into_api_error())?;
    let query = query_params(params)?.into_query();

    let list = state.users.list_users(&query).await.map_err(user_error)?;
    Ok(Json(list))
}

/// 이메일로 사용자 검색.
///
/// GET /api/v1/users/search/by-email?email=user@example.com
#[utoipa::path(
    get,
    path = "/api/v1/users/search/by-email",
    params(EmailSearchParams),
    responses(
        (status = 200, description = "조회 성공", body = UserInfo),
        (status = 400, description = "이메일 누락", body = ApiErrorResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 403, description = "권한 부족", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "users"
)]
pub async fn find_user_by_email(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    params: Result<Query<EmailSearchParams>, QueryRejection>,
) -> ApiResult<Json<UserInfo>> {
    require_permission(&claims, READ_PERMISSION).map_err(|e| e.into_api_error())?;
    let params = query_params(params)?;
    if params.email.is_empty() {
        return Err(bad_request("email is required"));
    }

    let user = state
        .users
        .find_by_email(&params.email)
        .await
        .map_err(user_error)?;
    Ok(Json(user))
}

/// 사용자 단건 조회. 본인이거나 `users:read` 권한 필요.
///
/// GET /api/v1/users/{id}
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "사용자 ID")),
    responses(
        (status = 200, description = "조회 성공", body = UserInfo),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 403, description = "접근 거부", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserInfo>> {
    require_ownership_or_permission(&claims, id, READ_PERMISSION)
        .map_err(|e| e.into_api_error())?;

    let user = state.users.get_user(id).await.map_err(user_error)?;
    Ok(Json(user))
}

/// 사용자 수정. 본인이거나 `users:update` 권한 필요.
///
/// 활성 상태 변경은 본인이라도 `users:update` 권한이 있어야 합니다.
///
/// PUT /api/v1/users/{id}
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "사용자 ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 204, description = "수정 성공"),
        (status = 400, description = "잘못된 요청", body = ApiErrorResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 403, description = "접근 거부", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 409, description = "이메일 중복", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    require_ownership_or_permission(&claims, id, UPDATE_PERMISSION)
        .map_err(|e| e.into_api_error())?;

    let request = json_body(payload)?;
    request.validate().map_err(bad_request)?;
    if request.is_active.is_some() && !claims.has_permission(UPDATE_PERMISSION) {
        return Err(JwtAuthError::InsufficientPermission.into_api_error());
    }

    state
        .users
        .update_user(id, &request.into())
        .await
        .map_err(user_error)?;

    if claims.user_id != id {
        info!(admin_id = claims.user_id, user_id = id, "User updated by administrator");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// 사용자 삭제 (소프트 삭제).
///
/// DELETE /api/v1/users/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = i64, Path, description = "사용자 ID")),
    responses(
        (status = 204, description = "삭제 성공"),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 403, description = "권한 부족", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_permission(&claims, DELETE_PERMISSION).map_err(|e| e.into_api_error())?;

    state.users.delete_user(id).await.map_err(user_error)?;

    info!(admin_id = claims.user_id, user_id = id, "User deleted by administrator");
    Ok(StatusCode::NO_CONTENT)
}

/// 계정 잠금 해제.
///
/// POST /api/v1/users/{id}/unlock
#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/unlock",
    params(("id" = i64, Path, description = "사용자 ID")),
    responses(
        (status = 204, description = "잠금 해제 성공"),
        (status = 401, description = "인증 필요", body = ApiErrorResponse),
        (status = 403, description = "권한 부족", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "users"
)]
pub async fn unlock_user(
    State(state): State<Arc<AppState>>,
    JwtAuth(claims): JwtAuth,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    require_permission(&claims, UPDATE_PERMISSION).map_err(|e| e.into_api_error())?;

    state.auth.unlock_account(id).await.map_err(auth_error)?;

    info!(admin_id = claims.user_id, user_id = id, "Unlock requested by administrator");
    Ok(StatusCode::NO_CONTENT)
}

/// 사용자 관리 라우터 생성.
pub fn users_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users))
        .route("/search/by-email", get(find_user_by_email))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/unlock", post(unlock_user))
}
