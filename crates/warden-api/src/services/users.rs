//! 사용자 관리 서비스.
//!
//! 프로필 조회/수정, 관리자용 목록 조회, 이메일 검색, 소프트 삭제를 담당합니다.
//! 권한 판단은 라우트 계층에서 끝난 상태로 호출됩니다.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};
use utoipa::ToSchema;
use warden_core::{auth_span, User};
use warden_data::{DataError, UserQuery, UserStore, UserUpdate};

use crate::auth::{resolve_effective_permissions, UserInfo};

/// 사용자 관리 에러.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("사용자를 찾을 수 없습니다")]
    NotFound,
    #[error("이미 사용 중인 이메일입니다")]
    EmailExists,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DataError> for UserError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Conflict(_) => UserError::EmailExists,
            other => UserError::Internal(other.to_string()),
        }
    }
}

/// 사용자 목록 응답.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserList {
    pub users: Vec<UserInfo>,
    /// 필터에 맞는 전체 사용자 수
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

fn user_info(user: &User) -> UserInfo {
    let permissions = resolve_effective_permissions(user).into_iter().collect();
    UserInfo::from_user(user, permissions)
}

/// 사용자 관리 서비스.
pub struct UserService {
    users: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<UserInfo, UserError> {
        let user = self
            .users
            .find_by_id(user_id)
            .instrument(auth_span!("get_user", user_id))
            .await?
            .ok_or(UserError::NotFound)?;

        Ok(user_info(&user))
    }

    /// 이메일(대소문자 구분)로 조회합니다.
    pub async fn find_by_email(&self, email: &str) -> Result<UserInfo, UserError> {
        let user = self
            .users
            .find_by_email(email)
            .instrument(auth_span!("find_by_email"))
            .await?
            .ok_or(UserError::NotFound)?;

        Ok(user_info(&user))
    }

    pub async fn list_users(&self, query: &UserQuery) -> Result<UserList, UserError> {
        let page = self
            .users
            .list_users(query)
            .instrument(auth_span!("list_users"))
            .await?;

        Ok(UserList {
            users: page.users.iter().map(user_info).collect(),
            total: page.total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    /// 주어진 필드만 갱신합니다. 비활성화된 사용자는 다음 갱신/로그인부터 거부됩니다.
    pub async fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<(), UserError> {
        if !self
            .users
            .update_user(user_id, update)
            .instrument(auth_span!("update_user", user_id))
            .await?
        {
            return Err(UserError::NotFound);
        }

        info!(
            user_id,
            email_changed = update.email.is_some(),
            is_active = ?update.is_active,
            "User updated"
        );
        Ok(())
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<(), UserError> {
        if !self
            .users
            .soft_delete(user_id)
            .instrument(auth_span!("delete_user", user_id))
            .await?
        {
            return Err(UserError::NotFound);
        }

        info!(user_id, "User deleted");
        Ok(())
    }
}
