//! 메모리 기반 사용자 저장소.
//!
//! 테스트와 로컬 개발용입니다. 모든 변경은 단일 쓰기 잠금 안에서
//! 수행되므로 실패 횟수 갱신이 직렬화됩니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use warden_core::{AccountSecurity, LockoutPolicy, User};

use super::user::{UserPage, UserQuery, UserStore, UserUpdate};
use crate::error::{DataError, Result};

/// 메모리 사용자 저장소.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<i64, User>>,
}

impl MemoryUserStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 사용자를 추가하거나 교체합니다.
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    /// 사용자를 제거합니다 (삭제된 사용자와 동일하게 조회되지 않음).
    pub async fn remove(&self, user_id: i64) -> Option<User> {
        self.users.write().await.remove(&user_id)
    }

    /// 사용자 레코드를 직접 수정합니다.
    pub async fn update<F>(&self, user_id: i64, f: F) -> bool
    where
        F: FnOnce(&mut User),
    {
        match self.users.write().await.get_mut(&user_id) {
            Some(user) => {
                f(user);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn record_failed_login(
        &self,
        user_id: i64,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<AccountSecurity> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| DataError::UserNotFound(user_id))?;

        let next = user.security.register_failure(policy, now);
        if next != user.security {
            user.security = next;
            user.updated_at = now;
        }
        Ok(next)
    }

    async fn record_successful_login(&self, user_id: i64, now: DateTime<Utc>) -> Result<()> {
        let mut users = self.users.write().await;
        if let Some(user) = users.get_mut(&user_id) {
            user.security = user.security.register_success();
            user.last_login_at = Some(now);
            user.updated_at = now;
        }
        Ok(())
    }

    async fn unlock(&self, user_id: i64) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(&user_id) {
            Some(user) => {
                user.security = AccountSecurity::unlocked();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<bool> {
        let mut users = self.users.write().await;
        match users.get_mut(&user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_users(&self, query: &UserQuery) -> Result<UserPage> {
        let users = self.users.read().await;
        let mut matched: Vec<&User> = users
            .values()
            .filter(|u| query.active.map_or(true, |active| u.is_active == Some(active)))
            .filter(|u| {
                query
                    .role
                    .as_deref()
                    .map_or(true, |name| u.roles.iter().any(|r| r.name == name))
            })
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = i64::try_from(matched.len()).unwrap_or(i64::MAX);
        let users = matched
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(UserPage { users, total })
    }

    async fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<bool> {
        let mut users = self.users.write().await;

        if let Some(email) = &update.email {
            if users.values().any(|u| u.id != user_id && &u.email == email) {
                return Err(DataError::Conflict(format!("email {} already exists", email)));
            }
        }

        match users.get_mut(&user_id) {
            Some(user) => {
                if let Some(email) = &update.email {
                    user.email = email.clone();
                }
                if let Some(first_name) = &update.first_name {
                    user.first_name = Some(first_name.clone());
                }
                if let Some(last_name) = &update.last_name {
                    user.last_name = Some(last_name.clone());
                }
                if let Some(is_active) = update.is_active {
                    user.is_active = Some(is_active);
                }
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn soft_delete(&self, user_id: i64) -> Result<bool> {
        Ok(self.users.write().await.remove(&user_id).is_some())
    }
}
