//! 사용자 엔티티.

use chrono::{DateTime, Utc};
use std::fmt;

use super::rbac::{PermissionOverride, Role};
use super::security::AccountSecurity;

/// 사용자 레코드.
///
/// 역할과 직접 권한 오버라이드가 함께 로드된 상태로 전달됩니다.
/// `is_active`는 `None`(미설정)인 경우 비활성으로 취급합니다.
#[derive(Clone)]
pub struct User {
    /// 사용자 ID
    pub id: i64,
    /// 이메일 (대소문자 구분)
    pub email: String,
    /// bcrypt 비밀번호 해시
    pub password_hash: String,
    /// 이름
    pub first_name: Option<String>,
    /// 성
    pub last_name: Option<String>,
    /// 활성 플래그 (미설정 / true / false)
    pub is_active: Option<bool>,
    /// 이메일 인증 여부
    pub email_verified: bool,
    /// 로그인 실패 횟수 및 잠금 상태
    pub security: AccountSecurity,
    /// 마지막 로그인 성공 시각
    pub last_login_at: Option<DateTime<Utc>>,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 수정 시각
    pub updated_at: DateTime<Utc>,
    /// 할당된 역할 (비활성 역할 포함)
    pub roles: Vec<Role>,
    /// 직접 권한 오버라이드
    pub permission_overrides: Vec<PermissionOverride>,
}

impl User {
    /// 최소 필드로 활성 사용자를 생성합니다.
    pub fn new(id: i64, email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: email.into(),
            password_hash: password_hash.into(),
            first_name: None,
            last_name: None,
            is_active: Some(true),
            email_verified: false,
            security: AccountSecurity::unlocked(),
            last_login_at: None,
            created_at: now,
            updated_at: now,
            roles: Vec::new(),
            permission_overrides: Vec::new(),
        }
    }

    /// 이름을 설정합니다.
    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self.last_name = Some(last_name.into());
        self
    }

    /// 역할을 추가합니다.
    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    /// 직접 권한 오버라이드를 추가합니다.
    pub fn with_override(mut self, permission_override: PermissionOverride) -> Self {
        self.permission_overrides.push(permission_override);
        self
    }

    /// 활성 플래그를 설정합니다.
    pub fn with_active(mut self, is_active: Option<bool>) -> Self {
        self.is_active = is_active;
        self
    }

    /// 활성 플래그가 명시적으로 `true`인지 확인합니다.
    pub fn is_active_account(&self) -> bool {
        self.is_active == Some(true)
    }

    /// `now` 시점에 잠겨 있는지 확인합니다.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.security.is_locked_at(now)
    }

    /// 활성 상태이며 잠겨 있지 않은 경우에만 로그인할 수 있습니다.
    pub fn can_login_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active_account() && !self.is_locked_at(now)
    }
}

// 비밀번호 해시는 로그에 남지 않도록 제외
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("is_active", &self.is_active)
            .field("email_verified", &self.email_verified)
            .field("security", &self.security)
            .field("last_login_at", &self.last_login_at)
            .field("roles", &self.roles.len())
            .field("permission_overrides", &self.permission_overrides.len())
            .finish_non_exhaustive()
    }
}
