//! 역할 기반 접근 제어 (RBAC) 엔티티.
//!
//! 권한은 `(resource, action)` 쌍으로 식별되며 `"resource:action"` 형태로 표기됩니다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 원자적 권한.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// 권한 ID
    pub id: i64,
    /// 대상 리소스 (예: "users")
    pub resource: String,
    /// 작업 (예: "read")
    pub action: String,
    /// 설명
    #[serde(default)]
    pub description: Option<String>,
}

impl Permission {
    /// 새 권한을 생성합니다.
    pub fn new(id: i64, resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id,
            resource: resource.into(),
            action: action.into(),
            description: None,
        }
    }

    /// 정규 문자열 키 (`"resource:action"`).
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

/// 권한 묶음인 역할.
///
/// `is_active`가 `true`인 역할만 사용자의 유효 권한에 기여합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// 역할 ID
    pub id: i64,
    /// 역할 이름 (예: "admin")
    pub name: String,
    /// 설명
    #[serde(default)]
    pub description: Option<String>,
    /// 활성 여부
    pub is_active: bool,
    /// 역할이 부여하는 권한 목록
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    /// 새 활성 역할을 생성합니다.
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            is_active: true,
            permissions: Vec::new(),
        }
    }

    /// 권한을 추가합니다.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }

    /// 활성 여부를 설정합니다.
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

/// 사용자 단위 직접 권한 오버라이드.
///
/// `allow = true`는 역할 부여 여부와 관계없이 권한을 추가하고,
/// `allow = false`는 역할이 부여하더라도 권한을 제거합니다.
/// `(user, permission)` 쌍마다 하나만 존재합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverride {
    /// 대상 권한
    pub permission: Permission,
    /// 허용(true) / 거부(false)
    pub allow: bool,
}

impl PermissionOverride {
    /// 허용 오버라이드.
    pub fn allow(permission: Permission) -> Self {
        Self {
            permission,
            allow: true,
        }
    }

    /// 거부 오버라이드.
    pub fn deny(permission: Permission) -> Self {
        Self {
            permission,
            allow: false,
        }
    }
}
