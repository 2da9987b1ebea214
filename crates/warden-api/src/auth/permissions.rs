//! 유효 권한 계산.
//!
//! 1. 활성 역할이 부여하는 권한을 모두 모읍니다.
//! 2. 직접 오버라이드를 적용합니다 (`allow = true`는 추가, `allow = false`는 제거).
//!
//! 결과는 정렬된 집합이며 토큰 발급 시점에만 계산됩니다.
//! 이미 발급된 Access Token에는 이후의 권한 변경이 반영되지 않습니다.

use std::collections::BTreeSet;

use warden_core::User;

/// 모든 권한 검사를 통과하는 와일드카드 권한.
pub const WILDCARD_PERMISSIONS: [&str; 2] = ["admin:all", "super_admin:all"];

/// 사용자의 유효 권한 집합을 계산합니다.
pub fn resolve_effective_permissions(user: &User) -> BTreeSet<String> {
    let mut permissions: BTreeSet<String> = user
        .roles
        .iter()
        .filter(|role| role.is_active)
        .flat_map(|role| role.permissions.iter().map(|p| p.key()))
        .collect();

    // 같은 권한이 여러 번 나오면 마지막 항목이 우선
    for permission_override in &user.permission_overrides {
        let key = permission_override.permission.key();
        if permission_override.allow {
            permissions.insert(key);
        } else {
            permissions.remove(&key);
        }
    }

    permissions
}

/// 활성 역할 이름 목록 (정렬, 중복 제거).
pub fn active_role_names(user: &User) -> Vec<String> {
    user.roles
        .iter()
        .filter(|role| role.is_active)
        .map(|role| role.name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 권한 목록이 요구 권한을 만족하는지 확인합니다.
pub fn has_permission<S: AsRef<str>>(granted: &[S], required: &str) -> bool {
    granted.iter().any(|p| {
        let p = p.as_ref();
        p == required || WILDCARD_PERMISSIONS.contains(&p)
    })
}
