//! 사용자/RBAC 저장소.
//!
//! 사용자 레코드를 역할(권한 포함)과 직접 권한 오버라이드와 함께 로드하고,
//! 로그인 실패/성공에 따른 보안 필드를 갱신합니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};
use warden_core::{
    AccountSecurity, LockoutPolicy, Permission, PermissionOverride, Role, User,
};

use crate::error::{DataError, Result};

/// 사용자 저장소 인터페이스.
///
/// 실패 횟수 갱신은 저장소 수준에서 원자적으로 수행되어야 합니다.
/// 동시에 들어온 실패 기록이 서로를 덮어쓰면 안 됩니다.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 이메일(대소문자 구분)로 사용자를 조회합니다. 삭제된 사용자는 제외됩니다.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// ID로 사용자를 조회합니다. 삭제된 사용자는 제외됩니다.
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>>;

    /// 로그인 실패를 기록하고 갱신된 보안 상태를 반환합니다.
    ///
    /// 잠금 중인 계정은 변경하지 않고 현재 상태를 그대로 반환합니다.
    async fn record_failed_login(
        &self,
        user_id: i64,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<AccountSecurity>;

    /// 로그인 성공을 기록합니다 (실패 횟수/잠금 초기화, 마지막 로그인 시각 갱신).
    async fn record_successful_login(&self, user_id: i64, now: DateTime<Utc>) -> Result<()>;

    /// 잠금을 해제하고 실패 횟수를 초기화합니다. 사용자가 없으면 `false`.
    async fn unlock(&self, user_id: i64) -> Result<bool>;

    /// 비밀번호 해시를 교체합니다. 사용자가 없으면 `false`.
    async fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<bool>;

    /// 필터와 페이지 조건으로 사용자 목록을 조회합니다. 최근 생성 순.
    async fn list_users(&self, query: &UserQuery) -> Result<UserPage>;

    /// 지정된 프로필 필드만 갱신합니다. 사용자가 없으면 `false`.
    ///
    /// 다른 사용자가 쓰는 이메일로 바꾸면 [`DataError::Conflict`].
    async fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<bool>;

    /// 사용자를 삭제 상태로 표시합니다. 이미 없으면 `false`.
    async fn soft_delete(&self, user_id: i64) -> Result<bool>;
}

// =============================================================================
// 조회/수정 조건
// =============================================================================

/// 기본 페이지 크기.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// 최대 페이지 크기.
pub const MAX_PAGE_SIZE: u32 = 100;

/// 사용자 목록 조회 조건.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    /// 이 이름의 역할을 가진 사용자만
    pub role: Option<String>,
    /// 활성 상태가 일치하는 사용자만
    pub active: Option<bool>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            role: None,
            active: None,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl UserQuery {
    /// 범위(1..=100)를 벗어난 페이지 크기는 기본값으로 대체합니다.
    pub fn with_page(mut self, limit: Option<u32>, offset: Option<u32>) -> Self {
        self.limit = limit
            .filter(|l| (1..=MAX_PAGE_SIZE).contains(l))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        self.offset = offset.unwrap_or(0);
        self
    }
}

/// 목록 조회 결과. `total`은 페이지와 무관한 전체 건수입니다.
#[derive(Debug, Clone)]
pub struct UserPage {
    pub users: Vec<User>,
    pub total: i64,
}

/// 프로필 갱신 내용. `None` 필드는 변경하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.is_active.is_none()
    }
}

// =============================================================================
// 레코드
// =============================================================================

/// 사용자 테이블 레코드.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    pub email_verified: bool,
    pub login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    fn into_user(self, roles: Vec<Role>, permission_overrides: Vec<PermissionOverride>) -> User {
        User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            is_active: self.is_active,
            email_verified: self.email_verified,
            security: security_from_row(self.login_attempts, self.locked_until),
            last_login_at: self.last_login_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            roles,
            permission_overrides,
        }
    }
}

/// 역할-권한 조인 행. 권한이 없는 역할은 권한 컬럼이 NULL입니다.
#[derive(Debug, Clone, FromRow)]
pub struct RolePermissionRow {
    pub role_id: i64,
    pub role_name: String,
    pub role_description: Option<String>,
    pub role_is_active: bool,
    pub permission_id: Option<i64>,
    pub resource: Option<String>,
    pub action: Option<String>,
    pub permission_description: Option<String>,
}

/// 직접 권한 오버라이드 행.
#[derive(Debug, Clone, FromRow)]
pub struct PermissionOverrideRow {
    pub permission_id: i64,
    pub resource: String,
    pub action: String,
    pub description: Option<String>,
    pub allow: bool,
}

impl From<PermissionOverrideRow> for PermissionOverride {
    fn from(row: PermissionOverrideRow) -> Self {
        let mut permission = Permission::new(row.permission_id, row.resource, row.action);
        permission.description = row.description;
        PermissionOverride {
            permission,
            allow: row.allow,
        }
    }
}

#[derive(Debug, FromRow)]
struct SecurityRow {
    login_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
}

fn security_from_row(login_attempts: i32, locked_until: Option<DateTime<Utc>>) -> AccountSecurity {
    AccountSecurity::new(u32::try_from(login_attempts).unwrap_or(0), locked_until)
}

/// 역할 ID 순으로 정렬된 조인 행을 역할 목록으로 묶습니다.
pub fn group_role_rows(rows: Vec<RolePermissionRow>) -> Vec<Role> {
    let mut roles: Vec<Role> = Vec::new();

    for row in rows {
        let needs_new = roles.last().map_or(true, |role| role.id != row.role_id);
        if needs_new {
            let mut role = Role::new(row.role_id, row.role_name).with_active(row.role_is_active);
            role.description = row.role_description;
            roles.push(role);
        }

        if let (Some(id), Some(resource), Some(action)) =
            (row.permission_id, row.resource, row.action)
        {
            let mut permission = Permission::new(id, resource, action);
            permission.description = row.permission_description;
            if let Some(role) = roles.last_mut() {
                role.permissions.push(permission);
            }
        }
    }

    roles
}

// =============================================================================
// PostgreSQL 구현
// =============================================================================

const USER_COLUMNS: &str = r#"
    id, email, password_hash, first_name, last_name, is_active, email_verified,
    login_attempts, locked_until, last_login_at, created_at, updated_at
"#;

/// PostgreSQL 기반 사용자 저장소.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// 새 저장소를 생성합니다.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_relations(&self, record: UserRecord) -> Result<User> {
        let role_rows = sqlx::query_as::<_, RolePermissionRow>(
            r#"
            SELECT
                r.id AS role_id,
                r.name AS role_name,
                r.description AS role_description,
                r.is_active AS role_is_active,
                p.id AS permission_id,
                p.resource,
                p.action,
                p.description AS permission_description
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.user_id = $1
            ORDER BY r.id, p.id
            "#,
        )
        .bind(record.id)
        .fetch_all(&self.pool)
        .await?;

        let override_rows = sqlx::query_as::<_, PermissionOverrideRow>(
            r#"
            SELECT
                p.id AS permission_id,
                p.resource,
                p.action,
                p.description,
                up.allow
            FROM user_permissions up
            JOIN permissions p ON p.id = up.permission_id
            WHERE up.user_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(record.id)
        .fetch_all(&self.pool)
        .await?;

        let roles = group_role_rows(role_rows);
        let overrides = override_rows.into_iter().map(Into::into).collect();

        Ok(record.into_user(roles, overrides))
    }

    async fn load_all(&self, records: Vec<UserRecord>) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(records.len());
        for record in records {
            users.push(self.load_relations(record).await?);
        }
        Ok(users)
    }

    async fn current_security(&self, user_id: i64) -> Result<AccountSecurity> {
        let row = sqlx::query_as::<_, SecurityRow>(
            r#"
            SELECT login_attempts, locked_until
            FROM users
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| security_from_row(r.login_attempts, r.locked_until))
            .ok_or_else(|| DataError::UserNotFound(user_id))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip(self, email))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!(
            "SELECT {} FROM users WHERE email = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );
        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match record {
            Some(record) => Ok(Some(self.load_relations(record).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let query = format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );
        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match record {
            Some(record) => Ok(Some(self.load_relations(record).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, policy))]
    async fn record_failed_login(
        &self,
        user_id: i64,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<AccountSecurity> {
        let max_attempts = i32::try_from(policy.max_attempts).unwrap_or(i32::MAX);
        let lock_deadline = policy.lock_deadline(now);

        // 단일 UPDATE로 증가와 잠금을 처리. 잠금 중인 행은 갱신하지 않음.
        let updated = sqlx::query_as::<_, SecurityRow>(
            r#"
            UPDATE users
            SET
                login_attempts = CASE
                    WHEN locked_until IS NOT NULL THEN 1
                    ELSE login_attempts + 1
                END,
                locked_until = CASE
                    WHEN (CASE WHEN locked_until IS NOT NULL THEN 1 ELSE login_attempts + 1 END) >= $3::INTEGER
                        THEN $4::TIMESTAMPTZ
                    ELSE NULL
                END,
                updated_at = $2
            WHERE id = $1
              AND deleted_at IS NULL
              AND (locked_until IS NULL OR locked_until <= $2)
            RETURNING login_attempts, locked_until
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(max_attempts)
        .bind(lock_deadline)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => {
                debug!(attempts = row.login_attempts, "Failed login recorded");
                Ok(security_from_row(row.login_attempts, row.locked_until))
            }
            None => self.current_security(user_id).await,
        }
    }

    #[instrument(skip(self))]
    async fn record_successful_login(&self, user_id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET login_attempts = 0, locked_until = NULL, last_login_at = $2, updated_at = $2
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn unlock(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET login_attempts = 0, locked_until = NULL, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn list_users(&self, query: &UserQuery) -> Result<UserPage> {
        let list_query = format!(
            "SELECT {} FROM users WHERE {} ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
            USER_COLUMNS, LIST_FILTER
        );
        let records = sqlx::query_as::<_, UserRecord>(&list_query)
            .bind(query.active)
            .bind(query.role.as_deref())
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(&self.pool)
            .await?;

        let count_query = format!("SELECT COUNT(*) FROM users WHERE {}", LIST_FILTER);
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(query.active)
            .bind(query.role.as_deref())
            .fetch_one(&self.pool)
            .await?;

        Ok(UserPage {
            users: self.load_all(records).await?,
            total,
        })
    }

    #[instrument(skip(self, update))]
    async fn update_user(&self, user_id: i64, update: &UserUpdate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET
                email = COALESCE($2, email),
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(update.email.as_deref())
        .bind(update.first_name.as_deref())
        .bind(update.last_name.as_deref())
        .bind(update.is_active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn soft_delete(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// 목록/건수 조회 공통 조건. `$1` 활성 여부, `$2` 역할 이름 (NULL이면 무시).
const LIST_FILTER: &str = r#"
    deleted_at IS NULL
    AND ($1::BOOLEAN IS NULL OR is_active = $1)
    AND ($2::TEXT IS NULL OR EXISTS (
        SELECT 1 FROM user_roles ur
        JOIN roles r ON r.id = ur.role_id
        WHERE ur.user_id = users.id AND r.name = $2
    ))
"#;
