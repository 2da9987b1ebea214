//! 인증 서비스.
//!
//! 로그인, 토큰 갱신, 로그아웃, 현재 사용자 조회를 조합하는 진입점입니다.
//! 호출 단위로 상태가 없으며, 변경 가능한 상태는 모두 사용자 저장소와
//! 폐기 저장소에 있습니다.
//!
//! 저장소 I/O 실패는 재시도 없이 `AuthError::Internal`로 전달됩니다.
//! 호출자가 future를 drop하면 진행 중인 I/O도 취소되지만, 이미 시작된
//! 비밀번호 해싱은 blocking 스레드에서 끝까지 실행됩니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};
use utoipa::ToSchema;
use warden_core::{auth_span, JwtConfig, LockoutPolicy, SecurityConfig, User};
use warden_data::{DataError, UserStore};

use super::jwt::{Claims, TokenCodec, TokenError, TokenPair};
use super::password::{validate_password_strength, CredentialVerifier, PasswordError};
use super::permissions::{active_role_names, resolve_effective_permissions};
use super::revocation::RevocationStore;
use crate::metrics::{
    record_account_lockout, record_login_attempt, record_token_refresh, LoginOutcome,
};

/// 인증 에러.
///
/// 메시지는 사용자에게 그대로 노출되므로 내부 원인을 담지 않습니다.
/// `Internal`의 상세 내용은 로그에만 기록됩니다.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("이메일 또는 비밀번호가 올바르지 않습니다")]
    InvalidCredentials,
    #[error("비활성화된 계정입니다")]
    UserInactive,
    #[error("계정이 잠겨 있습니다")]
    AccountLocked,
    #[error("유효하지 않은 토큰입니다")]
    TokenNotFound,
    #[error("사용자를 찾을 수 없습니다")]
    UserNotFound,
    #[error("{0}")]
    WeakPassword(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DataError> for AuthError {
    fn from(err: DataError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// 응답용 사용자 정보.
///
/// 비밀번호 해시, 로그인 실패 횟수, 잠금 시각은 포함하지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    /// 활성 역할 이름
    pub roles: Vec<String>,
    /// 유효 권한 (정렬됨)
    pub permissions: Vec<String>,
}

impl UserInfo {
    pub(crate) fn from_user(user: &User, permissions: Vec<String>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_active: user.is_active_account(),
            email_verified: user.email_verified,
            last_login_at: user.last_login_at,
            roles: active_role_names(user),
            permissions,
        }
    }
}

/// 로그인/갱신 응답.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access Token 만료 시간 (초)
    pub expires_in: i64,
    pub user: UserInfo,
}

impl LoginResponse {
    fn new(pair: TokenPair, user: UserInfo) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            expires_in: pair.expires_in,
            user,
        }
    }
}

/// 인증 서비스.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    revocations: Arc<dyn RevocationStore>,
    codec: TokenCodec,
    verifier: CredentialVerifier,
    lockout: LockoutPolicy,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        revocations: Arc<dyn RevocationStore>,
        codec: TokenCodec,
        verifier: CredentialVerifier,
        lockout: LockoutPolicy,
    ) -> Self {
        Self {
            users,
            revocations,
            codec,
            verifier,
            lockout,
        }
    }

    /// 설정에서 서비스를 구성합니다. 비용 계수가 범위를 벗어나면 실패합니다.
    pub fn from_config(
        jwt: &JwtConfig,
        security: &SecurityConfig,
        users: Arc<dyn UserStore>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Result<Self, PasswordError> {
        Ok(Self::new(
            users,
            revocations,
            TokenCodec::from_config(jwt),
            CredentialVerifier::new(security.bcrypt_cost)?,
            LockoutPolicy::from(security),
        ))
    }

    /// 자격 증명 검증기.
    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    /// 이메일/비밀번호로 로그인합니다.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let result = self
            .login_inner(email, password)
            .instrument(auth_span!("login"))
            .await;

        let outcome = match &result {
            Ok(_) => LoginOutcome::Success,
            Err(AuthError::InvalidCredentials) => LoginOutcome::InvalidCredentials,
            Err(AuthError::UserInactive) => LoginOutcome::Inactive,
            Err(AuthError::AccountLocked) => LoginOutcome::Locked,
            Err(_) => LoginOutcome::Error,
        };
        record_login_attempt(outcome);

        result
    }

    async fn login_inner(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let now = Utc::now();

        let Some(user) = self.users.find_by_email(email).await? else {
            // 사용자 존재 여부가 응답 시간으로 드러나지 않도록 동일한 검증 수행
            self.verifier.verify_dummy(password).await;
            debug!("Login failed: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active_account() {
            debug!(user_id = user.id, "Login rejected: inactive account");
            return Err(AuthError::UserInactive);
        }
        if user.is_locked_at(now) {
            debug!(user_id = user.id, "Login rejected: account locked");
            return Err(AuthError::AccountLocked);
        }

        if !self.verifier.verify(password, &user.password_hash).await? {
            let state = self
                .users
                .record_failed_login(user.id, &self.lockout, now)
                .await?;

            if state.is_locked_at(now) {
                record_account_lockout();
                warn!(
                    user_id = user.id,
                    attempts = state.failed_attempts,
                    "Account locked after repeated login failures"
                );
            } else {
                debug!(
                    user_id = user.id,
                    attempts = state.failed_attempts,
                    "Login failed: wrong password"
                );
            }
            return Err(AuthError::InvalidCredentials);
        }

        self.users.record_successful_login(user.id, now).await?;

        let permissions: Vec<String> = resolve_effective_permissions(&user).into_iter().collect();
        let pair = self.issue(&user, &permissions)?;

        let mut info = UserInfo::from_user(&user, permissions);
        info.last_login_at = Some(now);

        info!(user_id = user.id, "Login succeeded");
        Ok(LoginResponse::new(pair, info))
    }

    /// Refresh Token으로 새 토큰 쌍을 발급합니다.
    ///
    /// 제시된 Refresh Token은 한 번만 사용할 수 있습니다.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<LoginResponse, AuthError> {
        let result = self
            .refresh_inner(refresh_token)
            .instrument(auth_span!("refresh"))
            .await;

        record_token_refresh(match &result {
            Ok(_) => "success",
            Err(AuthError::Internal(_)) => "error",
            Err(_) => "rejected",
        });

        result
    }

    async fn refresh_inner(&self, refresh_token: &str) -> Result<LoginResponse, AuthError> {
        let claims = self
            .codec
            .validate_refresh_token(refresh_token)
            .map_err(|e| {
                debug!(reason = %e, "Refresh token rejected");
                AuthError::TokenNotFound
            })?;

        if self.revocations.is_revoked(refresh_token).await? {
            debug!(user_id = claims.user_id, "Refresh token already revoked");
            return Err(AuthError::TokenNotFound);
        }

        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !user.can_login_at(Utc::now()) {
            return Err(AuthError::UserInactive);
        }

        // 동시 갱신 요청 중 하나만 통과
        if !self
            .revocations
            .try_revoke(refresh_token, revocation_ttl(&claims))
            .await?
        {
            debug!(user_id = user.id, "Refresh token reused concurrently");
            return Err(AuthError::TokenNotFound);
        }

        let permissions: Vec<String> = resolve_effective_permissions(&user).into_iter().collect();
        let pair = self.issue(&user, &permissions)?;

        info!(user_id = user.id, "Token pair rotated");
        Ok(LoginResponse::new(pair, UserInfo::from_user(&user, permissions)))
    }

    /// Refresh Token을 폐기합니다.
    ///
    /// 이미 폐기되었거나 형식이 잘못된 토큰도 에러 없이 처리됩니다.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let ttl = match self.codec.validate_refresh_token(refresh_token) {
            Ok(claims) => revocation_ttl(&claims),
            Err(_) => Duration::from_secs(self.codec.refresh_ttl_secs()),
        };

        self.revocations
            .revoke(refresh_token, ttl)
            .instrument(auth_span!("logout"))
            .await?;

        Ok(())
    }

    /// Access Token을 검증합니다. 저장소를 조회하지 않습니다.
    pub fn validate_token(&self, access_token: &str) -> Result<Claims, TokenError> {
        self.codec.validate_access_token(access_token)
    }

    /// 현재 사용자 정보를 조회합니다.
    pub async fn get_current_user(&self, user_id: i64) -> Result<UserInfo, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .instrument(auth_span!("me", user_id))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let permissions = resolve_effective_permissions(&user).into_iter().collect();
        Ok(UserInfo::from_user(&user, permissions))
    }

    /// 계정 잠금을 해제합니다 (관리 작업).
    pub async fn unlock_account(&self, user_id: i64) -> Result<(), AuthError> {
        if !self
            .users
            .unlock(user_id)
            .instrument(auth_span!("unlock", user_id))
            .await?
        {
            return Err(AuthError::UserNotFound);
        }

        info!(user_id, "Account unlocked");
        Ok(())
    }

    /// 비밀번호를 변경합니다.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let span = auth_span!("change_password", user_id);
        async {
            let user = self
                .users
                .find_by_id(user_id)
                .await?
                .ok_or(AuthError::UserNotFound)?;

            if !self
                .verifier
                .verify(current_password, &user.password_hash)
                .await?
            {
                return Err(AuthError::InvalidCredentials);
            }

            validate_password_strength(new_password).map_err(AuthError::WeakPassword)?;

            let hash = self.verifier.hash(new_password).await?;
            if !self.users.update_password_hash(user_id, &hash).await? {
                return Err(AuthError::UserNotFound);
            }

            info!("Password changed");
            Ok(())
        }
        .instrument(span)
        .await
    }

    fn issue(&self, user: &User, permissions: &[String]) -> Result<TokenPair, AuthError> {
        self.codec
            .issue_token_pair(user.id, &user.email, permissions)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}

/// 토큰의 남은 수명 (최소 1초).
fn revocation_ttl(claims: &Claims) -> Duration {
    Duration::from_secs(claims.remaining_secs().max(1))
}
