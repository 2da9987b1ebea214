//! 인증 및 권한 부여.
//!
//! JWT 기반 인증과 역할 기반 접근 제어(RBAC)를 제공합니다.
//!
//! # 구성 요소
//!
//! - [`TokenCodec`]: Access/Refresh Token 발급 및 검증
//! - [`CredentialVerifier`]: bcrypt 해시 생성 및 검증
//! - [`resolve_effective_permissions`]: 역할과 오버라이드로부터 유효 권한 계산
//! - [`RevocationStore`]: Refresh Token 폐기 목록
//! - [`AuthService`]: 로그인, 토큰 갱신, 로그아웃 흐름
//! - [`JwtAuth`]: Axum 핸들러용 Bearer 토큰 추출기
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! async fn protected_handler(
//!     JwtAuth(claims): JwtAuth,
//! ) -> impl IntoResponse {
//!     format!("Hello, {}!", claims.email)
//! }
//! ```

mod jwt;
mod middleware;
mod password;
mod permissions;
mod revocation;
mod service;

pub use jwt::{Claims, TokenCodec, TokenError, TokenPair, TokenType};
pub use middleware::{require_ownership_or_permission, require_permission, JwtAuth, JwtAuthError};
pub use password::{validate_password_strength, CredentialVerifier, PasswordError};
pub use permissions::{
    active_role_names, has_permission, resolve_effective_permissions, WILDCARD_PERMISSIONS,
};
pub use revocation::{
    MemoryRevocationStore, RedisRevocationStore, RevocationStore, REVOCATION_KEY_PREFIX,
};
pub use service::{AuthError, AuthService, LoginResponse, UserInfo};
