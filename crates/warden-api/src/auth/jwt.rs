//! JWT 토큰 코덱.
//!
//! Access Token 및 Refresh Token 생성/검증 로직.
//!
//! 두 토큰은 서로 다른 비밀 키로 서명되며, `token_type` 클레임으로도 구분됩니다.
//! 토큰에 담긴 권한은 발급 시점의 스냅샷이며 검증 시 다시 조회하지 않습니다.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use warden_core::{JwtConfig, MAX_TOKEN_TTL_SECS};

use super::permissions::has_permission;

/// 허용되는 서명 알고리즘 (HMAC 계열만).
const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// 토큰 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT 페이로드.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// 사용자 ID
    pub user_id: i64,
    /// 이메일
    pub email: String,
    /// 발급 시점의 유효 권한 (`"resource:action"`)
    pub permissions: Vec<String>,
    /// 토큰 종류
    pub token_type: TokenType,
    /// JWT ID - 128비트 난수 (hex)
    pub jti: String,
    /// Issuer
    pub iss: String,
    /// Subject - 사용자 ID 문자열
    pub sub: String,
    /// Issued At (Unix timestamp)
    pub iat: i64,
    /// Not Before (= iat)
    pub nbf: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// 특정 권한을 가지는지 확인 (와일드카드 포함).
    pub fn has_permission(&self, required: &str) -> bool {
        has_permission(&self.permissions, required)
    }

    /// 남은 유효 시간 (초). 이미 만료되었으면 0.
    pub fn remaining_secs(&self) -> u64 {
        u64::try_from(self.exp - Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Access Token + Refresh Token 쌍.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    /// Access Token
    pub access_token: String,
    /// Refresh Token
    pub refresh_token: String,
    /// Access Token 만료 시간 (초)
    pub expires_in: i64,
}

/// 토큰 처리 에러.
///
/// `Malformed`/`Expired`/`Invalid` 구분은 로깅용이며 API 응답에서는 하나로 합쳐집니다.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("잘못된 토큰 형식")]
    Malformed,
    #[error("토큰이 만료되었습니다")]
    Expired,
    #[error("유효하지 않은 토큰")]
    Invalid,
    #[error("토큰 인코딩 실패: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Malformed,
            _ => TokenError::Invalid,
        }
    }
}

/// 토큰 발급/검증기.
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    issuer: String,
    validation: Validation,
}

impl TokenCodec {
    /// 설정에서 코덱을 생성합니다. 설정은 사전에 검증되어 있어야 합니다.
    ///
    /// 수명은 `MAX_TOKEN_TTL_SECS`로 잘립니다.
    pub fn from_config(config: &JwtConfig) -> Self {
        let access = config.access_secret.expose_secret().as_bytes();
        let refresh = config.refresh_secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ALLOWED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Self {
            access_encoding: EncodingKey::from_secret(access),
            access_decoding: DecodingKey::from_secret(access),
            refresh_encoding: EncodingKey::from_secret(refresh),
            refresh_decoding: DecodingKey::from_secret(refresh),
            access_ttl_secs: ttl_secs(config.access_ttl_secs),
            refresh_ttl_secs: ttl_secs(config.refresh_ttl_secs),
            issuer: config.issuer.clone(),
            validation,
        }
    }

    /// Refresh Token 수명 (초).
    pub fn refresh_ttl_secs(&self) -> u64 {
        u64::try_from(self.refresh_ttl_secs).unwrap_or(0)
    }

    /// Access Token + Refresh Token 쌍을 발급합니다.
    pub fn issue_token_pair(
        &self,
        user_id: i64,
        email: &str,
        permissions: &[String],
    ) -> Result<TokenPair, TokenError> {
        let access = self.claims(user_id, email, permissions, TokenType::Access);
        let refresh = self.claims(user_id, email, permissions, TokenType::Refresh);

        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            expires_in: self.access_ttl_secs,
        })
    }

    /// Access Token을 검증합니다.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, TokenType::Access)
    }

    /// Refresh Token을 검증합니다.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, TokenType::Refresh)
    }

    fn claims(
        &self,
        user_id: i64,
        email: &str,
        permissions: &[String],
        token_type: TokenType,
    ) -> Claims {
        let now = Utc::now().timestamp();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };

        Claims {
            user_id,
            email: email.to_string(),
            permissions: permissions.to_vec(),
            token_type,
            jti: generate_jti(),
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(ttl),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let key = match claims.token_type {
            TokenType::Access => &self.access_encoding,
            TokenType::Refresh => &self.refresh_encoding,
        };

        encode(&Header::new(Algorithm::HS256), claims, key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let key = match expected {
            TokenType::Access => &self.access_decoding,
            TokenType::Refresh => &self.refresh_decoding,
        };

        let claims = decode::<Claims>(token, key, &self.validation)?.claims;

        if claims.token_type != expected || claims.sub != claims.user_id.to_string() {
            return Err(TokenError::Invalid);
        }

        Ok(claims)
    }
}

fn ttl_secs(secs: u64) -> i64 {
    i64::try_from(secs.min(MAX_TOKEN_TTL_SECS)).unwrap_or(i64::MAX)
}

/// 128비트 난수 토큰 ID.
fn generate_jti() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}
