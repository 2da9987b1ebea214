//! 비밀번호 해싱 및 검증.
//!
//! bcrypt 기반이며 비용 계수는 설정으로 조정합니다.
//! 해싱은 CPU 집약적이므로 blocking 스레드 풀에서 실행합니다.

use std::sync::Arc;

use warden_core::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};

/// 비밀번호 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("bcrypt 비용 계수가 허용 범위를 벗어났습니다: {0}")]
    InvalidCost(u32),
    #[error("비밀번호 해싱 실패")]
    HashingFailed,
    #[error("잘못된 해시 형식")]
    InvalidHashFormat,
    #[error("해싱 작업이 중단되었습니다")]
    TaskAborted,
}

/// 자격 증명 검증기.
///
/// 존재하지 않는 사용자에 대해서도 동일한 비용의 검증을 수행할 수 있도록
/// 생성 시점에 더미 해시를 준비합니다.
#[derive(Clone)]
pub struct CredentialVerifier {
    cost: u32,
    dummy_hash: Arc<str>,
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    /// 새 검증기를 생성합니다. 비용 계수가 10..=15 범위를 벗어나면 실패합니다.
    pub fn new(cost: u32) -> Result<Self, PasswordError> {
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
            return Err(PasswordError::InvalidCost(cost));
        }

        let seed: [u8; 16] = rand::random();
        let dummy_hash =
            bcrypt::hash(hex::encode(seed), cost).map_err(|_| PasswordError::HashingFailed)?;

        Ok(Self {
            cost,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// 설정된 비용 계수.
    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// 비밀번호를 해싱합니다.
    pub async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let password = password.to_owned();
        let cost = self.cost;

        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|_| PasswordError::TaskAborted)?
            .map_err(|_| PasswordError::HashingFailed)
    }

    /// 비밀번호를 저장된 해시와 비교합니다.
    ///
    /// 불일치는 `Ok(false)`이며, 해시 자체를 해석할 수 없는 경우에만 에러입니다.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let password = password.to_owned();
        let hash = hash.to_owned();

        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|_| PasswordError::TaskAborted)?
            .map_err(|_| PasswordError::InvalidHashFormat)
    }

    /// 더미 해시에 대해 검증을 수행합니다. 결과는 버립니다.
    pub async fn verify_dummy(&self, password: &str) {
        let dummy_hash = self.dummy_hash.clone();
        let _ = self.verify(password, &dummy_hash).await;
    }
}

/// 비밀번호 강도 검증.
///
/// # 요구사항
///
/// - 최소 8자 이상
/// - 최소 1개의 숫자 포함
/// - 최소 1개의 영문자 포함
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("비밀번호는 최소 8자 이상이어야 합니다");
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("비밀번호에 최소 1개의 숫자가 포함되어야 합니다");
    }

    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err("비밀번호에 최소 1개의 영문자가 포함되어야 합니다");
    }

    Ok(())
}
