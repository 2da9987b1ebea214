//! 핵심 에러 타입.

use thiserror::Error;

/// 설정 단계 에러. 서버 시작 시 발생하면 치명적입니다.
#[derive(Debug, Error)]
pub enum WardenError {
    /// 값이 허용 범위를 벗어남 (비밀 키 길이, bcrypt 비용 등)
    #[error("잘못된 설정: {0}")]
    Config(String),

    /// 설정 파일이나 환경 변수를 읽거나 역직렬화하지 못함
    #[error("설정 로드 실패: {0}")]
    Load(#[from] config::ConfigError),
}

pub type WardenResult<T> = Result<T, WardenError>;
