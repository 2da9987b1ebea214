//! # Warden Core
//!
//! 인증/세션/RBAC 백엔드의 핵심 도메인 모델 및 공통 인프라를 제공합니다.
//!
//! - 사용자, 역할, 권한 엔티티
//! - 계정 잠금 상태 머신
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
