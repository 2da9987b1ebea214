//! 인증/인가 도메인 모델.

mod rbac;
mod security;
mod user;

pub use rbac::*;
pub use security::*;
pub use user::*;
