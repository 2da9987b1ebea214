//! 도메인 서비스 모듈.
//!
//! 인증 흐름([`crate::auth::AuthService`]) 밖의 사용자 관리 작업을 제공합니다.

pub mod users;

pub use users::{UserError, UserList, UserService};
