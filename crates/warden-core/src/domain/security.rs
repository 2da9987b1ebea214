//! 계정 보안 상태 머신.
//!
//! 사용자별 로그인 실패 횟수와 잠금 만료 시각을 추적합니다.
//! 상태는 사용자 레코드와 함께 영속 저장소에 보관됩니다.
//!
//! ```text
//!             실패 (attempts + 1 < max)
//!            ┌──────────┐
//!            ▼          │
//!        Unlocked ──────┘
//!            │  실패 (attempts + 1 >= max)
//!            ▼
//!         Locked ── 만료 후 실패 ──▶ Unlocked(attempts = 1)
//!            │
//!            └─ 잠금 중 시도: 상태 변경 없음
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{SecurityConfig, MAX_LOCKOUT_DURATION_SECS};

/// 잠금 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// 잠금까지 허용되는 연속 실패 횟수
    pub max_attempts: u32,
    /// 잠금 지속 시간
    pub lockout_duration: Duration,
}

impl LockoutPolicy {
    /// 새 정책을 생성합니다.
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            max_attempts,
            lockout_duration,
        }
    }

    /// `now`에 시작한 잠금의 만료 시각. 표현 범위를 넘으면 최대 시각.
    pub fn lock_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.lockout_duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl From<&SecurityConfig> for LockoutPolicy {
    /// 잠금 시간은 상한으로 잘립니다.
    fn from(config: &SecurityConfig) -> Self {
        // 상한 이하이므로 i64 범위 안
        let secs = config.lockout_duration_secs.min(MAX_LOCKOUT_DURATION_SECS) as i64;
        Self::new(config.max_login_attempts, Duration::seconds(secs))
    }
}

/// 특정 시점의 잠금 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// 로그인 가능
    Unlocked,
    /// 잠금 만료 시각까지 로그인 불가
    Locked {
        /// 잠금 만료 시각
        until: DateTime<Utc>,
    },
}

/// 사용자별 보안 필드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountSecurity {
    /// 연속 로그인 실패 횟수
    pub failed_attempts: u32,
    /// 잠금 만료 시각
    pub locked_until: Option<DateTime<Utc>>,
}

impl AccountSecurity {
    /// 새 보안 상태를 생성합니다.
    pub fn new(failed_attempts: u32, locked_until: Option<DateTime<Utc>>) -> Self {
        Self {
            failed_attempts,
            locked_until,
        }
    }

    /// 초기화된(잠금 해제) 상태.
    pub fn unlocked() -> Self {
        Self::default()
    }

    /// `now` 시점의 잠금 상태를 반환합니다.
    pub fn state_at(&self, now: DateTime<Utc>) -> LockState {
        match self.locked_until {
            Some(until) if until > now => LockState::Locked { until },
            _ => LockState::Unlocked,
        }
    }

    /// `now` 시점에 잠겨 있는지 확인합니다.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state_at(now), LockState::Locked { .. })
    }

    /// 비밀번호 검증 실패 전이.
    ///
    /// 잠금 중에는 상태를 바꾸지 않습니다. 만료된 잠금 이후의 실패는
    /// 카운터를 1부터 다시 셉니다.
    #[must_use]
    pub fn register_failure(&self, policy: &LockoutPolicy, now: DateTime<Utc>) -> Self {
        if self.is_locked_at(now) {
            return *self;
        }

        let base = if self.locked_until.is_some() {
            0
        } else {
            self.failed_attempts
        };
        let failed_attempts = base.saturating_add(1);

        let locked_until = if failed_attempts >= policy.max_attempts {
            Some(policy.lock_deadline(now))
        } else {
            None
        };

        Self {
            failed_attempts,
            locked_until,
        }
    }

    /// 로그인 성공 전이 (카운터와 잠금 초기화).
    #[must_use]
    pub fn register_success(&self) -> Self {
        Self::unlocked()
    }
}
