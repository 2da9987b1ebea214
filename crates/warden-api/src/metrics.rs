//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 인증 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// # 반환값
///
/// `/metrics` 엔드포인트에서 메트릭을 렌더링하기 위한 `PrometheusHandle`.
/// 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        // HTTP 요청 지속 시간 히스토그램 버킷 설정
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .install_recorder()
}

/// 라우트 템플릿에 매칭되지 않은 요청(404 등)의 라벨.
///
/// 원시 경로를 라벨로 쓰면 스캐너 요청만으로 시계열이 무한히 늘어납니다.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// 완료된 HTTP 요청 하나를 기록합니다.
///
/// - `http_requests_total{method, route, status}`
/// - `http_request_duration_seconds{method, route}`
pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(duration_secs);
}

// ============================================================================
// 인증 메트릭 헬퍼 함수
// ============================================================================

/// 로그인 시도 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    InvalidCredentials,
    Inactive,
    Locked,
    Error,
}

impl LoginOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginOutcome::Success => "success",
            LoginOutcome::InvalidCredentials => "invalid_credentials",
            LoginOutcome::Inactive => "inactive",
            LoginOutcome::Locked => "locked",
            LoginOutcome::Error => "error",
        }
    }
}

/// 로그인 시도 카운터 증가.
pub fn record_login_attempt(outcome: LoginOutcome) {
    counter!("auth_login_attempts_total", "outcome" => outcome.as_str()).increment(1);
}

/// 토큰 갱신 카운터 증가 (`success` / `rejected` / `error`).
pub fn record_token_refresh(outcome: &'static str) {
    counter!("auth_token_refresh_total", "outcome" => outcome).increment(1);
}

/// 계정 잠금 카운터 증가.
pub fn record_account_lockout() {
    counter!("auth_account_lockouts_total").increment(1);
}
