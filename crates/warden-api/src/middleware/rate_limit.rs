//! 클라이언트 IP별 요청 한도.
//!
//! 토큰 버킷으로 구현합니다. 버킷 용량만큼 연속 요청이 허용되고 이후에는
//! 분당 한도 속도로 회복됩니다. 일반 API 한도와 로그인 한도는 서로 다른
//! [`RateLimitState`]를 사용하므로 로그인 시도가 일반 한도를 소모하지 않습니다.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ApiErrorResponse;

/// 요청 한도 설정.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    /// 기본 용량(초당 회복량, 최소 1)에 더해지는 연속 요청 허용량
    pub burst: u32,
    /// 이 시간 동안 요청이 없던 클라이언트의 버킷은 정리됨
    pub idle_ttl: Duration,
}

impl RateLimitConfig {
    /// 일반 API 한도. 분당 한도의 10%를 버스트로 허용합니다.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst: requests_per_minute / 10,
            idle_ttl: Duration::from_secs(60),
        }
    }

    /// 로그인 한도. 새 클라이언트는 분당 한도만큼 바로 시도할 수 있습니다.
    pub fn login(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            burst: requests_per_minute.saturating_sub(1),
            idle_ttl: Duration::from_secs(60),
        }
    }

    fn refill_per_sec(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }

    fn capacity(&self) -> f64 {
        self.refill_per_sec().max(1.0) + f64::from(self.burst)
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    updated_at: Instant,
}

/// 한도 확인 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// `retry_after`초 후 다시 시도 가능 (최소 1)
    Deny { retry_after: u64 },
}

/// IP별 토큰 버킷 모음.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<Mutex<HashMap<IpAddr, Bucket>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 토큰 하나를 소비합니다.
    pub async fn check(&self, ip: IpAddr) -> Decision {
        let now = Instant::now();
        let capacity = self.config.capacity();
        let refill = self.config.refill_per_sec();

        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.entry(ip).or_insert(Bucket {
            tokens: capacity,
            updated_at: now,
        });

        let elapsed = now.duration_since(bucket.updated_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * refill).min(capacity);
        bucket.updated_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Decision::Allow;
        }

        let wait = if refill > 0.0 {
            (1.0 - bucket.tokens) / refill
        } else {
            60.0
        };
        Decision::Deny {
            retry_after: (wait.ceil() as u64).max(1),
        }
    }

    /// 유휴 버킷을 제거하고 제거한 수를 반환합니다.
    pub async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let ttl = self.config.idle_ttl;
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.updated_at) < ttl);
        before - buckets.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

/// 미들웨어 상태.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: RateLimiter,
    /// 메트릭/로그 라벨 ("api" | "login")
    scope: &'static str,
}

impl RateLimitState {
    pub fn new(scope: &'static str, config: RateLimitConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config),
            scope,
        }
    }
}

/// 한도를 넘은 요청에 429와 `Retry-After`를 반환합니다.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    match state.limiter.check(ip).await {
        Decision::Allow => {
            counter!("rate_limit_requests_total", "scope" => state.scope, "decision" => "allow")
                .increment(1);
            next.run(request).await
        }
        Decision::Deny { retry_after } => {
            counter!("rate_limit_requests_total", "scope" => state.scope, "decision" => "deny")
                .increment(1);
            warn!(client_ip = %ip, scope = state.scope, retry_after, "Rate limit exceeded");

            (
                StatusCode::TOO_MANY_REQUESTS,
                [(RETRY_AFTER, HeaderValue::from(retry_after))],
                Json(ApiErrorResponse::with_details(
                    "RATE_LIMITED",
                    "too many requests",
                    serde_json::json!({ "retry_after": retry_after }),
                )),
            )
                .into_response()
        }
    }
}

/// 프록시 헤더의 원본 클라이언트 주소.
///
/// `X-Forwarded-For`의 첫 항목, 그다음 `X-Real-IP`.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());

    header("x-forwarded-for")
        .and_then(|chain| chain.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or_else(|| header("x-real-ip").and_then(|ip| ip.trim().parse().ok()))
}

fn client_ip(request: &Request) -> IpAddr {
    forwarded_ip(request.headers())
        .or_else(|| {
            // into_make_service_with_connect_info로 서빙될 때만 존재
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// 유휴 버킷을 주기적으로 정리합니다. `shutdown`이 취소되면 종료됩니다.
pub async fn run_cleanup_task(states: Vec<RateLimitState>, shutdown: CancellationToken) {
    let period = states
        .iter()
        .map(|state| state.limiter.config.idle_ttl)
        .min()
        .unwrap_or(Duration::from_secs(60));
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                for state in &states {
                    let evicted = state.limiter.evict_idle().await;
                    if evicted > 0 {
                        debug!(scope = state.scope, evicted, "Evicted idle rate limit buckets");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, middleware::from_fn_with_state, routing::post, Router};
    use tower::ServiceExt;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn config(requests_per_minute: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_minute,
            burst,
            idle_ttl: Duration::from_secs(60),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_then_deny() {
        // 용량 = 1 (초당) + 5 (버스트)
        let limiter = RateLimiter::new(config(60, 5));

        for i in 0..6 {
            assert_eq!(
                limiter.check(ip("192.168.1.1")).await,
                Decision::Allow,
                "request {} should pass",
                i
            );
        }
        assert_eq!(
            limiter.check(ip("192.168.1.1")).await,
            Decision::Deny { retry_after: 1 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clients_are_isolated() {
        let limiter = RateLimiter::new(config(60, 0));

        assert_eq!(limiter.check(ip("192.168.1.1")).await, Decision::Allow);
        assert!(matches!(
            limiter.check(ip("192.168.1.1")).await,
            Decision::Deny { .. }
        ));
        assert_eq!(limiter.check(ip("192.168.1.2")).await, Decision::Allow);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_over_time() {
        // 초당 100회
        let limiter = RateLimiter::new(config(6000, 0));
        let client = ip("192.168.1.1");

        for _ in 0..100 {
            let _ = limiter.check(client).await;
        }
        assert!(matches!(limiter.check(client).await, Decision::Deny { .. }));

        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(limiter.check(client).await, Decision::Allow);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_limit_allows_exactly_n_per_minute() {
        let limiter = RateLimiter::new(RateLimitConfig::login(5));
        let client = ip("10.0.0.1");

        for i in 0..5 {
            assert_eq!(
                limiter.check(client).await,
                Decision::Allow,
                "login attempt {} should pass",
                i
            );
        }

        // 분당 5회 = 12초에 1회 회복
        assert_eq!(
            limiter.check(client).await,
            Decision::Deny { retry_after: 12 }
        );

        tokio::time::advance(Duration::from_secs(12)).await;
        assert_eq!(limiter.check(client).await, Decision::Allow);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle() {
        let limiter = RateLimiter::new(RateLimitConfig {
            idle_ttl: Duration::from_millis(10),
            ..config(60, 0)
        });

        let _ = limiter.check(ip("192.168.1.1")).await;
        assert_eq!(limiter.tracked_clients().await, 1);

        tokio::time::advance(Duration::from_millis(20)).await;
        let _ = limiter.check(ip("192.168.1.2")).await;

        assert_eq!(limiter.evict_idle().await, 1);
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[test]
    fn test_config_presets() {
        let general = RateLimitConfig::per_minute(600);
        assert_eq!(general.burst, 60);

        let login = RateLimitConfig::login(5);
        assert_eq!(login.burst, 4);
        assert_eq!(login.capacity(), 5.0);

        // 분당 0회 설정도 첫 요청은 받을 수 있음
        assert_eq!(RateLimitConfig::login(0).capacity(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_middleware_rejects_with_retry_after() {
        let state = RateLimitState::new("login", config(60, 0));
        let app = Router::new()
            .route("/login", post(|| async { "ok" }))
            .layer(from_fn_with_state(state, rate_limit_middleware));

        let request = || {
            axum::http::Request::post("/login")
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[RETRY_AFTER], "1");
    }

    #[test]
    fn test_client_ip_sources() {
        let forwarded = axum::http::Request::builder()
            .header("x-forwarded-for", "198.51.100.4, 10.0.0.1")
            .header("x-real-ip", "192.0.2.9")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&forwarded), ip("198.51.100.4"));

        let real_ip = axum::http::Request::builder()
            .header("x-forwarded-for", "garbage")
            .header("x-real-ip", "192.0.2.9")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&real_ip), ip("192.0.2.9"));

        let mut direct = axum::http::Request::builder().body(Body::empty()).unwrap();
        direct
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 20], 5123))));
        assert_eq!(client_ip(&direct), ip("203.0.113.20"));

        let bare = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&bare), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
}
