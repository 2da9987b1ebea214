//! Warden 인증 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다.
//! 로그인, 토큰 갱신, 로그아웃, 권한 기반 관리 엔드포인트를 제공합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use warden_api::auth::{AuthService, RedisRevocationStore};
use warden_api::metrics::setup_metrics_recorder;
use warden_api::middleware::{metrics_layer, run_cleanup_task};
use warden_api::openapi::swagger_ui_router;
use warden_api::routes::{create_api_router, RateLimits};
use warden_api::services::UserService;
use warden_api::state::AppState;
use warden_core::{init_logging, AppConfig, LogConfig};
use warden_data::{Database, PgUserStore, RedisCache};

/// CORS 레이어 생성.
///
/// CORS_ORIGINS 환경변수가 설정되어 있으면 해당 origin만 허용합니다.
/// 설정되지 않으면 개발 모드로 간주하여 모든 origin을 허용합니다.
///
/// # 환경변수
///
/// - `CORS_ORIGINS`: 쉼표로 구분된 허용 origin 목록
///   예: `https://app.example.com,https://admin.example.com`
fn cors_layer() -> CorsLayer {
    let origins: Vec<_> = std::env::var("CORS_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    let restricted = !origins.is_empty();
    let allow_origin = if restricted {
        info!("CORS configured with {} allowed origins", origins.len());
        AllowOrigin::list(origins)
    } else {
        warn!("CORS_ORIGINS not set, allowing any origin (development mode)");
        AllowOrigin::any()
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
            axum::http::header::ACCEPT,
        ])
        // 와일드카드 origin과 함께 사용할 수 없음
        .allow_credentials(restricted)
        .max_age(Duration::from_secs(3600))
}

/// /metrics 엔드포인트 핸들러.
async fn metrics_handler(
    axum::extract::State(handle): axum::extract::State<PrometheusHandle>,
) -> String {
    handle.render()
}

/// 전체 라우터 생성.
fn create_router(
    state: Arc<AppState>,
    metrics_handle: PrometheusHandle,
    rate_limits: Option<RateLimits>,
    request_timeout: Duration,
) -> Router {
    // 메트릭 라우터 (별도 상태, Rate Limit 제외)
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics_handle);

    Router::new()
        .merge(metrics_router)
        .merge(create_api_router(rate_limits).with_state(state))
        .merge(swagger_ui_router())
        .layer(middleware::from_fn(metrics_layer))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    init_logging(LogConfig::from(&config.logging)).context("failed to initialize logging")?;

    info!("Starting Warden API server...");

    let metrics_handle =
        setup_metrics_recorder().context("failed to install Prometheus recorder")?;
    info!("Prometheus metrics recorder initialized");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host/server.port")?;

    // 데이터베이스 연결 및 마이그레이션
    let database = Database::connect(&config.database)
        .await
        .context("failed to connect to PostgreSQL")?;
    database
        .migrate()
        .await
        .context("failed to run database migrations")?;
    info!("Database connected and migrated");

    // 폐기 목록 저장소 연결 (PING 실패 시 시작 중단)
    let cache = Arc::new(
        RedisCache::connect(&config.redis)
            .await
            .context("failed to connect to Redis")?,
    );
    cache.ping().await.context("Redis PING failed")?;
    info!("Redis connected");

    let user_store = Arc::new(PgUserStore::new(database.pool().clone()));
    let auth = AuthService::from_config(
        &config.jwt,
        &config.security,
        user_store.clone(),
        Arc::new(RedisRevocationStore::new(cache.clone())),
    )
    .context("failed to build authentication service")?;

    let state = Arc::new(
        AppState::new(Arc::new(auth), Arc::new(UserService::new(user_store)))
            .with_database(database.clone())
            .with_cache(cache),
    );
    info!(version = %state.version, "Application state initialized");

    // 전역 종료 토큰 생성 (백그라운드 태스크에 종료 전파)
    let shutdown_token = CancellationToken::new();

    let rate_limits = RateLimits::from_settings(&config.rate_limit);
    match &rate_limits {
        Some(limits) => {
            info!(
                requests_per_minute = config.rate_limit.requests_per_minute,
                login_requests_per_minute = config.rate_limit.login_requests_per_minute,
                "Rate limiting configured"
            );
            tokio::spawn(run_cleanup_task(
                vec![limits.general.clone(), limits.login.clone()],
                shutdown_token.clone(),
            ));
        }
        None => info!("Rate limiting DISABLED"),
    }

    let app = create_router(
        state,
        metrics_handle,
        rate_limits,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    info!(%addr, "API server listening");
    info!("Swagger UI available at http://{}/swagger-ui", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
    .await?;

    shutdown_token.cancel();
    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
    info!("Shutdown signal propagated to background tasks");
}
