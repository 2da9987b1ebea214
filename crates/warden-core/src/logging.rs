//! 구조화 로깅 초기화.
//!
//! 출력 형식은 `logging.format`으로 고릅니다. 개발 환경은 `pretty`,
//! 로그 수집기로 보내는 운영 환경은 `json`을 사용합니다.
//!
//! 비밀번호, 해시, 토큰 문자열, 서명 키는 어떤 레벨에서도 기록하지 않습니다.

use tracing::Subscriber;
use tracing_subscriber::{
    filter::ParseError,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// 한 줄에 하나의 JSON 객체. span 필드가 이벤트에 평탄화됨
    Json,
    Compact,
}

/// 알 수 없는 로그 형식 이름.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log format `{0}` (expected pretty, json or compact)")]
pub struct UnknownLogFormat(pub String);

impl std::str::FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        [
            ("pretty", LogFormat::Pretty),
            ("json", LogFormat::Json),
            ("compact", LogFormat::Compact),
        ]
        .into_iter()
        .find(|(known, _)| name.eq_ignore_ascii_case(known))
        .map(|(_, format)| format)
        .ok_or_else(|| UnknownLogFormat(s.to_string()))
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "warden_api=debug,tower_http=info")
    pub level: String,
    pub format: LogFormat,
    /// 요청/인증 span의 생성과 종료를 이벤트로 기록
    pub with_span_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            format: LogFormat::default(),
            with_span_events: false,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        // 알 수 없는 형식은 기본값(pretty)으로 처리
        let format: LogFormat = config.format.parse().unwrap_or_default();
        // 운영(JSON) 환경에서는 span 종료 시 소요 시간을 남김
        Self::new(config.level.clone())
            .with_format(format)
            .with_span_events(format == LogFormat::Json)
    }
}

/// 로깅 초기화 에러.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("잘못된 로그 필터: {0}")]
    Filter(#[from] ParseError),
    #[error("전역 subscriber를 설치할 수 없습니다: {0}")]
    Init(#[from] TryInitError),
}

/// 형식별 fmt 레이어.
fn fmt_layer<S>(config: &LogConfig) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer().with_target(true).with_span_events(span_events);

    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        // span 필드(user_id, operation)를 각 이벤트에 함께 기록
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

/// 전역 tracing subscriber를 설치합니다.
///
/// `RUST_LOG`가 설정되어 있으면 `config.level`보다 우선합니다.
/// 프로세스당 한 번만 성공하며 두 번째 호출은 [`LoggingError::Init`].
pub fn init_logging(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer(&config))
        .try_init()?;

    tracing::debug!(format = ?config.format, filter = %config.level, "Logging ready");

    Ok(())
}

/// 인증 작업 컨텍스트 필드가 포함된 span을 생성하는 매크로.
///
/// ```ignore
/// let _span = warden_core::auth_span!("login", user_id).entered();
/// ```
#[macro_export]
macro_rules! auth_span {
    ($operation:expr) => {
        tracing::info_span!("auth", operation = $operation)
    };
    ($operation:expr, $user_id:expr) => {
        tracing::info_span!("auth", operation = $operation, user_id = %$user_id)
    };
}
