//! HTTP 요청 metrics middleware.
//!
//! 라우트 템플릿(`/api/v1/users/{id}/unlock`)을 라벨로 사용합니다.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

use crate::metrics::{record_http_request, UNMATCHED_ROUTE};

/// 요청 수, 상태 코드, 처리 시간을 기록합니다.
pub async fn metrics_layer(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned());

    let response = next.run(request).await;

    record_http_request(
        method.as_str(),
        route.as_deref().unwrap_or(UNMATCHED_ROUTE),
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
