//! HTTP 라우터 통합 테스트.
//!
//! `create_api_router`를 메모리 저장소로 구성하여 요청/응답 형식과
//! 상태 코드 매핑을 확인합니다.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use warden_api::auth::{AuthService, MemoryRevocationStore};
use warden_api::routes::{create_api_router, RateLimits};
use warden_api::services::UserService;
use warden_api::state::AppState;
use warden_core::{JwtConfig, Permission, RateLimitSettings, Role, SecurityConfig, User};
use warden_data::MemoryUserStore;

// ============================================================================
// 테스트 헬퍼 함수
// ============================================================================

const ADMIN_EMAIL: &str = "admin@example.com";
const READER_EMAIL: &str = "reader@example.com";
const GUEST_EMAIL: &str = "guest@example.com";
const PASSWORD: &str = "password123";

async fn app_with(rate_limits: Option<RateLimits>) -> Router {
    let users = Arc::new(MemoryUserStore::new());
    let security = SecurityConfig {
        bcrypt_cost: 10,
        ..Default::default()
    };
    let service = AuthService::from_config(
        &JwtConfig::new(
            "http-test-access-secret-minimum-32-chars",
            "http-test-refresh-secret-minimum-32-chars",
        ),
        &security,
        users.clone(),
        Arc::new(MemoryRevocationStore::new()),
    )
    .unwrap();

    let hash = service.verifier().hash(PASSWORD).await.unwrap();
    let admin = Role::new(1, "admin")
        .with_permission(Permission::new(1, "users", "read"))
        .with_permission(Permission::new(2, "users", "update"))
        .with_permission(Permission::new(3, "users", "delete"));
    let reader = Role::new(2, "user").with_permission(Permission::new(1, "users", "read"));

    users
        .insert(User::new(1, ADMIN_EMAIL, hash.clone()).with_role(admin))
        .await;
    users
        .insert(User::new(2, READER_EMAIL, hash.clone()).with_role(reader))
        .await;
    // 역할 없는 사용자
    users.insert(User::new(3, GUEST_EMAIL, hash)).await;

    let state = Arc::new(AppState::new(
        Arc::new(service),
        Arc::new(UserService::new(users)),
    ));
    create_api_router(rate_limits).with_state(state)
}

async fn app() -> Router {
    app_with(None).await
}

fn json_request(method: Method, uri: &str, body: Value, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn authed(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, email: &str, password: &str) -> Response {
    app.clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/auth/login",
            json!({ "email": email, "password": password }),
            None,
        ))
        .await
        .unwrap()
}

async fn login_tokens(app: &Router, email: &str) -> (String, String) {
    let response = login(app, email, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    (
        body["access_token"].as_str().unwrap().to_string(),
        body["refresh_token"].as_str().unwrap().to_string(),
    )
}

// ============================================================================
// 로그인
// ============================================================================

#[tokio::test]
async fn test_login_response_shape() {
    let app = app().await;
    let response = login(&app, ADMIN_EMAIL, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_eq!(body["expires_in"], 900);

    let user = &body["user"];
    assert_eq!(user["id"], 1);
    assert_eq!(user["email"], ADMIN_EMAIL);
    assert_eq!(user["is_active"], true);
    assert_eq!(user["roles"], json!(["admin"]));
    assert_eq!(user["permissions"], json!(["users:delete", "users:read", "users:update"]));
    assert!(user["last_login_at"].is_string());

    // 민감한 필드는 직렬화되지 않음
    let raw = body.to_string();
    assert!(!raw.contains("password_hash"));
    assert!(!raw.contains("login_attempts"));
    assert!(!raw.contains("locked_until"));
    assert!(!raw.contains("$2"));
}

#[tokio::test]
async fn test_login_validation_errors() {
    let app = app().await;

    for body in [
        json!({ "email": "", "password": PASSWORD }),
        json!({ "email": ADMIN_EMAIL, "password": "" }),
        json!({ "email": ADMIN_EMAIL }),
        json!({ "email": "not-an-email", "password": PASSWORD }),
    ] {
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/api/v1/auth/login", body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "INVALID_REQUEST");
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_failures_share_generic_message() {
    let app = app().await;

    let unknown = login(&app, "nobody@example.com", PASSWORD).await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown = body_json(unknown).await;

    let wrong = login(&app, ADMIN_EMAIL, "wrong").await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong = body_json(wrong).await;

    assert_eq!(unknown["code"], wrong["code"]);
    assert_eq!(unknown["message"], wrong["message"]);
}

#[tokio::test]
async fn test_lockout_returns_forbidden() {
    let app = app().await;
    for _ in 0..5 {
        let response = login(&app, ADMIN_EMAIL, "wrong").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = login(&app, ADMIN_EMAIL, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "ACCOUNT_LOCKED");
}

// ============================================================================
// 토큰 갱신 / 로그아웃 / me
// ============================================================================

#[tokio::test]
async fn test_refresh_then_reuse() {
    let app = app().await;
    let (_, refresh_token) = login_tokens(&app, ADMIN_EMAIL).await;

    let request = || {
        json_request(
            Method::POST,
            "/api/v1/auth/refresh",
            json!({ "refresh_token": refresh_token }),
            None,
        )
    };

    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_ne!(body["refresh_token"], json!(refresh_token));

    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_logout_requires_bearer_and_revokes() {
    let app = app().await;
    let (access_token, refresh_token) = login_tokens(&app, ADMIN_EMAIL).await;
    let body = json!({ "refresh_token": refresh_token });

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/auth/logout", body.clone(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/auth/logout",
            body.clone(),
            Some(&access_token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(json_request(Method::POST, "/api/v1/auth/refresh", body, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_with_valid_and_invalid_tokens() {
    let app = app().await;
    let (access_token, refresh_token) = login_tokens(&app, READER_EMAIL).await;

    let get_me = |auth: Option<String>| {
        let mut builder = Request::builder().method(Method::GET).uri("/api/v1/auth/me");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    };

    let response = app
        .clone()
        .oneshot(get_me(Some(format!("Bearer {}", access_token))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], READER_EMAIL);
    assert_eq!(body["permissions"], json!(["users:read"]));

    let cases = [
        (None, "MISSING_TOKEN"),
        (Some(format!("Token {}", access_token)), "INVALID_AUTH_HEADER"),
        (Some("Bearer ".to_string()), "INVALID_AUTH_HEADER"),
        (Some("Bearer not.a.jwt".to_string()), "INVALID_TOKEN"),
        // Refresh Token은 Access Token으로 사용할 수 없음
        (Some(format!("Bearer {}", refresh_token)), "INVALID_TOKEN"),
    ];
    for (auth, code) in cases {
        let response = app.clone().oneshot(get_me(auth)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], code);
    }
}

// ============================================================================
// 프로필 / 관리
// ============================================================================

#[tokio::test]
async fn test_change_password_endpoint() {
    let app = app().await;
    let (access_token, _) = login_tokens(&app, READER_EMAIL).await;

    let change = |current: &str, new: &str| {
        json_request(
            Method::PUT,
            "/api/v1/profile/password",
            json!({ "current_password": current, "new_password": new }),
            Some(&access_token),
        )
    };

    let response = app.clone().oneshot(change("wrong", "newpassword1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.clone().oneshot(change(PASSWORD, "weak")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "WEAK_PASSWORD");

    let response = app.clone().oneshot(change(PASSWORD, "newpassword1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        login(&app, READER_EMAIL, "newpassword1").await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn test_unlock_requires_permission() {
    let app = app().await;
    let (admin_token, _) = login_tokens(&app, ADMIN_EMAIL).await;
    let (reader_token, _) = login_tokens(&app, READER_EMAIL).await;

    for _ in 0..5 {
        let _ = login(&app, READER_EMAIL, "wrong").await;
    }
    assert_eq!(
        login(&app, READER_EMAIL, PASSWORD).await.status(),
        StatusCode::FORBIDDEN
    );

    let unlock = |id: i64, token: &str| {
        Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/users/{}/unlock", id))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(unlock(2, &reader_token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "INSUFFICIENT_PERMISSION");

    let response = app.clone().oneshot(unlock(999, &admin_token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.clone().oneshot(unlock(2, &admin_token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    assert_eq!(
        login(&app, READER_EMAIL, PASSWORD).await.status(),
        StatusCode::OK
    );
}

// ============================================================================
// 프로필 / 사용자 관리
// ============================================================================

#[tokio::test]
async fn test_profile_get_and_update() {
    let app = app().await;
    let (token, _) = login_tokens(&app, READER_EMAIL).await;

    let response = app.clone().oneshot(authed(Method::GET, "/api/v1/profile", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], 2);

    // 본인 프로필 수정으로는 활성 상태를 바꿀 수 없음
    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/profile",
            json!({ "first_name": "Rita", "is_active": false }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.clone().oneshot(authed(Method::GET, "/api/v1/profile", &token)).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["first_name"], "Rita");
    assert_eq!(body["is_active"], true);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/profile",
            json!({ "email": ADMIN_EMAIL }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "EMAIL_EXISTS");

    let response = app
        .clone()
        .oneshot(json_request(Method::PUT, "/api/v1/profile", json!({}), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(Request::builder().uri("/api/v1/profile").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_users_filters_and_permission() {
    let app = app().await;
    let (reader_token, _) = login_tokens(&app, READER_EMAIL).await;
    let (guest_token, _) = login_tokens(&app, GUEST_EMAIL).await;

    let response = app
        .clone()
        .oneshot(authed(Method::GET, "/api/v1/users?limit=1", &reader_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
    assert!(!body.to_string().contains("password_hash"));

    let response = app
        .clone()
        .oneshot(authed(Method::GET, "/api/v1/users?role=admin&limit=500", &reader_token))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 10);
    assert_eq!(body["users"][0]["id"], 1);

    let response = app
        .clone()
        .oneshot(authed(Method::GET, "/api/v1/users?limit=abc", &reader_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_REQUEST");

    let response = app
        .oneshot(authed(Method::GET, "/api/v1/users", &guest_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "INSUFFICIENT_PERMISSION");
}

#[tokio::test]
async fn test_search_by_email() {
    let app = app().await;
    let (reader_token, _) = login_tokens(&app, READER_EMAIL).await;
    let (guest_token, _) = login_tokens(&app, GUEST_EMAIL).await;
    let search = |email: &str| format!("/api/v1/users/search/by-email?email={}", email);

    let response = app
        .clone()
        .oneshot(authed(Method::GET, &search(ADMIN_EMAIL), &reader_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], 1);

    let response = app
        .clone()
        .oneshot(authed(Method::GET, &search("nobody@example.com"), &reader_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(authed(Method::GET, "/api/v1/users/search/by-email", &reader_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(authed(Method::GET, &search(ADMIN_EMAIL), &guest_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_get_user_owner_or_reader() {
    let app = app().await;
    let (reader_token, _) = login_tokens(&app, READER_EMAIL).await;
    let (guest_token, _) = login_tokens(&app, GUEST_EMAIL).await;

    let response = app
        .clone()
        .oneshot(authed(Method::GET, "/api/v1/users/3", &guest_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], GUEST_EMAIL);

    let response = app
        .clone()
        .oneshot(authed(Method::GET, "/api/v1/users/1", &guest_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "ACCESS_DENIED");

    let response = app
        .clone()
        .oneshot(authed(Method::GET, "/api/v1/users/1", &reader_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(authed(Method::GET, "/api/v1/users/999", &reader_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_user_owner_and_admin() {
    let app = app().await;
    let (admin_token, _) = login_tokens(&app, ADMIN_EMAIL).await;
    let (reader_token, _) = login_tokens(&app, READER_EMAIL).await;
    let (guest_token, _) = login_tokens(&app, GUEST_EMAIL).await;
    let update = |id: i64, body: Value, token: &str| {
        json_request(Method::PUT, &format!("/api/v1/users/{}", id), body, Some(token))
    };

    let response = app
        .clone()
        .oneshot(update(3, json!({ "last_name": "Guest" }), &guest_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // 본인이라도 활성 상태 변경은 users:update 필요
    let response = app
        .clone()
        .oneshot(update(3, json!({ "is_active": true }), &guest_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "INSUFFICIENT_PERMISSION");

    let response = app
        .clone()
        .oneshot(update(3, json!({ "first_name": "X" }), &reader_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "ACCESS_DENIED");

    let response = app
        .clone()
        .oneshot(update(2, json!({ "email": ADMIN_EMAIL }), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(update(999, json!({ "first_name": "X" }), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(update(3, json!({ "is_active": false }), &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = login(&app, GUEST_EMAIL, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "USER_INACTIVE");
}

#[tokio::test]
async fn test_delete_user_requires_delete_permission() {
    let app = app().await;
    let (admin_token, _) = login_tokens(&app, ADMIN_EMAIL).await;
    let (reader_token, _) = login_tokens(&app, READER_EMAIL).await;

    let response = app
        .clone()
        .oneshot(authed(Method::DELETE, "/api/v1/users/3", &reader_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(authed(Method::DELETE, "/api/v1/users/3", &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(authed(Method::DELETE, "/api/v1/users/3", &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // 삭제된 사용자는 존재하지 않는 계정과 같은 응답
    let response = login(&app, GUEST_EMAIL, PASSWORD).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_CREDENTIALS");
}

// ============================================================================
// 요청 한도 / 헬스 체크
// ============================================================================

#[tokio::test]
async fn test_login_rate_limit() {
    let settings = RateLimitSettings {
        enabled: true,
        requests_per_minute: 1200,
        login_requests_per_minute: 5,
    };
    let app = app_with(RateLimits::from_settings(&settings)).await;

    for _ in 0..5 {
        let response = login(&app, "nobody@example.com", PASSWORD).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = login(&app, "nobody@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    // 다른 경로는 로그인 한도와 무관
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_disabled_rate_limit() {
    let settings = RateLimitSettings {
        enabled: false,
        ..Default::default()
    };
    assert!(RateLimits::from_settings(&settings).is_none());
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["components"]["database"]["status"], "not_configured");
}
