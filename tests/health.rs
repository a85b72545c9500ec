//! Router-level tests: request-scoped sessions through the Axum extractor.

#![allow(clippy::panic)]

use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use tower::ServiceExt;
use tower_http::timeout::TimeoutLayer;

use habit_db::api;
use habit_db::app_state::AppState;
use habit_db::config::{EnvSource, Settings};
use habit_db::database::{Session, SessionProvider};

fn state(extra: &[(&'static str, &'static str)]) -> AppState {
    let mut pairs = vec![
        ("DATABASE_URL", "sqlite::memory:"),
        ("SECRET_KEY", "test-secret"),
        ("PROJECT_NAME", "Habit Test"),
    ];
    pairs.extend_from_slice(extra);
    let Ok(settings) = Settings::from_source(&EnvSource::from_pairs(pairs)) else {
        panic!("valid settings");
    };
    let Ok(sessions) = SessionProvider::from_settings(&settings) else {
        panic!("provider should build");
    };
    AppState::new(settings, sessions)
}

fn health_request() -> Request<Body> {
    let Ok(req) = Request::builder().uri("/health").body(Body::empty()) else {
        panic!("request");
    };
    req
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body");
    };
    let Ok(value) = serde_json::from_slice(&bytes) else {
        panic!("json body");
    };
    value
}

#[tokio::test]
async fn health_reports_settings_and_releases_session() {
    let state = state(&[]);
    let app = api::build_router().with_state(state.clone());

    let Ok(response) = app.oneshot(health_request()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["project"], "Habit Test");
    assert_eq!(body["version"], "1.0.0");
    assert_eq!(body["sessions"]["active"], 1);

    let stats = state.sessions.stats();
    assert_eq!(stats.acquired, 1);
    assert_eq!(stats.released, 1);
}

#[tokio::test]
async fn repeated_requests_share_one_pool() {
    let state = state(&[("DATABASE_MAX_CONNECTIONS", "1")]);
    let app = api::build_router().with_state(state.clone());

    let Ok(mut setup) = state.sessions.acquire_session().await else {
        panic!("acquire");
    };
    let created = sqlx::query("CREATE TABLE marker (id INTEGER)")
        .execute(&mut *setup)
        .await;
    assert!(created.is_ok());
    setup.release();

    for _ in 0..3 {
        let Ok(response) = app.clone().oneshot(health_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // The in-memory table survives only on the pool's single connection.
    let Ok(mut check) = state.sessions.acquire_session().await else {
        panic!("acquire");
    };
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM marker")
        .fetch_one(&mut *check)
        .await;
    assert!(matches!(count, Ok(0)));
    check.release();

    let stats = state.sessions.stats();
    assert_eq!(stats.acquired, 5);
    assert_eq!(stats.released, 5);
}

#[tokio::test]
async fn closed_pool_yields_service_unavailable() {
    let state = state(&[]);
    state.sessions.close().await;
    let app = api::build_router().with_state(state.clone());

    let Ok(response) = app.oneshot(health_request()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], 2003);
    assert_eq!(state.sessions.stats().failed, 1);
}

async fn slow_handler(_session: Session) -> StatusCode {
    tokio::time::sleep(Duration::from_secs(5)).await;
    StatusCode::OK
}

#[tokio::test]
async fn timed_out_request_releases_its_session() {
    let state = state(&[]);
    let app = axum::Router::new()
        .route("/slow", get(slow_handler))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_millis(50),
        ))
        .with_state(state.clone());

    let Ok(req) = Request::builder().uri("/slow").body(Body::empty()) else {
        panic!("request");
    };
    let Ok(response) = app.oneshot(req).await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

    let stats = state.sessions.stats();
    assert_eq!(stats.acquired, 1);
    assert_eq!(stats.released, 1);
}
