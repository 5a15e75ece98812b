mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use blaze::auth::session;
use blaze::config::Config;
use blaze::routes;
use blaze::state::AppState;
use common::TestApp;
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(app: &TestApp) -> Router {
    routes::app(AppState {
        db: app.pool.clone(),
        config: Config::default(),
        graphql_schema: app.schema.clone(),
    })
}

fn graphql_request(token: Option<&str>, query: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/graphql")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(json!({ "query": query }).to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 64).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_reports_ok() {
    let app = TestApp::new();
    let response = router(&app)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_bearer_token_identifies_caller() {
    let app = TestApp::new();
    let alice = app.add_user("user-a", "alice");
    let token = session::create_session(&app.pool, &alice.id, 1).unwrap();

    let response = router(&app)
        .oneshot(graphql_request(Some(&token), "{ user { me { id username } } }"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["user"]["me"], json!({ "id": "user-a", "username": "alice" }));

    let response = router(&app)
        .oneshot(graphql_request(None, "{ user { me { id } } }"))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_session_cookie_identifies_caller() {
    let app = TestApp::new();
    let alice = app.add_user("user-a", "alice");
    let token = session::create_session(&app.pool, &alice.id, 1).unwrap();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/graphql")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, format!("theme=dark; blaze_session={token}"))
        .body(Body::from(json!({ "query": "{ user { me { id } } }" }).to_string()))
        .unwrap();
    let body = json_body(router(&app).oneshot(request).await.unwrap()).await;
    assert_eq!(body["data"]["user"]["me"]["id"], "user-a");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    let alice = app.add_user("user-a", "alice");
    let token = session::create_session(&app.pool, &alice.id, 1).unwrap();

    let response = router(&app)
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/auth/logout")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("blaze_session=;"));
    assert!(cookie.contains("Max-Age=0"));

    assert!(session::lookup_session(&app.pool, &token).unwrap().is_none());

    let response = router(&app)
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_route_reports_owner() {
    let app = TestApp::new();
    let alice = app.add_user("user-a", "alice");
    let token = session::create_session(&app.pool, &alice.id, 1).unwrap();

    let response = router(&app)
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "user_id": "user-a", "name": "ALICE", "username": "alice" })
    );
}

#[tokio::test]
async fn test_seed_route_is_not_mounted_by_default() {
    let app = TestApp::new();
    let response = router(&app)
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/test/seed")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "id": "x" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_seed_creates_user_and_session() {
    let app = TestApp::new();
    let state = AppState {
        db: app.pool.clone(),
        config: Config::default(),
        graphql_schema: app.schema.clone(),
    };
    let response = routes::auth::seed_router()
        .with_state(state)
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/test/seed")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "id": "seeded", "name": "Seed", "email": null, "username": "Seedling" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .starts_with("blaze_session="));

    let body = json_body(response).await;
    assert_eq!(body["user_id"], "seeded");
    assert_eq!(body["username"], "seedling");
    let token = body["token"].as_str().unwrap();
    let user = session::lookup_session(&app.pool, token).unwrap().unwrap();
    assert_eq!(user.username.as_deref(), Some("seedling"));
}
