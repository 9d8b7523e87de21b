//! Router tests for requests answered before any database access.

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use hr_console::{app, resolve, AppState, MemoryStore};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> Router {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://localhost/hr_console_test")
        .unwrap();
    let model = resolve("public").unwrap();
    app(AppState::new(pool, model, Arc::new(MemoryStore::new())))
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &axum::response::Response) -> &str {
    response.headers().get(header::LOCATION).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let response = test_app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn unknown_entities_are_not_found() {
    let response = test_app().oneshot(get("/spaceships")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn malformed_ids_are_bad_requests() {
    let response = test_app().oneshot(get("/employees/not-an-id")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_submissions_report_field_errors() {
    let response = test_app()
        .oneshot(form_post("/companies/upsert", "name=&service_charge_field=all"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "validation_error");
    let details = body["error"]["details"].as_array().unwrap();
    assert!(details.iter().any(|d| d["field"] == "name"));
}

#[tokio::test]
async fn filter_form_redirects_to_the_list() {
    let response = test_app()
        .oneshot(form_post("/filters/vehicles?page=3", "status=+In+Use+"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/vehicles?status=in%20use&page=1");
}

#[tokio::test]
async fn clearing_all_filters_keeps_the_search() {
    let response = test_app()
        .oneshot(form_post("/filters/vehicles?search=swift&status=sold", "deleteAll=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/vehicles?search=swift");
}

#[tokio::test]
async fn color_scheme_sets_the_theme_cookie() {
    let response = test_app()
        .oneshot(form_post("/color-scheme", "colorScheme=dark&returnTo=%2Femployees"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/employees");
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("en_theme=dark;"));
}

#[tokio::test]
async fn color_scheme_ignores_foreign_return_targets() {
    let response = test_app()
        .oneshot(form_post("/color-scheme", "colorScheme=system&returnTo=https%3A%2F%2Fevil.example"))
        .await
        .unwrap();
    assert_eq!(location(&response), "/");
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn documents_cannot_be_exported() {
    let response = test_app().oneshot(get("/documents?export=true")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bulk_delete_needs_a_selection() {
    let response = test_app().oneshot(form_post("/vehicles", "")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_people_and_locations_have_attendance() {
    let uri = format!("/vehicles/{}/attendance", uuid::Uuid::new_v4());
    let response = test_app().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
