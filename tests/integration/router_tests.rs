//! In-process API tests over the in-memory store

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use libris_server::{
    api, config::AppConfig, repository::memory::MemoryStore, services::Services, AppState,
};

fn app() -> Router {
    let config = AppConfig::default();
    let store = Arc::new(MemoryStore::new());
    let services = Services::new(store.clone(), store, &config.reservations);

    api::router(AppState {
        services: Arc::new(services),
    })
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_user(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/users",
        Some(json!({
            "username": username,
            "first_name": "Ada",
            "last_name": "Lovelace"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn create_book(app: &Router, title: &str, copies: i32) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/books",
        Some(json!({
            "title": title,
            "author": "Frank Herbert",
            "categories": ["science-fiction"],
            "total_copies": copies
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["available_copies"], copies);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_reservation_lifecycle_over_http() {
    let app = app();
    let alice = create_user(&app, "alice").await;
    let bob = create_user(&app, "bob").await;
    let book = create_book(&app, "Dune", 1).await;

    // Alice takes the only copy
    let (status, reservation) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(json!({ "user_id": alice, "book_id": book })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reservation["status"], "ACTIVE");
    assert_eq!(reservation["is_overdue"], false);
    assert_eq!(reservation["book_title"], "Dune");
    assert_eq!(reservation["user_username"], "alice");
    let reservation_id = reservation["id"].as_str().unwrap().to_string();

    let (_, body) = send(&app, Method::GET, &format!("/api/books/{}", book), None).await;
    assert_eq!(body["available_copies"], 0);

    // Bob is refused while no copy is free
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(json!({ "user_id": bob, "book_id": book })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BookUnavailable");

    // Alice returns the book
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/reservations/{}/return", reservation_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reservation"]["status"], "RETURNED");
    assert!(body["reservation"]["actual_return_date"].is_string());

    // A second return is an invalid transition and leaves counts alone
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/reservations/{}/return", reservation_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidTransition");

    let (_, body) = send(&app, Method::GET, &format!("/api/books/{}", book), None).await;
    assert_eq!(body["available_copies"], 1);

    // Bob can now reserve, then cancels
    let (status, reservation) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(json!({ "user_id": bob, "book_id": book })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let bob_reservation = reservation["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/reservations/{}/cancel", bob_reservation),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reservation"]["status"], "CANCELLED");

    let (_, body) = send(&app, Method::GET, &format!("/api/books/{}", book), None).await;
    assert_eq!(body["available_copies"], 1);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/books/{}/reservations", book),
        None,
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_records_are_not_found() {
    let app = app();
    let book = create_book(&app, "Dune", 2).await;
    let missing = uuid::Uuid::new_v4();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(json!({ "user_id": missing, "book_id": book })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");

    // The failed create did not consume a copy
    let (_, body) = send(&app, Method::GET, &format!("/api/books/{}", book), None).await;
    assert_eq!(body["available_copies"], 2);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/reservations/{}/return", missing),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, &format!("/api/books/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reservations_by_status() {
    let app = app();
    let user = create_user(&app, "carol").await;
    let book = create_book(&app, "Hyperion", 3).await;

    send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(json!({ "user_id": user, "book_id": book })),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/api/reservations/status/active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Nothing is past due yet
    let (status, body) = send(&app, Method::GET, "/api/reservations/status/OVERDUE", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = send(&app, Method::GET, "/api/reservations/status/lost", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, body) = send(&app, Method::GET, "/api/reservations/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], 1);
    assert_eq!(body["overdue"], 0);
}

#[tokio::test]
async fn test_invalid_book_is_rejected() {
    let app = app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/books",
        Some(json!({
            "title": "  ",
            "author": "Nobody",
            "categories": ["misc"],
            "total_copies": 1
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/books",
        Some(json!({
            "title": "Empty Shelf",
            "author": "Nobody",
            "categories": ["misc"],
            "total_copies": 0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_book_with_open_reservation_cannot_be_deleted() {
    let app = app();
    let user = create_user(&app, "dave").await;
    let book = create_book(&app, "Solaris", 1).await;

    send(
        &app,
        Method::POST,
        "/api/reservations",
        Some(json!({ "user_id": user, "book_id": book })),
    )
    .await;

    let (status, _) = send(&app, Method::DELETE, &format!("/api/books/{}", book), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/users/{}", user), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_search_and_category_lookup() {
    let app = app();
    create_book(&app, "Dune Messiah", 1).await;

    let (status, body) = send(&app, Method::GET, "/api/books/search?query=dune", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/books/category?categories=poetry,science-fiction",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}
