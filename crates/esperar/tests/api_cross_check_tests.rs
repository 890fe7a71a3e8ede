//! UI table vs backend API, with a local axum server standing in for the API.

#![cfg(feature = "api")]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use common::{fast_config, init_tracing, valid_user, SETTLE};
use esperar::prelude::*;
use serde_json::{json, Value};

/// Serve `router` on an ephemeral port and return its `/api` root
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api")
}

async fn users_api(payload: Value) -> UsersApi {
    let router = Router::new().route(
        "/api/users",
        get(move || {
            let payload = payload.clone();
            async move { Json(payload) }
        }),
    );
    UsersApi::new(serve(router).await)
}

#[tokio::test]
async fn test_ui_and_api_agree_after_add() {
    init_tracing();
    let doc = MockDocument::new().with_render_delay(2);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    page.add_user(&valid_user()).await.unwrap();
    assert!(page
        .wait_until_row_appears(&valid_user().email, SETTLE)
        .await
        .unwrap());

    // Server stores the rendered label, as the real backend does.
    let api = users_api(json!([
        {"_id": "1", "name": "John Doe", "email": "john.doe@test.com", "age": "30 Year's"}
    ]))
    .await;
    let users = api.list_users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].to_record(), valid_user());

    let report = cross_check(&page.read_table().await.unwrap(), &users);
    assert!(report.is_consistent(), "{report:?}");
    report.assert_consistent().unwrap();
}

#[tokio::test]
async fn test_find_user_by_email() {
    let api = users_api(json!([
        {"name": "Ann", "email": "ann@x.io", "age": 41},
        {"name": "Bo", "email": "bo@x.io", "age": "7"}
    ]))
    .await;
    assert_eq!(api.find_user("bo@x.io").await.unwrap().unwrap().age, 7);
    assert!(api.find_user("nobody@x.io").await.unwrap().is_none());
}

#[tokio::test]
async fn test_cross_check_flags_stale_table() {
    let doc = MockDocument::new().with_users(vec![valid_user()]);
    let config = fast_config();
    let page = UserManagementPage::new(&doc, &config);
    let api = users_api(json!([
        {"name": "John Doe", "email": "john.doe@test.com", "age": 31}
    ]))
    .await;

    let report = cross_check(
        &page.read_table().await.unwrap(),
        &api.list_users().await.unwrap(),
    );
    assert!(!report.is_consistent());
    assert_eq!(report.mismatched[0].ui, "30 Year's");
    assert_eq!(report.mismatched[0].api, "31 Year's");
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let router = Router::new().route(
        "/api/users",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database down") }),
    );
    let api = UsersApi::new(serve(router).await);
    let err = api.list_users().await.unwrap_err();
    assert!(matches!(err, EsperarError::Api { .. }));
    assert!(err.to_string().contains("database down"));
}

#[tokio::test]
async fn test_unreachable_server_is_api_error() {
    let api = UsersApi::new("http://127.0.0.1:9/api");
    assert!(matches!(
        api.list_users().await.unwrap_err(),
        EsperarError::Api { .. }
    ));
}
