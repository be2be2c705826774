// tests/image_upload_tests.rs

use std::{collections::HashMap, sync::Arc};

use axum::{
    Form, Json, Router,
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use quizbuddy::{
    config::Config,
    routes,
    state::AppState,
    store::{MemoryStore, Stores},
};
use serde_json::{Value, json};

const HOST_KEY: &str = "test-key";

/// Stand-in for the ImgBB upload endpoint.
async fn fake_upload(
    Query(query): Query<HashMap<String, String>>,
    Form(form): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    if query.get("key").map(String::as_str) != Some(HOST_KEY) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": { "message": "Invalid API v1 key." } })),
        );
    }

    let image = form.get("image").cloned().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": { "url": format!("https://i.example.com/{}.png", image.len()) }
        })),
    )
}

async fn spawn_image_host() -> String {
    let app = Router::new().route("/1/upload", post(fake_upload));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://127.0.0.1:{}/1/upload", listener.local_addr().unwrap().port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn spawn_app(upload_url: String, api_key: &str) -> String {
    let config = Config {
        database_url: None,
        jwt_secret: "image_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        timer_enabled: false,
        question_seconds: 60,
        imgbb_api_key: Some(api_key.to_string()),
        imgbb_upload_url: upload_url,
    };

    let stores = Stores::from_backend(Arc::new(MemoryStore::new()));
    let app = routes::create_router(AppState::new(config, stores));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn sign_in(client: &reqwest::Client, address: &str) -> String {
    let credentials = json!({ "username": "author", "password": "password123" });

    client
        .post(format!("{}/api/auth/register", address))
        .json(&credentials)
        .send()
        .await
        .unwrap();

    let login: Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&credentials)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    login["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn upload_returns_hosted_url() {
    let host = spawn_image_host().await;
    let address = spawn_app(host, HOST_KEY).await;
    let client = reqwest::Client::new();
    let token = sign_in(&client, &address).await;

    let response = client
        .post(format!("{}/api/images", address))
        .bearer_auth(&token)
        .json(&json!({ "image": "data:image/png;base64,aGVsbG8=" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    // The data-URL prefix is stripped before forwarding: 8 base64 chars.
    assert_eq!(body["url"], "https://i.example.com/8.png");
}

#[tokio::test]
async fn rejected_upload_is_a_gateway_error() {
    let host = spawn_image_host().await;
    let address = spawn_app(host, "wrong-key").await;
    let client = reqwest::Client::new();
    let token = sign_in(&client, &address).await;

    let response = client
        .post(format!("{}/api/images", address))
        .bearer_auth(&token)
        .json(&json!({ "image": "aGVsbG8=" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 502);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid API v1 key"));
}

#[tokio::test]
async fn empty_image_is_rejected() {
    let host = spawn_image_host().await;
    let address = spawn_app(host, HOST_KEY).await;
    let client = reqwest::Client::new();
    let token = sign_in(&client, &address).await;

    let response = client
        .post(format!("{}/api/images", address))
        .bearer_auth(&token)
        .json(&json!({ "image": "" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}
