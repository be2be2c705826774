// tests/api_tests.rs

use std::sync::Arc;

use quizbuddy::{
    config::Config,
    routes,
    state::AppState,
    store::{MemoryStore, Stores},
};
use serde_json::{Value, json};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        timer_enabled: false,
        question_seconds: 60,
        imgbb_api_key: None,
        imgbb_upload_url: "http://127.0.0.1:9/upload".to_string(),
    };

    let stores = Stores::from_backend(Arc::new(MemoryStore::new()));
    let app = routes::create_router(AppState::new(config, stores));

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Registers a fresh user and returns their bearer token.
async fn sign_in(client: &reqwest::Client, address: &str) -> String {
    let username = format!("u_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    let password = "password123";

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let login: Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    login["token"].as_str().unwrap().to_string()
}

fn question(text: &str, correct: &str) -> Value {
    json!({
        "type": "text",
        "text": text,
        "options": ["one", "two", "three", "four"],
        "correctOption": correct,
        "explanation": format!("Because {}", text),
    })
}

async fn save_quiz(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    subject: &str,
    topic: &str,
    questions: Vec<Value>,
) -> reqwest::Response {
    client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(token)
        .json(&json!({ "subject": subject, "topic": topic, "questions": questions }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_check_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let body = json!({ "username": "same_name", "password": "password123" });

    let first = client
        .post(format!("{}/api/auth/register", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    let second = client
        .post(format!("{}/api/auth/register", address))
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(first.status().as_u16(), 201);
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": "alice", "password": "password123" }))
        .send()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": "alice", "password": "nope1234" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    for path in ["/api/attempt", "/api/attempts", "/api/dashboard"] {
        let response = client
            .get(format!("{}{}", address, path))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 401, "{path}");
    }

    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth("not-a-token")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn saving_same_subject_and_topic_merges() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = sign_in(&client, &address).await;

    let created = save_quiz(
        &client,
        &address,
        &token,
        "Physics",
        "Optics",
        vec![question("Lens?", "A")],
    )
    .await;
    assert_eq!(created.status().as_u16(), 201);
    let created: Value = created.json().await.unwrap();

    let merged = save_quiz(
        &client,
        &address,
        &token,
        "Physics",
        "Optics",
        vec![question("Prism?", "B"), question("Mirror?", "C")],
    )
    .await;
    assert_eq!(merged.status().as_u16(), 200);
    let merged: Value = merged.json().await.unwrap();
    assert_eq!(merged["id"], created["id"]);

    let quizzes: Vec<Value> = client
        .get(format!("{}/api/quizzes?subject=Physics&topic=Optics", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quizzes.len(), 1);
    assert_eq!(quizzes[0]["questions"].as_array().unwrap().len(), 2);
    assert_eq!(quizzes[0]["questions"][0]["difficulty"], "Moderate");
}

#[tokio::test]
async fn authored_text_is_sanitized_and_invalid_quizzes_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = sign_in(&client, &address).await;

    let response = save_quiz(
        &client,
        &address,
        &token,
        "Web",
        "XSS",
        vec![question("<b>Bold</b><script>alert(1)</script>", "A")],
    )
    .await;
    let quiz: Value = response.json().await.unwrap();
    assert_eq!(quiz["questions"][0]["text"], "<b>Bold</b>");

    let empty = save_quiz(&client, &address, &token, "Web", "Empty", vec![]).await;
    assert_eq!(empty.status().as_u16(), 400);

    let blank_prompt = save_quiz(
        &client,
        &address,
        &token,
        "Web",
        "Blank",
        vec![question("   ", "A")],
    )
    .await;
    assert_eq!(blank_prompt.status().as_u16(), 400);
}

#[tokio::test]
async fn topic_named_like_the_all_topics_selector_is_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = sign_in(&client, &address).await;

    for topic in ["all", "All", " ALL "] {
        let response = save_quiz(
            &client,
            &address,
            &token,
            "Math",
            topic,
            vec![question("1 + 1?", "B")],
        )
        .await;
        assert_eq!(response.status().as_u16(), 400, "topic {:?}", topic);
    }

    let allowed = save_quiz(
        &client,
        &address,
        &token,
        "Chemistry",
        "Allotropes",
        vec![question("Diamond is?", "A")],
    )
    .await;
    assert_eq!(allowed.status().as_u16(), 201);

    let topics: Value = client
        .get(format!("{}/api/subjects/Math/topics", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(topics, json!([]));
}

#[tokio::test]
async fn catalog_lists_subjects_and_topics() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = sign_in(&client, &address).await;

    for (subject, topic) in [("Math", "Algebra"), ("Math", "Geometry"), ("Art", "Color")] {
        save_quiz(
            &client,
            &address,
            &token,
            subject,
            topic,
            vec![question("Q?", "A")],
        )
        .await;
    }

    let subjects: Vec<String> = client
        .get(format!("{}/api/subjects", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(subjects, ["Art", "Math"]);

    let topics: Vec<String> = client
        .get(format!("{}/api/subjects/Math/topics", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(topics, ["Algebra", "Geometry"]);
}

#[tokio::test]
async fn only_the_author_can_change_a_quiz() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let author = sign_in(&client, &address).await;
    let other = sign_in(&client, &address).await;

    let quiz: Value = save_quiz(
        &client,
        &address,
        &author,
        "History",
        "Rome",
        vec![question("Founded?", "A")],
    )
    .await
    .json()
    .await
    .unwrap();
    let id = quiz["id"].as_str().unwrap();

    let response = client
        .delete(format!("{}/api/quizzes/{}", address, id))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = client
        .put(format!("{}/api/quizzes/{}/questions", address, id))
        .bearer_auth(&author)
        .json(&json!({ "questions": [question("Fell?", "D")] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["questions"][0]["correctOption"], "D");

    let response = client
        .delete(format!("{}/api/quizzes/{}", address, id))
        .bearer_auth(&author)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let response = client
        .get(format!("{}/api/quizzes/{}", address, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn deleting_a_subject_removes_all_its_quizzes() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = sign_in(&client, &address).await;

    for topic in ["Cells", "Genetics"] {
        save_quiz(
            &client,
            &address,
            &token,
            "Biology",
            topic,
            vec![question("Q?", "A")],
        )
        .await;
    }

    let response = client
        .delete(format!("{}/api/subjects/Biology", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["deleted"], 2);

    let subjects: Vec<String> = client
        .get(format!("{}/api/subjects", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(subjects.is_empty());
}

#[tokio::test]
async fn image_upload_without_host_key_is_a_gateway_error() {
    let address = spawn_app().await;
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
}
