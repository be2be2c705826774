// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, auth, catalog, dashboard, history, image, quiz},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Public routes: sign-in and read-only catalog browsing.
/// * Protected routes sit behind the bearer-token middleware.
/// * Global middleware: Trace, CORS.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/subjects", get(catalog::list_subjects))
        .route("/api/subjects/{subject}/topics", get(catalog::list_topics))
        .route("/api/quizzes", get(quiz::list_quizzes))
        .route("/api/quizzes/{id}", get(quiz::get_quiz));

    let authoring_routes = Router::new()
        .route("/api/quizzes", post(quiz::save_quiz))
        .route("/api/quizzes/{id}", delete(quiz::delete_quiz))
        .route("/api/quizzes/{id}/questions", put(quiz::replace_questions))
        .route("/api/subjects/{subject}", delete(catalog::delete_subject))
        .route("/api/images", post(image::upload_image));

    let attempt_routes = Router::new()
        .route("/api/attempt", get(attempt::current))
        .route("/api/attempt/start", post(attempt::start))
        .route("/api/attempt/answer", post(attempt::answer))
        .route("/api/attempt/advance", post(attempt::advance))
        .route("/api/attempt/finish", post(attempt::finish))
        .route("/api/attempt/resume", post(attempt::resume))
        .route(
            "/api/attempts",
            get(history::list_attempts).delete(history::delete_all_attempts),
        )
        .route("/api/attempts/{id}", delete(history::delete_attempt))
        .route("/api/dashboard", get(dashboard::dashboard));

    let protected_routes = authoring_routes
        .merge(attempt_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
