// src/routes.rs

use std::sync::Arc;

use axum::{
    Router, http::Method, middleware,
    routing::{get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, attendance, auth, cbt, fees, news, results},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, cbt, portal pages, admin).
/// * Applies global middleware (Trace, CORS) and a login rate limit.
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    // Brute-force protection on the login route only.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(5)
            .finish()
            .unwrap(),
    );

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .layer(GovernorLayer::new(governor_conf))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let cbt_routes = Router::new()
        .route("/tests", get(cbt::list_tests))
        .route("/tests/{id}/attempt", post(cbt::begin_attempt))
        .route("/tests/{id}/submit", post(cbt::submit_attempt))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let results_routes = Router::new()
        .route("/", get(results::my_results))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let news_routes = Router::new()
        .route("/", get(news::list_news))
        .route("/{id}", get(news::get_news))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let attendance_routes = Router::new()
        .route("/", get(attendance::my_attendance))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let fees_routes = Router::new()
        .route("/", get(fees::my_receipts))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/classes", post(admin::create_class))
        .route("/students", post(admin::create_student))
        .route("/tests", post(admin::create_test))
        .route("/tests/{id}", put(admin::update_test))
        .route("/tests/{id}/publish", post(admin::publish_test))
        .route("/tests/{id}/close", post(admin::close_test))
        .route("/tests/{id}/questions", post(admin::add_question))
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route("/news", post(admin::create_news))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/cbt", cbt_routes)
        .nest("/api/results", results_routes)
        .nest("/api/news", news_routes)
        .nest("/api/attendance", attendance_routes)
        .nest("/api/fees", fees_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
