pub mod auth;
pub mod client;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod query;

use std::any::Any;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{
    routing::{get, post},
    Json, Router,
};
use db::DbPool;
use serde_json::json;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

/// Credential requests a single client IP may send back to back.
pub const AUTH_BURST: u32 = 10;
/// Seconds until one more credential request is allowed after the burst.
pub const AUTH_REPLENISH_SECS: u64 = 6;

pub const RATE_LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub jwt_secret: Arc<String>,
    pub base_path: Arc<String>,
}

fn todo_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::api::list_all_todos).post(handlers::api::create_new_todo),
        )
        .route(
            "/{id}",
            get(handlers::api::get_single_todo)
                .put(handlers::api::update_existing_todo)
                .delete(handlers::api::delete_existing_todo),
        )
}

fn auth_routes() -> Router<AppState> {
    let governor = GovernorConfigBuilder::default()
        .per_second(AUTH_REPLENISH_SECS)
        .burst_size(AUTH_BURST)
        .finish()
        .expect("non-zero rate limit");

    // register and login share one per-IP bucket
    let credentials = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .layer(GovernorLayer {
            config: Arc::new(governor),
        })
        .layer(axum::middleware::map_response(rate_limited_as_json));

    Router::new()
        .merge(credentials)
        .route("/protected", get(handlers::auth::protected))
}

async fn rate_limited_as_json(response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    tracing::warn!("Rate limited credential request");
    let mut headers = response.headers().clone();
    headers.remove(header::CONTENT_TYPE);
    headers.remove(header::CONTENT_LENGTH);
    (
        StatusCode::TOO_MANY_REQUESTS,
        headers,
        Json(json!({ "message": RATE_LIMITED_MESSAGE })),
    )
        .into_response()
}

fn handle_panic(_err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": error::INTERNAL_MESSAGE })),
    )
        .into_response()
}

pub fn create_app(state: AppState) -> Router {
    let base_path = state.base_path.clone();

    let app_routes = Router::new()
        .route("/", get(handlers::health))
        .nest("/api/todo", todo_routes())
        .nest("/api/auth", auth_routes())
        .layer(
            tower::ServiceBuilder::new()
                .layer(tower_http::trace::TraceLayer::new_for_http())
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(CorsLayer::permissive())
                .layer(tower_http::compression::CompressionLayer::new()),
        )
        .with_state(state);

    tracing::info!("base_path: {base_path:?}");

    if base_path.is_empty() {
        app_routes
    } else {
        Router::new().nest(&*base_path, app_routes)
    }
}
