pub mod api;
pub mod auth;

/// Health check answered at the service root.
pub async fn health() -> &'static str {
    "API is running..."
}
