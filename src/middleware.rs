use axum::http::{header::AUTHORIZATION, request::Parts, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{extract::FromRequestParts, Json};
use serde_json::json;
use tracing::warn;

use crate::auth::verify_token;
use crate::AppState;

/// Represents a request carrying a valid bearer token.
pub struct AuthUser {
    pub id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;

        match verify_token(token, &state.jwt_secret) {
            Some(claims) => Ok(AuthUser { id: claims.sub }),
            None => {
                warn!("Rejected invalid bearer token");
                Err(AuthError::InvalidToken)
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (_scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "Access denied. No token provided.",
            ),
            AuthError::InvalidToken => (StatusCode::FORBIDDEN, "Invalid token"),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
