use std::sync::LazyLock;

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::{hash_password, issue_token, verify_password};
use crate::db::{create_user, get_user_by_email};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{LoginRequest, RegisterRequest, TokenResponse, User};
use crate::AppState;

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const USER_EXISTS: &str = "User already exists";
const DUMMY_PASSWORD: &str = "duedate-dummy-password";

/// Verified against when the email is unknown, so every failed login costs one
/// argon2 run.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password(DUMMY_PASSWORD).ok());

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(req) = payload?;
    let email = non_blank(req.email)
        .map(|email| email.to_lowercase())
        .ok_or_else(|| AppError::bad_request("email is required"))?;
    let password = req
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::bad_request("password is required"))?;

    if get_user_by_email(&state.db, &email)?.is_some() {
        return Err(AppError::bad_request(USER_EXISTS));
    }

    let password_hash = hash_password(&password)?;
    let first_name = non_blank(req.first_name);
    let last_name = non_blank(req.last_name);
    let phone_number = non_blank(req.phone_number);

    let user = create_user(
        &state.db,
        &email,
        &password_hash,
        first_name.as_deref(),
        last_name.as_deref(),
        phone_number.as_deref(),
    )?
    .ok_or_else(|| AppError::bad_request(USER_EXISTS))?;

    info!(id = user.id, "Registered user");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully", "user": user })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(req) = payload?;
    let email = req.email.trim().to_lowercase();

    let user = get_user_by_email(&state.db, &email)?;
    let Some(user) = check_credentials(user, &req.password) else {
        warn!("Failed login attempt");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS));
    };

    let token = issue_token(user.id, &state.jwt_secret)?;
    info!(id = user.id, "User logged in");
    Ok(Json(TokenResponse { token }))
}

fn check_credentials(user: Option<User>, password: &str) -> Option<User> {
    let hash = match &user {
        Some(user) => Some(user.password_hash.as_str()),
        None => DUMMY_HASH.as_deref(),
    };
    let verified = hash.is_some_and(|hash| verify_password(password, hash));
    user.filter(|_| verified)
}

pub async fn protected(user: AuthUser) -> Json<Value> {
    Json(json!({ "message": "This is a protected route", "userId": user.id }))
}
