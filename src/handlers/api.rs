use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::{http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::db::{create_todo, delete_todo, get_todo, list_todos, update_todo};
use crate::error::AppError;
use crate::models::{CreateTodo, Todo, TodoPage, UpdateTodo};
use crate::query::{ListParams, QueryDescriptor};
use crate::AppState;

/// Ids are opaque to callers; anything that is not one of ours simply does not exist.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim().parse().map_err(|_| AppError::NotFound)
}

pub async fn list_all_todos(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<TodoPage>, AppError> {
    let query = QueryDescriptor::from_params(&params);
    let page = list_todos(&state.db, &query)?;
    debug!(
        page = query.page,
        limit = query.page_size,
        count = page.data.len(),
        total = page.total,
        "Listed todos"
    );
    Ok(Json(page))
}

pub async fn create_new_todo(
    State(state): State<AppState>,
    payload: Result<Json<CreateTodo>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), AppError> {
    let Json(req) = payload?;
    let new_todo = req.validate()?;

    let todo = create_todo(&state.db, &new_todo)?;
    info!(id = todo.id, title = %todo.title, "Created todo");
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn get_single_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Todo>, AppError> {
    let id = parse_id(&id)?;
    match get_todo(&state.db, id)? {
        Some(todo) => Ok(Json(todo)),
        None => Err(AppError::NotFound),
    }
}

pub async fn update_existing_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTodo>, JsonRejection>,
) -> Result<Json<Todo>, AppError> {
    let id = parse_id(&id)?;
    if get_todo(&state.db, id)?.is_none() {
        return Err(AppError::NotFound);
    }

    let Json(req) = payload?;
    let patch = req.validate()?;

    match update_todo(&state.db, id, &patch)? {
        Some(todo) => {
            info!(id = todo.id, completed = todo.completed, "Updated todo");
            Ok(Json(todo))
        }
        None => Err(AppError::NotFound),
    }
}

pub async fn delete_existing_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    if delete_todo(&state.db, id)? {
        info!(id, "Deleted todo");
        Ok(Json(json!({ "message": "Deleted" })))
    } else {
        Err(AppError::NotFound)
    }
}
