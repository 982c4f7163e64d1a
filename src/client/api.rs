use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::models::{CreateTodo, Todo, TodoPage, UpdateTodo};
use crate::query::QueryDescriptor;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid url {url:?}: {reason}")]
    Url { url: String, reason: String },
    /// The server answered with an error status; `message` is its explanation.
    #[error("{message}")]
    Api { status: u16, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Async client for the `/api/todo` routes.
#[derive(Debug, Clone)]
pub struct TodoClient {
    http: Client,
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        let url = format!("{}/api/todo{path}", self.base_url);
        Url::parse(&url).map_err(|err| ClientError::Url {
            url,
            reason: err.to_string(),
        })
    }

    pub async fn list(&self, query: &QueryDescriptor) -> Result<TodoPage, ClientError> {
        let mut url = self.url("")?;
        url.query_pairs_mut()
            .append_pair("title", &query.title_filter)
            .append_pair("description", &query.description_filter)
            .append_pair("sort", query.sort_field.as_str())
            .append_pair("order", query.sort_direction.as_str())
            .append_pair("page", &query.page.to_string())
            .append_pair("limit", &query.page_size.to_string());

        let resp = self.http.get(url).send().await?;
        parse(resp).await
    }

    pub async fn get(&self, id: i64) -> Result<Todo, ClientError> {
        let resp = self.http.get(self.url(&format!("/{id}"))?).send().await?;
        parse(resp).await
    }

    pub async fn create(&self, todo: &CreateTodo) -> Result<Todo, ClientError> {
        let resp = self.http.post(self.url("")?).json(todo).send().await?;
        parse(resp).await
    }

    pub async fn update(&self, id: i64, patch: &UpdateTodo) -> Result<Todo, ClientError> {
        let resp = self
            .http
            .put(self.url(&format!("/{id}"))?)
            .json(patch)
            .send()
            .await?;
        parse(resp).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        let resp = self
            .http
            .delete(self.url(&format!("/{id}"))?)
            .send()
            .await?;
        parse::<Value>(resp).await.map(|_| ())
    }
}

async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let message = resp
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| status.to_string());
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
