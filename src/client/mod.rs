//! Client side of the todo list: HTTP access, list state and its view.

pub mod api;
pub mod state;
pub mod view;

use std::collections::VecDeque;

use tracing::{debug, warn};

use api::TodoClient;
use state::{update, Action, Effect, QueryState};
use view::ListView;

/// Owns a [`QueryState`] and performs the effects its reducer asks for.
pub struct TodoSession {
    api: TodoClient,
    state: QueryState,
}

impl TodoSession {
    pub fn new(api: TodoClient, page_size: u32) -> Self {
        Self {
            api,
            state: QueryState::new(page_size),
        }
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn view(&self) -> ListView<'_> {
        view::render(&self.state)
    }

    /// Applies `action`, then runs every resulting effect to completion,
    /// feeding each outcome back into the reducer.
    pub async fn dispatch(&mut self, action: Action) {
        let mut pending: VecDeque<Effect> = update(&mut self.state, action).into();
        while let Some(effect) = pending.pop_front() {
            let outcome = self.perform(effect).await;
            pending.extend(update(&mut self.state, outcome));
        }
    }

    async fn perform(&self, effect: Effect) -> Action {
        match effect {
            Effect::Fetch { request, query } => {
                debug!(request, page = query.page, "Fetching todos");
                match self.api.list(&query).await {
                    Ok(page) => Action::FetchSucceeded { request, page },
                    Err(err) => {
                        warn!(request, error = %err, "Fetching todos failed");
                        Action::FetchFailed {
                            request,
                            message: err.to_string(),
                        }
                    }
                }
            }
            Effect::Create(todo) => match self.api.create(&todo).await {
                Ok(todo) => Action::Created(todo),
                Err(err) => {
                    warn!(error = %err, "Creating todo failed");
                    Action::CreateFailed(err.to_string())
                }
            },
            Effect::Update { id, patch } => match self.api.update(id, &patch).await {
                Ok(todo) => Action::Updated(todo),
                Err(err) => {
                    warn!(id, error = %err, "Updating todo failed");
                    Action::UpdateFailed {
                        id,
                        message: err.to_string(),
                    }
                }
            },
            Effect::Delete { id } => match self.api.delete(id).await {
                Ok(()) => Action::Deleted(id),
                Err(err) => {
                    warn!(id, error = %err, "Deleting todo failed");
                    Action::DeleteFailed {
                        id,
                        message: err.to_string(),
                    }
                }
            },
        }
    }
}
