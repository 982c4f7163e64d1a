//! List state of the client and the reducer that drives it.
//!
//! The whole screen state is one serializable value. [`update`] is the only
//! way to change it: it applies an [`Action`] and returns the [`Effect`]s the
//! caller has to perform. Results of those effects come back as actions.
//!
//! Every fetch is tagged with a request id taken from a counter. A response is
//! only applied when it answers the most recent fetch, so a slow response to
//! an old query can never overwrite the result of a newer one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::{parse_due_date, CreateTodo, Todo, TodoPage, UpdateTodo};
use crate::query::{total_pages, QueryDescriptor, SortDirection, SortField, DEFAULT_PAGE_SIZE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Idle,
    Loading,
    Loaded,
    Errored,
}

/// Inline edit form contents for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditDraft {
    pub title: String,
    pub description: String,
    pub saving: bool,
    pub error: Option<String>,
}

impl EditDraft {
    fn from_todo(todo: &Todo) -> Self {
        Self {
            title: todo.title.clone(),
            description: todo.description.clone(),
            saving: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryState {
    pub title_search: String,
    pub description_search: String,
    pub sort_direction: SortDirection,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
    pub status: Status,
    /// Items of the last successful fetch. Kept when a later fetch fails.
    pub items: Vec<Todo>,
    pub editing: BTreeMap<i64, EditDraft>,
    /// Why the last fetch failed.
    pub error: Option<String>,
    /// Why the last create, toggle or delete failed.
    pub notice: Option<String>,
    pub latest_request: u64,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl QueryState {
    pub fn new(page_size: u32) -> Self {
        Self {
            title_search: String::new(),
            description_search: String::new(),
            sort_direction: SortDirection::Asc,
            page: 1,
            page_size: page_size.max(1),
            total: 0,
            total_pages: 1,
            status: Status::Idle,
            items: Vec::new(),
            editing: BTreeMap::new(),
            error: None,
            notice: None,
            latest_request: 0,
        }
    }

    /// Query matching the current selection.
    pub fn descriptor(&self) -> QueryDescriptor {
        QueryDescriptor {
            title_filter: self.title_search.clone(),
            description_filter: self.description_search.clone(),
            sort_field: SortField::DueDate,
            sort_direction: self.sort_direction,
            page: self.page,
            page_size: self.page_size,
        }
    }

    pub fn item(&self, id: i64) -> Option<&Todo> {
        self.items.iter().find(|todo| todo.id == id)
    }

    fn fetch(&mut self) -> Effect {
        self.latest_request += 1;
        self.status = Status::Loading;
        Effect::Fetch {
            request: self.latest_request,
            query: self.descriptor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Mount,
    Refresh,
    SetTitleSearch(String),
    SetDescriptionSearch(String),
    ToggleSort,
    SetPage(u32),
    NextPage,
    PreviousPage,
    FetchSucceeded { request: u64, page: TodoPage },
    FetchFailed { request: u64, message: String },
    Create { todo: CreateTodo, now: OffsetDateTime },
    Created(Todo),
    CreateFailed(String),
    ToggleEdit(i64),
    EditTitle { id: i64, title: String },
    EditDescription { id: i64, description: String },
    SubmitEdit(i64),
    ToggleCompleted(i64),
    Updated(Todo),
    UpdateFailed { id: i64, message: String },
    Delete(i64),
    Deleted(i64),
    DeleteFailed { id: i64, message: String },
}

/// Work requested by the reducer, performed by whoever owns the state.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Fetch { request: u64, query: QueryDescriptor },
    Create(CreateTodo),
    Update { id: i64, patch: UpdateTodo },
    Delete { id: i64 },
}

pub fn update(state: &mut QueryState, action: Action) -> Vec<Effect> {
    match action {
        Action::Mount | Action::Refresh => vec![state.fetch()],
        Action::SetTitleSearch(text) => {
            if text == state.title_search {
                return Vec::new();
            }
            state.title_search = text;
            state.page = 1;
            vec![state.fetch()]
        }
        Action::SetDescriptionSearch(text) => {
            if text == state.description_search {
                return Vec::new();
            }
            state.description_search = text;
            state.page = 1;
            vec![state.fetch()]
        }
        Action::ToggleSort => {
            state.sort_direction = state.sort_direction.toggled();
            state.page = 1;
            vec![state.fetch()]
        }
        Action::SetPage(page) => go_to_page(state, page),
        Action::NextPage => {
            let next = state.page.saturating_add(1);
            go_to_page(state, next)
        }
        Action::PreviousPage => {
            let previous = state.page.saturating_sub(1);
            go_to_page(state, previous)
        }
        Action::FetchSucceeded { request, page } => {
            if request != state.latest_request {
                return Vec::new();
            }
            state.total = page.total;
            state.total_pages = total_pages(page.total, state.page_size);

            // The page emptied underneath us, e.g. its last item was deleted.
            if page.data.is_empty() && state.page > state.total_pages {
                state.page = state.total_pages;
                return vec![state.fetch()];
            }

            state.items = page.data;
            let items = &state.items;
            state
                .editing
                .retain(|id, _| items.iter().any(|todo| todo.id == *id));
            state.status = Status::Loaded;
            state.error = None;
            Vec::new()
        }
        Action::FetchFailed { request, message } => {
            if request != state.latest_request {
                return Vec::new();
            }
            state.status = Status::Errored;
            state.error = Some(message);
            Vec::new()
        }
        Action::Create { todo, now } => match check_new_todo(&todo, now) {
            Ok(()) => {
                state.notice = None;
                vec![Effect::Create(todo)]
            }
            Err(message) => {
                state.notice = Some(message);
                Vec::new()
            }
        },
        Action::Created(_) => {
            state.notice = None;
            vec![state.fetch()]
        }
        Action::CreateFailed(message) => {
            state.notice = Some(message);
            Vec::new()
        }
        Action::ToggleEdit(id) => {
            if state.editing.remove(&id).is_none() {
                if let Some(todo) = state.item(id) {
                    let draft = EditDraft::from_todo(todo);
                    state.editing.insert(id, draft);
                }
            }
            Vec::new()
        }
        Action::EditTitle { id, title } => {
            if let Some(draft) = state.editing.get_mut(&id) {
                draft.title = title;
            }
            Vec::new()
        }
        Action::EditDescription { id, description } => {
            if let Some(draft) = state.editing.get_mut(&id) {
                draft.description = description;
            }
            Vec::new()
        }
        Action::SubmitEdit(id) => {
            let Some(draft) = state.editing.get_mut(&id) else {
                return Vec::new();
            };
            if draft.title.trim().is_empty() {
                draft.error = Some("title is required".to_string());
                return Vec::new();
            }
            draft.saving = true;
            draft.error = None;
            vec![Effect::Update {
                id,
                patch: UpdateTodo {
                    title: Some(draft.title.clone()),
                    description: Some(draft.description.clone()),
                    ..UpdateTodo::default()
                },
            }]
        }
        Action::ToggleCompleted(id) => match state.item(id) {
            Some(todo) => vec![Effect::Update {
                id,
                patch: UpdateTodo {
                    completed: Some(!todo.completed),
                    ..UpdateTodo::default()
                },
            }],
            None => Vec::new(),
        },
        Action::Updated(todo) => {
            if state.editing.get(&todo.id).is_some_and(|draft| draft.saving) {
                state.editing.remove(&todo.id);
            }
            if let Some(slot) = state.items.iter_mut().find(|item| item.id == todo.id) {
                *slot = todo;
            }
            state.notice = None;
            Vec::new()
        }
        Action::UpdateFailed { id, message } => {
            match state.editing.get_mut(&id) {
                Some(draft) if draft.saving => {
                    draft.saving = false;
                    draft.error = Some(message);
                }
                _ => state.notice = Some(message),
            }
            Vec::new()
        }
        Action::Delete(id) => vec![Effect::Delete { id }],
        Action::Deleted(id) => {
            state.items.retain(|todo| todo.id != id);
            state.editing.remove(&id);
            state.notice = None;
            vec![state.fetch()]
        }
        Action::DeleteFailed { id: _, message } => {
            state.notice = Some(message);
            Vec::new()
        }
    }
}

fn go_to_page(state: &mut QueryState, page: u32) -> Vec<Effect> {
    let page = page.clamp(1, state.total_pages.max(1));
    if page == state.page {
        return Vec::new();
    }
    state.page = page;
    vec![state.fetch()]
}

/// Checks made before a new todo is sent to the server.
pub fn check_new_todo(todo: &CreateTodo, now: OffsetDateTime) -> Result<(), String> {
    if todo.title.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        return Err("title is required".to_string());
    }
    let due_date = match todo.due_date.as_deref() {
        Some(raw) if !raw.trim().is_empty() => parse_due_date(raw).map_err(|err| err.to_string())?,
        _ => return Err("dueDate is required".to_string()),
    };
    if due_date < now {
        return Err("Due date has already passed. Please pick a future date.".to_string());
    }
    Ok(())
}
