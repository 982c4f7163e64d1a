//! What the list screen shows for a given [`QueryState`].

use crate::client::state::{EditDraft, QueryState, Status};
use crate::models::Todo;
use crate::query::SortDirection;

#[derive(Debug, Clone, PartialEq)]
pub enum Row<'a> {
    Display(&'a Todo),
    Editing { todo: &'a Todo, draft: &'a EditDraft },
}

impl Row<'_> {
    pub fn todo(&self) -> &Todo {
        match self {
            Row::Display(todo) => todo,
            Row::Editing { todo, .. } => todo,
        }
    }
}

/// Shown in place of, or above, the rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    Loading,
    NoResults,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    pub total: u32,
    pub previous_enabled: bool,
    pub next_enabled: bool,
}

impl Pagination {
    pub fn label(&self) -> String {
        format!("Page {} of {}", self.current, self.total)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListView<'a> {
    pub rows: Vec<Row<'a>>,
    pub placeholder: Option<Placeholder>,
    pub notice: Option<&'a str>,
    pub sort_label: &'static str,
    pub pagination: Pagination,
}

pub fn render(state: &QueryState) -> ListView<'_> {
    let rows = match state.status {
        Status::Loaded | Status::Errored => state
            .items
            .iter()
            .map(|todo| match state.editing.get(&todo.id) {
                Some(draft) => Row::Editing { todo, draft },
                None => Row::Display(todo),
            })
            .collect(),
        Status::Idle | Status::Loading => Vec::new(),
    };

    let placeholder = match state.status {
        Status::Idle => None,
        Status::Loading => Some(Placeholder::Loading),
        Status::Errored => Some(Placeholder::Error(
            state.error.clone().unwrap_or_default(),
        )),
        Status::Loaded if rows.is_empty() => Some(Placeholder::NoResults),
        Status::Loaded => None,
    };

    let sort_label = match state.sort_direction {
        SortDirection::Asc => "Oldest First",
        SortDirection::Desc => "Newest First",
    };

    let total = state.total_pages.max(1);
    ListView {
        rows,
        placeholder,
        notice: state.notice.as_deref(),
        sort_label,
        pagination: Pagination {
            current: state.page,
            total,
            previous_enabled: state.page > 1,
            next_enabled: state.page < total,
        },
    }
}
