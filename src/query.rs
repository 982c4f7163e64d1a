//! Translation of raw list parameters into a normalized query.
//!
//! Everything arriving on the query string is an untrusted string. Nothing in
//! here fails: unknown or malformed values fall back to their defaults.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Raw parameters of `GET /api/todo`, exactly as received.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    pub title: Option<String>,
    pub description: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    #[default]
    DueDate,
    Title,
    Description,
    Completed,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    /// Parses a field name as used in the API; unknown names sort by due date.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "title" => SortField::Title,
            "description" => SortField::Description,
            "completed" => SortField::Completed,
            "createdAt" => SortField::CreatedAt,
            "updatedAt" => SortField::UpdatedAt,
            _ => SortField::DueDate,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::DueDate => "dueDate",
            SortField::Title => "title",
            SortField::Description => "description",
            SortField::Completed => "completed",
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
        }
    }

    /// Column name; the only part of an `ORDER BY` that is not a bound parameter.
    pub fn column(self) -> &'static str {
        match self {
            SortField::DueDate => "due_date",
            SortField::Title => "title",
            SortField::Description => "description",
            SortField::Completed => "completed",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Normalized filter, sort and page selection for one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub title_filter: String,
    pub description_filter: String,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    pub page: u32,
    pub page_size: u32,
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self {
            title_filter: String::new(),
            description_filter: String::new(),
            sort_field: SortField::default(),
            sort_direction: SortDirection::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl QueryDescriptor {
    pub fn from_params(params: &ListParams) -> Self {
        Self {
            title_filter: params.title.clone().unwrap_or_default(),
            description_filter: params.description.clone().unwrap_or_default(),
            sort_field: params
                .sort
                .as_deref()
                .map(SortField::parse)
                .unwrap_or_default(),
            sort_direction: params
                .order
                .as_deref()
                .map(SortDirection::parse)
                .unwrap_or_default(),
            page: parse_page(params.page.as_deref()),
            page_size: parse_page_size(params.limit.as_deref()),
        }
    }

    /// Number of matching rows skipped before this page starts.
    pub fn offset(&self) -> i64 {
        let offset = (u64::from(self.page) - 1) * u64::from(self.page_size);
        i64::try_from(offset).unwrap_or(i64::MAX)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// Converts back to wire parameters, the shape the client sends.
    pub fn to_params(&self) -> ListParams {
        ListParams {
            title: Some(self.title_filter.clone()),
            description: Some(self.description_filter.clone()),
            sort: Some(self.sort_field.as_str().to_string()),
            order: Some(self.sort_direction.as_str().to_string()),
            page: Some(self.page.to_string()),
            limit: Some(self.page_size.to_string()),
        }
    }
}

fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(|page| page.clamp(1, i64::from(u32::MAX)) as u32)
        .unwrap_or(1)
}

fn parse_page_size(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(|size| size.clamp(1, i64::from(MAX_PAGE_SIZE)) as u32)
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

/// Number of pages needed for `total` rows, never less than one.
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    let pages = total.div_ceil(size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}
