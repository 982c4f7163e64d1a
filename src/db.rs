use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, Row};
use time::OffsetDateTime;

use crate::error::AppError;
use crate::models::{NewTodo, Todo, TodoPage, TodoPatch, User};
use crate::query::QueryDescriptor;

pub type DbPool = Arc<Mutex<Connection>>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        email TEXT UNIQUE NOT NULL,
        password_hash TEXT NOT NULL,
        first_name TEXT,
        last_name TEXT,
        phone_number TEXT,
        created_at INTEGER DEFAULT (strftime('%s', 'now'))
    );

    CREATE TABLE IF NOT EXISTS todos (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL CHECK (length(trim(title)) > 0),
        description TEXT NOT NULL DEFAULT '',
        due_date INTEGER NOT NULL,
        completed INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER DEFAULT (strftime('%s', 'now')),
        updated_at INTEGER DEFAULT (strftime('%s', 'now'))
    );

    CREATE INDEX IF NOT EXISTS todos_due_date ON todos (due_date);
";

const TODO_COLUMNS: &str =
    "id, title, description, due_date, completed, created_at, updated_at";

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, phone_number, created_at";

pub fn init_db(path: impl AsRef<Path>) -> rusqlite::Result<DbPool> {
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn open_in_memory() -> rusqlite::Result<DbPool> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    register_functions(conn)?;
    conn.execute_batch(SCHEMA)
}

/// Registers `contains_ci(haystack, needle)`, a literal substring test under
/// Unicode lowercase folding. Wildcards in `needle` have no meaning.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "contains_ci",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let needle = ctx.get::<String>(1)?;
            if needle.is_empty() {
                return Ok(true);
            }
            let haystack = ctx.get::<String>(0)?;
            Ok(contains_folded(&haystack, &needle))
        },
    )
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn lock(pool: &DbPool) -> Result<MutexGuard<'_, Connection>, AppError> {
    pool.lock()
        .map_err(|_| AppError::Internal("database connection lock poisoned".to_string()))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let secs: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err)))
}

fn todo_from_row(row: &Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        due_date: timestamp(row, 3)?,
        completed: row.get::<_, i32>(4)? != 0,
        created_at: timestamp(row, 5)?,
        updated_at: timestamp(row, 6)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        phone_number: row.get(5)?,
        created_at: timestamp(row, 6)?,
    })
}

// User operations
pub fn create_user(
    pool: &DbPool,
    email: &str,
    password_hash: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
    phone_number: Option<&str>,
) -> Result<Option<User>, AppError> {
    let conn = lock(pool)?;
    let inserted = conn.execute(
        "INSERT INTO users (email, password_hash, first_name, last_name, phone_number)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![email, password_hash, first_name, last_name, phone_number],
    );

    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    }

    let id = conn.last_insert_rowid();
    let user = conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        [id],
        user_from_row,
    )?;
    Ok(Some(user))
}

pub fn get_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, AppError> {
    let conn = lock(pool)?;
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;
    let mut rows = stmt.query([email])?;

    match rows.next()? {
        Some(row) => Ok(Some(user_from_row(row)?)),
        None => Ok(None),
    }
}

// Todo operations
pub fn create_todo(pool: &DbPool, todo: &NewTodo) -> Result<Todo, AppError> {
    let conn = lock(pool)?;
    conn.execute(
        "INSERT INTO todos (title, description, due_date, completed) VALUES (?1, ?2, ?3, ?4)",
        params![
            todo.title,
            todo.description,
            todo.due_date.unix_timestamp(),
            todo.completed as i32
        ],
    )?;
    let id = conn.last_insert_rowid();

    get_todo_internal(&conn, id)?
        .ok_or_else(|| AppError::Internal(format!("todo {id} vanished after insert")))
}

/// Returns the requested page and the number of todos matching the filters.
pub fn list_todos(pool: &DbPool, query: &QueryDescriptor) -> Result<TodoPage, AppError> {
    let conn = lock(pool)?;
    let filter = "contains_ci(title, ?1) AND contains_ci(description, ?2)";
    let title = &query.title_filter;
    let description = &query.description_filter;

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM todos WHERE {filter}"),
        params![title, description],
        |row| row.get(0),
    )?;

    let direction = query.sort_direction.sql();
    let mut stmt = conn.prepare(&format!(
        "SELECT {TODO_COLUMNS} FROM todos WHERE {filter}
         ORDER BY {column} {direction}, id {direction}
         LIMIT ?3 OFFSET ?4",
        column = query.sort_field.column(),
    ))?;
    let data = stmt
        .query_map(
            params![title, description, query.limit(), query.offset()],
            todo_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TodoPage {
        data,
        total: u64::try_from(total).unwrap_or_default(),
    })
}

pub fn get_todo(pool: &DbPool, id: i64) -> Result<Option<Todo>, AppError> {
    let conn = lock(pool)?;
    get_todo_internal(&conn, id)
}

pub fn update_todo(pool: &DbPool, id: i64, patch: &TodoPatch) -> Result<Option<Todo>, AppError> {
    let conn = lock(pool)?;
    if patch.is_empty() {
        return get_todo_internal(&conn, id);
    }

    let mut updates = Vec::new();
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(title) = &patch.title {
        updates.push("title = ?");
        params.push(Box::new(title.clone()));
    }
    if let Some(description) = &patch.description {
        updates.push("description = ?");
        params.push(Box::new(description.clone()));
    }
    if let Some(due_date) = patch.due_date {
        updates.push("due_date = ?");
        params.push(Box::new(due_date.unix_timestamp()));
    }
    if let Some(completed) = patch.completed {
        updates.push("completed = ?");
        params.push(Box::new(completed as i32));
    }

    updates.push("updated_at = strftime('%s', 'now')");
    params.push(Box::new(id));

    let query = format!("UPDATE todos SET {} WHERE id = ?", updates.join(", "));

    let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = conn.execute(&query, params_refs.as_slice())?;
    if rows == 0 {
        return Ok(None);
    }

    get_todo_internal(&conn, id)
}

fn get_todo_internal(conn: &Connection, id: i64) -> Result<Option<Todo>, AppError> {
    let mut stmt = conn.prepare(&format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1"))?;
    let mut rows = stmt.query([id])?;

    match rows.next()? {
        Some(row) => Ok(Some(todo_from_row(row)?)),
        None => Ok(None),
    }
}

pub fn delete_todo(pool: &DbPool, id: i64) -> Result<bool, AppError> {
    let conn = lock(pool)?;
    let rows = conn.execute("DELETE FROM todos WHERE id = ?1", [id])?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use super::*;
    use crate::query::{SortDirection, SortField};

    fn new_todo(title: &str, description: &str, due_date: OffsetDateTime) -> NewTodo {
        NewTodo {
            title: title.to_string(),
            description: description.to_string(),
            due_date,
            completed: false,
        }
    }

    fn seed(pool: &DbPool, count: usize) {
        let start = datetime!(2025-01-01 0:00 UTC);
        for i in 0..count {
            let due = start + Duration::days(i as i64);
            create_todo(pool, &new_todo(&format!("Task {i}"), "", due)).unwrap();
        }
    }

    fn titles(page: &TodoPage) -> Vec<&str> {
        page.data.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn create_then_get() {
        let pool = open_in_memory().unwrap();
        let created =
            create_todo(&pool, &new_todo("X", "", datetime!(2025-06-01 0:00 UTC))).unwrap();

        let fetched = get_todo(&pool, created.id).unwrap().unwrap();
        assert_eq!(fetched.title, "X");
        assert_eq!(fetched.description, "");
        assert!(!fetched.completed);
        assert_eq!(fetched.due_date, datetime!(2025-06-01 0:00 UTC));

        assert!(get_todo(&pool, created.id + 1).unwrap().is_none());
    }

    #[test]
    fn pagination_bounds() {
        let pool = open_in_memory().unwrap();
        seed(&pool, 25);

        for (page, expected) in [(1, 10), (2, 10), (3, 5), (4, 0)] {
            let query = QueryDescriptor {
                page,
                ..QueryDescriptor::default()
            };
            let result = list_todos(&pool, &query).unwrap();
            assert_eq!(result.data.len(), expected, "page {page}");
            assert_eq!(result.total, 25, "page {page}");
        }
    }

    #[test]
    fn sorts_by_due_date_both_ways() {
        let pool = open_in_memory().unwrap();
        create_todo(&pool, &new_todo("Jan", "", datetime!(2025-01-01 0:00 UTC))).unwrap();
        create_todo(&pool, &new_todo("Mar", "", datetime!(2025-03-01 0:00 UTC))).unwrap();
        create_todo(&pool, &new_todo("Feb", "", datetime!(2025-02-01 0:00 UTC))).unwrap();

        let asc = list_todos(&pool, &QueryDescriptor::default()).unwrap();
        assert_eq!(titles(&asc), ["Jan", "Feb", "Mar"]);

        let desc = list_todos(
            &pool,
            &QueryDescriptor {
                sort_direction: SortDirection::Desc,
                ..QueryDescriptor::default()
            },
        )
        .unwrap();
        assert_eq!(titles(&desc), ["Mar", "Feb", "Jan"]);

        let by_title = list_todos(
            &pool,
            &QueryDescriptor {
                sort_field: SortField::Title,
                ..QueryDescriptor::default()
            },
        )
        .unwrap();
        assert_eq!(titles(&by_title), ["Feb", "Jan", "Mar"]);
    }

    #[test]
    fn filters_are_case_insensitive_and_conjunctive() {
        let pool = open_in_memory().unwrap();
        let due = datetime!(2025-06-01 0:00 UTC);
        create_todo(&pool, &new_todo("Buy groceries", "Milk and bread", due)).unwrap();
        create_todo(&pool, &new_todo("Buy a bike", "Road bike", due)).unwrap();
        create_todo(&pool, &new_todo("Workout", "30 minutes cardio", due)).unwrap();

        let query = QueryDescriptor {
            title_filter: "BUY".into(),
            ..QueryDescriptor::default()
        };
        assert_eq!(list_todos(&pool, &query).unwrap().total, 2);

        let query = QueryDescriptor {
            title_filter: "buy".into(),
            description_filter: "MILK".into(),
            ..QueryDescriptor::default()
        };
        let result = list_todos(&pool, &query).unwrap();
        assert_eq!(titles(&result), ["Buy groceries"]);
        assert_eq!(result.total, 1);
    }

    #[test]
    fn filter_metacharacters_match_literally() {
        let pool = open_in_memory().unwrap();
        let due = datetime!(2025-06-01 0:00 UTC);
        create_todo(&pool, &new_todo("a.b*", "", due)).unwrap();
        create_todo(&pool, &new_todo("axb", "", due)).unwrap();
        create_todo(&pool, &new_todo("aab", "", due)).unwrap();
        create_todo(&pool, &new_todo("100% done", "", due)).unwrap();
        create_todo(&pool, &new_todo("1000 done", "", due)).unwrap();
        create_todo(&pool, &new_todo("snake_case", "", due)).unwrap();
        create_todo(&pool, &new_todo("snakeXcase", "", due)).unwrap();

        for (filter, expected) in [
            ("a.b*", vec!["a.b*"]),
            ("100%", vec!["100% done"]),
            ("e_c", vec!["snake_case"]),
            ("(", vec![]),
        ] {
            let query = QueryDescriptor {
                title_filter: filter.into(),
                ..QueryDescriptor::default()
            };
            let result = list_todos(&pool, &query).unwrap();
            assert_eq!(titles(&result), expected, "filter {filter:?}");
        }
    }

    #[test]
    fn filters_fold_non_ascii_case() {
        let pool = open_in_memory().unwrap();
        let due = datetime!(2025-06-01 0:00 UTC);
        create_todo(&pool, &new_todo("Überweisung", "Miete für März", due)).unwrap();
        create_todo(&pool, &new_todo("Ölwechsel", "", due)).unwrap();

        for (title, description, expected) in [
            ("über", "", vec!["Überweisung"]),
            ("ÜBERWEISUNG", "MÄRZ", vec!["Überweisung"]),
            ("öl", "", vec!["Ölwechsel"]),
            ("", "für", vec!["Überweisung"]),
        ] {
            let query = QueryDescriptor {
                title_filter: title.into(),
                description_filter: description.into(),
                ..QueryDescriptor::default()
            };
            let result = list_todos(&pool, &query).unwrap();
            assert_eq!(titles(&result), expected, "filter {title:?}/{description:?}");
            assert_eq!(result.total, expected.len() as u64);
        }
    }

    #[test]
    fn long_filters_do_not_fail() {
        let pool = open_in_memory().unwrap();
        let due = datetime!(2025-06-01 0:00 UTC);
        let long_title = "a".repeat(60_000);
        create_todo(&pool, &new_todo(&long_title, "", due)).unwrap();
        create_todo(&pool, &new_todo("short", "", due)).unwrap();

        let query = QueryDescriptor {
            title_filter: "A".repeat(50_000),
            ..QueryDescriptor::default()
        };
        assert_eq!(list_todos(&pool, &query).unwrap().total, 1);

        let query = QueryDescriptor {
            title_filter: "%_\\".repeat(20_000),
            ..QueryDescriptor::default()
        };
        assert_eq!(list_todos(&pool, &query).unwrap().total, 0);
    }

    #[test]
    fn folding_is_literal() {
        assert!(contains_folded("100% done", "0% D"));
        assert!(!contains_folded("1000 done", "0% d"));
        assert!(contains_folded("anything", ""));
    }

    #[test]
    fn update_merges_supplied_fields_only() {
        let pool = open_in_memory().unwrap();
        let todo = create_todo(&pool, &new_todo("A", "B", datetime!(2025-06-01 0:00 UTC))).unwrap();

        let patch = TodoPatch {
            description: Some("C".into()),
            ..TodoPatch::default()
        };
        let updated = update_todo(&pool, todo.id, &patch).unwrap().unwrap();
        assert_eq!(updated.title, "A");
        assert_eq!(updated.description, "C");
        assert_eq!(updated.due_date, todo.due_date);

        let patch = TodoPatch {
            completed: Some(true),
            ..TodoPatch::default()
        };
        assert!(update_todo(&pool, todo.id, &patch).unwrap().unwrap().completed);

        let unchanged = update_todo(&pool, todo.id, &TodoPatch::default())
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.description, "C");
        assert!(unchanged.completed);

        assert!(update_todo(&pool, todo.id + 100, &patch).unwrap().is_none());
        assert!(update_todo(&pool, todo.id + 100, &TodoPatch::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn delete_reports_missing_rows() {
        let pool = open_in_memory().unwrap();
        let todo = create_todo(&pool, &new_todo("X", "", datetime!(2025-06-01 0:00 UTC))).unwrap();

        assert!(delete_todo(&pool, todo.id).unwrap());
        assert!(!delete_todo(&pool, todo.id).unwrap());
        assert!(get_todo(&pool, todo.id).unwrap().is_none());
    }

    #[test]
    fn users_are_unique_by_email() {
        let pool = open_in_memory().unwrap();
        let user = create_user(&pool, "a@example.com", "hash", Some("Ada"), None, None)
            .unwrap()
            .unwrap();
        assert_eq!(user.first_name.as_deref(), Some("Ada"));

        assert!(create_user(&pool, "a@example.com", "other", None, None, None)
            .unwrap()
            .is_none());

        let found = get_user_by_email(&pool, "a@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.password_hash, "hash");
        assert!(get_user_by_email(&pool, "b@example.com").unwrap().is_none());
    }

    #[test]
    fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.db");

        let pool = init_db(&path).unwrap();
        create_todo(&pool, &new_todo("Persist", "", datetime!(2025-06-01 0:00 UTC))).unwrap();
        drop(pool);

        let pool = init_db(&path).unwrap();
        let page = list_todos(&pool, &QueryDescriptor::default()).unwrap();
        assert_eq!(titles(&page), ["Persist"]);
    }
}
