use std::net::SocketAddr;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::net::TcpListener;

use duedate::client::api::{ClientError, TodoClient};
use duedate::client::state::{Action, Status};
use duedate::client::view::{Placeholder, Row};
use duedate::client::TodoSession;
use duedate::models::{CreateTodo, UpdateTodo};
use duedate::query::QueryDescriptor;
use duedate::{create_app, db, AppState};

async fn spawn_server() -> String {
    let state = AppState {
        db: db::open_in_memory().expect("Failed to create in-memory database"),
        jwt_secret: Arc::new("test-secret".to_string()),
        base_path: Arc::new(String::new()),
    };
    let app = create_app(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

async fn seed(api: &TodoClient, count: u32) {
    for day in 1..=count {
        let todo = CreateTodo {
            title: Some(format!("Task {day:02}")),
            due_date: Some(format!("2099-01-{day:02}")),
            ..CreateTodo::default()
        };
        api.create(&todo).await.unwrap();
    }
}

fn titles(session: &TodoSession) -> Vec<String> {
    session
        .state()
        .items
        .iter()
        .map(|todo| todo.title.clone())
        .collect()
}

#[tokio::test]
async fn test_api_client_round_trip() {
    let api = TodoClient::new(&spawn_server().await);

    let created = api
        .create(&CreateTodo {
            title: Some("X".into()),
            due_date: Some("2025-06-01".into()),
            ..CreateTodo::default()
        })
        .await
        .unwrap();
    assert_eq!(api.get(created.id).await.unwrap(), created);

    let updated = api
        .update(
            created.id,
            &UpdateTodo {
                completed: Some(true),
                ..UpdateTodo::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.completed);

    let page = api.list(&QueryDescriptor::default()).await.unwrap();
    assert_eq!(page.total, 1);

    api.delete(created.id).await.unwrap();
    let err = api.delete(created.id).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "Todo item with this ID was not found");

    let err = api.create(&CreateTodo::default()).await.unwrap_err();
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn test_session_pages_and_sorts() {
    let api = TodoClient::new(&spawn_server().await);
    seed(&api, 25).await;

    let mut session = TodoSession::new(api, 10);
    session.dispatch(Action::Mount).await;
    assert_eq!(session.state().status, Status::Loaded);
    assert_eq!(session.state().total_pages, 3);
    assert_eq!(titles(&session)[0], "Task 01");

    session.dispatch(Action::SetPage(3)).await;
    assert_eq!(session.state().items.len(), 5);
    assert_eq!(session.view().pagination.label(), "Page 3 of 3");

    session.dispatch(Action::ToggleSort).await;
    assert_eq!(session.state().page, 1);
    assert_eq!(titles(&session)[0], "Task 25");

    session
        .dispatch(Action::SetTitleSearch("task 1".into()))
        .await;
    assert_eq!(session.state().total, 10);
    assert_eq!(titles(&session)[0], "Task 19");

    session
        .dispatch(Action::SetTitleSearch("nothing like this".into()))
        .await;
    assert_eq!(session.view().placeholder, Some(Placeholder::NoResults));
}

#[tokio::test]
async fn test_session_mutations() {
    let api = TodoClient::new(&spawn_server().await);
    let mut session = TodoSession::new(api, 10);
    session.dispatch(Action::Mount).await;
    assert_eq!(session.view().placeholder, Some(Placeholder::NoResults));

    session
        .dispatch(Action::Create {
            todo: CreateTodo {
                title: Some("Walk the dog".into()),
                description: Some("Evening walk".into()),
                due_date: Some("2099-05-15T18:00:00Z".into()),
                ..CreateTodo::default()
            },
            now: OffsetDateTime::now_utc(),
        })
        .await;
    assert_eq!(titles(&session), ["Walk the dog"]);
    let id = session.state().items[0].id;

    session.dispatch(Action::ToggleCompleted(id)).await;
    assert!(session.state().items[0].completed);

    session.dispatch(Action::ToggleEdit(id)).await;
    session
        .dispatch(Action::EditTitle {
            id,
            title: "Walk the cat".into(),
        })
        .await;
    session.dispatch(Action::SubmitEdit(id)).await;
    assert!(session.state().editing.is_empty());
    assert_eq!(titles(&session), ["Walk the cat"]);
    assert!(matches!(session.view().rows[0], Row::Display(_)));

    session.dispatch(Action::Delete(id)).await;
    assert!(session.state().items.is_empty());
    assert_eq!(session.state().total, 0);

    // Deleting something that is already gone keeps the view and reports why
    session.dispatch(Action::Delete(id)).await;
    assert_eq!(
        session.state().notice.as_deref(),
        Some("Todo item with this ID was not found")
    );
}

#[tokio::test]
async fn test_session_unreachable_server() {
    // Nothing listens on the discard port
    let mut session = TodoSession::new(TodoClient::new("http://127.0.0.1:9"), 10);
    session.dispatch(Action::Mount).await;

    assert_eq!(session.state().status, Status::Errored);
    assert!(matches!(
        session.view().placeholder,
        Some(Placeholder::Error(_))
    ));

    let err = TodoClient::new("http://127.0.0.1:9")
        .get(1)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}
