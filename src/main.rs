use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tracing::info;

use duedate::{create_app, db, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let port: u16 = std::env::var("DUEDATE_PORT")
        .expect("DUEDATE_PORT to be set")
        .parse()
        .expect("port number");

    let jwt_secret = std::env::var("DUEDATE_JWT_SECRET").expect("DUEDATE_JWT_SECRET to be set");

    let database = std::env::var("DUEDATE_DATABASE").unwrap_or_else(|_| "todos.db".to_string());

    let base_path = std::env::var("DUEDATE_BASE_PATH")
        .ok()
        .map(|path| {
            let path = path.trim_end_matches('/');
            if path.is_empty() || path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{}", path)
            }
        })
        .unwrap_or_default();

    let db = db::init_db(&database).expect("initializing database");
    info!(%database, "opened database");

    let state = AppState {
        db,
        jwt_secret: Arc::new(jwt_secret),
        base_path: Arc::new(base_path),
    };
    let app = create_app(state);
    let addr = (Ipv4Addr::UNSPECIFIED, port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind to port {port}: {err}"));

    info!("running on {addr:?}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("failed serving");
}
