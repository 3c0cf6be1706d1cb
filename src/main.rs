use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use moments_server::config::Config;
use moments_server::jobs::spawn_scheduled_jobs;
use moments_server::payments::StripeGateway;
use moments_server::routes::create_routes;
use moments_server::state::AppState;
use moments_server::storage::FsArchiveStorage;
use moments_server::store::PgStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Arc::new(Config::from_env());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
        gateway: Arc::new(StripeGateway::new(config.stripe_secret_key.clone())),
        archives: Arc::new(FsArchiveStorage::new(config.archive_root.clone())),
        config: config.clone(),
    };

    spawn_scheduled_jobs(state.clone());

    let app: Router = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
