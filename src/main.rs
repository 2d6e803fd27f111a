use std::time::Duration;

use axum::Router;
use emberroom::{
    db, presence::PresenceTracker, receipts::ReadReceipts, registry::RoomRegistry, rooms,
    stream::MessageStream, summary::Summarizer, sweep::Sweeper, AppState,
};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db_url =
        dotenv::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://emberroom.db?mode=rwc".to_owned());
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&db_url)
        .await?;
    db::init(&db_pool).await?;

    let sweep_interval = env_secs("SWEEP_INTERVAL_SECS", 60);
    let inactivity_window = env_secs("INACTIVITY_WINDOW_SECS", 30 * 60);

    let changes = broadcast::channel(256).0;
    let state = AppState {
        registry: RoomRegistry::new(db_pool.clone()),
        presence: PresenceTracker::new(db_pool.clone()),
        stream: MessageStream::new(db_pool.clone(), changes.clone()),
        receipts: ReadReceipts::new(db_pool.clone(), changes.clone()),
        summarizer: Summarizer::new(dotenv::var("SUMMARY_URL").ok()),
        boards: broadcast::channel(256).0,
    };

    let sweeper = Sweeper::new(
        db_pool,
        state.presence.clone(),
        changes,
        Duration::from_secs(sweep_interval),
        time::Duration::seconds(inactivity_window as i64),
    );
    tokio::spawn(sweeper.run());

    let app = Router::new()
        .nest("/rooms", rooms::router())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn env_secs(key: &str, default: u64) -> u64 {
    dotenv::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
