pub mod config;
pub mod controllers;
pub mod database;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use engine::BookingEngine;
use services::{BookingJournal, CatalogLoader};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BookingEngine>,
    /// `None` when running without Postgres (tests, local demos).
    pub journal: Option<BookingJournal>,
    pub config: config::Config,
}

impl AppState {
    /// Connects to Postgres, provisions every show from the catalog and
    /// replays journaled bookings before any request is served.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database).await?;
        db.migrate().await?;

        let engine = Arc::new(BookingEngine::with_system_clock(config.booking.engine()));
        CatalogLoader::new(db.clone()).load_into(&engine).await?;

        let journal = BookingJournal::new(db);
        journal.replay_into(&engine).await?;

        Ok(Arc::new(Self {
            engine,
            journal: Some(journal),
            config,
        }))
    }

    pub fn in_memory(config: config::Config, engine: Arc<BookingEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            journal: None,
            config,
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Showtime Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
