use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use crate::error::EngineError;
use crate::middleware::SessionId;
use crate::models::{SeatId, SeatStatus, ShowId};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shows", get(list_shows))
        .route("/shows/{show_id}/seats", get(get_seats))
        .route("/shows/{show_id}/categories", get(get_categories))
        .route("/shows/{show_id}/summary", get(get_summary))
        .route("/shows/{show_id}/holds", post(create_hold))
}

// GET /api/shows
async fn list_shows(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.shows())
}

/* ---------- SEATS ---------- */

#[derive(Debug, Deserialize)]
struct SeatsQuery {
    row: Option<i32>,
    status: Option<SeatStatus>, // AVAILABLE, HELD, SOLD
}

// GET /api/shows/{show_id}/seats
async fn get_seats(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
    Query(params): Query<SeatsQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let seats: Vec<_> = state
        .engine
        .list_seats(show_id)?
        .into_iter()
        .filter(|v| params.row.map_or(true, |r| v.seat.row == r))
        .filter(|v| params.status.map_or(true, |s| v.status == s))
        .collect();

    Ok((StatusCode::OK, Json(seats)))
}

// GET /api/shows/{show_id}/categories
async fn get_categories(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
) -> Result<impl IntoResponse, EngineError> {
    let categories = state.engine.list_price_categories(show_id)?;
    Ok((StatusCode::OK, Json(categories)))
}

// GET /api/shows/{show_id}/summary
async fn get_summary(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
) -> Result<impl IntoResponse, EngineError> {
    let summary = state.engine.show_summary(show_id)?;
    Ok((StatusCode::OK, Json(summary)))
}

/* ---------- HOLDS ---------- */

#[derive(Debug, Deserialize, Validate)]
struct CreateHoldRequest {
    #[validate(length(min = 1, message = "at least one seat must be selected"))]
    seat_ids: Vec<SeatId>,
    #[validate(range(min = 1, message = "ttl_seconds must be positive"))]
    ttl_seconds: Option<u64>,
}

// POST /api/shows/{show_id}/holds
async fn create_hold(
    State(state): State<Arc<AppState>>,
    Path(show_id): Path<ShowId>,
    session: SessionId,
    Json(req): Json<CreateHoldRequest>,
) -> Result<impl IntoResponse, EngineError> {
    req.validate()
        .map_err(|e| EngineError::Validation(e.to_string()))?;

    let receipt = state.engine.create_hold(
        show_id,
        &session.0,
        &req.seat_ids,
        req.ttl_seconds.map(Duration::from_secs),
    )?;

    Ok((StatusCode::CREATED, Json(receipt)))
}
