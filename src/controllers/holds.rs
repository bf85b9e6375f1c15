use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::EngineError;
use crate::middleware::AuthUser;
use crate::models::{Booking, HoldToken};
use crate::AppState;

#[derive(Debug, Serialize)]
struct ConfirmResponse {
    #[serde(flatten)]
    booking: Booking,
    /// `false` when the booking exists only in memory and will not survive
    /// a restart.
    journaled: bool,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/holds/{token}", get(get_hold).delete(cancel_hold))
        .route("/holds/{token}/confirm", post(confirm_hold))
}

// GET /api/holds/{token}
async fn get_hold(
    State(state): State<Arc<AppState>>,
    Path(token): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let view = state.engine.get_hold(HoldToken::from(token))?;
    Ok((StatusCode::OK, Json(view)))
}

// DELETE /api/holds/{token} - идемпотентно
async fn cancel_hold(
    State(state): State<Arc<AppState>>,
    Path(token): Path<Uuid>,
) -> StatusCode {
    state.engine.cancel_hold(HoldToken::from(token));
    StatusCode::NO_CONTENT
}

// POST /api/holds/{token}/confirm
async fn confirm_hold(
    State(state): State<Arc<AppState>>,
    Path(token): Path<Uuid>,
    user: AuthUser,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state
        .engine
        .confirm_hold(HoldToken::from(token), Some(user.user_id.as_str()))?;

    // Бронь уже действительна в памяти; сбой журнала виден клиенту.
    let journaled = match &state.journal {
        Some(journal) => journal.record_or_log(&booking).await,
        None => false,
    };

    Ok((StatusCode::CREATED, Json(ConfirmResponse { booking, journaled })))
}
