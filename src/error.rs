use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::{HoldToken, SeatId, SeatStatus, ShowId};

/// Ошибки движка бронирования. Every multi-seat operation that returns one
/// of these has left seat state exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("show {0} is not provisioned")]
    ShowNotFound(ShowId),

    #[error("seats are not available: {conflicting:?}")]
    SeatUnavailable { conflicting: Vec<SeatId> },

    #[error("hold {0} not found")]
    HoldNotFound(HoldToken),

    #[error("hold {0} has expired")]
    HoldExpired(HoldToken),

    #[error("an authenticated user is required")]
    Authorization,

    #[error("seat {seat_id} of show {show_id} is {actual}, expected {expected}")]
    ConcurrentModification {
        show_id: ShowId,
        seat_id: SeatId,
        expected: SeatStatus,
        actual: SeatStatus,
    },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::ShowNotFound(_) => "SHOW_NOT_FOUND",
            EngineError::SeatUnavailable { .. } => "SEAT_UNAVAILABLE",
            EngineError::HoldNotFound(_) => "HOLD_NOT_FOUND",
            EngineError::HoldExpired(_) => "HOLD_EXPIRED",
            EngineError::Authorization => "AUTHORIZATION_ERROR",
            EngineError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::ShowNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::SeatUnavailable { .. } => StatusCode::CONFLICT,
            EngineError::HoldNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::HoldExpired(_) => StatusCode::GONE,
            EngineError::Authorization => StatusCode::UNAUTHORIZED,
            EngineError::ConcurrentModification { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let EngineError::SeatUnavailable { conflicting } = &self {
            body["conflicting_seat_ids"] = json!(conflicting);
        }
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_map_to_409() {
        let err = EngineError::SeatUnavailable { conflicting: vec![3] };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn expired_and_missing_holds_are_distinguished() {
        let token = HoldToken::new();
        assert_eq!(EngineError::HoldExpired(token).status_code(), StatusCode::GONE);
        assert_eq!(EngineError::HoldNotFound(token).status_code(), StatusCode::NOT_FOUND);
    }
}
