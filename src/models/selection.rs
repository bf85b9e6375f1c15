//! Client-side booking flow.
//!
//! Шаги: выбор количества мест -> выбор мест на схеме -> активная бронь ->
//! подтверждение / истечение / отмена. The engine only takes part from
//! `SeatsPending` onwards; the earlier step is validated here so that the
//! seat-count dialog and the engine share one cap.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionPhase {
    CountPending,
    SeatsPending,
    HoldActive,
    Confirmed,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    /// Пользователь выбрал количество мест.
    CountChosen(usize),
    HoldCreated,
    /// Hold rejected (conflict); the user picks other seats.
    HoldRejected,
    HoldConfirmed,
    HoldExpired,
    HoldCancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("seat count must be between 1 and {max}, got {requested}")]
    InvalidCount { requested: usize, max: usize },
    #[error("event {event:?} is not allowed in phase {phase:?}")]
    InvalidTransition { phase: SelectionPhase, event: SelectionEvent },
}

impl SelectionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SelectionPhase::Confirmed | SelectionPhase::Expired | SelectionPhase::Cancelled
        )
    }

    /// Returns the next phase or rejects the event.
    pub fn transition(
        self,
        event: SelectionEvent,
        max_seats: usize,
    ) -> Result<SelectionPhase, SelectionError> {
        use SelectionEvent as E;
        use SelectionPhase as P;

        match (self, event) {
            (P::CountPending, E::CountChosen(n)) => {
                if n == 0 || n > max_seats {
                    Err(SelectionError::InvalidCount { requested: n, max: max_seats })
                } else {
                    Ok(P::SeatsPending)
                }
            }
            (P::SeatsPending, E::HoldCreated) => Ok(P::HoldActive),
            (P::SeatsPending, E::HoldRejected) => Ok(P::SeatsPending),
            (P::HoldActive, E::HoldConfirmed) => Ok(P::Confirmed),
            (P::HoldActive, E::HoldExpired) => Ok(P::Expired),
            (P::HoldActive, E::HoldCancelled) => Ok(P::Cancelled),
            // Истекшая бронь возвращает пользователя к выбору количества.
            (P::Expired, E::CountChosen(_)) | (P::Cancelled, E::CountChosen(_)) => {
                P::CountPending.transition(event, max_seats)
            }
            (phase, event) => Err(SelectionError::InvalidTransition { phase, event }),
        }
    }
}
