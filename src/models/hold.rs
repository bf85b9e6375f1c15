use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{SeatId, ShowId};

/// Opaque capability returned by `createHold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoldToken(Uuid);

impl HoldToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HoldToken {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for HoldToken {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for HoldToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Временная бронь набора мест одного сеанса.
///
/// Owned by the reservation coordinator; the inventory only sees the HELD
/// statuses it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hold {
    pub token: HoldToken,
    pub session_id: String,
    pub show_id: ShowId,
    /// Sorted ascending, no duplicates.
    pub seat_ids: Vec<SeatId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    /// A hold is expired at its expiry instant, not after it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn receipt(&self) -> HoldReceipt {
        HoldReceipt {
            hold_token: self.token,
            show_id: self.show_id,
            seat_ids: self.seat_ids.clone(),
            expires_at: self.expires_at,
        }
    }

    pub fn view(&self, now: DateTime<Utc>) -> HoldView {
        HoldView {
            hold_token: self.token,
            show_id: self.show_id,
            session_id: self.session_id.clone(),
            seat_ids: self.seat_ids.clone(),
            expires_at: self.expires_at,
            remaining_seconds: (self.expires_at - now).num_seconds().max(0),
        }
    }
}

/// Result of a successful `createHold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldReceipt {
    pub hold_token: HoldToken,
    pub show_id: ShowId,
    pub seat_ids: Vec<SeatId>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldView {
    pub hold_token: HoldToken,
    pub show_id: ShowId,
    pub session_id: String,
    pub seat_ids: Vec<SeatId>,
    pub expires_at: DateTime<Utc>,
    pub remaining_seconds: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn hold_expiring_at(expires_at: DateTime<Utc>) -> Hold {
        Hold {
            token: HoldToken::new(),
            session_id: "s-1".into(),
            show_id: 1,
            seat_ids: vec![1, 2],
            created_at: expires_at - Duration::seconds(300),
            expires_at,
        }
    }

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let deadline = Utc::now();
        let hold = hold_expiring_at(deadline);
        assert!(!hold.is_expired(deadline - Duration::milliseconds(1)));
        assert!(hold.is_expired(deadline));
    }

    #[test]
    fn view_never_reports_negative_remaining_time() {
        let deadline = Utc::now();
        let hold = hold_expiring_at(deadline);
        assert_eq!(hold.view(deadline + Duration::seconds(30)).remaining_seconds, 0);
        assert_eq!(hold.view(deadline - Duration::seconds(30)).remaining_seconds, 30);
    }
}
