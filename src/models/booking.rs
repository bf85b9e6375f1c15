use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{SeatId, ShowId};

/// Постоянная запись о покупке. Создаётся один раз и больше не меняется.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub show_id: ShowId,
    pub seat_ids: Vec<SeatId>,
    pub user_id: String,
    pub session_id: String,
    pub total_price: u64,
    pub created_at: DateTime<Utc>,
}
