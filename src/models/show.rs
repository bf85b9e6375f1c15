use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ShowId;

/// A single screening. Seat state lives in the inventory, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    pub id: ShowId,
    pub screen_id: i64,
    pub starts_at: DateTime<Utc>,
}

/// Live occupancy counters of a show.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShowSummary {
    pub show_id: ShowId,
    pub total_seats: u32,
    pub available_seats: u32,
    pub held_seats: u32,
    pub sold_seats: u32,
    /// Сумма цен проданных мест.
    pub sold_revenue: u64,
}
