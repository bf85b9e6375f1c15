use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{SeatId, ShowId};

/// Ценовая категория места. Фиксируется при создании сеанса.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeatCategory {
    Silver,
    Gold,
    Platinum,
}

impl SeatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatCategory::Silver => "SILVER",
            SeatCategory::Gold => "GOLD",
            SeatCategory::Platinum => "PLATINUM",
        }
    }
}

impl fmt::Display for SeatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SILVER" => Ok(SeatCategory::Silver),
            "GOLD" => Ok(SeatCategory::Gold),
            "PLATINUM" => Ok(SeatCategory::Platinum),
            other => Err(format!("unknown seat category '{}'", other)),
        }
    }
}

/// Occupancy of one seat within one show.
///
/// Stored as a `u8` inside the inventory so that transitions can be done
/// with a single compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum SeatStatus {
    Available = 0,
    Held = 1,
    Sold = 2,
}

impl SeatStatus {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(SeatStatus::Available),
            1 => Some(SeatStatus::Held),
            2 => Some(SeatStatus::Sold),
            _ => None,
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Held => "HELD",
            SeatStatus::Sold => "SOLD",
        };
        f.write_str(s)
    }
}

/// Physical seat of a show layout. Category and price never change after provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub row: i32,
    pub number: i32,
    pub category: SeatCategory,
    /// Цена в минимальных единицах валюты.
    pub price: u64,
}

impl Seat {
    pub fn new(id: SeatId, row: i32, number: i32, category: SeatCategory, price: u64) -> Self {
        Self { id, row, number, category, price }
    }
}

/// Seat as returned by `listSeats`: layout data plus the live status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatView {
    pub show_id: ShowId,
    #[serde(flatten)]
    pub seat: Seat,
    pub status: SeatStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_survives_u8_encoding() {
        for status in [SeatStatus::Available, SeatStatus::Held, SeatStatus::Sold] {
            assert_eq!(SeatStatus::from_u8(status.as_u8()), Some(status));
        }
        assert_eq!(SeatStatus::from_u8(7), None);
    }

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("gold".parse::<SeatCategory>(), Ok(SeatCategory::Gold));
        assert_eq!(" PLATINUM ".parse::<SeatCategory>(), Ok(SeatCategory::Platinum));
        assert!("balcony".parse::<SeatCategory>().is_err());
    }

    #[test]
    fn seat_view_flattens_layout_fields() {
        let view = SeatView {
            show_id: 7,
            seat: Seat::new(3, 1, 3, SeatCategory::Silver, 15000),
            status: SeatStatus::Held,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["category"], "SILVER");
        assert_eq!(json["status"], "HELD");
    }
}
