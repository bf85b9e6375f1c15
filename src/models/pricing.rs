use serde::Serialize;

use super::SeatCategory;

/// Display label derived from category occupancy. Never stored on a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScarcityLabel {
    #[serde(rename = "Available")]
    Available,
    #[serde(rename = "Filling Fast")]
    FillingFast,
    #[serde(rename = "Sold Out")]
    SoldOut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceCategory {
    pub name: SeatCategory,
    /// Lowest seat price in the category, minor units.
    pub price: u64,
    pub label: ScarcityLabel,
    pub available: u32,
    pub total: u32,
}
