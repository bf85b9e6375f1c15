use std::collections::BTreeMap;

use crate::engine::inventory::InventoryStore;
use crate::error::EngineResult;
use crate::models::{PriceCategory, ScarcityLabel, SeatCategory, SeatStatus, ShowId};

/// Derives per-category price and scarcity label from live occupancy.
/// Holds no state besides the threshold, so results are never stale.
#[derive(Debug, Clone)]
pub struct PriceResolver {
    filling_fast_threshold: f64,
}

impl PriceResolver {
    pub fn new(filling_fast_threshold: f64) -> Self {
        Self { filling_fast_threshold }
    }

    pub fn resolve(&self, store: &InventoryStore, show_id: ShowId) -> EngineResult<Vec<PriceCategory>> {
        // (минимальная цена, свободно, всего)
        let mut by_category: BTreeMap<SeatCategory, (u64, u32, u32)> = BTreeMap::new();

        for view in store.get_seats(show_id)? {
            let entry = by_category
                .entry(view.seat.category)
                .or_insert((view.seat.price, 0, 0));
            entry.0 = entry.0.min(view.seat.price);
            entry.2 += 1;
            if view.status == SeatStatus::Available {
                entry.1 += 1;
            }
        }

        Ok(by_category
            .into_iter()
            .map(|(name, (price, available, total))| PriceCategory {
                name,
                price,
                label: self.label(available, total),
                available,
                total,
            })
            .collect())
    }

    /// `Filling Fast` when `available / total <= threshold` (inclusive).
    pub fn label(&self, available: u32, total: u32) -> ScarcityLabel {
        if available == 0 {
            return ScarcityLabel::SoldOut;
        }
        let ratio = available as f64 / total as f64;
        if ratio <= self.filling_fast_threshold {
            ScarcityLabel::FillingFast
        } else {
            ScarcityLabel::Available
        }
    }
}
