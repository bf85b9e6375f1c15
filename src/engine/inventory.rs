//! Seat inventory store.
//!
//! Единственный источник правды о занятости мест. Each show owns a fixed
//! seat layout; the only mutable part is a per-seat `AtomicU8` status, so
//! contention on one seat never blocks work on another seat or show. The
//! show index itself is behind an `RwLock` that is write-locked only while a
//! show is provisioned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::{Seat, SeatId, SeatStatus, SeatView, Show, ShowId, ShowSummary};

struct SeatSlot {
    seat: Seat,
    status: AtomicU8,
}

impl SeatSlot {
    fn status(&self) -> SeatStatus {
        // Only valid discriminants are ever stored.
        SeatStatus::from_u8(self.status.load(Ordering::Acquire)).unwrap_or(SeatStatus::Held)
    }
}

struct ShowInventory {
    show: Show,
    /// Ordered by row, then seat number.
    seats: Vec<SeatSlot>,
    index: HashMap<SeatId, usize>,
}

impl ShowInventory {
    fn slot(&self, seat_id: SeatId) -> Option<&SeatSlot> {
        self.index.get(&seat_id).map(|&i| &self.seats[i])
    }
}

#[derive(Default)]
pub struct InventoryStore {
    shows: RwLock<HashMap<ShowId, Arc<ShowInventory>>>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует сеанс; все места создаются в статусе AVAILABLE.
    pub fn provision(&self, show: Show, mut seats: Vec<Seat>) -> EngineResult<()> {
        if seats.is_empty() {
            return Err(EngineError::Validation(format!(
                "show {} has an empty seat layout",
                show.id
            )));
        }

        seats.sort_by_key(|s| (s.row, s.number, s.id));
        let mut index = HashMap::with_capacity(seats.len());
        for (i, seat) in seats.iter().enumerate() {
            if index.insert(seat.id, i).is_some() {
                return Err(EngineError::Validation(format!(
                    "seat {} appears twice in the layout of show {}",
                    seat.id, show.id
                )));
            }
        }

        let show_id = show.id;
        let seat_count = seats.len();
        let inventory = ShowInventory {
            show,
            seats: seats
                .into_iter()
                .map(|seat| SeatSlot {
                    seat,
                    status: AtomicU8::new(SeatStatus::Available.as_u8()),
                })
                .collect(),
            index,
        };

        let mut shows = self.shows.write().unwrap_or_else(PoisonError::into_inner);
        if shows.contains_key(&show_id) {
            return Err(EngineError::Validation(format!(
                "show {} is already provisioned",
                show_id
            )));
        }
        shows.insert(show_id, Arc::new(inventory));
        info!("Provisioned show {} with {} seats", show_id, seat_count);
        Ok(())
    }

    fn inventory(&self, show_id: ShowId) -> EngineResult<Arc<ShowInventory>> {
        self.shows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&show_id)
            .cloned()
            .ok_or(EngineError::ShowNotFound(show_id))
    }

    /// Все сеансы, по возрастанию id.
    pub fn shows(&self) -> Vec<Show> {
        let mut shows: Vec<Show> = self
            .shows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|inventory| inventory.show.clone())
            .collect();
        shows.sort_unstable_by_key(|show| show.id);
        shows
    }

    /// Snapshot of every seat with its current status, in layout order.
    ///
    /// Statuses are read seat by seat, so a snapshot taken during a
    /// concurrent hold may show part of it; each individual status is exact.
    pub fn get_seats(&self, show_id: ShowId) -> EngineResult<Vec<SeatView>> {
        let inventory = self.inventory(show_id)?;
        Ok(inventory
            .seats
            .iter()
            .map(|slot| SeatView {
                show_id,
                seat: slot.seat.clone(),
                status: slot.status(),
            })
            .collect())
    }

    pub fn seat(&self, show_id: ShowId, seat_id: SeatId) -> EngineResult<Seat> {
        let inventory = self.inventory(show_id)?;
        inventory
            .slot(seat_id)
            .map(|slot| slot.seat.clone())
            .ok_or_else(|| unknown_seat(show_id, seat_id))
    }

    pub fn status(&self, show_id: ShowId, seat_id: SeatId) -> EngineResult<SeatStatus> {
        let inventory = self.inventory(show_id)?;
        inventory
            .slot(seat_id)
            .map(SeatSlot::status)
            .ok_or_else(|| unknown_seat(show_id, seat_id))
    }

    /// Ids from `seat_ids` that are not part of the show layout.
    pub fn unknown_seats(&self, show_id: ShowId, seat_ids: &[SeatId]) -> EngineResult<Vec<SeatId>> {
        let inventory = self.inventory(show_id)?;
        Ok(seat_ids
            .iter()
            .copied()
            .filter(|id| !inventory.index.contains_key(id))
            .collect())
    }

    /// Compare-and-set of a single seat status. The only mutation primitive.
    pub fn try_set_status(
        &self,
        show_id: ShowId,
        seat_id: SeatId,
        expected: SeatStatus,
        new: SeatStatus,
    ) -> EngineResult<()> {
        let inventory = self.inventory(show_id)?;
        let slot = inventory
            .slot(seat_id)
            .ok_or_else(|| unknown_seat(show_id, seat_id))?;

        match slot.status.compare_exchange(
            expected.as_u8(),
            new.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                debug!("show {} seat {}: {} -> {}", show_id, seat_id, expected, new);
                Ok(())
            }
            Err(actual) => Err(EngineError::ConcurrentModification {
                show_id,
                seat_id,
                expected,
                actual: SeatStatus::from_u8(actual).unwrap_or(SeatStatus::Held),
            }),
        }
    }

    pub fn summary(&self, show_id: ShowId) -> EngineResult<ShowSummary> {
        let inventory = self.inventory(show_id)?;
        let mut summary = ShowSummary {
            show_id,
            ..ShowSummary::default()
        };
        for slot in &inventory.seats {
            summary.total_seats += 1;
            match slot.status() {
                SeatStatus::Available => summary.available_seats += 1,
                SeatStatus::Held => summary.held_seats += 1,
                SeatStatus::Sold => {
                    summary.sold_seats += 1;
                    summary.sold_revenue += slot.seat.price;
                }
            }
        }
        Ok(summary)
    }
}

fn unknown_seat(show_id: ShowId, seat_id: SeatId) -> EngineError {
    EngineError::Validation(format!("seat {} does not exist in show {}", seat_id, show_id))
}
