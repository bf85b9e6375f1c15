//! Booking transaction manager: the only path that writes SOLD.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::clock::Clock;
use crate::engine::coordinator::ReservationCoordinator;
use crate::engine::inventory::InventoryStore;
use crate::error::{EngineError, EngineResult};
use crate::models::{Booking, HoldToken, SeatId, SeatStatus, ShowId};

#[derive(Default)]
struct BookingLedger {
    bookings: HashMap<Uuid, Booking>,
    by_user: HashMap<String, Vec<Uuid>>,
}

impl BookingLedger {
    fn insert(&mut self, booking: Booking) {
        self.by_user
            .entry(booking.user_id.clone())
            .or_default()
            .push(booking.id);
        self.bookings.insert(booking.id, booking);
    }
}

pub struct BookingManager {
    store: Arc<InventoryStore>,
    coordinator: Arc<ReservationCoordinator>,
    clock: Arc<dyn Clock>,
    ledger: RwLock<BookingLedger>,
}

impl BookingManager {
    pub fn new(
        store: Arc<InventoryStore>,
        coordinator: Arc<ReservationCoordinator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            coordinator,
            clock,
            ledger: RwLock::new(BookingLedger::default()),
        }
    }

    /// Converts a live hold into a permanent booking.
    ///
    /// On any failure the hold stays registered and its seats stay HELD, so
    /// the caller may retry within the hold's lifetime.
    pub fn confirm_hold(&self, token: HoldToken, user_id: Option<&str>) -> EngineResult<Booking> {
        let user_id = match user_id.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(EngineError::Authorization),
        };

        let hold = self.coordinator.take_for_confirm(token)?;

        let outcome = self
            .total_price(hold.show_id, &hold.seat_ids)
            .and_then(|total| self.sell(token, hold.show_id, &hold.seat_ids).map(|_| total));
        let total_price = match outcome {
            Ok(total) => total,
            Err(e) => {
                self.coordinator.restore(hold);
                return Err(e);
            }
        };

        let booking = Booking {
            id: Uuid::new_v4(),
            show_id: hold.show_id,
            seat_ids: hold.seat_ids,
            user_id,
            session_id: hold.session_id,
            total_price,
            created_at: self.clock.now(),
        };

        self.ledger
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(booking.clone());

        info!(
            "Booking {} confirmed: show {} seats {:?} user {} total {}",
            booking.id, booking.show_id, booking.seat_ids, booking.user_id, booking.total_price
        );
        Ok(booking)
    }

    // Цены фиксированы при создании сеанса, поэтому сумма не зависит от порядка.
    fn total_price(&self, show_id: ShowId, seat_ids: &[SeatId]) -> EngineResult<u64> {
        seat_ids.iter().try_fold(0u64, |total, &seat_id| {
            Ok(total + self.store.seat(show_id, seat_id)?.price)
        })
    }

    /// HELD -> SOLD for every seat, or none of them.
    fn sell(&self, token: HoldToken, show_id: ShowId, seat_ids: &[SeatId]) -> EngineResult<()> {
        for (i, &seat_id) in seat_ids.iter().enumerate() {
            if let Err(e) =
                self.store
                    .try_set_status(show_id, seat_id, SeatStatus::Held, SeatStatus::Sold)
            {
                error!(
                    "Confirm of hold {} aborted, seat {} lost its HELD status: {}",
                    token, seat_id, e
                );
                for &done in seat_ids[..i].iter().rev() {
                    if let Err(e) =
                        self.store
                            .try_set_status(show_id, done, SeatStatus::Sold, SeatStatus::Held)
                    {
                        error!("Could not revert seat {} to HELD: {}", done, e);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Re-applies a booking loaded from durable storage at start-up.
    /// Seats go straight from AVAILABLE to SOLD, all or nothing.
    pub fn restore_booking(&self, booking: Booking) -> EngineResult<()> {
        {
            let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
            if ledger.bookings.contains_key(&booking.id) {
                return Err(EngineError::Validation(format!(
                    "booking {} is already restored",
                    booking.id
                )));
            }
        }

        let mut sold: Vec<SeatId> = Vec::with_capacity(booking.seat_ids.len());
        for &seat_id in &booking.seat_ids {
            if let Err(e) = self.store.try_set_status(
                booking.show_id,
                seat_id,
                SeatStatus::Available,
                SeatStatus::Sold,
            ) {
                warn!(
                    "Booking {} cannot be restored, seat {}: {}",
                    booking.id, seat_id, e
                );
                for &done in sold.iter().rev() {
                    if let Err(e) = self.store.try_set_status(
                        booking.show_id,
                        done,
                        SeatStatus::Sold,
                        SeatStatus::Available,
                    ) {
                        error!("Could not revert restored seat {} to AVAILABLE: {}", done, e);
                    }
                }
                return Err(e);
            }
            sold.push(seat_id);
        }

        self.ledger
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(booking);
        Ok(())
    }

    /// Бронирования пользователя, новые первыми.
    pub fn list_bookings(&self, user_id: &str) -> Vec<Booking> {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        let mut bookings: Vec<Booking> = ledger
            .by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| ledger.bookings.get(id).cloned())
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }

    pub fn bookings_for_show(&self, show_id: ShowId) -> Vec<Booking> {
        let ledger = self.ledger.read().unwrap_or_else(PoisonError::into_inner);
        let mut bookings: Vec<Booking> = ledger
            .bookings
            .values()
            .filter(|b| b.show_id == show_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        bookings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::clock::ManualClock;
    use crate::models::{Seat, SeatCategory, Show};
    use chrono::Utc;
    use std::time::Duration;

    struct Fixture {
        store: Arc<InventoryStore>,
        clock: Arc<ManualClock>,
        coordinator: Arc<ReservationCoordinator>,
        manager: BookingManager,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InventoryStore::new());
        let layout = vec![
            Seat::new(1, 1, 1, SeatCategory::Silver, 100),
            Seat::new(2, 1, 2, SeatCategory::Gold, 250),
            Seat::new(3, 1, 3, SeatCategory::Platinum, 400),
        ];
        store
            .provision(Show { id: 1, screen_id: 1, starts_at: Utc::now() }, layout)
            .unwrap();
        let clock = Arc::new(ManualClock::default());
        let coordinator = Arc::new(ReservationCoordinator::new(
            store.clone(),
            clock.clone(),
            EngineConfig::default(),
        ));
        let manager = BookingManager::new(store.clone(), coordinator.clone(), clock.clone());
        Fixture { store, clock, coordinator, manager }
    }

    #[test]
    fn confirm_sells_seats_and_sums_prices() {
        let f = fixture();
        let receipt = f.coordinator.create_hold(1, "s", &[3, 1], None).unwrap();
        let booking = f.manager.confirm_hold(receipt.hold_token, Some("42")).unwrap();

        assert_eq!(booking.total_price, 500);
        assert_eq!(booking.seat_ids, vec![1, 3]);
        assert_eq!(f.store.status(1, 1).unwrap(), SeatStatus::Sold);
        assert_eq!(f.store.status(1, 3).unwrap(), SeatStatus::Sold);
        assert_eq!(f.manager.list_bookings("42"), vec![booking.clone()]);
        assert_eq!(f.manager.bookings_for_show(1), vec![booking]);
        assert_eq!(f.coordinator.active_holds(), 0);
    }

    #[test]
    fn confirm_without_user_keeps_the_hold() {
        let f = fixture();
        let receipt = f.coordinator.create_hold(1, "s", &[1], None).unwrap();

        assert_eq!(
            f.manager.confirm_hold(receipt.hold_token, None).unwrap_err(),
            EngineError::Authorization
        );
        assert_eq!(
            f.manager.confirm_hold(receipt.hold_token, Some("  ")).unwrap_err(),
            EngineError::Authorization
        );
        assert_eq!(f.store.status(1, 1).unwrap(), SeatStatus::Held);
        assert!(f.manager.confirm_hold(receipt.hold_token, Some("7")).is_ok());
    }

    #[test]
    fn partial_restore_is_undone() {
        let f = fixture();
        f.coordinator.create_hold(1, "s", &[3], None).unwrap();
        let booking = Booking {
            id: Uuid::new_v4(),
            show_id: 1,
            seat_ids: vec![1, 2, 3],
            user_id: "42".to_string(),
            session_id: "old".to_string(),
            total_price: 750,
            created_at: Utc::now(),
        };

        let err = f.manager.restore_booking(booking).unwrap_err();
        assert!(matches!(err, EngineError::ConcurrentModification { seat_id: 3, .. }));
        assert_eq!(f.store.status(1, 1).unwrap(), SeatStatus::Available);
        assert_eq!(f.store.status(1, 2).unwrap(), SeatStatus::Available);
        assert_eq!(f.store.status(1, 3).unwrap(), SeatStatus::Held);
        assert!(f.manager.list_bookings("42").is_empty());
    }

    #[test]
    fn consumed_token_cannot_be_confirmed_twice() {
        let f = fixture();
        let receipt = f.coordinator.create_hold(1, "s", &[2], None).unwrap();
        f.manager.confirm_hold(receipt.hold_token, Some("1")).unwrap();
        assert_eq!(
            f.manager.confirm_hold(receipt.hold_token, Some("1")).unwrap_err(),
            EngineError::HoldNotFound(receipt.hold_token)
        );
    }

    #[test]
    fn expired_hold_is_rejected_and_released() {
        let f = fixture();
        let receipt = f
            .coordinator
            .create_hold(1, "s", &[1, 2], Some(Duration::from_secs(30)))
            .unwrap();
        f.clock.advance(chrono::Duration::seconds(31));

        assert_eq!(
            f.manager.confirm_hold(receipt.hold_token, Some("1")).unwrap_err(),
            EngineError::HoldExpired(receipt.hold_token)
        );
        assert_eq!(f.store.status(1, 1).unwrap(), SeatStatus::Available);
        assert!(f.manager.bookings_for_show(1).is_empty());
    }

    #[test]
    fn corrupted_seat_aborts_confirm_and_leaves_seats_held() {
        let f = fixture();
        let receipt = f.coordinator.create_hold(1, "s", &[1, 2, 3], None).unwrap();
        // Внешняя порча: место 3 освобождено в обход координатора.
        f.store
            .try_set_status(1, 3, SeatStatus::Held, SeatStatus::Available)
            .unwrap();

        let err = f.manager.confirm_hold(receipt.hold_token, Some("1")).unwrap_err();
        assert!(matches!(err, EngineError::ConcurrentModification { seat_id: 3, .. }));
        assert_eq!(f.store.status(1, 1).unwrap(), SeatStatus::Held);
        assert_eq!(f.store.status(1, 2).unwrap(), SeatStatus::Held);
        assert_eq!(f.coordinator.active_holds(), 1);
        assert!(f.manager.bookings_for_show(1).is_empty());
    }

    #[test]
    fn restore_marks_seats_sold_once() {
        let f = fixture();
        let booking = Booking {
            id: Uuid::new_v4(),
            show_id: 1,
            seat_ids: vec![1, 2],
            user_id: "9".into(),
            session_id: "old".into(),
            total_price: 350,
            created_at: Utc::now(),
        };
        f.manager.restore_booking(booking.clone()).unwrap();
        assert_eq!(f.store.status(1, 2).unwrap(), SeatStatus::Sold);
        assert!(f.manager.restore_booking(booking).is_err());

        let overlapping = Booking {
            id: Uuid::new_v4(),
            seat_ids: vec![3, 2],
            ..f.manager.list_bookings("9")[0].clone()
        };
        assert!(f.manager.restore_booking(overlapping).is_err());
        assert_eq!(f.store.status(1, 3).unwrap(), SeatStatus::Available);
    }

    #[test]
    fn bookings_are_listed_newest_first() {
        let f = fixture();
        let first = f.coordinator.create_hold(1, "s", &[1], None).unwrap();
        let first = f.manager.confirm_hold(first.hold_token, Some("u")).unwrap();
        f.clock.advance(chrono::Duration::seconds(5));
        let second = f.coordinator.create_hold(1, "s", &[2], None).unwrap();
        let second = f.manager.confirm_hold(second.hold_token, Some("u")).unwrap();

        let ids: Vec<Uuid> = f.manager.list_bookings("u").iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(f.manager.list_bookings("nobody").is_empty());
    }
}
