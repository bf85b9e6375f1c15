//! Reservation coordinator.
//!
//! Превращает запрос на набор мест в бронь по принципу "всё или ничего".
//!
//! Seats are acquired one compare-and-set at a time, always in ascending
//! seat id order, so two sessions contending for overlapping sets meet on
//! the same first seat instead of each grabbing half. A failed acquisition
//! rolls back every seat already taken by the same call before returning.
//!
//! Hold records live in a registry owned by the coordinator. The registry
//! lock is never held during acquisition; it is held while expired or
//! cancelled holds release their seats, so once an expiry pass returns the
//! seats it reclaimed are already AVAILABLE.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::engine::clock::Clock;
use crate::engine::inventory::InventoryStore;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Hold, HoldReceipt, HoldToken, HoldView, SeatId, SeatStatus, SelectionEvent, SelectionPhase,
    ShowId,
};

#[derive(Default)]
struct HoldRegistry {
    active: HashMap<HoldToken, Hold>,
    /// Tombstones of expired holds, so late callers get `HoldExpired`
    /// instead of `HoldNotFound`. Pruned after `max_hold_ttl`.
    expired: HashMap<HoldToken, DateTime<Utc>>,
}

pub struct ReservationCoordinator {
    store: Arc<InventoryStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    holds: Mutex<HoldRegistry>,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<InventoryStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            config,
            holds: Mutex::new(HoldRegistry::default()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HoldRegistry> {
        self.holds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_hold(
        &self,
        show_id: ShowId,
        session_id: &str,
        seat_ids: &[SeatId],
        ttl: Option<Duration>,
    ) -> EngineResult<HoldReceipt> {
        let now = self.clock.now();
        let expires_at = self.validate_request(session_id, seat_ids, ttl, now)?;

        let unknown = self.store.unknown_seats(show_id, seat_ids)?;
        if !unknown.is_empty() {
            return Err(EngineError::Validation(format!(
                "unknown seats for show {}: {:?}",
                show_id, unknown
            )));
        }

        // Истекшие брони этого сеанса освобождаются до попытки захвата.
        self.expire_show(show_id);

        let mut ordered = seat_ids.to_vec();
        ordered.sort_unstable();

        let mut acquired: Vec<SeatId> = Vec::with_capacity(ordered.len());
        for &seat_id in &ordered {
            match self
                .store
                .try_set_status(show_id, seat_id, SeatStatus::Available, SeatStatus::Held)
            {
                Ok(()) => acquired.push(seat_id),
                Err(EngineError::ConcurrentModification { .. }) => {
                    self.roll_back(show_id, &acquired);
                    let conflicting = self.conflicting_seats(show_id, &ordered, seat_id);
                    warn!(
                        "Hold rejected for session {} on show {}: seats {:?} unavailable",
                        session_id, show_id, conflicting
                    );
                    return Err(EngineError::SeatUnavailable { conflicting });
                }
                Err(other) => {
                    self.roll_back(show_id, &acquired);
                    return Err(other);
                }
            }
        }

        let hold = Hold {
            token: HoldToken::new(),
            session_id: session_id.to_string(),
            show_id,
            seat_ids: ordered,
            created_at: now,
            expires_at,
        };
        let receipt = hold.receipt();

        debug!(
            "Hold {} created for session {}: show {} seats {:?} until {}",
            hold.token, session_id, show_id, hold.seat_ids, expires_at
        );
        self.registry().active.insert(hold.token, hold);
        Ok(receipt)
    }

    fn validate_request(
        &self,
        session_id: &str,
        seat_ids: &[SeatId],
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> EngineResult<DateTime<Utc>> {
        if session_id.trim().is_empty() {
            return Err(EngineError::Validation("session id is required".to_string()));
        }
        // Тот же лимит, что и в диалоге выбора количества мест.
        SelectionPhase::CountPending
            .transition(
                SelectionEvent::CountChosen(seat_ids.len()),
                self.config.max_seats_per_booking,
            )
            .map_err(|e| EngineError::Validation(e.to_string()))?;

        let mut seen = HashSet::with_capacity(seat_ids.len());
        let duplicates: Vec<SeatId> = seat_ids
            .iter()
            .copied()
            .filter(|id| !seen.insert(*id))
            .collect();
        if !duplicates.is_empty() {
            return Err(EngineError::Validation(format!(
                "duplicate seat ids: {:?}",
                duplicates
            )));
        }

        let ttl = ttl.unwrap_or(self.config.default_hold_ttl);
        if ttl.is_zero() || ttl > self.config.max_hold_ttl {
            return Err(EngineError::Validation(format!(
                "hold ttl must be between 1s and {}s",
                self.config.max_hold_ttl.as_secs()
            )));
        }
        // Срок вычисляется до захвата мест: ошибка здесь ничего не меняет.
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| EngineError::Validation(format!("ttl {:?} is out of range", ttl)))
    }

    fn roll_back(&self, show_id: ShowId, acquired: &[SeatId]) {
        for &seat_id in acquired.iter().rev() {
            if let Err(e) =
                self.store
                    .try_set_status(show_id, seat_id, SeatStatus::Held, SeatStatus::Available)
            {
                error!("Rollback of seat {} on show {} failed: {}", seat_id, show_id, e);
            }
        }
    }

    /// Seats of the request that are not AVAILABLE right now, always
    /// including the one whose acquisition failed.
    fn conflicting_seats(&self, show_id: ShowId, requested: &[SeatId], failed: SeatId) -> Vec<SeatId> {
        requested
            .iter()
            .copied()
            .filter(|&id| {
                id == failed
                    || !matches!(self.store.status(show_id, id), Ok(SeatStatus::Available))
            })
            .collect()
    }

    /// Отмена брони. Idempotent: unknown, consumed or expired tokens are a no-op.
    pub fn cancel_hold(&self, token: HoldToken) {
        let mut registry = self.registry();
        match registry.active.remove(&token) {
            Some(hold) => {
                let expired = hold.is_expired(self.clock.now());
                self.release(&hold);
                if expired {
                    registry.expired.insert(token, hold.expires_at);
                }
                debug!("Hold {} cancelled, {} seats released", token, hold.seat_ids.len());
            }
            None => debug!("Cancel of unknown or finished hold {} ignored", token),
        }
    }

    pub fn get_hold(&self, token: HoldToken) -> EngineResult<HoldView> {
        let now = self.clock.now();
        let mut registry = self.registry();
        let current = registry
            .active
            .get(&token)
            .map(|hold| (hold.is_expired(now), hold.view(now)));
        match current {
            Some((false, view)) => Ok(view),
            Some((true, _)) => {
                if let Some(hold) = registry.active.remove(&token) {
                    self.release(&hold);
                    registry.expired.insert(token, hold.expires_at);
                }
                Err(EngineError::HoldExpired(token))
            }
            None if registry.expired.contains_key(&token) => Err(EngineError::HoldExpired(token)),
            None => Err(EngineError::HoldNotFound(token)),
        }
    }

    /// Removes an unexpired hold from the registry and hands it to the
    /// caller, which now exclusively owns its HELD seats. An expired hold is
    /// released on the spot.
    pub(crate) fn take_for_confirm(&self, token: HoldToken) -> EngineResult<Hold> {
        let now = self.clock.now();
        let mut registry = self.registry();
        match registry.active.remove(&token) {
            Some(hold) if hold.is_expired(now) => {
                self.release(&hold);
                registry.expired.insert(token, hold.expires_at);
                warn!("Confirm of expired hold {} rejected", token);
                Err(EngineError::HoldExpired(token))
            }
            Some(hold) => Ok(hold),
            None if registry.expired.contains_key(&token) => Err(EngineError::HoldExpired(token)),
            None => Err(EngineError::HoldNotFound(token)),
        }
    }

    /// Puts back a hold taken by `take_for_confirm` whose confirm aborted.
    pub(crate) fn restore(&self, hold: Hold) {
        self.registry().active.insert(hold.token, hold);
    }

    fn release(&self, hold: &Hold) {
        for &seat_id in &hold.seat_ids {
            if let Err(e) = self.store.try_set_status(
                hold.show_id,
                seat_id,
                SeatStatus::Held,
                SeatStatus::Available,
            ) {
                error!("Hold {} could not release seat {}: {}", hold.token, seat_id, e);
            }
        }
    }

    fn expire_matching(&self, registry: &mut HoldRegistry, now: DateTime<Utc>, show: Option<ShowId>) -> usize {
        let expired: Vec<HoldToken> = registry
            .active
            .values()
            .filter(|h| h.is_expired(now) && show.map_or(true, |id| h.show_id == id))
            .map(|h| h.token)
            .collect();

        for token in &expired {
            if let Some(hold) = registry.active.remove(token) {
                self.release(&hold);
                registry.expired.insert(*token, hold.expires_at);
                debug!("Hold {} expired, seats {:?} released", token, hold.seat_ids);
            }
        }
        expired.len()
    }

    fn expire_show(&self, show_id: ShowId) -> usize {
        let now = self.clock.now();
        let mut registry = self.registry();
        self.expire_matching(&mut registry, now, Some(show_id))
    }

    /// Expires every overdue hold and prunes old tombstones.
    /// Returns the number of holds expired by this pass.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut registry = self.registry();
        let count = self.expire_matching(&mut registry, now, None);

        let retention = chrono::Duration::from_std(self.config.max_hold_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(1800));
        registry.expired.retain(|_, expired_at| now - *expired_at < retention);

        if count > 0 {
            info!("Hold sweep expired {} holds", count);
        }
        count
    }

    pub fn active_holds(&self) -> usize {
        self.registry().active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;
    use crate::models::{Seat, SeatCategory, Show};

    fn setup(seats: i64) -> (Arc<InventoryStore>, Arc<ManualClock>, ReservationCoordinator) {
        let store = Arc::new(InventoryStore::new());
        let layout = (1..=seats)
            .map(|id| Seat::new(id, 1, id as i32, SeatCategory::Silver, 100))
            .collect();
        store
            .provision(Show { id: 1, screen_id: 1, starts_at: Utc::now() }, layout)
            .unwrap();
        let clock = Arc::new(ManualClock::default());
        let coordinator =
            ReservationCoordinator::new(store.clone(), clock.clone(), EngineConfig::default());
        (store, clock, coordinator)
    }

    #[test]
    fn hold_sorts_seats_and_marks_them_held() {
        let (store, _, coordinator) = setup(5);
        let receipt = coordinator.create_hold(1, "a", &[3, 1, 2], None).unwrap();
        assert_eq!(receipt.seat_ids, vec![1, 2, 3]);
        for id in 1..=3 {
            assert_eq!(store.status(1, id).unwrap(), SeatStatus::Held);
        }
        assert_eq!(store.status(1, 4).unwrap(), SeatStatus::Available);
    }

    #[test]
    fn conflict_rolls_back_already_acquired_seats() {
        let (store, _, coordinator) = setup(5);
        coordinator.create_hold(1, "a", &[3], None).unwrap();

        let err = coordinator.create_hold(1, "b", &[2, 3, 4], None).unwrap_err();
        assert_eq!(err, EngineError::SeatUnavailable { conflicting: vec![3] });
        assert_eq!(store.status(1, 2).unwrap(), SeatStatus::Available);
        assert_eq!(store.status(1, 4).unwrap(), SeatStatus::Available);
    }

    #[test]
    fn malformed_requests_are_rejected_before_mutation() {
        let (store, _, coordinator) = setup(12);
        let cases: Vec<(&str, Vec<SeatId>, Option<Duration>)> = vec![
            ("a", vec![], None),
            ("a", (1..=11).collect(), None),
            ("a", vec![1, 2, 1], None),
            ("a", vec![1, 99], None),
            ("", vec![1], None),
            ("a", vec![1], Some(Duration::ZERO)),
            ("a", vec![1], Some(Duration::from_secs(7200))),
        ];
        for (session, seats, ttl) in cases {
            let err = coordinator.create_hold(1, session, &seats, ttl).unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "{:?} -> {:?}", seats, err);
        }
        assert!(store.get_seats(1).unwrap().iter().all(|v| v.status == SeatStatus::Available));
        assert_eq!(coordinator.active_holds(), 0);
    }

    #[test]
    fn unrepresentable_ttl_is_rejected_before_any_seat_is_held() {
        let store = Arc::new(InventoryStore::new());
        store
            .provision(
                Show { id: 1, screen_id: 1, starts_at: Utc::now() },
                vec![
                    Seat::new(1, 1, 1, SeatCategory::Silver, 100),
                    Seat::new(2, 1, 2, SeatCategory::Silver, 100),
                ],
            )
            .unwrap();
        let config = EngineConfig {
            max_hold_ttl: Duration::from_secs(u64::MAX),
            ..EngineConfig::default()
        };
        let coordinator =
            ReservationCoordinator::new(store.clone(), Arc::new(ManualClock::default()), config);

        for ttl in [Duration::from_secs(u64::MAX / 2), Duration::from_secs(10u64.pow(13))] {
            let err = coordinator.create_hold(1, "s", &[1, 2], Some(ttl)).unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "{:?} -> {:?}", ttl, err);
            assert_eq!(store.status(1, 1).unwrap(), SeatStatus::Available);
            assert_eq!(store.status(1, 2).unwrap(), SeatStatus::Available);
        }
        assert_eq!(coordinator.active_holds(), 0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let (store, _, coordinator) = setup(3);
        let receipt = coordinator.create_hold(1, "a", &[1, 2], None).unwrap();
        coordinator.cancel_hold(receipt.hold_token);
        coordinator.cancel_hold(receipt.hold_token);
        assert_eq!(store.status(1, 1).unwrap(), SeatStatus::Available);

        // Повторная отмена не трогает чужую новую бронь.
        coordinator.create_hold(1, "b", &[1], None).unwrap();
        coordinator.cancel_hold(receipt.hold_token);
        assert_eq!(store.status(1, 1).unwrap(), SeatStatus::Held);
    }

    #[test]
    fn expired_hold_is_reclaimed_by_next_request() {
        let (store, clock, coordinator) = setup(3);
        let receipt = coordinator
            .create_hold(1, "a", &[1, 2], Some(Duration::from_secs(60)))
            .unwrap();
        clock.advance(chrono::Duration::seconds(60));

        coordinator.create_hold(1, "b", &[2, 3], None).unwrap();
        assert_eq!(store.status(1, 1).unwrap(), SeatStatus::Available);
        assert_eq!(
            coordinator.get_hold(receipt.hold_token).unwrap_err(),
            EngineError::HoldExpired(receipt.hold_token)
        );
    }

    #[test]
    fn sweep_releases_without_any_caller() {
        let (store, clock, coordinator) = setup(3);
        coordinator.create_hold(1, "a", &[1], Some(Duration::from_secs(10))).unwrap();
        assert_eq!(coordinator.sweep_expired(), 0);

        clock.advance(chrono::Duration::seconds(11));
        assert_eq!(coordinator.sweep_expired(), 1);
        assert_eq!(store.status(1, 1).unwrap(), SeatStatus::Available);
        assert_eq!(coordinator.active_holds(), 0);
    }

    #[test]
    fn tombstones_are_pruned_after_retention() {
        let (_, clock, coordinator) = setup(1);
        let receipt = coordinator
            .create_hold(1, "a", &[1], Some(Duration::from_secs(10)))
            .unwrap();
        clock.advance(chrono::Duration::seconds(10));
        coordinator.sweep_expired();
        assert!(matches!(coordinator.get_hold(receipt.hold_token), Err(EngineError::HoldExpired(_))));

        clock.advance(chrono::Duration::seconds(1801));
        coordinator.sweep_expired();
        assert!(matches!(coordinator.get_hold(receipt.hold_token), Err(EngineError::HoldNotFound(_))));
    }
}
