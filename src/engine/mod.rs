//! Seat reservation and booking engine.
//!
//! Компоненты (от листьев к корню):
//! 1.  **InventoryStore**: per-show seat status map with a single
//!     compare-and-set mutation primitive.
//! 2.  **PriceResolver**: category price and scarcity label computed from
//!     live counts on every call.
//! 3.  **ReservationCoordinator**: all-or-nothing holds with ordered
//!     acquisition, TTL expiry and idempotent cancel.
//! 4.  **BookingManager**: turns a live hold into a permanent booking; the
//!     only writer of SOLD.
//!
//! `BookingEngine` wires them together behind the operations exposed to
//! the HTTP layer.

pub mod booking;
pub mod clock;
pub mod coordinator;
pub mod inventory;
pub mod pricing;

use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::models::{
    Booking, HoldReceipt, HoldToken, HoldView, PriceCategory, Seat, SeatId, SeatView, Show,
    ShowId, ShowSummary,
};

pub use booking::BookingManager;
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::ReservationCoordinator;
pub use inventory::InventoryStore;
pub use pricing::PriceResolver;

pub struct BookingEngine {
    inventory: Arc<InventoryStore>,
    pricing: PriceResolver,
    coordinator: Arc<ReservationCoordinator>,
    bookings: BookingManager,
}

impl BookingEngine {
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let pricing = PriceResolver::new(config.filling_fast_threshold);
        let inventory = Arc::new(InventoryStore::new());
        let coordinator = Arc::new(ReservationCoordinator::new(
            inventory.clone(),
            clock.clone(),
            config,
        ));
        let bookings = BookingManager::new(inventory.clone(), coordinator.clone(), clock);
        Self {
            pricing,
            inventory,
            coordinator,
            bookings,
        }
    }

    pub fn with_system_clock(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn inventory(&self) -> &InventoryStore {
        &self.inventory
    }

    // === Provisioning ===

    pub fn provision_show(&self, show: Show, seats: Vec<Seat>) -> EngineResult<()> {
        self.inventory.provision(show, seats)
    }

    pub fn restore_booking(&self, booking: Booking) -> EngineResult<()> {
        self.bookings.restore_booking(booking)
    }

    pub fn shows(&self) -> Vec<Show> {
        self.inventory.shows()
    }

    // === Caller operations ===

    pub fn list_seats(&self, show_id: ShowId) -> EngineResult<Vec<SeatView>> {
        self.inventory.get_seats(show_id)
    }

    pub fn list_price_categories(&self, show_id: ShowId) -> EngineResult<Vec<PriceCategory>> {
        self.pricing.resolve(&self.inventory, show_id)
    }

    pub fn show_summary(&self, show_id: ShowId) -> EngineResult<ShowSummary> {
        self.inventory.summary(show_id)
    }

    pub fn create_hold(
        &self,
        show_id: ShowId,
        session_id: &str,
        seat_ids: &[SeatId],
        ttl: Option<Duration>,
    ) -> EngineResult<HoldReceipt> {
        self.coordinator.create_hold(show_id, session_id, seat_ids, ttl)
    }

    pub fn get_hold(&self, token: HoldToken) -> EngineResult<HoldView> {
        self.coordinator.get_hold(token)
    }

    pub fn cancel_hold(&self, token: HoldToken) {
        self.coordinator.cancel_hold(token)
    }

    pub fn confirm_hold(&self, token: HoldToken, user_id: Option<&str>) -> EngineResult<Booking> {
        self.bookings.confirm_hold(token, user_id)
    }

    pub fn list_bookings(&self, user_id: &str) -> Vec<Booking> {
        self.bookings.list_bookings(user_id)
    }

    pub fn bookings_for_show(&self, show_id: ShowId) -> Vec<Booking> {
        self.bookings.bookings_for_show(show_id)
    }

    // === Maintenance ===

    pub fn sweep_expired_holds(&self) -> usize {
        self.coordinator.sweep_expired()
    }

    pub fn active_holds(&self) -> usize {
        self.coordinator.active_holds()
    }
}
