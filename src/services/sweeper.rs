use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::engine::BookingEngine;

/// Периодически освобождает места истекших броней, даже если никто не
/// обращается к сеансу.
pub struct HoldSweeper {
    engine: Arc<BookingEngine>,
    interval: Duration,
}

impl HoldSweeper {
    pub fn new(engine: Arc<BookingEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    pub fn sweep_once(&self) -> usize {
        let expired = self.engine.sweep_expired_holds();
        if expired > 0 {
            info!("🧹 Released seats of {} expired holds", expired);
        } else {
            debug!("🧹 No expired holds");
        }
        expired
    }

    pub async fn run(self) {
        info!("Hold sweeper started, interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sweep_once();
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
