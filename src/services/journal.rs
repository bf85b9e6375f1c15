//! Журнал подтверждённых бронирований в Postgres.
//!
//! The in-memory engine is authoritative while the process runs; the
//! journal makes bookings survive a restart. `booking_seats` carries a
//! unique `(show_id, seat_id)` constraint as a durable backstop against a
//! seat being sold twice.
//!
//! A booking whose journal write fails stays valid in memory but is lost on
//! restart, and its seats become AVAILABLE again after replay. Confirm
//! responses carry `journaled: false` in that case.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::engine::BookingEngine;
use crate::models::Booking;

#[derive(Debug, sqlx::FromRow)]
struct BookingSeatRow {
    id: Uuid,
    show_id: i64,
    user_id: String,
    session_id: String,
    total_price: i64,
    created_at: DateTime<Utc>,
    seat_id: i64,
}

#[derive(Clone)]
pub struct BookingJournal {
    db: Database,
}

impl BookingJournal {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn record(&self, booking: &Booking) -> Result<(), sqlx::Error> {
        let mut tx = self.db.pool.begin().await?;

        sqlx::query(
            "INSERT INTO bookings (id, show_id, user_id, session_id, total_price, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(booking.id)
        .bind(booking.show_id)
        .bind(&booking.user_id)
        .bind(&booking.session_id)
        .bind(booking.total_price as i64)
        .bind(booking.created_at)
        .execute(&mut *tx)
        .await?;

        for &seat_id in &booking.seat_ids {
            sqlx::query(
                "INSERT INTO booking_seats (booking_id, show_id, seat_id) VALUES ($1, $2, $3)",
            )
            .bind(booking.id)
            .bind(booking.show_id)
            .bind(seat_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!("Booking {} journaled", booking.id);
        Ok(())
    }

    /// Записывает бронь, логируя ошибку вместо её проброса.
    /// Returns whether the booking is now durable.
    pub async fn record_or_log(&self, booking: &Booking) -> bool {
        match self.record(booking).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to journal booking {}: {:?}", booking.id, e);
                false
            }
        }
    }

    /// Re-applies every journaled booking to a freshly provisioned engine.
    pub async fn replay_into(&self, engine: &BookingEngine) -> Result<usize, sqlx::Error> {
        let rows: Vec<BookingSeatRow> = sqlx::query_as(
            r#"
            SELECT b.id, b.show_id, b.user_id, b.session_id, b.total_price, b.created_at, bs.seat_id
            FROM bookings b
            JOIN booking_seats bs ON bs.booking_id = b.id
            ORDER BY b.created_at, b.id, bs.seat_id
            "#,
        )
        .fetch_all(&self.db.pool)
        .await?;

        let mut restored = 0;
        for booking in assemble(rows) {
            let id = booking.id;
            match engine.restore_booking(booking) {
                Ok(()) => restored += 1,
                Err(e) => warn!("Journaled booking {} not restored: {}", id, e),
            }
        }

        info!("Restored {} bookings from journal", restored);
        Ok(restored)
    }
}

fn assemble(rows: Vec<BookingSeatRow>) -> Vec<Booking> {
    let mut by_id: BTreeMap<(DateTime<Utc>, Uuid), Booking> = BTreeMap::new();
    for row in rows {
        let booking = by_id.entry((row.created_at, row.id)).or_insert_with(|| Booking {
            id: row.id,
            show_id: row.show_id,
            seat_ids: Vec::new(),
            user_id: row.user_id.clone(),
            session_id: row.session_id.clone(),
            total_price: row.total_price.max(0) as u64,
            created_at: row.created_at,
        });
        booking.seat_ids.push(row.seat_id);
    }
    by_id.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_fold_into_bookings() {
        let created_at = Utc::now();
        let id = Uuid::new_v4();
        let row = |seat_id| BookingSeatRow {
            id,
            show_id: 1,
            user_id: "42".into(),
            session_id: "s".into(),
            total_price: 300,
            created_at,
            seat_id,
        };

        let bookings = assemble(vec![row(1), row(2), row(3)]);
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].seat_ids, vec![1, 2, 3]);
        assert_eq!(bookings[0].total_price, 300);
    }
}
