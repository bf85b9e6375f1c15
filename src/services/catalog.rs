//! Загрузка сеансов и раскладки мест из каталога (Postgres) в движок.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::database::Database;
use crate::engine::BookingEngine;
use crate::models::{Seat, SeatCategory, Show, ShowId};

#[derive(Debug, sqlx::FromRow)]
struct ShowRow {
    id: i64,
    screen_id: i64,
    starts_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SeatRow {
    pub show_id: i64,
    pub seat_id: i64,
    pub row: i32,
    pub number: i32,
    pub category: String,
    pub price: i64,
}

impl TryFrom<SeatRow> for Seat {
    type Error = String;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        let category: SeatCategory = row.category.parse()?;
        let price = u64::try_from(row.price)
            .map_err(|_| format!("seat {} has negative price {}", row.seat_id, row.price))?;
        Ok(Seat::new(row.seat_id, row.row, row.number, category, price))
    }
}

pub struct CatalogLoader {
    db: Database,
}

impl CatalogLoader {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Provisions every show found in the catalog. Shows with a broken
    /// layout are skipped with a warning; returns the number provisioned.
    pub async fn load_into(&self, engine: &BookingEngine) -> Result<usize, sqlx::Error> {
        let shows: Vec<ShowRow> =
            sqlx::query_as("SELECT id, screen_id, starts_at FROM shows ORDER BY id")
                .fetch_all(&self.db.pool)
                .await?;

        let seat_rows: Vec<SeatRow> = sqlx::query_as(
            "SELECT show_id, seat_id, row, number, category, price
             FROM seats
             ORDER BY show_id, row, number",
        )
        .fetch_all(&self.db.pool)
        .await?;

        let mut layouts = group_layouts(seat_rows);
        let mut provisioned = 0;

        for row in shows {
            let seats = layouts.remove(&row.id).unwrap_or_default();
            let show = Show {
                id: row.id,
                screen_id: row.screen_id,
                starts_at: row.starts_at,
            };
            match engine.provision_show(show, seats) {
                Ok(()) => provisioned += 1,
                Err(e) => warn!("Show {} skipped: {}", row.id, e),
            }
        }

        info!("Catalog loaded: {} shows provisioned", provisioned);
        Ok(provisioned)
    }
}

/// Группирует строки мест по сеансу, отбрасывая некорректные.
pub fn group_layouts(rows: Vec<SeatRow>) -> BTreeMap<ShowId, Vec<Seat>> {
    let mut layouts: BTreeMap<ShowId, Vec<Seat>> = BTreeMap::new();
    for row in rows {
        let show_id = row.show_id;
        match Seat::try_from(row) {
            Ok(seat) => layouts.entry(show_id).or_default().push(seat),
            Err(e) => warn!("Seat row of show {} ignored: {}", show_id, e),
        }
    }
    layouts
}
