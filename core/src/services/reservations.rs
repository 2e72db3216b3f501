//! Reservation service holding stock against future shipments

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::models::Reservation;
use shared::validation::validate_positive_quantity;

/// Reservation service
#[derive(Clone)]
pub struct ReservationService {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    warehouse_id: Uuid,
    item_id: Uuid,
    quantity: Decimal,
    holder: String,
    shipment_id: Option<Uuid>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        Reservation {
            id: row.id,
            warehouse_id: row.warehouse_id,
            item_id: row.item_id,
            quantity: row.quantity,
            holder: row.holder,
            shipment_id: row.shipment_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

impl ReservationService {
    /// Create a new ReservationService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Place a hold within an existing transaction
    ///
    /// Locks the stock row so concurrent holds for the same item serialize;
    /// the hold is rejected when it exceeds the unreserved balance.
    pub async fn reserve_in_tx(
        conn: &mut PgConnection,
        warehouse_id: Uuid,
        item_id: Uuid,
        quantity: Decimal,
        holder: &str,
        shipment_id: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Reservation> {
        validate_positive_quantity(quantity).map_err(|msg| AppError::Validation {
            field: "quantity".to_string(),
            message: msg.to_string(),
        })?;

        if holder.trim().is_empty() {
            return Err(AppError::Validation {
                field: "holder".to_string(),
                message: "Holder cannot be empty".to_string(),
            });
        }

        // Lock the stock row for the duration of the check
        let on_hand = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT quantity FROM stock_entries
            WHERE warehouse_id = $1 AND item_id = $2
            FOR UPDATE
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?
        .unwrap_or(Decimal::ZERO);

        let reserved = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity), 0) FROM reservations
            WHERE warehouse_id = $1 AND item_id = $2
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_one(&mut *conn)
        .await?;

        let available = on_hand - reserved;
        if quantity > available {
            return Err(AppError::InsufficientStock(format!(
                "{} available, {} requested",
                available, quantity
            )));
        }

        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            INSERT INTO reservations (warehouse_id, item_id, quantity, holder, shipment_id, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, warehouse_id, item_id, quantity, holder, shipment_id, expires_at, created_at
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .bind(quantity)
        .bind(holder)
        .bind(shipment_id)
        .bind(expires_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.into())
    }

    /// Release every hold linked to a shipment
    pub async fn release_for_shipment_in_tx(
        conn: &mut PgConnection,
        shipment_id: Uuid,
    ) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM reservations WHERE shipment_id = $1")
            .bind(shipment_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Place a standalone hold on stock
    pub async fn reserve(
        &self,
        warehouse_id: Uuid,
        item_id: Uuid,
        quantity: Decimal,
        holder: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<Reservation> {
        let mut tx = self.db.begin().await?;

        let reservation = Self::reserve_in_tx(
            &mut tx,
            warehouse_id,
            item_id,
            quantity,
            holder,
            None,
            expires_at,
        )
        .await?;

        tx.commit().await?;

        Ok(reservation)
    }

    /// Cancel a hold, returning the quantity to the available pool
    pub async fn cancel_reservation(&self, reservation_id: Uuid) -> AppResult<()> {
        let deleted =
            sqlx::query_scalar::<_, Uuid>("DELETE FROM reservations WHERE id = $1 RETURNING id")
                .bind(reservation_id)
                .fetch_optional(&self.db)
                .await?;

        if deleted.is_none() {
            return Err(AppError::NotFound("Reservation".to_string()));
        }

        Ok(())
    }

    /// Get a reservation by ID
    pub async fn get_reservation(&self, reservation_id: Uuid) -> AppResult<Reservation> {
        let row = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT id, warehouse_id, item_id, quantity, holder, shipment_id, expires_at, created_at
            FROM reservations
            WHERE id = $1
            "#,
        )
        .bind(reservation_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Reservation".to_string()))?;

        Ok(row.into())
    }

    /// List reservations, oldest first
    pub async fn list_reservations(
        &self,
        warehouse_id: Option<Uuid>,
        item_id: Option<Uuid>,
        include_expired: bool,
    ) -> AppResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT id, warehouse_id, item_id, quantity, holder, shipment_id, expires_at, created_at
            FROM reservations
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
              AND ($2::uuid IS NULL OR item_id = $2)
              AND ($3 OR expires_at IS NULL OR expires_at > NOW())
            ORDER BY created_at
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .bind(include_expired)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Reservation::from).collect())
    }

    /// Drop every hold whose deadline has passed
    ///
    /// Safe to run repeatedly; a run that finds nothing is a no-op.
    pub async fn expire_stale(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM reservations WHERE expires_at IS NOT NULL AND expires_at <= NOW()",
        )
        .execute(&self.db)
        .await?;

        let released = result.rows_affected();
        if released > 0 {
            tracing::info!("Released {} expired reservations", released);
        }

        Ok(released)
    }
}
