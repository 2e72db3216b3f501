//! Shipment service: recipients, drafting, reservation and fulfillment

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::ledger::{MovementRefs, StockLedgerService};
use crate::services::reservations::ReservationService;
use shared::models::{
    hold_deadline, FulfillmentOutcome, ItemKind, MovementKind, Recipient, Shipment, ShipmentItem,
    ShipmentStatus,
};
use shared::validation::{validate_display_name, validate_positive_quantity};

/// Shipment service
#[derive(Clone)]
pub struct ShipmentService {
    db: PgPool,
    reservation_ttl_days: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct ShipmentRow {
    id: Uuid,
    recipient_id: Uuid,
    warehouse_id: Uuid,
    status: String,
    scheduled_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    fulfilled_at: Option<DateTime<Utc>>,
}

impl ShipmentRow {
    fn into_shipment(self, items: Vec<ShipmentItem>) -> AppResult<Shipment> {
        let status = ShipmentStatus::from_str(&self.status).ok_or_else(|| {
            AppError::Internal(format!("Unknown shipment status: {}", self.status))
        })?;
        Ok(Shipment {
            id: self.id,
            recipient_id: self.recipient_id,
            warehouse_id: self.warehouse_id,
            status,
            scheduled_date: self.scheduled_date,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
            fulfilled_at: self.fulfilled_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecipientRow {
    id: Uuid,
    name: String,
    contact: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RecipientRow> for Recipient {
    fn from(row: RecipientRow) -> Self {
        Recipient {
            id: row.id,
            name: row.name,
            contact: row.contact,
            created_at: row.created_at,
        }
    }
}

/// Input for creating a draft shipment
#[derive(Debug, Deserialize)]
pub struct CreateShipmentInput {
    pub recipient_id: Uuid,
    pub warehouse_id: Uuid,
    pub scheduled_date: Option<NaiveDate>,
}

impl ShipmentService {
    /// Create a new ShipmentService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            reservation_ttl_days: config.stock.reservation_ttl_days,
        }
    }

    /// Register a recipient
    pub async fn create_recipient(
        &self,
        name: &str,
        contact: Option<&str>,
    ) -> AppResult<Recipient> {
        validate_display_name(name).map_err(|msg| AppError::Validation {
            field: "name".to_string(),
            message: msg.to_string(),
        })?;

        // Check for duplicate name
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM recipients WHERE LOWER(name) = LOWER($1))",
        )
        .bind(name)
        .fetch_one(&self.db)
        .await?;

        if exists {
            return Err(AppError::DuplicateEntry("recipient name".to_string()));
        }

        let row = sqlx::query_as::<_, RecipientRow>(
            r#"
            INSERT INTO recipients (name, contact)
            VALUES ($1, $2)
            RETURNING id, name, contact, created_at
            "#,
        )
        .bind(name)
        .bind(contact)
        .fetch_one(&self.db)
        .await?;

        Ok(row.into())
    }

    /// List recipients alphabetically
    pub async fn list_recipients(&self) -> AppResult<Vec<Recipient>> {
        let rows = sqlx::query_as::<_, RecipientRow>(
            "SELECT id, name, contact, created_at FROM recipients ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Recipient::from).collect())
    }

    /// Open a new draft shipment
    pub async fn create_shipment(&self, input: CreateShipmentInput) -> AppResult<Shipment> {
        // Validate recipient exists
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM recipients WHERE id = $1)")
                .bind(input.recipient_id)
                .fetch_one(&self.db)
                .await?;

        if !exists {
            return Err(AppError::NotFound("Recipient".to_string()));
        }

        // Validate warehouse exists
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM warehouses WHERE id = $1)")
                .bind(input.warehouse_id)
                .fetch_one(&self.db)
                .await?;

        if !exists {
            return Err(AppError::NotFound("Warehouse".to_string()));
        }

        let row = sqlx::query_as::<_, ShipmentRow>(
            r#"
            INSERT INTO shipments (recipient_id, warehouse_id, status, scheduled_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id, recipient_id, warehouse_id, status, scheduled_date,
                      created_at, updated_at, fulfilled_at
            "#,
        )
        .bind(input.recipient_id)
        .bind(input.warehouse_id)
        .bind(ShipmentStatus::Draft.as_str())
        .bind(input.scheduled_date)
        .fetch_one(&self.db)
        .await?;

        row.into_shipment(Vec::new())
    }

    /// Add a finished-goods line to a draft shipment
    pub async fn add_item(
        &self,
        shipment_id: Uuid,
        item_id: Uuid,
        quantity: Decimal,
    ) -> AppResult<Shipment> {
        validate_positive_quantity(quantity).map_err(|msg| AppError::Validation {
            field: "quantity".to_string(),
            message: msg.to_string(),
        })?;

        let mut tx = self.db.begin().await?;

        let row = lock_shipment(&mut tx, shipment_id).await?;
        let status = parse_status(&row.status)?;
        if status != ShipmentStatus::Draft {
            return Err(AppError::InvalidStateTransition(
                "Items can only be edited on a draft shipment".to_string(),
            ));
        }

        // Only finished goods leave through shipments
        let kind = sqlx::query_scalar::<_, String>("SELECT kind FROM items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        if kind != ItemKind::Finished.as_str() {
            return Err(AppError::Validation {
                field: "item_id".to_string(),
                message: "Only finished items can be shipped".to_string(),
            });
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM shipment_items WHERE shipment_id = $1 AND item_id = $2)",
        )
        .bind(shipment_id)
        .bind(item_id)
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            return Err(AppError::DuplicateEntry("shipment item".to_string()));
        }

        sqlx::query("INSERT INTO shipment_items (shipment_id, item_id, quantity) VALUES ($1, $2, $3)")
            .bind(shipment_id)
            .bind(item_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

        let row = touch_shipment(&mut tx, shipment_id).await?;
        let items = fetch_items(&mut *tx, shipment_id).await?;

        tx.commit().await?;

        row.into_shipment(items)
    }

    /// Remove a line from a draft shipment
    pub async fn remove_item(&self, shipment_id: Uuid, item_id: Uuid) -> AppResult<Shipment> {
        let mut tx = self.db.begin().await?;

        let row = lock_shipment(&mut tx, shipment_id).await?;
        let status = parse_status(&row.status)?;
        if status != ShipmentStatus::Draft {
            return Err(AppError::InvalidStateTransition(
                "Items can only be edited on a draft shipment".to_string(),
            ));
        }

        let deleted = sqlx::query_scalar::<_, Uuid>(
            "DELETE FROM shipment_items WHERE shipment_id = $1 AND item_id = $2 RETURNING item_id",
        )
        .bind(shipment_id)
        .bind(item_id)
        .fetch_optional(&mut *tx)
        .await?;

        if deleted.is_none() {
            return Err(AppError::NotFound("Shipment item".to_string()));
        }

        let row = touch_shipment(&mut tx, shipment_id).await?;
        let items = fetch_items(&mut *tx, shipment_id).await?;

        tx.commit().await?;

        row.into_shipment(items)
    }

    /// Place holds for every line and move the shipment to reserved
    ///
    /// One transaction: a single line exceeding the available balance rolls
    /// back every hold already placed.
    pub async fn reserve_shipment(&self, shipment_id: Uuid) -> AppResult<Shipment> {
        let mut tx = self.db.begin().await?;

        let row = lock_shipment(&mut tx, shipment_id).await?;
        let status = parse_status(&row.status)?;
        if !status.can_transition_to(ShipmentStatus::Reserved) {
            return Err(AppError::InvalidStateTransition(format!(
                "Shipment in status {} cannot be reserved",
                status.as_str()
            )));
        }

        let items = fetch_items(&mut *tx, shipment_id).await?;
        if items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "Shipment has no items".to_string(),
            });
        }

        let expires_at = row
            .scheduled_date
            .map(|date| hold_deadline(date, self.reservation_ttl_days));
        let holder = format!("shipment {}", shipment_id);

        for item in &items {
            ReservationService::reserve_in_tx(
                &mut tx,
                row.warehouse_id,
                item.item_id,
                item.quantity,
                &holder,
                Some(shipment_id),
                expires_at,
            )
            .await?;
        }

        let row = set_status(&mut tx, shipment_id, ShipmentStatus::Reserved).await?;

        tx.commit().await?;

        tracing::info!("Shipment {} reserved, {} holds placed", shipment_id, items.len());

        row.into_shipment(items)
    }

    /// Debit every line and close the shipment as fulfilled
    ///
    /// All-or-nothing: a single short line aborts the whole fulfillment.
    pub async fn fulfill_shipment(
        &self,
        shipment_id: Uuid,
        performed_by: &str,
    ) -> AppResult<FulfillmentOutcome> {
        let mut tx = self.db.begin().await?;

        let row = lock_shipment(&mut tx, shipment_id).await?;
        let status = parse_status(&row.status)?;
        if !status.can_transition_to(ShipmentStatus::Fulfilled) {
            return Err(AppError::InvalidStateTransition(format!(
                "Shipment in status {} cannot be fulfilled",
                status.as_str()
            )));
        }

        let items = fetch_items(&mut *tx, shipment_id).await?;

        let mut movements = Vec::with_capacity(items.len());
        for item in &items {
            let movement = StockLedgerService::adjust_in_tx(
                &mut tx,
                row.warehouse_id,
                item.item_id,
                -item.quantity,
                MovementKind::Shipment,
                performed_by,
                MovementRefs::shipment(shipment_id),
                None,
            )
            .await?;
            movements.push(movement);
        }

        // The shipment's own holds are spent, not released back
        ReservationService::release_for_shipment_in_tx(&mut tx, shipment_id).await?;

        let row = sqlx::query_as::<_, ShipmentRow>(
            r#"
            UPDATE shipments
            SET status = $1, fulfilled_at = NOW(), updated_at = NOW()
            WHERE id = $2
            RETURNING id, recipient_id, warehouse_id, status, scheduled_date,
                      created_at, updated_at, fulfilled_at
            "#,
        )
        .bind(ShipmentStatus::Fulfilled.as_str())
        .bind(shipment_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Shipment {} fulfilled, {} lines shipped",
            shipment_id,
            items.len()
        );

        Ok(FulfillmentOutcome {
            shipment: row.into_shipment(items)?,
            movements,
        })
    }

    /// Cancel a draft or reserved shipment, releasing its holds
    pub async fn cancel_shipment(&self, shipment_id: Uuid) -> AppResult<Shipment> {
        let mut tx = self.db.begin().await?;

        let row = lock_shipment(&mut tx, shipment_id).await?;
        let status = parse_status(&row.status)?;
        if !status.can_transition_to(ShipmentStatus::Cancelled) {
            return Err(AppError::InvalidStateTransition(format!(
                "Shipment in status {} cannot be cancelled",
                status.as_str()
            )));
        }

        let released = ReservationService::release_for_shipment_in_tx(&mut tx, shipment_id).await?;

        let row = set_status(&mut tx, shipment_id, ShipmentStatus::Cancelled).await?;
        let items = fetch_items(&mut *tx, shipment_id).await?;

        tx.commit().await?;

        if released > 0 {
            tracing::info!("Shipment {} cancelled, {} holds released", shipment_id, released);
        }

        row.into_shipment(items)
    }

    /// Get a shipment with its items
    pub async fn get_shipment(&self, shipment_id: Uuid) -> AppResult<Shipment> {
        let row = sqlx::query_as::<_, ShipmentRow>(
            r#"
            SELECT id, recipient_id, warehouse_id, status, scheduled_date,
                   created_at, updated_at, fulfilled_at
            FROM shipments
            WHERE id = $1
            "#,
        )
        .bind(shipment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Shipment".to_string()))?;

        let items = fetch_items(&self.db, shipment_id).await?;

        row.into_shipment(items)
    }

    /// List shipments, newest first
    pub async fn list_shipments(
        &self,
        status: Option<ShipmentStatus>,
        recipient_id: Option<Uuid>,
        limit: Option<i64>,
    ) -> AppResult<Vec<Shipment>> {
        let limit = limit.unwrap_or(50).clamp(1, 500);

        let rows = sqlx::query_as::<_, ShipmentRow>(
            r#"
            SELECT id, recipient_id, warehouse_id, status, scheduled_date,
                   created_at, updated_at, fulfilled_at
            FROM shipments
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR recipient_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(recipient_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let mut shipments = Vec::with_capacity(rows.len());
        for row in rows {
            let items = fetch_items(&self.db, row.id).await?;
            shipments.push(row.into_shipment(items)?);
        }

        Ok(shipments)
    }
}

fn parse_status(status: &str) -> AppResult<ShipmentStatus> {
    ShipmentStatus::from_str(status)
        .ok_or_else(|| AppError::Internal(format!("Unknown shipment status: {}", status)))
}

async fn lock_shipment(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    shipment_id: Uuid,
) -> AppResult<ShipmentRow> {
    sqlx::query_as::<_, ShipmentRow>(
        r#"
        SELECT id, recipient_id, warehouse_id, status, scheduled_date,
               created_at, updated_at, fulfilled_at
        FROM shipments
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(shipment_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Shipment".to_string()))
}

async fn touch_shipment(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    shipment_id: Uuid,
) -> AppResult<ShipmentRow> {
    let row = sqlx::query_as::<_, ShipmentRow>(
        r#"
        UPDATE shipments
        SET updated_at = NOW()
        WHERE id = $1
        RETURNING id, recipient_id, warehouse_id, status, scheduled_date,
                  created_at, updated_at, fulfilled_at
        "#,
    )
    .bind(shipment_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row)
}

async fn set_status(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    shipment_id: Uuid,
    status: ShipmentStatus,
) -> AppResult<ShipmentRow> {
    let row = sqlx::query_as::<_, ShipmentRow>(
        r#"
        UPDATE shipments
        SET status = $1, updated_at = NOW()
        WHERE id = $2
        RETURNING id, recipient_id, warehouse_id, status, scheduled_date,
                  created_at, updated_at, fulfilled_at
        "#,
    )
    .bind(status.as_str())
    .bind(shipment_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row)
}

/// Shipment lines in a stable item order
async fn fetch_items<'a, E>(executor: E, shipment_id: Uuid) -> AppResult<Vec<ShipmentItem>>
where
    E: sqlx::Executor<'a, Database = sqlx::Postgres>,
{
    let rows = sqlx::query_as::<_, (Uuid, Decimal)>(
        "SELECT item_id, quantity FROM shipment_items WHERE shipment_id = $1 ORDER BY item_id",
    )
    .bind(shipment_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(item_id, quantity)| ShipmentItem { item_id, quantity })
        .collect())
}
