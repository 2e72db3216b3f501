//! Item catalog service for items and raw-material categories

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::models::{Category, Item, ItemKind};
use shared::types::Unit;
use shared::validation::{validate_display_name, validate_item_code};

/// Item catalog service
#[derive(Clone)]
pub struct ItemService {
    db: PgPool,
}

/// Database row for an item
#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    code: String,
    name: String,
    kind: String,
    unit: String,
    category_id: Option<Uuid>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ItemRow> for Item {
    type Error = AppError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let kind = ItemKind::from_str(&row.kind)
            .ok_or_else(|| AppError::Internal(format!("Unknown item kind: {}", row.kind)))?;
        let unit = Unit::from_code(&row.unit)
            .ok_or_else(|| AppError::Internal(format!("Unknown unit: {}", row.unit)))?;
        Ok(Item {
            id: row.id,
            code: row.code,
            name: row.name,
            kind,
            unit,
            category_id: row.category_id,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

/// Input for creating an item
#[derive(Debug, Deserialize)]
pub struct CreateItemInput {
    pub code: String,
    pub name: String,
    pub kind: ItemKind,
    pub unit: Unit,
    pub category_id: Option<Uuid>,
}

impl ItemService {
    /// Create a new ItemService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a raw-material category
    pub async fn create_category(&self, name: &str) -> AppResult<Category> {
        validate_display_name(name).map_err(|msg| AppError::Validation {
            field: "name".to_string(),
            message: msg.to_string(),
        })?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE LOWER(name) = LOWER($1))",
        )
        .bind(name.trim())
        .fetch_one(&self.db)
        .await?;

        if exists {
            return Err(AppError::DuplicateEntry("category name".to_string()));
        }

        let row = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name.trim())
        .fetch_one(&self.db)
        .await?;

        Ok(Category {
            id: row.0,
            name: row.1,
            created_at: row.2,
        })
    }

    /// Get a category by ID
    pub async fn get_category(&self, category_id: Uuid) -> AppResult<Category> {
        let row = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
            "SELECT id, name, created_at FROM categories WHERE id = $1",
        )
        .bind(category_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category".to_string()))?;

        Ok(Category {
            id: row.0,
            name: row.1,
            created_at: row.2,
        })
    }

    /// List all categories
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
            "SELECT id, name, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, created_at)| Category {
                id,
                name,
                created_at,
            })
            .collect())
    }

    /// Create an item
    ///
    /// The kind is fixed for the item's lifetime.
    pub async fn create_item(&self, input: CreateItemInput) -> AppResult<Item> {
        validate_item_code(&input.code).map_err(|msg| AppError::Validation {
            field: "code".to_string(),
            message: msg.to_string(),
        })?;
        validate_display_name(&input.name).map_err(|msg| AppError::Validation {
            field: "name".to_string(),
            message: msg.to_string(),
        })?;

        // Raw items need a category so substitution checks have a scope
        if input.kind == ItemKind::Raw && input.category_id.is_none() {
            return Err(AppError::Validation {
                field: "category_id".to_string(),
                message: "Raw items require a category".to_string(),
            });
        }

        if let Some(category_id) = input.category_id {
            let category_exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)",
            )
            .bind(category_id)
            .fetch_one(&self.db)
            .await?;

            if !category_exists {
                return Err(AppError::NotFound("Category".to_string()));
            }
        }

        let code_taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM items WHERE code = $1)",
        )
        .bind(&input.code)
        .fetch_one(&self.db)
        .await?;

        if code_taken {
            return Err(AppError::DuplicateEntry("item code".to_string()));
        }

        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            INSERT INTO items (code, name, kind, unit, category_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, code, name, kind, unit, category_id, is_active, created_at
            "#,
        )
        .bind(&input.code)
        .bind(input.name.trim())
        .bind(input.kind.as_str())
        .bind(input.unit.code())
        .bind(input.category_id)
        .fetch_one(&self.db)
        .await?;

        row.try_into()
    }

    /// Get an item by ID
    pub async fn get_item(&self, item_id: Uuid) -> AppResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, code, name, kind, unit, category_id, is_active, created_at
            FROM items
            WHERE id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        row.try_into()
    }

    /// Find an item by its unique code
    pub async fn find_by_code(&self, code: &str) -> AppResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, code, name, kind, unit, category_id, is_active, created_at
            FROM items
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.db)
        .await?;

        row.map(Item::try_from).transpose()
    }

    /// List items, optionally narrowed to one kind
    pub async fn list_items(
        &self,
        kind: Option<ItemKind>,
        include_inactive: bool,
    ) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT id, code, name, kind, unit, category_id, is_active, created_at
            FROM items
            WHERE ($1::varchar IS NULL OR kind = $1)
              AND ($2 OR is_active)
            ORDER BY code
            "#,
        )
        .bind(kind.map(|k| k.as_str()))
        .bind(include_inactive)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(Item::try_from).collect()
    }

    /// Deactivate an item so new documents cannot reference it
    pub async fn deactivate_item(&self, item_id: Uuid) -> AppResult<Item> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            UPDATE items
            SET is_active = FALSE
            WHERE id = $1
            RETURNING id, code, name, kind, unit, category_id, is_active, created_at
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Item".to_string()))?;

        row.try_into()
    }
}
