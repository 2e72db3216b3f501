//! Recipe registry service for percentage-based production recipes

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::models::{ItemKind, Recipe, RecipeComponent, RecipeStatus};
use shared::validation::{
    validate_component_shares, validate_component_sum, validate_yield_percent,
};

/// Recipe registry service
#[derive(Clone)]
pub struct RecipeService {
    db: PgPool,
}

/// Database row for a recipe
#[derive(Debug, sqlx::FromRow)]
struct RecipeRow {
    id: Uuid,
    output_item_id: Uuid,
    yield_percent: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecipeRow {
    fn into_recipe(self, components: Vec<RecipeComponent>) -> AppResult<Recipe> {
        let status = RecipeStatus::from_str(&self.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown recipe status: {}", self.status)))?;
        Ok(Recipe {
            id: self.id,
            output_item_id: self.output_item_id,
            yield_percent: self.yield_percent,
            status,
            components,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Input for creating a recipe
#[derive(Debug, Deserialize)]
pub struct CreateRecipeInput {
    pub output_item_id: Uuid,
    pub yield_percent: Decimal,
    pub components: Vec<RecipeComponentInput>,
}

/// One component share of a new recipe
#[derive(Debug, Deserialize)]
pub struct RecipeComponentInput {
    pub raw_item_id: Uuid,
    pub percent: Decimal,
}

impl RecipeService {
    /// Create a new RecipeService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a recipe in draft status
    pub async fn create_recipe(&self, input: CreateRecipeInput) -> AppResult<Recipe> {
        validate_yield_percent(input.yield_percent).map_err(|msg| AppError::Validation {
            field: "yield_percent".to_string(),
            message: msg.to_string(),
        })?;

        let percents: Vec<Decimal> = input.components.iter().map(|c| c.percent).collect();
        check_composition(&percents)?;

        // No raw item may appear twice
        for (i, component) in input.components.iter().enumerate() {
            if input.components[..i]
                .iter()
                .any(|other| other.raw_item_id == component.raw_item_id)
            {
                return Err(AppError::Validation {
                    field: "components".to_string(),
                    message: "Recipe components must reference distinct items".to_string(),
                });
            }
        }

        // Validate output item is an intermediate
        let output_kind = sqlx::query_scalar::<_, String>("SELECT kind FROM items WHERE id = $1")
            .bind(input.output_item_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Output item".to_string()))?;

        if output_kind != ItemKind::Intermediate.as_str() {
            return Err(AppError::Validation {
                field: "output_item_id".to_string(),
                message: format!(
                    "Recipe output must be an intermediate item, got kind: {}",
                    output_kind
                ),
            });
        }

        // Validate every component is a raw item
        for component in &input.components {
            let kind = sqlx::query_scalar::<_, String>("SELECT kind FROM items WHERE id = $1")
                .bind(component.raw_item_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Component item".to_string()))?;

            if kind != ItemKind::Raw.as_str() {
                return Err(AppError::Validation {
                    field: "components".to_string(),
                    message: format!("Recipe components must be raw items, got kind: {}", kind),
                });
            }
        }

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, RecipeRow>(
            r#"
            INSERT INTO recipes (output_item_id, yield_percent, status)
            VALUES ($1, $2, $3)
            RETURNING id, output_item_id, yield_percent, status, created_at, updated_at
            "#,
        )
        .bind(input.output_item_id)
        .bind(input.yield_percent)
        .bind(RecipeStatus::Draft.as_str())
        .fetch_one(&mut *tx)
        .await?;

        for component in &input.components {
            sqlx::query(
                "INSERT INTO recipe_components (recipe_id, raw_item_id, percent) VALUES ($1, $2, $3)",
            )
            .bind(row.id)
            .bind(component.raw_item_id)
            .bind(component.percent)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let components = input
            .components
            .into_iter()
            .map(|c| RecipeComponent {
                raw_item_id: c.raw_item_id,
                percent: c.percent,
            })
            .collect();

        row.into_recipe(components)
    }

    /// Get a recipe with its components
    pub async fn get_recipe(&self, recipe_id: Uuid) -> AppResult<Recipe> {
        let row = sqlx::query_as::<_, RecipeRow>(
            r#"
            SELECT id, output_item_id, yield_percent, status, created_at, updated_at
            FROM recipes
            WHERE id = $1
            "#,
        )
        .bind(recipe_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;

        let components = fetch_components(&self.db, recipe_id).await?;
        row.into_recipe(components)
    }

    /// The active recipe for an output item
    pub async fn active_recipe_for(&self, output_item_id: Uuid) -> AppResult<Recipe> {
        let row = sqlx::query_as::<_, RecipeRow>(
            r#"
            SELECT id, output_item_id, yield_percent, status, created_at, updated_at
            FROM recipes
            WHERE output_item_id = $1 AND status = $2
            "#,
        )
        .bind(output_item_id)
        .bind(RecipeStatus::Active.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NoActiveRecipe(format!("item {}", output_item_id)))?;

        let components = fetch_components(&self.db, row.id).await?;
        row.into_recipe(components)
    }

    /// List recipes, optionally narrowed by output item and/or status
    pub async fn list_recipes(
        &self,
        output_item_id: Option<Uuid>,
        status: Option<RecipeStatus>,
    ) -> AppResult<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, RecipeRow>(
            r#"
            SELECT id, output_item_id, yield_percent, status, created_at, updated_at
            FROM recipes
            WHERE ($1::uuid IS NULL OR output_item_id = $1)
              AND ($2::varchar IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(output_item_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        let mut recipes = Vec::with_capacity(rows.len());
        for row in rows {
            let components = fetch_components(&self.db, row.id).await?;
            recipes.push(row.into_recipe(components)?);
        }

        Ok(recipes)
    }

    /// Activate a recipe, archiving any other active recipe for the item
    ///
    /// The composition sum is re-checked: a draft that no longer sums to 100
    /// must not go live. Activating the already-active recipe is a no-op.
    pub async fn activate(&self, recipe_id: Uuid) -> AppResult<Recipe> {
        let mut tx = self.db.begin().await?;

        // Serialize concurrent activations on the output item row
        let output_item_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT i.id
            FROM items i
            JOIN recipes r ON r.output_item_id = i.id
            WHERE r.id = $1
            FOR UPDATE OF i
            "#,
        )
        .bind(recipe_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;

        let row = sqlx::query_as::<_, RecipeRow>(
            r#"
            SELECT id, output_item_id, yield_percent, status, created_at, updated_at
            FROM recipes
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(recipe_id)
        .fetch_one(&mut *tx)
        .await?;

        let status = RecipeStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown recipe status: {}", row.status)))?;

        let components = fetch_components(&mut *tx, recipe_id).await?;

        if status == RecipeStatus::Active {
            return row.into_recipe(components);
        }

        let percents: Vec<Decimal> = components.iter().map(|c| c.percent).collect();
        check_composition(&percents)?;

        sqlx::query(
            r#"
            UPDATE recipes
            SET status = $1, updated_at = NOW()
            WHERE output_item_id = $2 AND status = $3 AND id <> $4
            "#,
        )
        .bind(RecipeStatus::Archived.as_str())
        .bind(output_item_id)
        .bind(RecipeStatus::Active.as_str())
        .bind(recipe_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, RecipeRow>(
            r#"
            UPDATE recipes
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, output_item_id, yield_percent, status, created_at, updated_at
            "#,
        )
        .bind(RecipeStatus::Active.as_str())
        .bind(recipe_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("Recipe {} activated for item {}", recipe_id, output_item_id);

        row.into_recipe(components)
    }

    /// Archive a recipe (from draft or active)
    pub async fn archive(&self, recipe_id: Uuid) -> AppResult<Recipe> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, RecipeRow>(
            r#"
            SELECT id, output_item_id, yield_percent, status, created_at, updated_at
            FROM recipes
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(recipe_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;

        let status = RecipeStatus::from_str(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown recipe status: {}", row.status)))?;

        if status == RecipeStatus::Archived {
            return Err(AppError::InvalidStateTransition(
                "Recipe is already archived".to_string(),
            ));
        }

        let row = sqlx::query_as::<_, RecipeRow>(
            r#"
            UPDATE recipes
            SET status = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, output_item_id, yield_percent, status, created_at, updated_at
            "#,
        )
        .bind(RecipeStatus::Archived.as_str())
        .bind(recipe_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let components = fetch_components(&self.db, recipe_id).await?;
        row.into_recipe(components)
    }
}

/// Validate composition shape and sum with the matching error types
fn check_composition(percents: &[Decimal]) -> AppResult<()> {
    validate_component_shares(percents).map_err(|msg| AppError::Validation {
        field: "components".to_string(),
        message: msg.to_string(),
    })?;

    validate_component_sum(percents).map_err(|_| {
        let total: Decimal = percents.iter().sum();
        AppError::Composition(format!(
            "Component percentages sum to {}, expected 100",
            total
        ))
    })
}

/// Load the component shares of a recipe
async fn fetch_components<'a, E>(executor: E, recipe_id: Uuid) -> AppResult<Vec<RecipeComponent>>
where
    E: sqlx::Executor<'a, Database = sqlx::Postgres>,
{
    let rows = sqlx::query_as::<_, (Uuid, Decimal)>(
        r#"
        SELECT raw_item_id, percent
        FROM recipe_components
        WHERE recipe_id = $1
        ORDER BY percent DESC, raw_item_id
        "#,
    )
    .bind(recipe_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(raw_item_id, percent)| RecipeComponent {
            raw_item_id,
            percent,
        })
        .collect())
}
