//! Product catalogue service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    is_low_stock, normalize_reference, MovementType, StockChange, DEFAULT_MAX_STOCK,
    DEFAULT_MIN_STOCK,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::{like_pattern, stock, Actor};

/// Product service for the catalogue
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Product record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub reference: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub min_stock: i32,
    pub max_stock: i32,
    pub current_stock: i32,
    pub is_active: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product with derived stock flags
#[derive(Debug, Clone, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub is_low_stock: bool,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            is_low_stock: is_low_stock(product.current_stock, product.min_stock),
            product,
        }
    }
}

/// Input for creating a product
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 50, message = "Reference must be 1-50 characters"))]
    pub reference: String,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub min_stock: Option<i32>,
    pub max_stock: Option<i32>,
    pub current_stock: Option<i32>,
}

/// Input for updating a product. Stock is changed through adjustments only.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 50, message = "Reference must be 1-50 characters"))]
    pub reference: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub min_stock: Option<i32>,
    pub max_stock: Option<i32>,
}

/// Query parameters for listing products
#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    pub search: Option<String>,
    pub low_stock: Option<bool>,
    pub include_archived: Option<bool>,
}

const PRODUCT_COLUMNS: &str = "id, reference, name, description, price, min_stock, max_stock, \
     current_stock, is_active, archived_at, created_at, updated_at";

fn check_fields(
    reference: &str,
    name: &str,
    price: Decimal,
    min_stock: i32,
    max_stock: i32,
) -> AppResult<()> {
    shared::validate_reference(reference).map_err(|msg| AppError::validation("reference", msg))?;
    shared::validate_required(name).map_err(|msg| AppError::validation("name", msg))?;
    shared::validate_price(price).map_err(|msg| AppError::validation("price", msg))?;
    shared::validate_stock_thresholds(min_stock, max_stock)
        .map_err(|msg| AppError::validation("max_stock", msg))?;
    Ok(())
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List products ordered by reference
    pub async fn list_products(&self, query: ListProductsQuery) -> AppResult<Vec<ProductResponse>> {
        let pattern = query
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);

        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {}
            FROM products
            WHERE ($1::text IS NULL OR reference ILIKE $1 OR name ILIKE $1)
              AND ($2 OR is_active)
              AND (NOT $3 OR current_stock <= min_stock)
            ORDER BY reference
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(pattern)
        .bind(query.include_archived.unwrap_or(false))
        .bind(query.low_stock.unwrap_or(false))
        .fetch_all(&self.db)
        .await?;

        Ok(products.into_iter().map(ProductResponse::from).collect())
    }

    async fn fetch_product(&self, product_id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Get a product by ID
    pub async fn get_product(&self, product_id: Uuid) -> AppResult<ProductResponse> {
        self.fetch_product(product_id).await.map(ProductResponse::from)
    }

    async fn reference_taken(&self, reference: &str, except: Option<Uuid>) -> AppResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE reference = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(reference)
        .bind(except)
        .fetch_one(&self.db)
        .await?;
        Ok(taken)
    }

    /// Create a product; a non-zero opening stock is journaled as an adjustment
    pub async fn create_product(
        &self,
        input: CreateProductInput,
        actor: &Actor,
    ) -> AppResult<ProductResponse> {
        input.validate()?;

        let reference = normalize_reference(&input.reference);
        let min_stock = input.min_stock.unwrap_or(DEFAULT_MIN_STOCK);
        let max_stock = input.max_stock.unwrap_or(DEFAULT_MAX_STOCK);
        let opening_stock = input.current_stock.unwrap_or(0);

        check_fields(&reference, &input.name, input.price, min_stock, max_stock)?;
        shared::validate_stock_level(opening_stock)
            .map_err(|msg| AppError::validation("current_stock", msg))?;

        if self.reference_taken(&reference, None).await? {
            return Err(AppError::DuplicateEntry("reference".to_string()));
        }

        let mut tx = self.db.begin().await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (id, reference, name, description, price, min_stock, max_stock, current_stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&reference)
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.price)
        .bind(min_stock)
        .bind(max_stock)
        .fetch_one(&mut *tx)
        .await?;

        let product = if opening_stock > 0 {
            let change = StockChange {
                product_id: product.id,
                movement_type: MovementType::Adjustment,
                quantity: opening_stock,
                stock_before: 0,
                stock_after: opening_stock,
            };
            stock::apply_change(&mut *tx, &change, "Opening stock", None, actor).await?;
            Product {
                current_stock: opening_stock,
                ..product
            }
        } else {
            product
        };

        tx.commit().await?;

        tracing::info!(product_id = %product.id, reference = %product.reference, "Product created");
        Ok(product.into())
    }

    /// Update catalogue fields of a product
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<ProductResponse> {
        input.validate()?;

        let existing = self.fetch_product(product_id).await?;

        let reference = input
            .reference
            .as_deref()
            .map(normalize_reference)
            .unwrap_or(existing.reference);
        let name = input.name.unwrap_or(existing.name);
        let description = input.description.or(existing.description);
        let price = input.price.unwrap_or(existing.price);
        let min_stock = input.min_stock.unwrap_or(existing.min_stock);
        let max_stock = input.max_stock.unwrap_or(existing.max_stock);

        check_fields(&reference, &name, price, min_stock, max_stock)?;

        if self.reference_taken(&reference, Some(product_id)).await? {
            return Err(AppError::DuplicateEntry("reference".to_string()));
        }

        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET reference = $2, name = $3, description = $4, price = $5,
                min_stock = $6, max_stock = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(&reference)
        .bind(name.trim())
        .bind(&description)
        .bind(price)
        .bind(min_stock)
        .bind(max_stock)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        Ok(product.into())
    }

    /// Hard delete, refused while any order line references the product
    pub async fn delete_product(&self, product_id: Uuid) -> AppResult<()> {
        let line_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM order_items WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        if line_count > 0 {
            return Err(AppError::conflict(
                "product",
                format!(
                    "Product is used in {} order line(s); archive it instead",
                    line_count
                ),
            ));
        }

        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        tracing::info!(product_id = %product_id, "Product deleted");
        Ok(())
    }

    /// Soft delete: hide from the catalogue and new orders
    pub async fn archive_product(&self, product_id: Uuid) -> AppResult<ProductResponse> {
        self.set_active(product_id, false).await
    }

    pub async fn restore_product(&self, product_id: Uuid) -> AppResult<ProductResponse> {
        self.set_active(product_id, true).await
    }

    async fn set_active(&self, product_id: Uuid, active: bool) -> AppResult<ProductResponse> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            UPDATE products
            SET is_active = $2,
                archived_at = CASE WHEN $2 THEN NULL ELSE COALESCE(archived_at, NOW()) END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(product_id)
        .bind(active)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        tracing::info!(product_id = %product_id, active, "Product availability changed");
        Ok(product.into())
    }
}
