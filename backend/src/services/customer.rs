//! Customer management service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::like_pattern;

/// Customer service for managing the customer book
#[derive(Clone)]
pub struct CustomerService {
    db: PgPool,
}

/// Customer record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or replacing a customer
#[derive(Debug, Deserialize, Validate)]
pub struct CustomerInput {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Query parameters for listing customers
#[derive(Debug, Default, Deserialize)]
pub struct ListCustomersQuery {
    pub search: Option<String>,
}

impl CustomerInput {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        shared::validate_required(&self.name).map_err(|msg| AppError::validation("name", msg))
    }
}

impl CustomerService {
    /// Create a new CustomerService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List customers by name, optionally filtered on name or email
    pub async fn list_customers(&self, query: ListCustomersQuery) -> AppResult<Vec<Customer>> {
        let pattern = query
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, email, phone, address, created_at, updated_at
            FROM customers
            WHERE ($1::text IS NULL OR name ILIKE $1 OR email ILIKE $1)
            ORDER BY name
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;

        Ok(customers)
    }

    /// Get a customer by ID
    pub async fn get_customer(&self, customer_id: Uuid) -> AppResult<Customer> {
        sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, email, phone, address, created_at, updated_at
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))
    }

    /// Create a customer
    pub async fn create_customer(&self, input: CustomerInput) -> AppResult<Customer> {
        input.check()?;

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (id, name, email, phone, address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, phone, address, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.name.trim())
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    /// Update a customer
    pub async fn update_customer(
        &self,
        customer_id: Uuid,
        input: CustomerInput,
    ) -> AppResult<Customer> {
        input.check()?;

        sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET name = $2, email = $3, phone = $4, address = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, phone, address, created_at, updated_at
            "#,
        )
        .bind(customer_id)
        .bind(input.name.trim())
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.address)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Customer".to_string()))
    }

    /// Delete a customer that has no orders
    pub async fn delete_customer(&self, customer_id: Uuid) -> AppResult<()> {
        let order_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE customer_id = $1",
        )
        .bind(customer_id)
        .fetch_one(&self.db)
        .await?;

        if order_count > 0 {
            return Err(AppError::conflict(
                "customer",
                format!("Customer has {} order(s) and cannot be deleted", order_count),
            ));
        }

        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(customer_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Customer".to_string()));
        }

        Ok(())
    }
}
