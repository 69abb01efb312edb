//! Configuration management for the ERP back-office
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with ERP_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::OutPolicy;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT verification configuration
    pub jwt: JwtConfig,

    /// Pricing settings
    pub business: BusinessConfig,

    /// Stock movement settings
    pub stock: StockConfig,

    /// Planning board settings
    pub planning: PlanningConfig,

    /// Notification generation settings
    pub notifications: NotificationConfig,

    /// Dashboard settings
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Shared secret the token issuer signs with (HS256)
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessConfig {
    /// VAT rate applied on top of order totals
    pub vat_rate: Decimal,

    /// Currency code shown next to amounts
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StockConfig {
    /// Handling of manual "out" movements larger than the stock
    pub out_policy: OutPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlanningConfig {
    /// Workshop capacity in load units
    pub capacity: u32,

    /// Load units taken by each scheduled order
    pub load_per_order: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Days ahead that count as an upcoming delivery
    pub upcoming_window_days: i64,

    /// References named in the low stock summary
    pub low_stock_preview: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    /// Rows shown in each dashboard list
    pub preview_limit: i64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("ERP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let mut builder = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("business.vat_rate", "0.20")?
            .set_default("business.currency", "EUR")?
            .set_default("stock.out_policy", "clamp")?
            .set_default("planning.capacity", 100)?
            .set_default("planning.load_per_order", 10)?
            .set_default("notifications.upcoming_window_days", 3)?
            .set_default("notifications.low_stock_preview", 3)?
            .set_default("dashboard.preview_limit", 5)?;

        // Production must provide its own secret
        if environment == "development" {
            builder = builder.set_default("jwt.secret", "development-secret-key")?;
        }

        let config = builder
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (ERP_ prefix)
            .add_source(
                Environment::with_prefix("ERP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
