use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use std::time::Duration;
use tracing::info;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes a connection pool using the application configuration.
pub async fn establish_connection(config: &AppConfig) -> Result<DbPool, ServiceError> {
    let mut options = ConnectOptions::new(config.database_url.clone());
    options
        .max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect_timeout(Duration::from_secs(config.db_connect_timeout_secs))
        .sqlx_logging(false);

    let pool = Database::connect(options).await?;
    info!(
        max_connections = config.db_max_connections,
        "database connection established"
    );
    Ok(pool)
}

/// Creates the engine's tables when they do not exist yet.
///
/// Orders carry a unique session-id column; that constraint is what makes the
/// two-phase create-then-link sequence and webhook lookups safe across
/// concurrent instances.
pub async fn init_schema(db: &DbPool) -> Result<(), ServiceError> {
    let backend = db.get_database_backend();
    let (uuid_ty, ts_ty) = match backend {
        DbBackend::Postgres => ("UUID", "TIMESTAMPTZ"),
        _ => ("TEXT", "TEXT"),
    };

    let statements = [
        format!(
            r#"CREATE TABLE IF NOT EXISTS products (
                id {uuid_ty} PRIMARY KEY NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                base_price_cents BIGINT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at {ts_ty} NOT NULL,
                updated_at {ts_ty} NOT NULL
            );"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS product_variants (
                id {uuid_ty} PRIMARY KEY NOT NULL,
                product_id {uuid_ty} NOT NULL,
                sku TEXT NOT NULL,
                name TEXT NOT NULL,
                price_cents BIGINT NOT NULL,
                stock INTEGER NOT NULL DEFAULT 0,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at {ts_ty} NOT NULL,
                updated_at {ts_ty} NOT NULL
            );"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS orders (
                id {uuid_ty} PRIMARY KEY NOT NULL,
                checkout_session_id TEXT NOT NULL UNIQUE,
                payment_intent_id TEXT,
                email TEXT NOT NULL,
                user_id {uuid_ty},
                currency TEXT NOT NULL,
                total_cents BIGINT NOT NULL,
                status TEXT NOT NULL,
                shipping_name TEXT,
                shipping_address TEXT,
                created_at {ts_ty} NOT NULL,
                updated_at {ts_ty} NOT NULL
            );"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS order_items (
                id {uuid_ty} PRIMARY KEY NOT NULL,
                order_id {uuid_ty} NOT NULL,
                product_id {uuid_ty} NOT NULL,
                variant_id {uuid_ty},
                quantity INTEGER NOT NULL,
                unit_price_cents BIGINT NOT NULL,
                created_at {ts_ty} NOT NULL
            );"#
        ),
        format!(
            r#"CREATE TABLE IF NOT EXISTS oversell_incidents (
                id {uuid_ty} PRIMARY KEY NOT NULL,
                order_id {uuid_ty} NOT NULL,
                variant_id {uuid_ty} NOT NULL,
                quantity INTEGER NOT NULL,
                resolved BOOLEAN NOT NULL DEFAULT FALSE,
                created_at {ts_ty} NOT NULL
            );"#
        ),
    ];

    for sql in statements {
        db.execute(Statement::from_string(backend, sql)).await?;
    }

    info!("schema bootstrap complete");
    Ok(())
}
