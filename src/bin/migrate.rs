use anyhow::{Context, Result};
use payment_intake::{
    config::AppConfig,
    repository::{PaymentRepository, PgPaymentRepository},
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("failed to read configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    PgPaymentRepository::new(pool)
        .init()
        .await
        .context("failed to run migrations")?;

    println!("Migrations applied successfully");
    Ok(())
}
