//! Postgres connection pool bootstrap, mirroring the teacher's
//! `PostgresDatabase` wrapper in shape though not in content: this crate
//! only needs a pool to hand to `ngas_core::catalog::CatalogGateway` and
//! `ngas_core::volume::VolumeRegistry`.

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;

pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
