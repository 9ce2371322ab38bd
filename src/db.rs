use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;
use crate::error::Result;

pub async fn connect(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db.url)
        .await?;

    Ok(pool)
}
