use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::MappingStore;
use crate::config::DatabaseSettings;
use crate::utils::error::TranslateError;

const ELIXIR_BY_EGA: &str = "SELECT elixir_id FROM mapping WHERE ega_id = $1";
const EGA_BY_ELIXIR: &str = "SELECT ega_id FROM mapping WHERE elixir_id = $1";

/// The `mapping` table in the LEGA Postgres database.
#[derive(Debug, Clone)]
pub struct PgMappingStore {
    pool: PgPool,
}

impl PgMappingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and checks that the database is reachable.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .test_before_acquire(true)
            .connect(&settings.url)
            .await?;
        Ok(Self::new(pool))
    }

    /// A NULL in the looked-up column counts as a miss.
    async fn lookup(
        &self,
        query: &'static str,
        id: &str,
    ) -> Result<Option<String>, TranslateError> {
        let row = sqlx::query_scalar::<_, Option<String>>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.flatten())
    }
}

#[async_trait]
impl MappingStore for PgMappingStore {
    async fn elixir_id_for(&self, ega_id: &str) -> Result<Option<String>, TranslateError> {
        self.lookup(ELIXIR_BY_EGA, ega_id).await
    }

    async fn ega_id_for(&self, elixir_id: &str) -> Result<Option<String>, TranslateError> {
        self.lookup(EGA_BY_ELIXIR, elixir_id).await
    }
}
