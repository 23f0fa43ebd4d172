//! Relational data source over an sqlx `AnyPool` (PostgreSQL or SQLite).

use super::DataSource;
use crate::config::{validate, DataSourceConfig, ModelSpec};
use crate::error::AppError;
use crate::migration;
use crate::sql::Dialect;
use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Transaction};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Owns the pool and the declared models. The schema is created lazily on the
/// first `connect()`, exactly once even under concurrent first use.
pub struct SqlDataSource {
    pool: AnyPool,
    dialect: Dialect,
    models: Vec<ModelSpec>,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
    schema_generation: AtomicU64,
}

impl SqlDataSource {
    /// Validate the declarations and build a lazy pool. No connection is opened here.
    pub fn new(config: &DataSourceConfig, models: Vec<ModelSpec>) -> Result<Self, AppError> {
        validate(&models)?;
        let dialect = Dialect::from_url(&config.url)?;
        sqlx::any::install_default_drivers();

        let mut options = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout);
        if dialect.is_in_memory(&config.url) {
            if config.max_connections > 1 {
                tracing::warn!(
                    requested = config.max_connections,
                    "in-memory sqlite is per connection; pool clamped to 1"
                );
            }
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options.connect_lazy(&dialect.connect_url(&config.url))?;

        Ok(SqlDataSource {
            pool,
            dialect,
            models,
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            schema_generation: AtomicU64::new(0),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    pub fn model(&self, name: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// How many times the schema has been created by this data source.
    pub fn schema_generation(&self) -> u64 {
        self.schema_generation.load(Ordering::Acquire)
    }

    /// Create every declared table (idempotent) and mark the source initialised.
    pub async fn initialize_db(&self) -> Result<(), AppError> {
        let _guard = self.init_lock.lock().await;
        self.create_schema().await
    }

    /// Drop every declared table. The next `connect()` recreates them.
    pub async fn clear_db(&self) -> Result<(), AppError> {
        let _guard = self.init_lock.lock().await;
        let mut conn = self.pool.acquire().await?;
        migration::drop_tables(&mut conn, &self.models).await?;
        self.initialized.store(false, Ordering::Release);
        tracing::info!(tables = self.models.len(), "schema dropped");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn ensure_initialized(&self) -> Result<(), AppError> {
        if self.is_initialized() {
            return Ok(());
        }
        let _guard = self.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(());
        }
        self.create_schema().await
    }

    /// Caller holds `init_lock`.
    async fn create_schema(&self) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        migration::create_tables(&mut conn, &self.models, self.dialect).await?;
        self.initialized.store(true, Ordering::Release);
        let generation = self.schema_generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(tables = self.models.len(), generation, "schema initialized");
        Ok(())
    }
}

#[async_trait]
impl DataSource for SqlDataSource {
    type Connection = SqlConnection;

    async fn connect(&self) -> Result<SqlConnection, AppError> {
        self.ensure_initialized().await?;
        let inner = self.pool.acquire().await?;
        tracing::trace!("connection acquired");
        Ok(SqlConnection {
            inner,
            dialect: self.dialect,
        })
    }
}

/// A pooled connection checked out for one repository operation. Returned to the pool on drop.
pub struct SqlConnection {
    inner: PoolConnection<Any>,
    dialect: Dialect,
}

impl SqlConnection {
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub async fn begin(&mut self) -> Result<Transaction<'_, Any>, AppError> {
        Ok(sqlx::Connection::begin(&mut *self.inner).await?)
    }
}

impl Deref for SqlConnection {
    type Target = AnyConnection;

    fn deref(&self) -> &AnyConnection {
        &self.inner
    }
}

impl DerefMut for SqlConnection {
    fn deref_mut(&mut self) -> &mut AnyConnection {
        &mut self.inner
    }
}

impl Drop for SqlConnection {
    fn drop(&mut self) {
        tracing::trace!("connection released");
    }
}
