//! Data sources hand out scoped connections. A connection is a guard: dropping it
//! returns the underlying resource on every exit path, errors included.

pub mod sql;

use crate::error::AppError;
use async_trait::async_trait;

pub use sql::{SqlConnection, SqlDataSource};

#[async_trait]
pub trait DataSource: Send + Sync {
    type Connection: Send;

    /// Acquire a connection, initialising the store on first use.
    async fn connect(&self) -> Result<Self::Connection, AppError>;
}
