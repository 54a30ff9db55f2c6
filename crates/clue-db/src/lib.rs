//! # clue-db
//!
//! PostgreSQL + PostGIS implementation of the clue stores.
//!
//! This crate provides:
//! - Connection pool management
//! - Parameterized rendering of composed predicates
//! - Snapshot-consistent page + count reads under a statement deadline
//! - Region search over `geography(Point, 4326)` locations
//!
//! ## Example
//!
//! ```rust,ignore
//! use clue_db::{Database, DbConfig};
//! use clue_core::{PaginationRequest, QueryComposer, PROJECT_SCHEMA};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DbConfig::from_env()?;
//!     let db = Database::connect(&config).await?;
//!
//!     let page = QueryComposer::new(config.query_config())
//!         .list(&PaginationRequest::default(), &PROJECT_SCHEMA, &db.projects)
//!         .await?;
//!     println!("{} of {}", page.items.len(), page.total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod pool;
pub mod projects;
pub mod sql;
pub mod store;
pub mod users;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use std::time::Duration;

use clue_core::Result;

pub use config::{DbConfig, DEFAULT_DATABASE_URL};
pub use pool::{create_pool, log_pool_metrics, PoolConfig};
pub use projects::{PgProjectStore, PROJECT_TABLE};
pub use sql::{escape_like, PredicateSql, PredicateSqlBuilder, QueryParam, TableSpec};
pub use store::{classify_error, with_deadline};
pub use users::{PgUserStore, USER_TABLE};

/// Pool plus one store per listed entity.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub projects: PgProjectStore,
    pub users: PgUserStore,
}

impl Database {
    /// Build the stores over an existing pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>, statement_timeout: Duration) -> Self {
        Self {
            projects: PgProjectStore::new(pool.clone(), statement_timeout),
            users: PgUserStore::new(pool.clone(), statement_timeout),
            pool,
        }
    }

    /// Connect using `config`.
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let pool = create_pool(&config.database_url, &config.pool).await?;
        Ok(Self::new(pool, config.statement_timeout))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| clue_core::Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        tracing::info!(
            subsystem = "db",
            component = "migrations",
            op = "migrate",
            "Migrations applied"
        );
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
