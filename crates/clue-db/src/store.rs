//! Shared execution for the PostgreSQL stores: snapshot transactions,
//! deadlines and error classification.

use std::future::Future;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, warn};

use clue_core::{Error, Result, Window};

use crate::sql::{bind_params, QueryParam};

/// SQLSTATE raised when `statement_timeout` cancels a statement.
pub const QUERY_CANCELED: &str = "57014";

/// Begin a `REPEATABLE READ READ ONLY` transaction whose statements are
/// cancelled server-side after `timeout`.
pub async fn begin_snapshot(
    pool: &PgPool,
    timeout: Duration,
) -> std::result::Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
        .execute(&mut *tx)
        .await?;
    // SET does not take bind parameters; the value is an integer we own.
    sqlx::query(&format!("SET LOCAL statement_timeout = {}", timeout.as_millis()))
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Map a driver error onto the core taxonomy.
pub fn classify_error(err: sqlx::Error, operation: &str, timeout: Duration) -> Error {
    let timed_out = match &err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db.code().as_deref() == Some(QUERY_CANCELED),
        _ => false,
    };
    if timed_out {
        warn!(
            subsystem = "db",
            component = "store",
            op = operation,
            timeout_ms = timeout.as_millis() as u64,
            "Store call exceeded its deadline"
        );
        return Error::StoreTimeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        };
    }
    Error::Database(err)
}

/// Run `fut` under a client-side deadline of `timeout`.
pub async fn with_deadline<T, F>(operation: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(classify_error(err, operation, timeout)),
        Err(_) => {
            warn!(
                subsystem = "db",
                component = "store",
                op = operation,
                timeout_ms = timeout.as_millis() as u64,
                "Store call abandoned at client deadline"
            );
            Err(Error::StoreTimeout {
                operation: operation.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

/// A rendered count + page pair sharing one WHERE clause.
pub struct PageStatements {
    pub count_sql: String,
    /// Ends with `LIMIT $n OFFSET $n+1`, numbered after `params`.
    pub page_sql: String,
    pub params: Vec<QueryParam>,
}

/// Count and fetch one page inside a single snapshot.
pub async fn fetch_page(
    pool: &PgPool,
    timeout: Duration,
    entity: &'static str,
    statements: &PageStatements,
    window: Window,
) -> Result<(Vec<PgRow>, i64)> {
    let start = Instant::now();
    let (rows, total) = with_deadline("find_and_count", timeout, async {
        let mut tx = begin_snapshot(pool, timeout).await?;

        let count_row = bind_params(sqlx::query(&statements.count_sql), &statements.params)
            .fetch_one(&mut *tx)
            .await?;
        let total: i64 = count_row.try_get("count")?;

        let rows = bind_params(sqlx::query(&statements.page_sql), &statements.params)
            .bind(window.limit)
            .bind(window.skip)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok::<_, sqlx::Error>((rows, total))
    })
    .await?;

    debug!(
        subsystem = "db",
        component = "store",
        op = "find_and_count",
        entity,
        param_count = statements.params.len(),
        skip = window.skip,
        limit = window.limit,
        result_count = rows.len(),
        total,
        duration_ms = start.elapsed().as_millis() as u64,
        "Page fetched"
    );
    Ok((rows, total))
}

/// Fetch every row of a (possibly windowed) statement inside a snapshot.
pub async fn fetch_all(
    pool: &PgPool,
    timeout: Duration,
    entity: &'static str,
    sql: &str,
    params: &[QueryParam],
) -> Result<Vec<PgRow>> {
    let start = Instant::now();
    let rows = with_deadline("find_within", timeout, async {
        let mut tx = begin_snapshot(pool, timeout).await?;
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok::<_, sqlx::Error>(rows)
    })
    .await?;

    debug!(
        subsystem = "db",
        component = "store",
        op = "find_within",
        entity,
        param_count = params.len(),
        result_count = rows.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Rows fetched"
    );
    Ok(rows)
}
