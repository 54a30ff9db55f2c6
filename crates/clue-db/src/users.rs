//! PostgreSQL store for `admin.users`.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use clue_core::{BoundQuery, EntityStore, Error, Result, SpatialQuery, User};

use crate::sql::{PredicateSqlBuilder, TableSpec};
use crate::store::{fetch_page, PageStatements};

pub const USER_TABLE: TableSpec = TableSpec {
    table: "admin.users",
    alias: "u",
    joins: &[],
};

const USER_COLUMNS: &str = "u.id, u.username, u.first_name, u.last_name, u.status, \
     u.created_at, u.updated_at, u.is_deleted";

/// PostgreSQL implementation of [`EntityStore`] for users.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgUserStore {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }
}

pub fn page_statements(query: &BoundQuery) -> Result<PageStatements> {
    let joins = USER_TABLE.join_clause(&query.predicate.relations())?;
    let from = if joins.is_empty() {
        format!("{} {}", USER_TABLE.table, USER_TABLE.alias)
    } else {
        format!("{} {} {}", USER_TABLE.table, USER_TABLE.alias, joins)
    };
    let rendered = PredicateSqlBuilder::new(&USER_TABLE, 0).build(&query.predicate)?;
    let order = USER_TABLE.order_clause(&query.order)?;
    let limit_idx = rendered.next_param(0);

    Ok(PageStatements {
        count_sql: format!(
            "SELECT COUNT(*) AS count FROM {} WHERE {}",
            from, rendered.where_clause
        ),
        page_sql: format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT ${} OFFSET ${}",
            USER_COLUMNS,
            from,
            rendered.where_clause,
            order,
            limit_idx,
            limit_idx + 1
        ),
        params: rendered.params,
    })
}

fn user_from_row(row: &PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        is_deleted: row.try_get("is_deleted")?,
    })
}

#[async_trait]
impl EntityStore for PgUserStore {
    type Entity = User;

    async fn find_and_count(&self, query: &BoundQuery) -> Result<(Vec<User>, i64)> {
        let statements = page_statements(query)?;
        let (rows, total) = fetch_page(
            &self.pool,
            self.statement_timeout,
            query.entity,
            &statements,
            query.window,
        )
        .await?;
        let items = rows.iter().map(user_from_row).collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    async fn find_within(&self, query: &SpatialQuery) -> Result<Vec<User>> {
        Err(Error::Config(format!(
            "{} has no location column",
            query.entity
        )))
    }
}
