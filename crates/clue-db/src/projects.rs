//! PostgreSQL store for `admin.project`.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use clue_core::clue_geo::{GeoPoint, Wgs84};
use clue_core::{
    BoundQuery, EntityStore, Error, OrderBy, Predicate, Project, Result, SpatialQuery,
    UserSummary, CREATOR,
};

use crate::sql::{PredicateSqlBuilder, QueryParam, RelationJoin, TableSpec};
use crate::store::{fetch_all, fetch_page, PageStatements};

/// Physical layout of projects and their creator relation.
pub const PROJECT_TABLE: TableSpec = TableSpec {
    table: "admin.project",
    alias: "p",
    joins: &[RelationJoin {
        name: CREATOR,
        alias: "u",
        clause: "LEFT JOIN admin.users u ON u.id = p.creator_id",
    }],
};

const PROJECT_COLUMNS: &str = "p.id, p.name, p.\"desc\", p.happened_at, p.category, p.region, \
     p.website, ST_Y(p.location::geometry) AS lat, ST_X(p.location::geometry) AS lng, \
     p.created_at, p.updated_at, p.is_deleted";

const CREATOR_COLUMNS: &str = "u.id AS creator_id, u.username AS creator_username, \
     u.first_name AS creator_first_name, u.last_name AS creator_last_name";

/// PostgreSQL implementation of [`EntityStore`] for projects.
#[derive(Clone)]
pub struct PgProjectStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgProjectStore {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    pub fn statement_timeout(&self) -> Duration {
        self.statement_timeout
    }
}

/// Everything up to (not including) ORDER BY, shared by both paths.
struct Selection {
    from: String,
    where_clause: String,
    select: String,
    params: Vec<QueryParam>,
}

fn select_for(
    predicate: &Predicate,
    relations: &[&'static str],
    load_creator: bool,
) -> Result<Selection> {
    let mut joined: Vec<&'static str> = relations.to_vec();
    for rel in predicate.relations() {
        if !joined.contains(&rel) {
            joined.push(rel);
        }
    }
    let joins = PROJECT_TABLE.join_clause(&joined)?;
    let from = if joins.is_empty() {
        format!("{} {}", PROJECT_TABLE.table, PROJECT_TABLE.alias)
    } else {
        format!("{} {} {}", PROJECT_TABLE.table, PROJECT_TABLE.alias, joins)
    };

    let rendered = PredicateSqlBuilder::new(&PROJECT_TABLE, 0).build(predicate)?;
    let select = if load_creator {
        format!("{}, {}", PROJECT_COLUMNS, CREATOR_COLUMNS)
    } else {
        PROJECT_COLUMNS.to_string()
    };

    Ok(Selection {
        from,
        where_clause: rendered.where_clause,
        select,
        params: rendered.params,
    })
}

fn order_sql(order: &[OrderBy]) -> Result<String> {
    PROJECT_TABLE.order_clause(order)
}

/// Render the count and page statements for a listing.
pub fn page_statements(query: &BoundQuery) -> Result<PageStatements> {
    let selection = select_for(&query.predicate, &query.relations, query.loads(CREATOR))?;
    let order = order_sql(&query.order)?;
    let limit_idx = selection.params.len() + 1;

    Ok(PageStatements {
        count_sql: format!(
            "SELECT COUNT(*) AS count FROM {} WHERE {}",
            selection.from, selection.where_clause
        ),
        page_sql: format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} LIMIT ${} OFFSET ${}",
            selection.select,
            selection.from,
            selection.where_clause,
            order,
            limit_idx,
            limit_idx + 1
        ),
        params: selection.params,
    })
}

/// Render the region-search statement.
pub fn within_statement(query: &SpatialQuery) -> Result<(String, Vec<QueryParam>)> {
    let selection = select_for(&query.predicate, &query.relations, query.loads(CREATOR))?;
    let order = order_sql(&query.order)?;
    let mut params = selection.params;
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {} ORDER BY {}",
        selection.select, selection.from, selection.where_clause, order
    );
    if let Some(window) = query.window {
        let limit_idx = params.len() + 1;
        sql.push_str(&format!(" LIMIT ${} OFFSET ${}", limit_idx, limit_idx + 1));
        params.push(QueryParam::Int(window.limit));
        params.push(QueryParam::Int(window.skip));
    }
    Ok((sql, params))
}

fn project_from_row(row: &PgRow, load_creator: bool) -> Result<Project> {
    let lat: Option<f64> = row.try_get("lat")?;
    let lng: Option<f64> = row.try_get("lng")?;
    let location = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint::<Wgs84>::try_new(lat, lng).map_err(|e| {
            Error::InvalidData(format!("project location: {}", e))
        })?),
        _ => None,
    };

    let creator = if load_creator {
        let creator_id: Option<Uuid> = row.try_get("creator_id")?;
        match creator_id {
            Some(id) => Some(UserSummary {
                id,
                username: row.try_get("creator_username")?,
                first_name: row.try_get("creator_first_name")?,
                last_name: row.try_get("creator_last_name")?,
            }),
            None => None,
        }
    } else {
        None
    };

    Ok(Project {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        desc: row.try_get("desc")?,
        happened_at: row.try_get("happened_at")?,
        category: row.try_get("category")?,
        region: row.try_get("region")?,
        website: row.try_get("website")?,
        location,
        creator,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        is_deleted: row.try_get("is_deleted")?,
    })
}

#[async_trait]
impl EntityStore for PgProjectStore {
    type Entity = Project;

    async fn find_and_count(&self, query: &BoundQuery) -> Result<(Vec<Project>, i64)> {
        let statements = page_statements(query)?;
        let (rows, total) = fetch_page(
            &self.pool,
            self.statement_timeout,
            query.entity,
            &statements,
            query.window,
        )
        .await?;
        let load_creator = query.loads(CREATOR);
        let items = rows
            .iter()
            .map(|row| project_from_row(row, load_creator))
            .collect::<Result<Vec<_>>>()?;
        Ok((items, total))
    }

    async fn find_within(&self, query: &SpatialQuery) -> Result<Vec<Project>> {
        let (sql, params) = within_statement(query)?;
        let rows = fetch_all(
            &self.pool,
            self.statement_timeout,
            query.entity,
            &sql,
            &params,
        )
        .await?;
        let load_creator = query.loads(CREATOR);
        rows.iter()
            .map(|row| project_from_row(row, load_creator))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_core::clue_geo::{BoundingBox, RegionPolygonBuilder};
    use clue_core::{
        PaginationRequest, QueryComposer, QueryConfig, SortDirection, SpatialQueryExecutor,
        Window, PROJECT_SCHEMA,
    };

    fn compose(req: &PaginationRequest) -> BoundQuery {
        QueryComposer::default().compose(req, &PROJECT_SCHEMA).unwrap()
    }

    #[test]
    fn test_default_page_statements() {
        let statements = page_statements(&compose(&PaginationRequest::default())).unwrap();
        assert_eq!(
            statements.count_sql,
            "SELECT COUNT(*) AS count FROM admin.project p \
             LEFT JOIN admin.users u ON u.id = p.creator_id WHERE p.\"is_deleted\" = $1"
        );
        assert!(statements
            .page_sql
            .ends_with("ORDER BY p.\"created_at\" DESC, p.\"id\" ASC LIMIT $2 OFFSET $3"));
        assert!(statements.page_sql.contains("u.username AS creator_username"));
        assert_eq!(statements.params, vec![QueryParam::Bool(false)]);
    }

    #[test]
    fn test_count_and_page_share_where_clause() {
        let req = PaginationRequest::default()
            .with_param("name", "pier")
            .with_param("category", "survey")
            .order_by("name", SortDirection::Asc);
        let statements = page_statements(&compose(&req)).unwrap();
        let where_body = statements
            .count_sql
            .split(" WHERE ")
            .nth(1)
            .unwrap()
            .to_string();
        assert!(statements.page_sql.contains(&format!("WHERE {} ORDER BY", where_body)));
        assert_eq!(statements.params.len(), 3);
        assert!(statements.page_sql.ends_with("LIMIT $4 OFFSET $5"));
    }

    #[test]
    fn test_all_rows_drops_filter() {
        let req = PaginationRequest::default().with_param("isDelete", "all");
        let statements = page_statements(&compose(&req)).unwrap();
        assert!(statements.count_sql.ends_with("WHERE TRUE"));
        assert!(statements.params.is_empty());
        assert!(statements.page_sql.ends_with("LIMIT $1 OFFSET $2"));
    }

    fn ring() -> clue_core::clue_geo::Polygon {
        RegionPolygonBuilder::default()
            .build_ring(&BoundingBox::new(30.2, 122.4, 29.9, 121.9).unwrap())
            .unwrap()
    }

    #[test]
    fn test_within_statement_unbounded_by_default() {
        let query = SpatialQueryExecutor::default()
            .plan(&ring(), &PROJECT_SCHEMA)
            .unwrap();
        let (sql, params) = within_statement(&query).unwrap();
        assert!(sql.contains("ST_DWithin(p.\"location\", ST_GeomFromGeoJSON($1)::geography, 0)"));
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("is_deleted\" ="));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_within_statement_with_window_and_soft_delete() {
        let config = QueryConfig::default()
            .with_spatial_soft_delete(true)
            .with_spatial_window(Some(Window { skip: 20, limit: 10 }));
        let query = SpatialQueryExecutor::new(config)
            .plan(&ring(), &PROJECT_SCHEMA)
            .unwrap();
        let (sql, params) = within_statement(&query).unwrap();
        assert!(sql.ends_with("LIMIT $3 OFFSET $4"));
        assert_eq!(params[2], QueryParam::Int(10));
        assert_eq!(params[3], QueryParam::Int(20));
    }
}
