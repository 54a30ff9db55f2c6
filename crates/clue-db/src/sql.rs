//! Rendering of structured predicates into parameterized PostgreSQL.
//!
//! Column and table names only ever come from static [`TableSpec`]s and
//! [`FieldRef`]s; every caller-supplied value becomes a `$n` parameter.

use clue_core::{Error, FieldRef, FilterValue, OrderBy, Predicate, Result, TextMatch};
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Bool(bool),
    String(String),
    Int(i64),
}

/// Bind `params` in order onto `query`.
pub fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Bool(b) => query.bind(*b),
            QueryParam::String(s) => query.bind(s.as_str()),
            QueryParam::Int(i) => query.bind(*i),
        };
    }
    query
}

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// A relation reachable from a table through a fixed join.
#[derive(Debug, Clone, Copy)]
pub struct RelationJoin {
    pub name: &'static str,
    pub alias: &'static str,
    pub clause: &'static str,
}

/// Physical layout of one listed entity.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub table: &'static str,
    pub alias: &'static str,
    pub joins: &'static [RelationJoin],
}

impl TableSpec {
    fn join(&self, relation: &str) -> Result<&RelationJoin> {
        self.joins
            .iter()
            .find(|j| j.name == relation)
            .ok_or_else(|| Error::Config(format!("{} has no relation '{}'", self.table, relation)))
    }

    /// Qualified, quoted column reference.
    pub fn column(&self, field: &FieldRef) -> Result<String> {
        let alias = match field.relation {
            Some(rel) => self.join(rel)?.alias,
            None => self.alias,
        };
        Ok(format!("{}.\"{}\"", alias, field.column))
    }

    /// JOIN clauses for `relations`, in declaration order, each at most once.
    pub fn join_clause(&self, relations: &[&str]) -> Result<String> {
        for rel in relations {
            self.join(rel)?;
        }
        Ok(self
            .joins
            .iter()
            .filter(|j| relations.contains(&j.name))
            .map(|j| j.clause)
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// `ORDER BY` body. Postgres puts NULLs last ascending and first
    /// descending.
    pub fn order_clause(&self, order: &[OrderBy]) -> Result<String> {
        if order.is_empty() {
            return Err(Error::Config("order must not be empty".to_string()));
        }
        let keys = order
            .iter()
            .map(|o| Ok(format!("{} {}", self.column(&o.field)?, o.direction.as_sql())))
            .collect::<Result<Vec<_>>>()?;
        Ok(keys.join(", "))
    }
}

/// Result of rendering a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateSql {
    /// WHERE clause body, `TRUE` when unfiltered.
    pub where_clause: String,
    pub params: Vec<QueryParam>,
}

impl PredicateSql {
    /// Index the next appended parameter will take.
    pub fn next_param(&self, param_offset: usize) -> usize {
        param_offset + self.params.len() + 1
    }
}

/// Renders a [`Predicate`] against a [`TableSpec`].
pub struct PredicateSqlBuilder<'a> {
    table: &'a TableSpec,
    param_offset: usize,
}

impl<'a> PredicateSqlBuilder<'a> {
    /// `param_offset` parameters are already bound ahead of this clause.
    pub fn new(table: &'a TableSpec, param_offset: usize) -> Self {
        Self {
            table,
            param_offset,
        }
    }

    pub fn build(&self, predicate: &Predicate) -> Result<PredicateSql> {
        let mut params = Vec::new();
        let where_clause = self.render(predicate, &mut params)?;
        Ok(PredicateSql {
            where_clause,
            params,
        })
    }

    fn push(&self, params: &mut Vec<QueryParam>, param: QueryParam) -> String {
        params.push(param);
        format!("${}", self.param_offset + params.len())
    }

    fn render(&self, predicate: &Predicate, params: &mut Vec<QueryParam>) -> Result<String> {
        match predicate {
            Predicate::True => Ok("TRUE".to_string()),
            Predicate::Eq { field, value } => {
                let column = self.table.column(field)?;
                let param = match value {
                    FilterValue::Bool(b) => QueryParam::Bool(*b),
                    FilterValue::Text(s) => QueryParam::String(s.clone()),
                };
                Ok(format!("{} = {}", column, self.push(params, param)))
            }
            Predicate::Text {
                fields,
                op: TextMatch::ContainsIgnoreCase,
                value,
            } => {
                if fields.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let placeholder = self.push(
                    params,
                    QueryParam::String(format!("%{}%", escape_like(value))),
                );
                let clauses = fields
                    .iter()
                    .map(|f| {
                        Ok(format!(
                            "{} ILIKE {} ESCAPE '\\'",
                            self.table.column(f)?,
                            placeholder
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("({})", clauses.join(" OR ")))
            }
            Predicate::Within { field, ring } => {
                let column = self.table.column(field)?;
                let placeholder =
                    self.push(params, QueryParam::String(ring.to_geojson().to_string()));
                Ok(format!(
                    "ST_DWithin({}, ST_GeomFromGeoJSON({})::geography, 0)",
                    column, placeholder
                ))
            }
            Predicate::And(parts) => {
                if parts.is_empty() {
                    return Ok("TRUE".to_string());
                }
                let rendered = parts
                    .iter()
                    .map(|p| self.render(p, params))
                    .collect::<Result<Vec<_>>>()?;
                Ok(rendered.join(" AND "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_core::{QueryComposer, PaginationRequest, SortDirection, PROJECT_SCHEMA};
    use clue_core::clue_geo::{BoundingBox, RegionPolygonBuilder};

    const PROJECTS: TableSpec = TableSpec {
        table: "admin.project",
        alias: "p",
        joins: &[RelationJoin {
            name: "creator",
            alias: "u",
            clause: "LEFT JOIN admin.users u ON u.id = p.creator_id",
        }],
    };

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\dir"), "c:\\\\dir");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_empty_predicate() {
        let sql = PredicateSqlBuilder::new(&PROJECTS, 0)
            .build(&Predicate::True)
            .unwrap();
        assert_eq!(sql.where_clause, "TRUE");
        assert!(sql.params.is_empty());
    }

    #[test]
    fn test_default_listing_predicate() {
        let q = QueryComposer::default()
            .compose(&PaginationRequest::default(), &PROJECT_SCHEMA)
            .unwrap();
        let sql = PredicateSqlBuilder::new(&PROJECTS, 0)
            .build(&q.predicate)
            .unwrap();
        assert_eq!(sql.where_clause, "p.\"is_deleted\" = $1");
        assert_eq!(sql.params, vec![QueryParam::Bool(false)]);
        assert_eq!(sql.next_param(0), 2);
    }

    #[test]
    fn test_free_text_reuses_one_escaped_param() {
        let req = PaginationRequest::default().with_param("name", "50%_off");
        let q = QueryComposer::default().compose(&req, &PROJECT_SCHEMA).unwrap();
        let sql = PredicateSqlBuilder::new(&PROJECTS, 0)
            .build(&q.predicate)
            .unwrap();

        assert_eq!(
            sql.where_clause,
            "p.\"is_deleted\" = $1 AND (p.\"name\" ILIKE $2 ESCAPE '\\' \
             OR u.\"username\" ILIKE $2 ESCAPE '\\' \
             OR u.\"first_name\" ILIKE $2 ESCAPE '\\' \
             OR u.\"last_name\" ILIKE $2 ESCAPE '\\')"
        );
        assert_eq!(
            sql.params,
            vec![
                QueryParam::Bool(false),
                QueryParam::String("%50\\%\\_off%".to_string())
            ]
        );
    }

    #[test]
    fn test_param_offset_shifts_placeholders() {
        let req = PaginationRequest::default().with_param("region", "zhoushan");
        let q = QueryComposer::default().compose(&req, &PROJECT_SCHEMA).unwrap();
        let sql = PredicateSqlBuilder::new(&PROJECTS, 3)
            .build(&q.predicate)
            .unwrap();
        assert_eq!(sql.where_clause, "p.\"is_deleted\" = $4 AND p.\"region\" = $5");
    }

    #[test]
    fn test_injection_attempt_stays_in_params() {
        let evil = "'; DROP TABLE admin.project; --";
        let req = PaginationRequest::default().with_param("region", evil);
        let q = QueryComposer::default().compose(&req, &PROJECT_SCHEMA).unwrap();
        let sql = PredicateSqlBuilder::new(&PROJECTS, 0)
            .build(&q.predicate)
            .unwrap();
        assert!(!sql.where_clause.contains("DROP"));
        assert!(sql.params.contains(&QueryParam::String(evil.to_string())));
    }

    #[test]
    fn test_within_renders_st_dwithin() {
        let ring = RegionPolygonBuilder::default()
            .build_ring(&BoundingBox::new(30.2, 122.4, 29.9, 121.9).unwrap())
            .unwrap();
        let predicate = Predicate::Within {
            field: FieldRef::own("location"),
            ring: ring.clone(),
        };
        let sql = PredicateSqlBuilder::new(&PROJECTS, 0)
            .build(&predicate)
            .unwrap();
        assert_eq!(
            sql.where_clause,
            "ST_DWithin(p.\"location\", ST_GeomFromGeoJSON($1)::geography, 0)"
        );
        let QueryParam::String(geojson) = &sql.params[0] else {
            panic!("expected GeoJSON text param");
        };
        assert_eq!(geojson, &ring.to_geojson().to_string());
        assert!(geojson.contains("\"type\":\"Polygon\""));
    }

    #[test]
    fn test_order_clause_with_tie_break() {
        let req = PaginationRequest::default().order_by("happenedAt", SortDirection::Desc);
        let q = QueryComposer::default().compose(&req, &PROJECT_SCHEMA).unwrap();
        assert_eq!(
            PROJECTS.order_clause(&q.order).unwrap(),
            "p.\"happened_at\" DESC, p.\"id\" ASC"
        );
    }

    #[test]
    fn test_join_clause() {
        assert_eq!(
            PROJECTS.join_clause(&["creator"]).unwrap(),
            "LEFT JOIN admin.users u ON u.id = p.creator_id"
        );
        assert_eq!(PROJECTS.join_clause(&[]).unwrap(), "");
        assert!(matches!(
            PROJECTS.join_clause(&["owner"]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_unknown_relation_is_config_error() {
        let predicate = Predicate::Eq {
            field: FieldRef::related("owner", "name"),
            value: FilterValue::Text("x".to_string()),
        };
        assert!(PredicateSqlBuilder::new(&PROJECTS, 0)
            .build(&predicate)
            .is_err());
    }
}
