//! Query composition: from a raw [`PaginationRequest`] to an immutable
//! [`BoundQuery`] description.
//!
//! The composer never produces query text. It resolves every public field
//! name against a static [`EntitySortSchema`] whitelist and emits structured
//! predicates; store adapters turn those into parameterized statements.
//!
//! # Example
//!
//! ```
//! use clue_core::{PaginationRequest, QueryComposer, SortDirection, PROJECT_SCHEMA};
//!
//! let request = PaginationRequest::new(0, 20)
//!     .order_by("name", SortDirection::Asc)
//!     .with_param("name", "bridge");
//!
//! let query = QueryComposer::default().compose(&request, &PROJECT_SCHEMA).unwrap();
//!
//! // name ASC, then the id tie-break
//! assert_eq!(query.order.len(), 2);
//! assert_eq!(query.order[1].name, "id");
//! ```

use clue_geo::Polygon;
use tracing::debug;

use crate::config::{LimitPolicy, QueryConfig};
use crate::defaults;
use crate::error::{Error, Result, ValidationError};
use crate::pagination::{
    PaginationRequest, PaginationResponse, ParamValue, SortDirection, Window,
};
use crate::traits::EntityStore;

// =============================================================================
// PREDICATE DESCRIPTORS
// =============================================================================

/// A column of the listed entity, or of an eager-loaded relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub relation: Option<&'static str>,
    pub column: &'static str,
}

impl FieldRef {
    pub const fn own(column: &'static str) -> Self {
        Self {
            relation: None,
            column,
        }
    }

    pub const fn related(relation: &'static str, column: &'static str) -> Self {
        Self {
            relation: Some(relation),
            column,
        }
    }
}

/// A literal compared against a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Bool(bool),
    Text(String),
}

/// Text operator of [`Predicate::Text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMatch {
    /// Case-insensitive substring. The value is literal; wildcards in it
    /// carry no meaning.
    ContainsIgnoreCase,
}

/// Structured filter. Rendered by the store, never interpolated.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every row.
    True,
    Eq {
        field: FieldRef,
        value: FilterValue,
    },
    /// Matches when ANY of `fields` matches.
    Text {
        fields: Vec<FieldRef>,
        op: TextMatch,
        value: String,
    },
    /// Location lies within (or on) the ring.
    Within { field: FieldRef, ring: Polygon },
    And(Vec<Predicate>),
}

impl Predicate {
    /// Conjunction, flattening nested `And`s and dropping `True`.
    pub fn and(parts: Vec<Predicate>) -> Predicate {
        let mut flat = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Predicate::True => {}
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Predicate::True,
            1 => flat.pop().unwrap_or(Predicate::True),
            _ => Predicate::And(flat),
        }
    }

    /// Relations any field in this predicate reads from.
    pub fn relations(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        self.collect_relations(&mut out);
        out
    }

    fn collect_relations(&self, out: &mut Vec<&'static str>) {
        match self {
            Predicate::True => {}
            Predicate::Eq { field, .. } | Predicate::Within { field, .. } => {
                push_relation(out, field)
            }
            Predicate::Text { fields, .. } => {
                for field in fields {
                    push_relation(out, field);
                }
            }
            Predicate::And(parts) => {
                for part in parts {
                    part.collect_relations(out);
                }
            }
        }
    }
}

fn push_relation(out: &mut Vec<&'static str>, field: &FieldRef) {
    if let Some(rel) = field.relation {
        if !out.contains(&rel) {
            out.push(rel);
        }
    }
}

// =============================================================================
// ENTITY SCHEMA
// =============================================================================

/// A whitelisted sort key: public name and the column it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortableField {
    pub name: &'static str,
    pub field: FieldRef,
}

/// An exact-match `params` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterField {
    pub param: &'static str,
    pub field: FieldRef,
}

/// The soft-delete toggle: `params` key and the flag column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftDelete {
    pub param: &'static str,
    pub field: FieldRef,
}

/// A free-text `params` key matched across several columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSearchSpec {
    pub param: &'static str,
    pub fields: &'static [FieldRef],
}

/// A resolved ORDER BY key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub name: &'static str,
    pub field: FieldRef,
    pub direction: SortDirection,
}

/// Everything the composer may touch on one entity. All fields are static,
/// so no caller input ever reaches a column name.
#[derive(Debug, Clone, Copy)]
pub struct EntitySortSchema {
    pub entity: &'static str,
    pub id_field: FieldRef,
    pub sortable: &'static [SortableField],
    /// Applied when the request carries no order.
    pub default_order: &'static [OrderBy],
    pub soft_delete: Option<SoftDelete>,
    pub search: Option<TextSearchSpec>,
    pub exact_filters: &'static [FilterField],
    /// Relations eager-loaded with every row.
    pub relations: &'static [&'static str],
    pub location_field: Option<FieldRef>,
}

impl EntitySortSchema {
    pub fn sortable_field(&self, name: &str) -> Option<&SortableField> {
        self.sortable.iter().find(|f| f.name == name)
    }

    /// The unique-id tie-break key.
    pub fn tie_break(&self) -> OrderBy {
        OrderBy {
            name: "id",
            field: self.id_field,
            direction: SortDirection::Asc,
        }
    }

    /// `order` plus the id tie-break, unless `order` already sorts by id.
    pub fn with_tie_break(&self, mut order: Vec<OrderBy>) -> Vec<OrderBy> {
        if !order.iter().any(|o| o.field == self.id_field) {
            order.push(self.tie_break());
        }
        order
    }

    /// Default soft-delete predicate: live rows only.
    pub fn exclude_deleted(&self) -> Predicate {
        match self.soft_delete {
            Some(sd) => Predicate::Eq {
                field: sd.field,
                value: FilterValue::Bool(false),
            },
            None => Predicate::True,
        }
    }
}

// =============================================================================
// BOUND QUERY
// =============================================================================

/// A validated, immutable listing query.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub entity: &'static str,
    pub predicate: Predicate,
    pub order: Vec<OrderBy>,
    pub window: Window,
    /// Relations to eager-load. Joins needed only by the predicate are
    /// derived from [`Predicate::relations`].
    pub relations: Vec<&'static str>,
}

impl BoundQuery {
    pub fn loads(&self, relation: &str) -> bool {
        self.relations.iter().any(|r| *r == relation)
    }
}

// =============================================================================
// COMPOSER
// =============================================================================

/// Turns [`PaginationRequest`]s into [`BoundQuery`]s.
///
/// Stateless apart from its policy; one instance can serve concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct QueryComposer {
    config: QueryConfig,
}

impl QueryComposer {
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Validate `request` against `schema`. Fails without partial output.
    pub fn compose(
        &self,
        request: &PaginationRequest,
        schema: &EntitySortSchema,
    ) -> std::result::Result<BoundQuery, ValidationError> {
        let window = self.window(request)?;
        let (order, default_order) = self.order(request, schema)?;
        let predicate = self.predicate(request, schema)?;

        debug!(
            subsystem = "query",
            component = "composer",
            op = "compose",
            entity = schema.entity,
            skip = window.skip,
            limit = window.limit,
            sort_keys = order.len(),
            default_order,
            "Composed listing query"
        );

        Ok(BoundQuery {
            entity: schema.entity,
            predicate,
            order,
            window,
            relations: schema.relations.to_vec(),
        })
    }

    /// Compose and run against `store`, checking `total >= items.len()`.
    pub async fn list<S>(
        &self,
        request: &PaginationRequest,
        schema: &EntitySortSchema,
        store: &S,
    ) -> Result<PaginationResponse<S::Entity>>
    where
        S: EntityStore + ?Sized,
    {
        let query = self.compose(request, schema)?;
        let (items, total) = store.find_and_count(&query).await?;

        if total < items.len() as i64 {
            return Err(Error::InvalidData(format!(
                "{} store returned {} items but total {}",
                schema.entity,
                items.len(),
                total
            )));
        }

        Ok(PaginationResponse::new(items, total, query.window))
    }

    fn window(&self, request: &PaginationRequest) -> std::result::Result<Window, ValidationError> {
        if request.skip < 0 {
            return Err(ValidationError::NegativeSkip(request.skip));
        }
        let max = self.config.max_page_size;
        let limit = match self.config.limit_policy {
            LimitPolicy::Reject if request.limit < 1 || request.limit > max => {
                return Err(ValidationError::LimitOutOfRange {
                    limit: request.limit,
                    max,
                });
            }
            LimitPolicy::Reject => request.limit,
            LimitPolicy::Clamp => request.limit.clamp(1, max.max(1)),
        };
        Ok(Window::new(request.skip, limit))
    }

    fn order(
        &self,
        request: &PaginationRequest,
        schema: &EntitySortSchema,
    ) -> std::result::Result<(Vec<OrderBy>, bool), ValidationError> {
        if request.order.is_empty() {
            return Ok((schema.with_tie_break(schema.default_order.to_vec()), true));
        }

        let mut order: Vec<OrderBy> = Vec::with_capacity(request.order.len() + 1);
        for key in request.order.keys() {
            let field = schema.sortable_field(&key.field).ok_or_else(|| {
                ValidationError::UnknownSortField {
                    entity: schema.entity,
                    field: key.field.clone(),
                }
            })?;
            // A repeated key cannot change the order.
            if order.iter().any(|o| o.field == field.field) {
                continue;
            }
            order.push(OrderBy {
                name: field.name,
                field: field.field,
                direction: key.direction,
            });
        }
        Ok((schema.with_tie_break(order), false))
    }

    fn predicate(
        &self,
        request: &PaginationRequest,
        schema: &EntitySortSchema,
    ) -> std::result::Result<Predicate, ValidationError> {
        let soft_delete = match schema.soft_delete {
            Some(sd) => soft_delete_predicate(sd, request.params.get(sd.param))?,
            None => Predicate::True,
        };

        let mut exact = Vec::new();
        let mut text = Predicate::True;

        for (key, value) in &request.params {
            if schema.soft_delete.is_some_and(|sd| sd.param == key.as_str()) {
                continue;
            }
            if let Some(search) = schema.search.filter(|s| s.param == key.as_str()) {
                let term = value.as_text().ok_or_else(|| ValidationError::InvalidFilterValue {
                    key: key.clone(),
                    reason: "expected a string".to_string(),
                })?;
                let term = term.trim();
                if !term.is_empty() {
                    text = Predicate::Text {
                        fields: search.fields.to_vec(),
                        op: TextMatch::ContainsIgnoreCase,
                        value: term.to_string(),
                    };
                }
                continue;
            }
            if let Some(filter) = schema.exact_filters.iter().find(|f| f.param == key.as_str()) {
                let value = match value {
                    ParamValue::Bool(b) => Some(FilterValue::Bool(*b)),
                    ParamValue::Text(s) if s.trim().is_empty() => None,
                    ParamValue::Text(s) => Some(FilterValue::Text(s.clone())),
                };
                if let Some(value) = value {
                    exact.push(Predicate::Eq {
                        field: filter.field,
                        value,
                    });
                }
                continue;
            }
            return Err(ValidationError::UnknownFilter {
                entity: schema.entity,
                key: key.clone(),
            });
        }

        let mut parts = vec![soft_delete];
        parts.extend(exact);
        parts.push(text);
        Ok(Predicate::and(parts))
    }
}

/// Absent or `false` keeps live rows, `true` selects deleted rows, and
/// `"all"` disables the filter.
fn soft_delete_predicate(
    sd: SoftDelete,
    value: Option<&ParamValue>,
) -> std::result::Result<Predicate, ValidationError> {
    let Some(value) = value else {
        return Ok(Predicate::Eq {
            field: sd.field,
            value: FilterValue::Bool(false),
        });
    };
    if value
        .as_text()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case(defaults::SOFT_DELETE_ALL))
    {
        return Ok(Predicate::True);
    }
    let deleted = value
        .as_bool()
        .ok_or_else(|| ValidationError::InvalidFilterValue {
            key: sd.param.to_string(),
            reason: format!("expected true, false or \"{}\"", defaults::SOFT_DELETE_ALL),
        })?;
    Ok(Predicate::Eq {
        field: sd.field,
        value: FilterValue::Bool(deleted),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::{PROJECT_SCHEMA, USER_SCHEMA};

    fn composer() -> QueryComposer {
        QueryComposer::default()
    }

    fn is_deleted(value: bool) -> Predicate {
        Predicate::Eq {
            field: FieldRef::own("is_deleted"),
            value: FilterValue::Bool(value),
        }
    }

    #[test]
    fn test_empty_order_uses_default_plus_tie_break() {
        let q = composer()
            .compose(&PaginationRequest::default(), &PROJECT_SCHEMA)
            .unwrap();
        let mut expected = PROJECT_SCHEMA.default_order.to_vec();
        expected.push(PROJECT_SCHEMA.tie_break());
        assert_eq!(q.order, expected);
        assert_eq!(q.order[0].name, "createdAt");
        assert_eq!(q.order[0].direction, SortDirection::Desc);
    }

    #[test]
    fn test_multi_key_order_kept_in_request_order() {
        let req = PaginationRequest::default()
            .order_by("region", SortDirection::Asc)
            .order_by("name", SortDirection::Desc);
        let q = composer().compose(&req, &PROJECT_SCHEMA).unwrap();
        let names: Vec<_> = q.order.iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["region", "name", "id"]);
        assert_eq!(q.order[1].direction, SortDirection::Desc);
        assert_eq!(q.order[0].field, FieldRef::own("region"));
    }

    #[test]
    fn test_unknown_sort_field_rejected() {
        let req = PaginationRequest::default()
            .order_by("name", SortDirection::Asc)
            .order_by("name; DROP TABLE admin.project", SortDirection::Asc);
        let err = composer().compose(&req, &PROJECT_SCHEMA).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownSortField {
                entity: "project",
                field: "name; DROP TABLE admin.project".to_string()
            }
        );
    }

    #[test]
    fn test_column_names_are_not_sortable_by_raw_name() {
        let req = PaginationRequest::default().order_by("created_at", SortDirection::Asc);
        assert!(composer().compose(&req, &PROJECT_SCHEMA).is_err());
    }

    #[test]
    fn test_duplicate_sort_key_collapses() {
        let req = PaginationRequest::default()
            .order_by("name", SortDirection::Asc)
            .order_by("name", SortDirection::Desc);
        let q = composer().compose(&req, &PROJECT_SCHEMA).unwrap();
        assert_eq!(q.order.len(), 2);
        assert_eq!(q.order[0].direction, SortDirection::Asc);
    }

    #[test]
    fn test_negative_skip_rejected() {
        let req = PaginationRequest::new(-1, 10);
        assert_eq!(
            composer().compose(&req, &PROJECT_SCHEMA).unwrap_err(),
            ValidationError::NegativeSkip(-1)
        );
    }

    #[test]
    fn test_limit_reject_policy() {
        for limit in [0, -5, defaults::MAX_PAGE_SIZE + 1] {
            let err = composer()
                .compose(&PaginationRequest::new(0, limit), &PROJECT_SCHEMA)
                .unwrap_err();
            assert_eq!(
                err,
                ValidationError::LimitOutOfRange {
                    limit,
                    max: defaults::MAX_PAGE_SIZE
                }
            );
        }
        let q = composer()
            .compose(
                &PaginationRequest::new(0, defaults::MAX_PAGE_SIZE),
                &PROJECT_SCHEMA,
            )
            .unwrap();
        assert_eq!(q.window.limit, defaults::MAX_PAGE_SIZE);
    }

    #[test]
    fn test_limit_clamp_policy() {
        let composer = QueryComposer::new(
            QueryConfig::default()
                .with_limit_policy(LimitPolicy::Clamp)
                .with_max_page_size(50),
        );
        let q = composer
            .compose(&PaginationRequest::new(3, 500), &PROJECT_SCHEMA)
            .unwrap();
        assert_eq!(q.window, Window::new(3, 50));

        let q = composer
            .compose(&PaginationRequest::new(0, 0), &PROJECT_SCHEMA)
            .unwrap();
        assert_eq!(q.window.limit, 1);

        // Clamping never hides a negative skip.
        assert!(composer
            .compose(&PaginationRequest::new(-1, 10), &PROJECT_SCHEMA)
            .is_err());
    }

    #[test]
    fn test_soft_delete_defaults_to_live_rows() {
        let q = composer()
            .compose(&PaginationRequest::default(), &PROJECT_SCHEMA)
            .unwrap();
        assert_eq!(q.predicate, is_deleted(false));
    }

    #[test]
    fn test_soft_delete_override() {
        let q = composer()
            .compose(
                &PaginationRequest::default().with_param("isDelete", true),
                &PROJECT_SCHEMA,
            )
            .unwrap();
        assert_eq!(q.predicate, is_deleted(true));

        let q = composer()
            .compose(
                &PaginationRequest::default().with_param("isDelete", "false"),
                &PROJECT_SCHEMA,
            )
            .unwrap();
        assert_eq!(q.predicate, is_deleted(false));

        let q = composer()
            .compose(
                &PaginationRequest::default().with_param("isDelete", "all"),
                &PROJECT_SCHEMA,
            )
            .unwrap();
        assert_eq!(q.predicate, Predicate::True);
    }

    #[test]
    fn test_soft_delete_garbage_rejected() {
        let err = composer()
            .compose(
                &PaginationRequest::default().with_param("isDelete", "maybe"),
                &PROJECT_SCHEMA,
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFilterValue { .. }));
    }

    #[test]
    fn test_free_text_combined_with_soft_delete_and_exact() {
        let req = PaginationRequest::default()
            .with_param("name", "  Wang ")
            .with_param("region", "zhoushan");
        let q = composer().compose(&req, &PROJECT_SCHEMA).unwrap();

        let Predicate::And(parts) = &q.predicate else {
            panic!("expected conjunction, got {:?}", q.predicate);
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], is_deleted(false));
        assert_eq!(
            parts[1],
            Predicate::Eq {
                field: FieldRef::own("region"),
                value: FilterValue::Text("zhoushan".to_string())
            }
        );
        match &parts[2] {
            Predicate::Text { fields, op, value } => {
                assert_eq!(value, "Wang");
                assert_eq!(*op, TextMatch::ContainsIgnoreCase);
                assert!(fields.contains(&FieldRef::related("creator", "username")));
                assert!(fields.contains(&FieldRef::own("name")));
            }
            other => panic!("expected text predicate, got {:?}", other),
        }
        assert_eq!(q.predicate.relations(), vec!["creator"]);
    }

    #[test]
    fn test_blank_free_text_ignored() {
        let req = PaginationRequest::default().with_param("name", "   ");
        let q = composer().compose(&req, &PROJECT_SCHEMA).unwrap();
        assert_eq!(q.predicate, is_deleted(false));
    }

    #[test]
    fn test_unknown_param_rejected() {
        let req = PaginationRequest::default().with_param("owner_id", "1");
        assert_eq!(
            composer().compose(&req, &PROJECT_SCHEMA).unwrap_err(),
            ValidationError::UnknownFilter {
                entity: "project",
                key: "owner_id".to_string()
            }
        );
    }

    #[test]
    fn test_free_text_must_be_string() {
        let req = PaginationRequest::default().with_param("username", true);
        assert!(matches!(
            composer().compose(&req, &USER_SCHEMA).unwrap_err(),
            ValidationError::InvalidFilterValue { .. }
        ));
    }

    #[test]
    fn test_project_listing_loads_creator() {
        let q = composer()
            .compose(&PaginationRequest::default(), &PROJECT_SCHEMA)
            .unwrap();
        assert!(q.loads("creator"));

        let q = composer()
            .compose(&PaginationRequest::default(), &USER_SCHEMA)
            .unwrap();
        assert!(q.relations.is_empty());
    }

    #[test]
    fn test_predicate_and_flattens() {
        let p = Predicate::and(vec![
            Predicate::True,
            Predicate::and(vec![is_deleted(false), Predicate::True]),
        ]);
        assert_eq!(p, is_deleted(false));
        assert_eq!(Predicate::and(vec![]), Predicate::True);
    }
}
