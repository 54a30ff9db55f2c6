//! Region search: containment of entity locations in a WGS-84 ring.

use std::time::Instant;

use clue_geo::{BoundingBox, Polygon, RegionPolygonBuilder};
use tracing::{debug, warn};

use crate::config::QueryConfig;
use crate::defaults;
use crate::error::{Error, Result};
use crate::pagination::Window;
use crate::query::{EntitySortSchema, OrderBy, Predicate};
use crate::traits::EntityStore;

/// A validated region search.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialQuery {
    pub entity: &'static str,
    pub ring: Polygon,
    /// `Within` on the location column, plus soft-delete when enabled.
    pub predicate: Predicate,
    /// Default order plus id tie-break, so repeated searches agree.
    pub order: Vec<OrderBy>,
    pub relations: Vec<&'static str>,
    /// `None` returns every match.
    pub window: Option<Window>,
}

impl SpatialQuery {
    pub fn loads(&self, relation: &str) -> bool {
        self.relations.iter().any(|r| *r == relation)
    }
}

/// Runs containment searches with the same relation loading as listings.
///
/// By default neither soft-delete filtering nor windowing is applied; both
/// are opt-in through [`QueryConfig`].
#[derive(Debug, Clone, Default)]
pub struct SpatialQueryExecutor {
    config: QueryConfig,
    builder: RegionPolygonBuilder,
}

impl SpatialQueryExecutor {
    pub fn new(config: QueryConfig) -> Self {
        Self {
            config,
            builder: RegionPolygonBuilder::default(),
        }
    }

    pub fn with_builder(mut self, builder: RegionPolygonBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Describe the search of `ring` over `schema`.
    pub fn plan(&self, ring: &Polygon, schema: &EntitySortSchema) -> Result<SpatialQuery> {
        let field = schema.location_field.ok_or_else(|| {
            Error::Config(format!("{} has no location column", schema.entity))
        })?;

        let soft_delete = if self.config.spatial_soft_delete {
            schema.exclude_deleted()
        } else {
            Predicate::True
        };

        Ok(SpatialQuery {
            entity: schema.entity,
            ring: ring.clone(),
            predicate: Predicate::and(vec![
                Predicate::Within {
                    field,
                    ring: ring.clone(),
                },
                soft_delete,
            ]),
            order: schema.with_tie_break(schema.default_order.to_vec()),
            relations: schema.relations.to_vec(),
            window: self.config.spatial_window,
        })
    }

    /// Entities located within `ring`.
    pub async fn search_within<S>(
        &self,
        ring: &Polygon,
        schema: &EntitySortSchema,
        store: &S,
    ) -> Result<Vec<S::Entity>>
    where
        S: EntityStore + ?Sized,
    {
        let query = self.plan(ring, schema)?;
        let start = Instant::now();
        let items = store.find_within(&query).await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            subsystem = "query",
            component = "spatial",
            op = "search_within",
            entity = schema.entity,
            result_count = items.len(),
            duration_ms,
            "Region search complete"
        );

        if query.window.is_none() && items.len() > defaults::SPATIAL_RESULT_WARN_THRESHOLD {
            warn!(
                subsystem = "query",
                component = "spatial",
                op = "search_within",
                entity = schema.entity,
                result_count = items.len(),
                "Unbounded region search returned a large result set"
            );
        }

        Ok(items)
    }

    /// Build the WGS-84 ring for a GCJ-02 box and search it.
    pub async fn search_area<S>(
        &self,
        bbox: &BoundingBox,
        schema: &EntitySortSchema,
        store: &S,
    ) -> Result<Vec<S::Entity>>
    where
        S: EntityStore + ?Sized,
    {
        let ring = self.builder.build_ring(bbox)?;
        self.search_within(&ring, schema, store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FieldRef, FilterValue};
    use crate::schemas::{PROJECT_SCHEMA, USER_SCHEMA};
    use clue_geo::GeoError;

    fn ring() -> Polygon {
        let bbox = BoundingBox::new(30.2, 122.4, 29.9, 121.9).unwrap();
        RegionPolygonBuilder::default().build_ring(&bbox).unwrap()
    }

    #[test]
    fn test_plan_defaults_preserve_unfiltered_unbounded_search() {
        let q = SpatialQueryExecutor::default()
            .plan(&ring(), &PROJECT_SCHEMA)
            .unwrap();
        assert_eq!(
            q.predicate,
            Predicate::Within {
                field: FieldRef::own("location"),
                ring: ring()
            }
        );
        assert_eq!(q.window, None);
        assert!(q.loads("creator"));
        assert_eq!(q.order.last().unwrap().name, "id");
    }

    #[test]
    fn test_plan_opt_in_soft_delete_and_window() {
        let exec = SpatialQueryExecutor::new(
            QueryConfig::default()
                .with_spatial_soft_delete(true)
                .with_spatial_window(Some(Window::new(0, 200))),
        );
        let q = exec.plan(&ring(), &PROJECT_SCHEMA).unwrap();
        let Predicate::And(parts) = &q.predicate else {
            panic!("expected conjunction");
        };
        assert_eq!(
            parts[1],
            Predicate::Eq {
                field: FieldRef::own("is_deleted"),
                value: FilterValue::Bool(false)
            }
        );
        assert_eq!(q.window, Some(Window::new(0, 200)));
    }

    #[test]
    fn test_plan_requires_location_column() {
        let err = SpatialQueryExecutor::default()
            .plan(&ring(), &USER_SCHEMA)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_search_area_rejects_degenerate_box() {
        let store = crate::mock::MockEntityStore::<crate::models::Project>::new(vec![]);
        let bbox = BoundingBox::new(10.0, 10.0, 10.0, 10.0).unwrap();
        let err = SpatialQueryExecutor::default()
            .search_area(&bbox, &PROJECT_SCHEMA, &store)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DegenerateRegion(GeoError::DegenerateRegion { .. })
        ));
        assert!(store.calls().is_empty());
    }
}
