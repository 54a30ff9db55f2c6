//! Store abstraction consumed by the composer and the spatial executor.

use async_trait::async_trait;

use crate::error::Result;
use crate::query::BoundQuery;
use crate::spatial::SpatialQuery;

/// A read-only entity collection.
///
/// Implementations translate the structured descriptors into their own
/// query language; they must bind every value as a parameter and may only
/// reference columns named by the descriptor.
#[async_trait]
pub trait EntityStore: Send + Sync {
    type Entity: Send;

    /// One page of rows matching `query.predicate` in `query.order`, and the
    /// count of all matching rows. Both reads observe the same snapshot.
    async fn find_and_count(&self, query: &BoundQuery) -> Result<(Vec<Self::Entity>, i64)>;

    /// Every row (or the window, when set) whose location satisfies the
    /// spatial predicate.
    async fn find_within(&self, query: &SpatialQuery) -> Result<Vec<Self::Entity>>;
}
