//! Query composition policy.

use crate::defaults;
use crate::pagination::Window;

/// What to do with a `limit` outside `1..=max_page_size`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LimitPolicy {
    /// Fail with `ValidationError::LimitOutOfRange`.
    #[default]
    Reject,
    /// Clamp into range.
    Clamp,
}

/// Policy knobs for [`crate::QueryComposer`] and
/// [`crate::SpatialQueryExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    pub max_page_size: i64,
    pub limit_policy: LimitPolicy,
    /// Exclude soft-deleted rows from region searches.
    pub spatial_soft_delete: bool,
    /// Window applied to region searches. `None` returns every match.
    pub spatial_window: Option<Window>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_page_size: defaults::MAX_PAGE_SIZE,
            limit_policy: LimitPolicy::Reject,
            spatial_soft_delete: false,
            spatial_window: None,
        }
    }
}

impl QueryConfig {
    pub fn with_max_page_size(mut self, max: i64) -> Self {
        self.max_page_size = max;
        self
    }

    pub fn with_limit_policy(mut self, policy: LimitPolicy) -> Self {
        self.limit_policy = policy;
        self
    }

    pub fn with_spatial_soft_delete(mut self, enabled: bool) -> Self {
        self.spatial_soft_delete = enabled;
        self
    }

    pub fn with_spatial_window(mut self, window: Option<Window>) -> Self {
        self.spatial_window = window;
        self
    }
}
