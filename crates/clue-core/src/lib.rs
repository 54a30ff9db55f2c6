//! # clue-core
//!
//! Store-agnostic core of the clue listing and region-search paths.
//!
//! - [`QueryComposer`] validates a [`PaginationRequest`] against an
//!   [`EntitySortSchema`] whitelist and produces an immutable [`BoundQuery`]
//! - [`SpatialQueryExecutor`] turns a WGS-84 ring into a [`SpatialQuery`]
//! - [`EntityStore`] is the seam both hand their descriptors to
//!
//! Nothing in this crate writes to a store.

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod mock;
pub mod models;
pub mod pagination;
pub mod query;
pub mod schemas;
pub mod spatial;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{LimitPolicy, QueryConfig};
pub use error::{Error, ErrorKind, Result, ValidationError};
pub use models::*;
pub use pagination::{
    PaginationRequest, PaginationResponse, ParamValue, SortDirection, SortKey, SortOrder, Window,
};
pub use query::{
    BoundQuery, EntitySortSchema, FieldRef, FilterField, FilterValue, OrderBy, Predicate,
    QueryComposer, SoftDelete, SortableField, TextMatch, TextSearchSpec,
};
pub use schemas::{CREATOR, PROJECT_SCHEMA, USER_SCHEMA};
pub use spatial::{SpatialQuery, SpatialQueryExecutor};
pub use traits::EntityStore;

pub use clue_geo;
