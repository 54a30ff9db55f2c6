//! Centralized default constants for clue.
//!
//! **This module is the single source of truth** for shared default values.
//! Other crates and the CLI reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default number of rows to skip.
pub const PAGE_SKIP: i64 = 0;

/// Default page size when a request omits `limit`.
pub const PAGE_LIMIT: i64 = 10;

/// Largest page a single listing call may request.
pub const MAX_PAGE_SIZE: i64 = 100;

// =============================================================================
// STORE
// =============================================================================

/// Deadline for a single store call, in milliseconds.
pub const STORE_TIMEOUT_MS: u64 = 5_000;

/// Default maximum pool connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default pool connect timeout, in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// SPATIAL
// =============================================================================

/// Unbounded spatial searches returning more rows than this log a warning.
pub const SPATIAL_RESULT_WARN_THRESHOLD: usize = 1_000;

// =============================================================================
// QUERY PARAMS
// =============================================================================

/// `params` key of the soft-delete toggle on every listing.
pub const SOFT_DELETE_PARAM: &str = "isDelete";

/// Soft-delete param value selecting live and deleted rows alike.
pub const SOFT_DELETE_ALL: &str = "all";
