//! Structured logging schema and field name constants for clue.
//!
//! Every crate emits `tracing` events with these field names so log
//! aggregation can filter on the same keys across the geodesy, composition
//! and store layers.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue surfaced to the caller (timeouts, oversized spatial results) |
//! | INFO  | Lifecycle events (pool established, migrations applied) |
//! | DEBUG | Decision points (composed query shape, default order applied) |
//! | TRACE | Per-row and per-corner detail |
//!
//! Bound query parameter values are user data and are never logged; log the
//! parameter count instead.

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "geo", "query", "db", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "composer", "spatial", "pool", "projects", "users"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "compose", "find_and_count", "find_within", "build_ring"
pub const OPERATION: &str = "op";

/// Entity name the query targets ("project", "user").
pub const ENTITY: &str = "entity";

// ─── Query shape fields ────────────────────────────────────────────────────

/// Number of rows skipped.
pub const SKIP: &str = "skip";

/// Page size.
pub const LIMIT: &str = "limit";

/// Number of ORDER BY keys, including the id tie-break.
pub const SORT_KEYS: &str = "sort_keys";

/// Number of bound parameters in a rendered statement.
pub const PARAM_COUNT: &str = "param_count";

/// Whether the default order was applied.
pub const DEFAULT_ORDER: &str = "default_order";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned.
pub const RESULT_COUNT: &str = "result_count";

/// Total matching rows, ignoring the window.
pub const TOTAL: &str = "total";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

/// Database table or entity affected.
pub const DB_TABLE: &str = "db_table";

/// Statement timeout applied to a store call.
pub const TIMEOUT_MS: &str = "timeout_ms";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Caller-facing error class ("validation", "timeout", ...).
pub const ERROR_KIND: &str = "error_kind";
