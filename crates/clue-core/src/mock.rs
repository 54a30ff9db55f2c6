//! In-memory entity store for deterministic testing.
//!
//! [`MockEntityStore`] evaluates the same [`BoundQuery`] and [`SpatialQuery`]
//! descriptors a database adapter receives, so composer and executor
//! behavior can be tested without PostgreSQL.
//!
//! ## Usage
//!
//! ```rust
//! use clue_core::mock::MockEntityStore;
//! use clue_core::{PaginationRequest, Project, QueryComposer, PROJECT_SCHEMA};
//!
//! #[tokio::test]
//! async fn test_listing() {
//!     let store = MockEntityStore::<Project>::new(vec![]);
//!     let page = QueryComposer::default()
//!         .list(&PaginationRequest::default(), &PROJECT_SCHEMA, &store)
//!         .await
//!         .unwrap();
//!     assert_eq!(page.total, 0);
//!     assert_eq!(store.calls().len(), 1);
//! }
//! ```
//!
//! Postgres ordering rules are mirrored: NULLs sort last ascending and first
//! descending. Text compares bytewise.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clue_geo::{GeoPoint, Wgs84};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Project, User};
use crate::pagination::{SortDirection, Window};
use crate::query::{BoundQuery, FieldRef, FilterValue, OrderBy, Predicate, TextMatch};
use crate::schemas::CREATOR;
use crate::spatial::SpatialQuery;
use crate::traits::EntityStore;

/// A column value as the mock store sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum MockValue {
    Null,
    Bool(bool),
    Text(String),
    Time(DateTime<Utc>),
    Id(Uuid),
}

impl MockValue {
    fn rank(&self) -> u8 {
        match self {
            MockValue::Bool(_) => 0,
            MockValue::Text(_) => 1,
            MockValue::Time(_) => 2,
            MockValue::Id(_) => 3,
            MockValue::Null => 4,
        }
    }

    /// Ascending order with NULL greater than every value.
    fn cmp_asc(&self, other: &Self) -> Ordering {
        match (self, other) {
            (MockValue::Bool(a), MockValue::Bool(b)) => a.cmp(b),
            (MockValue::Text(a), MockValue::Text(b)) => a.cmp(b),
            (MockValue::Time(a), MockValue::Time(b)) => a.cmp(b),
            (MockValue::Id(a), MockValue::Id(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<&str> for MockValue {
    fn from(s: &str) -> Self {
        MockValue::Text(s.to_string())
    }
}

impl From<Option<&str>> for MockValue {
    fn from(s: Option<&str>) -> Self {
        s.map(MockValue::from).unwrap_or(MockValue::Null)
    }
}

impl From<DateTime<Utc>> for MockValue {
    fn from(t: DateTime<Utc>) -> Self {
        MockValue::Time(t)
    }
}

/// An entity the mock store can filter, sort and trim.
pub trait MockRecord: Clone + Send + Sync + 'static {
    /// Relations this record can carry.
    const RELATIONS: &'static [&'static str] = &[];

    fn id(&self) -> Uuid;

    /// Value of `field`; `Null` for unknown columns or absent relations.
    fn value(&self, field: &FieldRef) -> MockValue;

    fn location(&self) -> Option<GeoPoint<Wgs84>> {
        None
    }

    /// Drop `relation` from the record when it was not requested.
    fn detach(&mut self, _relation: &str) {}
}

impl MockRecord for Project {
    const RELATIONS: &'static [&'static str] = &[CREATOR];

    fn id(&self) -> Uuid {
        self.id
    }

    fn value(&self, field: &FieldRef) -> MockValue {
        match field.relation {
            Some(CREATOR) => {
                let Some(creator) = &self.creator else {
                    return MockValue::Null;
                };
                match field.column {
                    "id" => MockValue::Id(creator.id),
                    "username" => creator.username.as_str().into(),
                    "first_name" => creator.first_name.as_str().into(),
                    "last_name" => creator.last_name.as_str().into(),
                    _ => MockValue::Null,
                }
            }
            Some(_) => MockValue::Null,
            None => match field.column {
                "id" => MockValue::Id(self.id),
                "name" => self.name.as_str().into(),
                "desc" => self.desc.as_str().into(),
                "category" => self.category.as_str().into(),
                "region" => self.region.as_str().into(),
                "website" => self.website.as_deref().into(),
                "happened_at" => self
                    .happened_at
                    .map(MockValue::Time)
                    .unwrap_or(MockValue::Null),
                "created_at" => self.created_at.into(),
                "updated_at" => self.updated_at.into(),
                "is_deleted" => MockValue::Bool(self.is_deleted),
                _ => MockValue::Null,
            },
        }
    }

    fn location(&self) -> Option<GeoPoint<Wgs84>> {
        self.location
    }

    fn detach(&mut self, relation: &str) {
        if relation == CREATOR {
            self.creator = None;
        }
    }
}

impl MockRecord for User {
    fn id(&self) -> Uuid {
        self.id
    }

    fn value(&self, field: &FieldRef) -> MockValue {
        if field.relation.is_some() {
            return MockValue::Null;
        }
        match field.column {
            "id" => MockValue::Id(self.id),
            "username" => self.username.as_str().into(),
            "first_name" => self.first_name.as_str().into(),
            "last_name" => self.last_name.as_str().into(),
            "status" => self.status.as_str().into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            "is_deleted" => MockValue::Bool(self.is_deleted),
            _ => MockValue::Null,
        }
    }
}

/// Evaluate `predicate` against `record`.
pub fn matches<T: MockRecord>(record: &T, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::True => true,
        Predicate::Eq { field, value } => match (record.value(field), value) {
            (MockValue::Bool(a), FilterValue::Bool(b)) => a == *b,
            (MockValue::Text(a), FilterValue::Text(b)) => a == *b,
            _ => false,
        },
        Predicate::Text {
            fields,
            op: TextMatch::ContainsIgnoreCase,
            value,
        } => {
            let needle = value.to_lowercase();
            fields.iter().any(|f| match record.value(f) {
                MockValue::Text(s) => s.to_lowercase().contains(&needle),
                _ => false,
            })
        }
        Predicate::Within { ring, .. } => record
            .location()
            .map(|p| ring.contains(&p))
            .unwrap_or(false),
        Predicate::And(parts) => parts.iter().all(|p| matches(record, p)),
    }
}

fn compare<T: MockRecord>(a: &T, b: &T, order: &[OrderBy]) -> Ordering {
    for key in order {
        let ord = a.value(&key.field).cmp_asc(&b.value(&key.field));
        let ord = match key.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Failure injected into every subsequent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Timeout { timeout_ms: u64 },
    Store,
}

/// One recorded store call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub operation: &'static str,
    pub entity: &'static str,
    pub window: Option<Window>,
}

#[derive(Debug, Clone, Default)]
struct MockConfig {
    failure: Option<MockFailure>,
    reported_total: Option<i64>,
    unstable_scan: bool,
}

/// In-memory [`EntityStore`].
#[derive(Clone)]
pub struct MockEntityStore<T> {
    records: Arc<Vec<T>>,
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    scans: Arc<AtomicUsize>,
}

impl<T: MockRecord> MockEntityStore<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records: Arc::new(records),
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
            scans: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every call with `failure`.
    pub fn with_failure(mut self, failure: MockFailure) -> Self {
        Arc::make_mut(&mut self.config).failure = Some(failure);
        self
    }

    /// Report `total` instead of the true count.
    pub fn with_reported_total(mut self, total: i64) -> Self {
        Arc::make_mut(&mut self.config).reported_total = Some(total);
        self
    }

    /// Rotate the scan order on every call, the way a heap table gives no
    /// order guarantee for rows with equal sort keys.
    pub fn with_unstable_scan(mut self) -> Self {
        Arc::make_mut(&mut self.config).unstable_scan = true;
        self
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear_calls(&self) {
        self.call_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear()
    }

    fn log_call(&self, operation: &'static str, entity: &'static str, window: Option<Window>) {
        self.call_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MockCall {
                operation,
                entity,
                window,
            });
    }

    fn check_failure(&self, operation: &str) -> Result<()> {
        match self.config.failure {
            Some(MockFailure::Timeout { timeout_ms }) => Err(Error::StoreTimeout {
                operation: operation.to_string(),
                timeout_ms,
            }),
            Some(MockFailure::Store) => Err(Error::Store(format!(
                "mock failure injected into {}",
                operation
            ))),
            None => Ok(()),
        }
    }

    /// Matching rows in `order`, before windowing.
    fn select(&self, predicate: &Predicate, order: &[OrderBy]) -> Vec<T> {
        let mut rows: Vec<T> = self
            .records
            .iter()
            .filter(|r| matches(*r, predicate))
            .cloned()
            .collect();
        if self.config.unstable_scan && !rows.is_empty() {
            let n = self.scans.fetch_add(1, AtomicOrdering::Relaxed);
            let len = rows.len();
            rows.rotate_left(n % len);
        }
        rows.sort_by(|a, b| compare(a, b, order));
        rows
    }

    fn trim(rows: Vec<T>, window: Option<Window>, relations: &[&'static str]) -> Vec<T> {
        let mut rows = match window {
            Some(w) => {
                let range = w.range(rows.len());
                rows.into_iter()
                    .skip(range.start)
                    .take(range.end - range.start)
                    .collect()
            }
            None => rows,
        };
        for relation in T::RELATIONS {
            if !relations.contains(relation) {
                for row in &mut rows {
                    row.detach(relation);
                }
            }
        }
        rows
    }
}

#[async_trait]
impl<T: MockRecord> EntityStore for MockEntityStore<T> {
    type Entity = T;

    async fn find_and_count(&self, query: &BoundQuery) -> Result<(Vec<T>, i64)> {
        self.log_call("find_and_count", query.entity, Some(query.window));
        self.check_failure("find_and_count")?;

        let rows = self.select(&query.predicate, &query.order);
        let total = self.config.reported_total.unwrap_or(rows.len() as i64);
        let items = Self::trim(rows, Some(query.window), &query.relations);
        Ok((items, total))
    }

    async fn find_within(&self, query: &SpatialQuery) -> Result<Vec<T>> {
        self.log_call("find_within", query.entity, query.window);
        self.check_failure("find_within")?;

        let rows = self.select(&query.predicate, &query.order);
        Ok(Self::trim(rows, query.window, &query.relations))
    }
}
