//! Pagination request/response types.
//!
//! A [`PaginationRequest`] is the caller's raw input. It is never handed to a
//! store directly; [`crate::QueryComposer`] validates it against an entity
//! schema first.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::defaults;
use crate::error::ValidationError;

// =============================================================================
// ORDERING
// =============================================================================

/// Sort direction. Parsed case-insensitively, rendered upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for SortDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            _ => Err(ValidationError::InvalidSortDirection(s.to_string())),
        }
    }
}

impl Serialize for SortDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_sql())
    }
}

impl<'de> Deserialize<'de> for SortDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One requested sort key, named by its public (API) field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Requested multi-key order. Key order is significant and survives
/// (de)serialization as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOrder(Vec<SortKey>);

impl SortOrder {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self(keys)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, field: impl Into<String>, direction: SortDirection) {
        self.0.push(SortKey::new(field, direction));
    }
}

impl Serialize for SortOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for key in &self.0 {
            map.serialize_entry(&key.field, &key.direction)?;
        }
        map.end()
    }
}

struct SortOrderVisitor;

impl<'de> Visitor<'de> for SortOrderVisitor {
    type Value = SortOrder;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of field name to ASC or DESC")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<SortOrder, M::Error> {
        let mut keys = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((field, direction)) = access.next_entry::<String, SortDirection>()? {
            keys.push(SortKey { field, direction });
        }
        Ok(SortOrder(keys))
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<SortOrder, E> {
        Ok(SortOrder::default())
    }
}

impl<'de> Deserialize<'de> for SortOrder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SortOrderVisitor)
    }
}

// =============================================================================
// FILTER PARAMS
// =============================================================================

/// A `params` value: string or boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Text(String),
}

impl ParamValue {
    /// Boolean reading, accepting the strings `"true"` / `"false"`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            ParamValue::Bool(_) => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

fn default_skip() -> i64 {
    defaults::PAGE_SKIP
}

fn default_limit() -> i64 {
    defaults::PAGE_LIMIT
}

/// Caller-supplied listing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationRequest {
    #[serde(default = "default_skip")]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self {
            skip: defaults::PAGE_SKIP,
            limit: defaults::PAGE_LIMIT,
            order: SortOrder::default(),
            params: BTreeMap::new(),
        }
    }
}

impl PaginationRequest {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push(field, direction);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// The same request advanced by one page.
    pub fn next_page(&self) -> Self {
        Self {
            skip: self.skip + self.limit,
            ..self.clone()
        }
    }
}

/// A validated skip/limit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub skip: i64,
    pub limit: i64,
}

impl Window {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }

    /// Slice bounds for an in-memory collection of `len` rows.
    pub fn range(&self, len: usize) -> std::ops::Range<usize> {
        let start = usize::try_from(self.skip).unwrap_or(usize::MAX).min(len);
        let end = start
            .saturating_add(usize::try_from(self.limit).unwrap_or(0))
            .min(len);
        start..end
    }
}

/// One page of results plus the total matching the filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

impl<T> PaginationResponse<T> {
    pub fn new(items: Vec<T>, total: i64, window: Window) -> Self {
        Self {
            items,
            total,
            skip: window.skip,
            limit: window.limit,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PaginationResponse<U> {
        PaginationResponse {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            skip: self.skip,
            limit: self.limit,
        }
    }

    /// Whether rows remain beyond this page.
    pub fn has_more(&self) -> bool {
        self.skip + (self.items.len() as i64) < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse_is_case_insensitive() {
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert_eq!("Desc".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert_eq!(
            "sideways".parse::<SortDirection>().unwrap_err(),
            ValidationError::InvalidSortDirection("sideways".to_string())
        );
    }

    #[test]
    fn test_order_preserves_key_order() {
        let req: PaginationRequest = serde_json::from_str(
            r#"{"skip":0,"limit":5,"order":{"region":"desc","name":"ASC","createdAt":"DESC"}}"#,
        )
        .unwrap();
        let fields: Vec<_> = req.order.keys().iter().map(|k| k.field.as_str()).collect();
        assert_eq!(fields, vec!["region", "name", "createdAt"]);
        assert_eq!(req.order.keys()[0].direction, SortDirection::Desc);

        let json = serde_json::to_string(&req.order).unwrap();
        assert_eq!(json, r#"{"region":"DESC","name":"ASC","createdAt":"DESC"}"#);
    }

    #[test]
    fn test_bad_direction_fails_deserialization() {
        let err = serde_json::from_str::<PaginationRequest>(r#"{"order":{"name":"UP"}}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_request_defaults() {
        let req: PaginationRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.skip, defaults::PAGE_SKIP);
        assert_eq!(req.limit, defaults::PAGE_LIMIT);
        assert!(req.order.is_empty());
        assert!(req.params.is_empty());
        assert_eq!(req, PaginationRequest::default());
    }

    #[test]
    fn test_null_order_is_empty() {
        let req: PaginationRequest = serde_json::from_str(r#"{"order":null}"#).unwrap();
        assert!(req.order.is_empty());
    }

    #[test]
    fn test_params_accept_strings_and_bools() {
        let req: PaginationRequest =
            serde_json::from_str(r#"{"params":{"name":"bridge","isDelete":true}}"#).unwrap();
        assert_eq!(req.params["name"], ParamValue::Text("bridge".to_string()));
        assert_eq!(req.params["isDelete"].as_bool(), Some(true));
    }

    #[test]
    fn test_param_string_booleans() {
        assert_eq!(ParamValue::from("TRUE").as_bool(), Some(true));
        assert_eq!(ParamValue::from("false").as_bool(), Some(false));
        assert_eq!(ParamValue::from("yes").as_bool(), None);
        assert_eq!(ParamValue::from(true).as_text(), None);
    }

    #[test]
    fn test_window_range_clamps_to_len() {
        assert_eq!(Window::new(0, 10).range(3), 0..3);
        assert_eq!(Window::new(2, 2).range(10), 2..4);
        assert_eq!(Window::new(20, 5).range(10), 10..10);
    }

    #[test]
    fn test_response_map_and_has_more() {
        let page = PaginationResponse::new(vec![1, 2], 5, Window::new(0, 2));
        assert!(page.has_more());
        let page = page.map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.total, 5);

        let last = PaginationResponse::new(vec![5], 5, Window::new(4, 2));
        assert!(!last.has_more());
    }

    #[test]
    fn test_next_page() {
        let req = PaginationRequest::new(0, 10).with_param("name", "x");
        let next = req.next_page();
        assert_eq!(next.skip, 10);
        assert_eq!(next.params, req.params);
    }
}
