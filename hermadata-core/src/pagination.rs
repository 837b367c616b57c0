//! Pagination contract shared by all list endpoints.
//!
//! Requests carry an index window plus optional sorting; responses carry the
//! window's items and the total row count before pagination.

use crate::SortOrder;
use serde::{Deserialize, Serialize};

/// Index window and sorting for a paginated request.
/// Serializes to the `from_index`/`to_index` query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub from_index: i64,
    pub to_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl PageRequest {
    /// First `page_size` rows, unsorted.
    pub fn first(page_size: i64) -> Self {
        Self {
            from_index: 0,
            to_index: page_size,
            sort_field: None,
            sort_order: None,
        }
    }

    /// Window covering rows `[from, to)`.
    pub fn window(from_index: i64, to_index: i64) -> Self {
        Self {
            from_index,
            to_index,
            sort_field: None,
            sort_order: None,
        }
    }

    /// Sort by the given field.
    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_field = Some(field.into());
        self.sort_order = Some(order);
        self
    }
}

/// Response window for a paginated list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Total count before pagination.
    pub total: i64,
    pub items: Vec<T>,
}

impl<T> Paginated<T> {
    /// An empty result set.
    pub fn empty() -> Self {
        Self {
            total: 0,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_query_serialization() {
        let page = PageRequest::window(20, 40).sorted_by("entry_date", SortOrder::Desc);
        let qs = to_json(&page);
        assert!(qs.contains("\"from_index\":20"));
        assert!(qs.contains("\"to_index\":40"));
        assert!(qs.contains("\"sort_field\":\"entry_date\""));
        assert!(qs.contains("\"sort_order\":\"desc\""));
    }

    #[test]
    fn test_page_request_omits_unset_sort() {
        let qs = to_json(&PageRequest::first(10));
        assert!(!qs.contains("sort_field"));
        assert!(!qs.contains("sort_order"));
    }

    #[test]
    fn test_paginated_deserializes_backend_shape() {
        let raw = r#"{"total": 3, "items": ["a", "b"]}"#;
        let page: Paginated<String> = serde_json::from_str(raw).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert!(!page.is_empty());
    }

    fn to_json(page: &PageRequest) -> String {
        serde_json::to_string(page).unwrap()
    }
}
