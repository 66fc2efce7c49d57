//! Query filters for document listings.
//!
//! Filters are conjunctive; ordering is most-recent-first unless explicitly
//! overridden. The filter is a plain value so subscriptions can re-run the
//! same query on every remote change.

use bson::{doc, Bson, Document};

/// Filter, ordering, and limit for a `list`/`subscribe` query.
#[derive(Debug, Clone)]
pub struct ListFilter {
    equals: Vec<(String, Bson)>,
    contains_any: Option<(String, Vec<String>)>,
    order_field: String,
    descending: bool,
    limit: Option<i64>,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            equals: Vec::new(),
            contains_any: None,
            order_field: "createdAt".to_string(),
            descending: true,
            limit: None,
        }
    }
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality clause. Clauses combine conjunctively.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.equals.push((field.into(), value.into()));
        self
    }

    /// Match documents whose array field contains any of `values`.
    pub fn contains_any(mut self, field: impl Into<String>, values: Vec<String>) -> Self {
        self.contains_any = Some((field.into(), values));
        self
    }

    /// Override the default `createdAt desc` ordering.
    pub fn order_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.order_field = field.into();
        self.descending = descending;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    /// Build the match document for the store driver.
    pub fn to_document(&self) -> Document {
        let mut filter = Document::new();
        for (field, value) in &self.equals {
            filter.insert(field.clone(), value.clone());
        }
        if let Some((field, values)) = &self.contains_any {
            filter.insert(field.clone(), doc! { "$in": values.clone() });
        }
        filter
    }

    /// Build the sort document for the store driver.
    pub fn sort_document(&self) -> Document {
        let direction: i32 = if self.descending { -1 } else { 1 };
        let mut sort = Document::new();
        sort.insert(self.order_field.clone(), direction);
        sort
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_orders_most_recent_first() {
        let filter = ListFilter::new();
        assert_eq!(filter.to_document(), Document::new());
        assert_eq!(filter.sort_document(), doc! { "createdAt": -1 });
        assert_eq!(filter.limit_value(), None);
    }

    #[test]
    fn test_clauses_are_conjunctive() {
        let filter = ListFilter::new()
            .eq("authorId", "user-1")
            .eq("status", "pending");
        assert_eq!(
            filter.to_document(),
            doc! { "authorId": "user-1", "status": "pending" }
        );
    }

    #[test]
    fn test_contains_any_builds_in_clause() {
        let filter = ListFilter::new()
            .contains_any("tags", vec!["parking".into(), "safety".into()]);
        assert_eq!(
            filter.to_document(),
            doc! { "tags": { "$in": ["parking", "safety"] } }
        );
    }

    #[test]
    fn test_order_override_and_limit() {
        let filter = ListFilter::new().order_by("updatedAt", false).limit(20);
        assert_eq!(filter.sort_document(), doc! { "updatedAt": 1 });
        assert_eq!(filter.limit_value(), Some(20));
    }
}
