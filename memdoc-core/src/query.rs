// src/query.rs
//! Boolean query matching
//!
//! Filters use the usual document-query mini-language: implicit equality,
//! comparison and array operators, logical combinators and regexes. The
//! per-operator logic lives in [`operators`]; [`Query`] validates a filter
//! up front and then matches documents against it.

pub mod operators;

use crate::error::{MemDocError, Result};
use bson::{Bson, Document};

pub use operators::matches_filter;

/// Decides whether a document is selected by an operation
pub trait Matcher {
    fn matches(&self, document: &Document) -> Result<bool>;
}

/// Plain predicates work as matchers, which keeps tests free of filters
impl<F> Matcher for F
where
    F: Fn(&Document) -> bool,
{
    fn matches(&self, document: &Document) -> Result<bool> {
        Ok(self(document))
    }
}

/// A validated query filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Document,
}

impl Query {
    /// Validate `filter` and wrap it. Unknown operators and malformed
    /// operator arguments are reported here rather than on first match.
    pub fn new(filter: Document) -> Result<Self> {
        validate_filter(&filter)?;
        Ok(Query { filter })
    }

    /// The empty query, matching every document
    pub fn all() -> Self {
        Query::default()
    }

    pub fn filter(&self) -> &Document {
        &self.filter
    }

    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
    }

    /// Top-level equality fields, used to seed upserted documents.
    pub fn equality_fields(&self) -> Document {
        let mut seed = Document::new();
        for (key, value) in &self.filter {
            if key.starts_with('$') {
                continue;
            }
            let is_condition = match value {
                Bson::Document(condition) => operators::is_operator_document(condition),
                Bson::RegularExpression(_) => true,
                _ => false,
            };
            if !is_condition {
                seed.insert(key.clone(), value.clone());
            }
        }
        seed
    }
}

impl Matcher for Query {
    fn matches(&self, document: &Document) -> Result<bool> {
        if self.filter.is_empty() {
            return Ok(true);
        }
        matches_filter(document, &self.filter)
    }
}

fn validate_filter(filter: &Document) -> Result<()> {
    for (key, value) in filter {
        if key.starts_with('$') {
            match key.as_str() {
                "$and" | "$or" | "$nor" => {
                    let items = value.as_array().ok_or_else(|| {
                        MemDocError::InvalidQuery(format!("{} operator requires an array", key))
                    })?;
                    for item in items {
                        let sub = item.as_document().ok_or_else(|| {
                            MemDocError::InvalidQuery(format!("{} entries must be objects", key))
                        })?;
                        validate_filter(sub)?;
                    }
                }
                "$expr" => {
                    crate::expression::Expression::parse(value)?;
                }
                other => {
                    return Err(MemDocError::InvalidQuery(format!(
                        "Unknown top-level operator: {}",
                        other
                    )))
                }
            }
        } else if let Bson::Document(condition) = value {
            if operators::is_operator_document(condition) {
                validate_condition(condition)?;
            }
        } else if let Bson::RegularExpression(_) = value {
            operators::validate_regex(value, "")?;
        }
    }
    Ok(())
}

fn validate_condition(condition: &Document) -> Result<()> {
    for (op_name, op_value) in condition {
        if !op_name.starts_with('$') {
            return Err(MemDocError::InvalidQuery(format!(
                "Unexpected field '{}' in operator object",
                op_name
            )));
        }
        if op_name == "$options" {
            continue;
        }
        if !operators::OPERATOR_REGISTRY.contains_key(op_name.as_str()) {
            return Err(MemDocError::InvalidQuery(format!("Unknown operator: {}", op_name)));
        }
        match (op_name.as_str(), op_value) {
            ("$in" | "$nin" | "$all", v) if v.as_array().is_none() => {
                return Err(MemDocError::InvalidQuery(format!(
                    "{} operator requires an array",
                    op_name
                )))
            }
            ("$regex", pattern) => {
                operators::validate_regex(pattern, condition.get_str("$options").unwrap_or(""))?
            }
            ("$not", Bson::Document(inner)) => validate_condition(inner)?,
            ("$elemMatch", Bson::Document(inner)) if !operators::is_operator_document(inner) => {
                validate_filter(inner)?
            }
            ("$elemMatch", Bson::Document(inner)) => validate_condition(inner)?,
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_query_matches() {
        let query = Query::new(doc! {"age": {"$gte": 18}, "status": "active"}).unwrap();
        assert!(query.matches(&doc! {"age": 20, "status": "active"}).unwrap());
        assert!(!query.matches(&doc! {"age": 12, "status": "active"}).unwrap());
    }

    #[test]
    fn test_empty_query_matches_all() {
        assert!(Query::all().matches(&doc! {"x": 1}).unwrap());
        assert!(Query::all().is_empty());
    }

    #[test]
    fn test_validation_rejects_unknown_operators() {
        let err = Query::new(doc! {"age": {"$between": [1, 2]}}).unwrap_err();
        assert!(err.to_string().contains("Unknown operator: $between"));

        let err = Query::new(doc! {"$or": [{"a": {"$bogus": 1}}]}).unwrap_err();
        assert!(err.to_string().contains("$bogus"));

        assert!(Query::new(doc! {"$text": {"$search": "x"}}).is_err());
        assert!(Query::new(doc! {"a": {"$in": 5}}).is_err());
    }

    #[test]
    fn test_validation_compiles_regex() {
        let err = Query::new(doc! {"name": {"$regex": "("}}).unwrap_err();
        assert!(matches!(err, MemDocError::InvalidQuery(_)));

        let implicit = bson::Regex { pattern: "[a-".to_string(), options: String::new() };
        assert!(Query::new(doc! {"name": implicit}).is_err());

        assert!(Query::new(doc! {"name": {"$regex": "^al", "$options": "i"}}).is_ok());
        assert!(Query::new(doc! {"name": {"$regex": 5}}).is_err());
    }

    #[test]
    fn test_equality_fields_seed() {
        let query = Query::new(doc! {
            "name": "Alice",
            "age": {"$gt": 5},
            "address": {"city": "Pécs"},
            "$or": [{"x": 1}],
        })
        .unwrap();
        assert_eq!(
            query.equality_fields(),
            doc! {"name": "Alice", "address": {"city": "Pécs"}}
        );
    }

    #[test]
    fn test_closure_matcher() {
        let only_even = |doc: &Document| doc.get_i32("n").map(|n| n % 2 == 0).unwrap_or(false);
        assert!(only_even.matches(&doc! {"n": 4}).unwrap());
        assert!(!only_even.matches(&doc! {"n": 3}).unwrap());
    }
}
