//! Multi-key document ordering
//!
//! A sort specification lists `(path, direction)` pairs. Documents are
//! compared key by key; the first non-equal key decides. Sorting is stable,
//! so documents equal on every key keep their relative input order.

use crate::error::{MemDocError, Result};
use crate::path::get_path;
use crate::value_utils::{as_integer, compare_directed};
use bson::{Bson, Document};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<(String, SortDirection)>,
}

impl SortSpec {
    pub fn new(keys: Vec<(String, SortDirection)>) -> Result<Self> {
        if keys.is_empty() {
            return Err(MemDocError::InvalidArgument(
                "sort specification must name at least one field".to_string(),
            ));
        }
        Ok(SortSpec { keys })
    }

    /// Parse `{field: 1 | -1, ...}`
    pub fn from_document(spec: &Document) -> Result<Self> {
        let mut keys = Vec::with_capacity(spec.len());
        for (field, direction) in spec {
            let direction = match as_integer(direction) {
                Some(1) => SortDirection::Ascending,
                Some(-1) => SortDirection::Descending,
                _ => {
                    return Err(MemDocError::InvalidArgument(format!(
                        "sort direction for '{}' must be 1 or -1, got {}",
                        field, direction
                    )))
                }
            };
            keys.push((field.clone(), direction));
        }
        SortSpec::new(keys)
    }

    /// Parse from a value that must be a sort document.
    pub fn from_bson(spec: &Bson) -> Result<Self> {
        match spec {
            Bson::Document(doc) => SortSpec::from_document(doc),
            other => Err(MemDocError::InvalidArgument(format!(
                "sort specification must be an object, got {:?}",
                other.element_type()
            ))),
        }
    }

    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.keys
    }

    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (path, direction) in &self.keys {
            let descending = *direction == SortDirection::Descending;
            match compare_directed(get_path(a, path), get_path(b, path), descending) {
                0 => continue,
                n if n < 0 => return Ordering::Less,
                _ => return Ordering::Greater,
            }
        }
        Ordering::Equal
    }

    /// Stable in-place sort
    pub fn sort_documents(&self, docs: &mut [Document]) {
        docs.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn names(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.get_str("name").unwrap_or("?")).collect()
    }

    #[test]
    fn test_parse_spec() {
        let spec = SortSpec::from_document(&doc! {"age": -1, "name": 1.0}).unwrap();
        assert_eq!(
            spec.keys(),
            &[
                ("age".to_string(), SortDirection::Descending),
                ("name".to_string(), SortDirection::Ascending)
            ]
        );
        assert!(SortSpec::from_document(&doc! {"age": 2}).is_err());
        assert!(SortSpec::from_document(&doc! {}).is_err());
        assert!(SortSpec::from_bson(&Bson::Int32(1)).is_err());
    }

    #[test]
    fn test_sort_empty() {
        let spec = SortSpec::from_document(&doc! {"a": 1}).unwrap();
        let mut docs: Vec<Document> = vec![];
        spec.sort_documents(&mut docs);
        assert!(docs.is_empty());
    }

    #[test]
    fn test_multi_key_priority() {
        let spec = SortSpec::from_document(&doc! {"age": -1, "name": 1}).unwrap();
        let mut docs = vec![
            doc! {"name": "b", "age": 30},
            doc! {"name": "c", "age": 40},
            doc! {"name": "a", "age": 30},
        ];
        spec.sort_documents(&mut docs);
        assert_eq!(names(&docs), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_stable_for_ties() {
        let spec = SortSpec::from_document(&doc! {"group": 1}).unwrap();
        let mut docs = vec![
            doc! {"name": "first", "group": 2},
            doc! {"name": "second", "group": 1},
            doc! {"name": "third", "group": 2},
            doc! {"name": "fourth", "group": 1},
        ];
        spec.sort_documents(&mut docs);
        assert_eq!(names(&docs), vec!["second", "fourth", "first", "third"]);
    }

    #[test]
    fn test_descending_keeps_type_rank() {
        let spec = SortSpec::from_document(&doc! {"v": -1}).unwrap();
        let mut docs = vec![
            doc! {"name": "text", "v": "z"},
            doc! {"name": "small", "v": 1},
            doc! {"name": "big", "v": 9},
        ];
        spec.sort_documents(&mut docs);
        // numbers rank before strings in either direction
        assert_eq!(names(&docs), vec!["big", "small", "text"]);
    }

    #[test]
    fn test_missing_fields_rank_as_undefined() {
        let spec = SortSpec::from_document(&doc! {"v": 1}).unwrap();
        let mut docs = vec![
            doc! {"name": "null", "v": null},
            doc! {"name": "missing"},
            doc! {"name": "number", "v": 3},
        ];
        spec.sort_documents(&mut docs);
        assert_eq!(names(&docs), vec!["number", "missing", "null"]);
    }

    #[test]
    fn test_reverse_then_forward_restores_order() {
        let original = vec![doc! {"name": "a", "v": 1}, doc! {"name": "b", "v": 2}, doc! {"name": "c", "v": 3}];
        let mut docs = original.clone();
        SortSpec::from_document(&doc! {"v": -1}).unwrap().sort_documents(&mut docs);
        assert_eq!(names(&docs), vec!["c", "b", "a"]);
        SortSpec::from_document(&doc! {"v": 1}).unwrap().sort_documents(&mut docs);
        assert_eq!(docs, original);
    }
}
