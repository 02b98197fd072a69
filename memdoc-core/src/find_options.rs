// memdoc-core/src/find_options.rs
// Options for collection reads and writes: projection, sort, limit, skip, upsert

use crate::error::Result;
use crate::projection::Projection;
use crate::sort::SortSpec;
use bson::{Bson, Document};

/// Options for find queries
///
/// Applied in the order filter, sort, skip, limit, projection.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Projection: field → 1 (include) or 0 (exclude), or a computed field
    pub projection: Option<Document>,

    /// Sort: field → 1 (asc) or -1 (desc), priority left to right
    pub sort: Option<Document>,

    /// Limit: maximum number of documents to return
    pub limit: Option<usize>,

    /// Skip: number of documents to skip (for pagination)
    pub skip: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Parsed sort, `None` when absent or empty
    pub(crate) fn sort_spec(&self) -> Result<Option<SortSpec>> {
        parse_sort(self.sort.as_ref())
    }

    /// Parsed projection, `None` when it would not change documents
    pub(crate) fn projection_spec(&self) -> Result<Option<Projection>> {
        parse_projection(self.projection.as_ref())
    }
}

pub(crate) fn parse_sort(sort: Option<&Document>) -> Result<Option<SortSpec>> {
    match sort {
        Some(sort) if !sort.is_empty() => Ok(Some(SortSpec::from_document(sort)?)),
        _ => Ok(None),
    }
}

pub(crate) fn parse_projection(projection: Option<&Document>) -> Result<Option<Projection>> {
    match projection {
        Some(spec) if !spec.is_empty() => {
            let projection = Projection::parse(spec)?;
            Ok(if projection.is_identity() { None } else { Some(projection) })
        }
        _ => Ok(None),
    }
}

/// Apply skip then limit
pub fn apply_limit_skip<T>(items: Vec<T>, limit: Option<usize>, skip: Option<usize>) -> Vec<T> {
    let skip_count = skip.unwrap_or(0);
    let take_count = limit.unwrap_or(usize::MAX);
    items.into_iter().skip(skip_count).take(take_count).collect()
}

/// Options for `update_one` / `update_many`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert a new document when nothing matches
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

/// Outcome of an update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    /// `_id` of the inserted document when an upsert inserted
    pub upserted_id: Option<Bson>,
}

/// Which version of the document `find_one_and_update` returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnDocument {
    #[default]
    Before,
    After,
}

/// Options for `find_one_and_update`
#[derive(Debug, Clone, Default)]
pub struct FindOneAndUpdateOptions {
    pub upsert: bool,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub return_document: ReturnDocument,
}

impl FindOneAndUpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn with_sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_return_document(mut self, return_document: ReturnDocument) -> Self {
        self.return_document = return_document;
        self
    }
}

/// Options for `delete_one`
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// Pick the first match in this order instead of insertion order
    pub sort: Option<Document>,
}

impl DeleteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_builders() {
        let options = FindOptions::new()
            .with_sort(doc! {"age": -1})
            .with_limit(5)
            .with_skip(2)
            .with_projection(doc! {"name": 1});
        assert_eq!(options.limit, Some(5));
        assert_eq!(options.skip, Some(2));
        assert!(options.sort_spec().unwrap().is_some());
        assert!(options.projection_spec().unwrap().is_some());
    }

    #[test]
    fn test_empty_specs_are_none() {
        let options = FindOptions::new().with_sort(doc! {}).with_projection(doc! {});
        assert!(options.sort_spec().unwrap().is_none());
        assert!(options.projection_spec().unwrap().is_none());
    }

    #[test]
    fn test_invalid_specs_rejected() {
        assert!(FindOptions::new().with_sort(doc! {"a": 3}).sort_spec().is_err());
        assert!(FindOptions::new()
            .with_projection(doc! {"a": 1, "b": 0})
            .projection_spec()
            .is_err());
    }

    #[test]
    fn test_limit_skip() {
        let items: Vec<i32> = (1..=5).collect();
        assert_eq!(apply_limit_skip(items.clone(), Some(2), Some(1)), vec![2, 3]);
        assert_eq!(apply_limit_skip(items.clone(), None, Some(10)), Vec::<i32>::new());
        assert_eq!(apply_limit_skip(items.clone(), Some(0), None), Vec::<i32>::new());
        assert_eq!(apply_limit_skip(items, None, None).len(), 5);
    }

    #[test]
    fn test_write_option_defaults() {
        assert!(!UpdateOptions::new().upsert);
        assert!(UpdateOptions::new().with_upsert(true).upsert);
        assert_eq!(FindOneAndUpdateOptions::new().return_document, ReturnDocument::Before);
        assert!(DeleteOptions::new().with_sort(doc! {"a": 1}).sort.is_some());
    }
}
