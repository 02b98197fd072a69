// memdoc-core/src/collection/mod.rs
// In-memory collection: document store plus the read/write API over it
//
// ├── CRUD operations: insert_one, insert_many, update_one, update_many,
// │   find_one_and_update, delete_one, delete_many
// ├── Query operations: find, find_cursor, find_one, count_documents, distinct
// ├── Aggregation
// └── Index stubs: create_index, list_indexes, drop_index
//
// Write methods take `&mut self`; the borrow checker is what serializes
// writers. Documents are handed out as shared handles, so an update is
// visible through every handle returned earlier.

mod cursor;
mod indexes;

pub use cursor::FindCursor;
pub use indexes::{IndexDefinition, ID_INDEX_NAME};

use std::sync::Arc;

use ahash::AHashSet;
use bson::{Bson, Document};

use crate::aggregation::Pipeline;
use crate::document::{ensure_id, id_generator_for, share, IdGenerator, SharedDocument, ID_FIELD};
use crate::error::{MemDocError, Result};
use crate::find_options::{
    apply_limit_skip, parse_projection, parse_sort, DeleteOptions, FindOneAndUpdateOptions,
    FindOptions, ReturnDocument, UpdateOptions, UpdateResult,
};
use crate::options::EngineOptions;
use crate::path::{get_path, set_path};
use crate::projection::Projection;
use crate::query::{Matcher, Query};
use crate::sort::SortSpec;
use crate::update::UpdateSpec;
use crate::value_utils::{canonical_key, values_equal};
use crate::{log_debug, log_trace};

use self::indexes::IndexCatalog;

/// Result of insert_many operation
#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<Bson>,
    pub inserted_count: usize,
}

/// A named, ordered set of documents
pub struct Collection {
    name: String,
    documents: Vec<SharedDocument>,
    /// Canonical keys of every stored `_id`
    ids: AHashSet<String>,
    indexes: IndexCatalog,
    options: Arc<EngineOptions>,
    id_generator: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("documents", &self.documents.len())
            .field("indexes", &self.indexes.names())
            .finish()
    }
}

impl Collection {
    // ========== CONSTRUCTOR ==========

    /// Standalone collection with default options
    pub fn new(name: impl Into<String>) -> Self {
        let options = Arc::new(EngineOptions::default());
        let id_generator = id_generator_for(options.id_generation);
        Collection::with_options(name, options, id_generator)
    }

    pub fn with_options(
        name: impl Into<String>,
        options: Arc<EngineOptions>,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        Collection {
            name: name.into(),
            documents: Vec::new(),
            ids: AHashSet::new(),
            indexes: IndexCatalog::default(),
            options,
            id_generator,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Every stored document, in insertion order
    pub fn documents(&self) -> &[SharedDocument] {
        &self.documents
    }

    // ========== CRUD OPERATIONS ==========

    /// Insert one document - returns its `_id`
    pub fn insert_one(&mut self, mut doc: Document) -> Result<Bson> {
        let id = ensure_id(&mut doc, self.id_generator.as_ref());
        let key = canonical_key(&id);
        if self.ids.contains(&key) {
            return Err(MemDocError::DuplicateKey(format!(
                "duplicate _id {} in collection '{}'",
                id, self.name
            )));
        }
        self.ids.insert(key);
        self.documents.push(share(doc));
        log_trace!("inserted {} into '{}'", id, self.name);
        Ok(id)
    }

    /// Insert many documents; nothing is inserted if any `_id` collides.
    pub fn insert_many(&mut self, documents: Vec<Document>) -> Result<InsertManyResult> {
        let mut prepared = Vec::with_capacity(documents.len());
        let mut batch_keys = AHashSet::with_capacity(documents.len());
        for mut doc in documents {
            let id = ensure_id(&mut doc, self.id_generator.as_ref());
            let key = canonical_key(&id);
            if self.ids.contains(&key) || !batch_keys.insert(key.clone()) {
                return Err(MemDocError::DuplicateKey(format!(
                    "duplicate _id {} in collection '{}'",
                    id, self.name
                )));
            }
            prepared.push((id, key, doc));
        }

        let mut inserted_ids = Vec::with_capacity(prepared.len());
        for (id, key, doc) in prepared {
            self.ids.insert(key);
            self.documents.push(share(doc));
            inserted_ids.push(id);
        }
        Ok(InsertManyResult {
            inserted_count: inserted_ids.len(),
            inserted_ids,
        })
    }

    /// Update the first matching document
    pub fn update_one(
        &mut self,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
    ) -> Result<UpdateResult> {
        self.update_matching(filter, update, options, false)
    }

    /// Update every matching document
    pub fn update_many(
        &mut self,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
    ) -> Result<UpdateResult> {
        self.update_matching(filter, update, options, true)
    }

    /// Update the first match (in `sort` order when given) and return it.
    ///
    /// `ReturnDocument::Before` yields a copy of the pre-update state;
    /// `After` yields the live handle unless a projection applies.
    pub fn find_one_and_update(
        &mut self,
        filter: &Document,
        update: &Document,
        options: FindOneAndUpdateOptions,
    ) -> Result<Option<SharedDocument>> {
        let query = Query::new(filter.clone())?;
        let spec = UpdateSpec::parse(update, self.options.validate_updates)?;
        let sort = parse_sort(options.sort.as_ref())?;
        let projection = parse_projection(options.projection.as_ref())?;

        let target = self.matching(&query, sort.as_ref())?.into_iter().next();
        match target {
            Some(handle) => {
                let before = handle.read().clone();
                apply_to_stored(&handle, &spec)?;
                match options.return_document {
                    ReturnDocument::Before => Ok(Some(share(maybe_project(before, &projection)?))),
                    ReturnDocument::After => live_or_projected(handle, &projection).map(Some),
                }
            }
            None if options.upsert => {
                let id = self.upsert(&query, &spec)?;
                match options.return_document {
                    ReturnDocument::Before => Ok(None),
                    ReturnDocument::After => match self.handle_by_id(&id) {
                        Some(handle) => live_or_projected(handle, &projection).map(Some),
                        None => Ok(None),
                    },
                }
            }
            None => Ok(None),
        }
    }

    /// Delete the first matching document (in `sort` order when given)
    pub fn delete_one(&mut self, filter: &Document, options: DeleteOptions) -> Result<u64> {
        let query = Query::new(filter.clone())?;
        let sort = parse_sort(options.sort.as_ref())?;
        let target = match self.matching(&query, sort.as_ref())?.into_iter().next() {
            Some(target) => target,
            None => return Ok(0),
        };
        if let Some(position) = self.documents.iter().position(|d| Arc::ptr_eq(d, &target)) {
            let removed = self.documents.remove(position);
            self.forget_id(&removed);
            return Ok(1);
        }
        Ok(0)
    }

    /// Delete every matching document
    pub fn delete_many(&mut self, filter: &Document) -> Result<u64> {
        let query = Query::new(filter.clone())?;
        // decide every match before removing anything
        let mut doomed = Vec::with_capacity(self.documents.len());
        for handle in &self.documents {
            doomed.push(query.matches(&handle.read())?);
        }

        let mut removed = Vec::new();
        let mut flags = doomed.into_iter();
        self.documents.retain(|handle| {
            let delete = flags.next().unwrap_or(false);
            if delete {
                removed.push(Arc::clone(handle));
            }
            !delete
        });
        for handle in &removed {
            self.forget_id(handle);
        }
        log_debug!("deleted {} documents from '{}'", removed.len(), self.name);
        Ok(removed.len() as u64)
    }

    // ========== QUERY OPERATIONS ==========

    /// Find documents matching `filter`
    pub fn find(&self, filter: &Document, options: FindOptions) -> Result<Vec<SharedDocument>> {
        let query = Query::new(filter.clone())?;
        let sort = options.sort_spec()?;
        let projection = options.projection_spec()?;

        let matched = self.matching(&query, sort.as_ref())?;
        let window = apply_limit_skip(matched, options.limit, options.skip);
        window
            .into_iter()
            .map(|handle| live_or_projected(handle, &projection))
            .collect()
    }

    /// Cursor over the documents `find` would return
    pub fn find_cursor(&self, filter: &Document, options: FindOptions) -> Result<FindCursor> {
        Ok(FindCursor::new(self.find(filter, options)?))
    }

    pub fn find_one(&self, filter: &Document, options: FindOptions) -> Result<Option<SharedDocument>> {
        Ok(self.find(filter, options.with_limit(1))?.into_iter().next())
    }

    pub fn count_documents(&self, filter: &Document) -> Result<u64> {
        let query = Query::new(filter.clone())?;
        let mut count = 0;
        for handle in &self.documents {
            if query.matches(&handle.read())? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Distinct values of `field` among matching documents; array values
    /// contribute their elements.
    pub fn distinct(&self, field: &str, filter: &Document) -> Result<Vec<Bson>> {
        let query = Query::new(filter.clone())?;
        let mut seen = AHashSet::new();
        let mut values = Vec::new();
        for handle in &self.documents {
            let doc = handle.read();
            if !query.matches(&doc)? {
                continue;
            }
            let candidates = match get_path(&doc, field) {
                Some(Bson::Array(items)) => items.clone(),
                Some(value) => vec![value.clone()],
                None => continue,
            };
            for value in candidates {
                if seen.insert(canonical_key(&value)) {
                    values.push(value);
                }
            }
        }
        Ok(values)
    }

    // ========== AGGREGATION ==========

    /// Run a pipeline over a snapshot of the collection
    pub fn aggregate(&self, pipeline: &Bson) -> Result<Vec<Document>> {
        let pipeline = Pipeline::parse(pipeline, &self.options)?;
        let snapshot: Vec<Document> = self.documents.iter().map(|d| d.read().clone()).collect();
        pipeline.execute(snapshot)
    }

    // ========== INDEX OPERATIONS ==========

    /// Record an index and return its conventional name (`a_1_b_-1`).
    /// Indexes are never consulted by queries.
    pub fn create_index(&mut self, keys: &Document) -> Result<String> {
        let name = self.indexes.create(keys)?;
        log_debug!("create_index '{}' on '{}' (not used for lookups)", name, self.name);
        Ok(name)
    }

    pub fn list_indexes(&self) -> Vec<String> {
        self.indexes.names()
    }

    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        self.indexes.drop(name)
    }

    // ========== PRIVATE HELPER METHODS ==========

    /// Handles matching `query`, in `sort` order or insertion order
    fn matching(&self, query: &Query, sort: Option<&SortSpec>) -> Result<Vec<SharedDocument>> {
        let mut matched = Vec::new();
        for handle in &self.documents {
            if query.matches(&handle.read())? {
                matched.push(Arc::clone(handle));
            }
        }
        if let Some(sort) = sort {
            matched.sort_by(|a, b| sort.compare(&a.read(), &b.read()));
        }
        Ok(matched)
    }

    fn update_matching(
        &mut self,
        filter: &Document,
        update: &Document,
        options: UpdateOptions,
        multi: bool,
    ) -> Result<UpdateResult> {
        let query = Query::new(filter.clone())?;
        let spec = UpdateSpec::parse(update, self.options.validate_updates)?;

        let mut targets = self.matching(&query, None)?;
        if !multi {
            targets.truncate(1);
        }

        let mut result = UpdateResult {
            matched_count: targets.len() as u64,
            ..UpdateResult::default()
        };
        // nothing is stored until every target has updated cleanly
        let mut staged = Vec::with_capacity(targets.len());
        for handle in &targets {
            if let Some(updated) = updated_copy(handle, &spec)? {
                staged.push((handle, updated));
            }
        }
        result.modified_count = staged.len() as u64;
        for (handle, updated) in staged {
            *handle.write() = updated;
        }

        if targets.is_empty() && options.upsert {
            result.upserted_id = Some(self.upsert(&query, &spec)?);
        }
        log_trace!(
            "update on '{}': matched {}, modified {}",
            self.name,
            result.matched_count,
            result.modified_count
        );
        Ok(result)
    }

    /// Insert the document an upsert builds: filter equality fields, then
    /// `$setOnInsert`, then the rest of the update.
    fn upsert(&mut self, query: &Query, spec: &UpdateSpec) -> Result<Bson> {
        let mut seed = Document::new();
        for (path, value) in query.equality_fields() {
            set_path(&mut seed, &path, value)?;
        }
        spec.apply(&mut seed, true)?;
        self.insert_one(seed)
    }

    fn handle_by_id(&self, id: &Bson) -> Option<SharedDocument> {
        self.documents
            .iter()
            .find(|d| d.read().get(ID_FIELD).map(|v| values_equal(v, id)).unwrap_or(false))
            .cloned()
    }

    fn forget_id(&mut self, handle: &SharedDocument) {
        if let Some(id) = handle.read().get(ID_FIELD) {
            self.ids.remove(&canonical_key(id));
        }
    }
}

/// Apply `spec` to a stored document in place. Returns whether the
/// document changed.
fn apply_to_stored(handle: &SharedDocument, spec: &UpdateSpec) -> Result<bool> {
    match updated_copy(handle, spec)? {
        Some(updated) => {
            *handle.write() = updated;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// What `spec` turns a stored document into, or `None` when it would not
/// change. The identity field may not change.
fn updated_copy(handle: &SharedDocument, spec: &UpdateSpec) -> Result<Option<Document>> {
    let current = handle.read();
    let mut working = current.clone();
    if !spec.apply(&mut working, false)? {
        return Ok(None);
    }
    let unchanged_id = match (current.get(ID_FIELD), working.get(ID_FIELD)) {
        (Some(before), Some(after)) => values_equal(before, after),
        (None, None) => true,
        _ => false,
    };
    if !unchanged_id {
        return Err(MemDocError::InvalidUpdate(
            "the _id field is immutable".to_string(),
        ));
    }
    Ok(Some(working))
}

fn maybe_project(doc: Document, projection: &Option<Projection>) -> Result<Document> {
    match projection {
        Some(projection) => projection.apply(&doc),
        None => Ok(doc),
    }
}

/// The live handle, or a projected copy when a projection applies
fn live_or_projected(handle: SharedDocument, projection: &Option<Projection>) -> Result<SharedDocument> {
    match projection {
        Some(projection) => {
            let projected = projection.apply(&handle.read())?;
            Ok(share(projected))
        }
        None => Ok(handle),
    }
}
