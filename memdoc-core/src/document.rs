// src/document.rs
use crate::error::{MemDocError, Result};
use crate::options::IdGeneration;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the identity field
pub const ID_FIELD: &str = "_id";

/// A stored document: shared by every reader, mutated by one writer at a time.
///
/// Handles returned by `find`/`update` point at the stored document itself,
/// so later updates are visible through them.
///
/// The lock is a `parking_lot::RwLock`, which is not reentrant. Drop any
/// `read()` or `write()` guard before calling a collection write that
/// touches the same document; holding one across `update_*`,
/// `find_one_and_update` or `delete_*` deadlocks.
///
/// ```ignore
/// let handle = coll.find_one(&doc! {"_id": 1}, FindOptions::new())?.unwrap();
/// let score = handle.read().get_i32("score")?; // guard dropped here
/// coll.update_one(&doc! {"_id": 1}, &doc! {"$set": {"score": score + 1}}, UpdateOptions::new())?;
/// ```
pub type SharedDocument = Arc<RwLock<Document>>;

pub fn share(doc: Document) -> SharedDocument {
    Arc::new(RwLock::new(doc))
}

/// Produces identity values for documents inserted without `_id`
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Bson;
}

/// `ObjectId` identities (default)
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectIdGenerator;

impl IdGenerator for ObjectIdGenerator {
    fn generate(&self) -> Bson {
        Bson::ObjectId(ObjectId::new())
    }
}

/// Random v4 UUID identities, stored as strings
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> Bson {
        Bson::String(Uuid::new_v4().to_string())
    }
}

pub fn id_generator_for(kind: IdGeneration) -> Arc<dyn IdGenerator> {
    match kind {
        IdGeneration::ObjectId => Arc::new(ObjectIdGenerator),
        IdGeneration::Uuid => Arc::new(UuidGenerator),
    }
}

/// Make sure `doc` has an `_id`, generating one when missing.
/// The identity field is moved to the front. Returns the identity.
pub fn ensure_id(doc: &mut Document, generator: &dyn IdGenerator) -> Bson {
    let id = match doc.remove(ID_FIELD) {
        Some(id) => id,
        None => generator.generate(),
    };
    let mut ordered = Document::new();
    ordered.insert(ID_FIELD, id.clone());
    for (key, value) in std::mem::take(doc) {
        ordered.insert(key, value);
    }
    *doc = ordered;
    id
}

/// Build a document from JSON, reading extended-JSON wrappers such as
/// `{"$oid": ..}` and `{"$date": ..}`.
pub fn document_from_json(value: Value) -> Result<Document> {
    match Bson::try_from(value) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(other) => Err(MemDocError::InvalidArgument(format!(
            "expected a JSON object, got {:?}",
            other.element_type()
        ))),
        Err(e) => Err(MemDocError::Serialization(e.to_string())),
    }
}

pub fn document_from_json_str(json: &str) -> Result<Document> {
    let value: Value = serde_json::from_str(json)?;
    document_from_json(value)
}

/// Relaxed extended JSON rendering of a document.
pub fn document_to_json(doc: &Document) -> Value {
    Bson::Document(doc.clone()).into_relaxed_extjson()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    #[test]
    fn test_ensure_id_generates_and_moves_first() {
        let mut doc = doc! {"name": "Alice", "age": 30};
        let id = ensure_id(&mut doc, &ObjectIdGenerator);
        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(doc.keys().next().map(String::as_str), Some("_id"));
        assert_eq!(doc.len(), 3);
    }

    #[test]
    fn test_ensure_id_keeps_existing() {
        let mut doc = doc! {"name": "Bob", "_id": "custom"};
        let id = ensure_id(&mut doc, &UuidGenerator);
        assert_eq!(id, Bson::String("custom".into()));
        assert_eq!(doc, doc! {"_id": "custom", "name": "Bob"});
    }

    #[test]
    fn test_uuid_generator_unique() {
        let a = UuidGenerator.generate();
        let b = UuidGenerator.generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().map(str::len), Some(36));
    }

    #[test]
    fn test_json_roundtrip_reads_dates() {
        let doc = document_from_json(json!({
            "b": 1,
            "a": {"$date": "2024-01-02T00:00:00Z"},
            "tags": ["x", "y"]
        }))
        .unwrap();
        assert_eq!(doc.len(), 3);
        assert!(matches!(doc.get("a"), Some(Bson::DateTime(_))));

        let back = document_to_json(&doc);
        assert_eq!(back["b"], json!(1));
        assert_eq!(back["tags"], json!(["x", "y"]));
    }

    #[test]
    fn test_json_rejects_non_object() {
        let result = document_from_json(json!([1, 2]));
        assert!(matches!(result, Err(MemDocError::InvalidArgument(_))));
        assert!(document_from_json_str("{not json").is_err());
    }
}
