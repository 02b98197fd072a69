// memdoc-core/src/collection/indexes.rs
// Index catalog. Definitions are recorded and listed, never used by queries.

use bson::{Bson, Document};

use crate::error::{MemDocError, Result};

/// Name of the implicit identity index
pub const ID_INDEX_NAME: &str = "_id_";

/// One recorded index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub keys: Document,
}

impl IndexDefinition {
    /// Validate a key specification and derive the conventional name
    pub fn from_keys(keys: &Document) -> Result<Self> {
        if keys.is_empty() {
            return Err(MemDocError::InvalidArgument(
                "Index must have at least one field".to_string(),
            ));
        }

        let mut parts = Vec::with_capacity(keys.len());
        for (field, kind) in keys {
            let suffix = match kind {
                Bson::Int32(1) | Bson::Int64(1) => "1".to_string(),
                Bson::Int32(-1) | Bson::Int64(-1) => "-1".to_string(),
                Bson::Double(d) if *d == 1.0 => "1".to_string(),
                Bson::Double(d) if *d == -1.0 => "-1".to_string(),
                Bson::String(kind) => kind.clone(),
                other => {
                    return Err(MemDocError::InvalidArgument(format!(
                        "Invalid index key type for '{}': {}",
                        field, other
                    )))
                }
            };
            parts.push(format!("{}_{}", field, suffix));
        }

        Ok(IndexDefinition {
            name: parts.join("_"),
            keys: keys.clone(),
        })
    }
}

/// Index definitions of one collection, in creation order
#[derive(Debug, Clone, Default)]
pub(crate) struct IndexCatalog {
    definitions: Vec<IndexDefinition>,
}

impl IndexCatalog {
    /// Record an index; creating the same one twice is a no-op.
    pub fn create(&mut self, keys: &Document) -> Result<String> {
        let definition = IndexDefinition::from_keys(keys)?;
        let name = definition.name.clone();
        if name == ID_INDEX_NAME || name == "_id_1" {
            return Ok(ID_INDEX_NAME.to_string());
        }
        if !self.definitions.iter().any(|d| d.name == name) {
            self.definitions.push(definition);
        }
        Ok(name)
    }

    pub fn drop(&mut self, name: &str) -> Result<()> {
        if name == ID_INDEX_NAME {
            return Err(MemDocError::InvalidArgument(
                "cannot drop _id index".to_string(),
            ));
        }
        let before = self.definitions.len();
        self.definitions.retain(|d| d.name != name);
        if self.definitions.len() == before {
            return Err(MemDocError::InvalidArgument(format!(
                "Index not found: {}",
                name
            )));
        }
        Ok(())
    }

    /// All index names, the identity index first
    pub fn names(&self) -> Vec<String> {
        std::iter::once(ID_INDEX_NAME.to_string())
            .chain(self.definitions.iter().map(|d| d.name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_conventional_names() {
        let def = IndexDefinition::from_keys(&doc! {"a": 1, "b": -1}).unwrap();
        assert_eq!(def.name, "a_1_b_-1");
        let text = IndexDefinition::from_keys(&doc! {"body": "text"}).unwrap();
        assert_eq!(text.name, "body_text");
    }

    #[test]
    fn test_invalid_keys() {
        assert!(IndexDefinition::from_keys(&doc! {}).is_err());
        assert!(IndexDefinition::from_keys(&doc! {"a": 2}).is_err());
        assert!(IndexDefinition::from_keys(&doc! {"a": true}).is_err());
    }

    #[test]
    fn test_catalog_lifecycle() {
        let mut catalog = IndexCatalog::default();
        assert_eq!(catalog.names(), vec!["_id_".to_string()]);

        assert_eq!(catalog.create(&doc! {"age": 1}).unwrap(), "age_1");
        assert_eq!(catalog.create(&doc! {"age": 1}).unwrap(), "age_1");
        assert_eq!(catalog.create(&doc! {"_id": 1}).unwrap(), "_id_");
        assert_eq!(catalog.names(), vec!["_id_".to_string(), "age_1".to_string()]);

        assert!(catalog.drop("_id_").is_err());
        assert!(catalog.drop("missing_1").is_err());
        catalog.drop("age_1").unwrap();
        assert_eq!(catalog.names().len(), 1);
    }
}
