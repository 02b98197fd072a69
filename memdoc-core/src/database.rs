// memdoc-core/src/database.rs
// Database handle: URI check, collection registry, lifecycle

use std::sync::Arc;

use ahash::AHashMap;

use crate::collection::Collection;
use crate::document::{id_generator_for, IdGenerator};
use crate::error::{MemDocError, Result};
use crate::logging;
use crate::options::EngineOptions;
use crate::{log_debug, log_info};

/// Database name used when the URI carries none
pub const DEFAULT_DATABASE_NAME: &str = "test";

/// An in-memory database: a named set of collections sharing one
/// configuration and one identifier generator.
pub struct Database {
    name: String,
    options: Arc<EngineOptions>,
    id_generator: Arc<dyn IdGenerator>,
    collections: AHashMap<String, Collection>,
    closed: bool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("collections", &self.list_names())
            .field("closed", &self.closed)
            .finish()
    }
}

// ============================================================================
// OPEN / CONSTRUCT
// ============================================================================

impl Database {
    /// Connect through a URI. Only URIs starting with one of
    /// `options.allowed_uris` are accepted; the path segment names the
    /// database (`mongodb://localhost:27017/shop` opens `shop`).
    pub fn open_uri(uri: &str, options: EngineOptions) -> Result<Self> {
        options.validate()?;
        if !options.allowed_uris.iter().any(|prefix| uri.starts_with(prefix.as_str())) {
            return Err(MemDocError::InvalidUri(format!("Connection failed: {}", uri)));
        }
        let name = database_name_from_uri(uri);
        Database::new(name, options)
    }

    /// Create a database directly, without a URI
    pub fn new(name: impl Into<String>, options: EngineOptions) -> Result<Self> {
        options.validate()?;
        if let Some(level) = options.log_level()? {
            logging::set_log_level(level);
        }

        let name = name.into();
        validate_name("database", &name)?;
        let id_generator = id_generator_for(options.id_generation);
        log_info!("opened database '{}'", name);

        Ok(Database {
            name,
            options: Arc::new(options),
            id_generator,
            collections: AHashMap::new(),
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ========== COLLECTIONS ==========

    /// Get a collection, creating it on first use
    pub fn collection(&mut self, name: &str) -> Result<&mut Collection> {
        self.ensure_open()?;
        validate_name("collection", name)?;
        let options = &self.options;
        let id_generator = &self.id_generator;
        Ok(self.collections.entry(name.to_string()).or_insert_with(|| {
            log_debug!("created collection '{}'", name);
            Collection::with_options(name, Arc::clone(options), Arc::clone(id_generator))
        }))
    }

    /// Get an existing collection
    pub fn get_collection(&self, name: &str) -> Result<Option<&Collection>> {
        self.ensure_open()?;
        Ok(self.collections.get(name))
    }

    /// Create a collection explicitly; fails if it already exists.
    pub fn create_collection(&mut self, name: &str) -> Result<&mut Collection> {
        self.ensure_open()?;
        if self.collections.contains_key(name) {
            return Err(MemDocError::InvalidArgument(format!(
                "Collection already exists: {}",
                name
            )));
        }
        self.collection(name)
    }

    /// Returns whether a collection was dropped
    pub fn drop_collection(&mut self, name: &str) -> Result<bool> {
        self.ensure_open()?;
        let dropped = self.collections.remove(name).is_some();
        if dropped {
            log_info!("dropped collection '{}.{}'", self.name, name);
        }
        Ok(dropped)
    }

    /// Collection names, sorted
    pub fn list_collection_names(&self) -> Result<Vec<String>> {
        self.ensure_open()?;
        Ok(self.list_names())
    }

    // ========== LIFECYCLE ==========

    /// Remove every collection
    pub fn drop_database(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.collections.clear();
        log_info!("dropped database '{}'", self.name);
        Ok(())
    }

    /// Close the handle; later calls fail with `ConnectionClosed`.
    /// Closing twice is harmless.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.collections.clear();
            log_info!("closed database '{}'", self.name);
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(MemDocError::ConnectionClosed);
        }
        Ok(())
    }

    fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Path segment after the host, without query string
fn database_name_from_uri(uri: &str) -> String {
    let rest = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
    let path = rest.split_once('/').map(|(_, path)| path).unwrap_or("");
    let name = path.split(['?', '/']).next().unwrap_or("");
    if name.is_empty() {
        DEFAULT_DATABASE_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MemDocError::InvalidArgument(format!("{} name cannot be empty", kind)));
    }
    if name.contains('$') || name.contains('\0') {
        return Err(MemDocError::InvalidArgument(format!(
            "Invalid {} name '{}'",
            kind, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::IdGeneration;
    use bson::{doc, Bson};

    // ========== Open tests ==========

    #[test]
    fn test_open_uri_default_name() {
        let db = Database::open_uri("mongodb://localhost:27017", EngineOptions::default()).unwrap();
        assert_eq!(db.name(), "test");
    }

    #[test]
    fn test_open_uri_path_name() {
        let db =
            Database::open_uri("mongodb://localhost:27017/shop?retryWrites=true", EngineOptions::default())
                .unwrap();
        assert_eq!(db.name(), "shop");
    }

    #[test]
    fn test_open_uri_rejected() {
        let err = Database::open_uri("mongodb://example.com:27017", EngineOptions::default()).unwrap_err();
        assert!(matches!(err, MemDocError::InvalidUri(_)));

        let options = EngineOptions::new().with_allowed_uri("memdoc://");
        assert!(Database::open_uri("memdoc://local/app", options).is_ok());
    }

    #[test]
    fn test_uri_name_parsing() {
        assert_eq!(database_name_from_uri("mongodb://h:1/"), "test");
        assert_eq!(database_name_from_uri("mongodb://h:1/a/b"), "a");
        assert_eq!(database_name_from_uri("mongodb://h:1?x=1"), "test");
    }

    // ========== Collection registry tests ==========

    #[test]
    fn test_collection_created_on_first_use() {
        let mut db = Database::new("app", EngineOptions::default()).unwrap();
        db.collection("users").unwrap().insert_one(doc! {"name": "Alice"}).unwrap();
        assert_eq!(db.get_collection("users").unwrap().map(|c| c.len()), Some(1));
        assert!(db.get_collection("missing").unwrap().is_none());
    }

    #[test]
    fn test_create_and_drop_collection() {
        let mut db = Database::new("app", EngineOptions::default()).unwrap();
        db.create_collection("b").unwrap();
        db.create_collection("a").unwrap();
        assert!(db.create_collection("a").is_err());
        assert_eq!(db.list_collection_names().unwrap(), vec!["a", "b"]);

        assert!(db.drop_collection("a").unwrap());
        assert!(!db.drop_collection("a").unwrap());
        assert!(db.collection("").is_err());
        assert!(db.collection("bad$name").is_err());
    }

    #[test]
    fn test_uuid_ids() {
        let options = EngineOptions::new().with_id_generation(IdGeneration::Uuid);
        let mut db = Database::new("app", options).unwrap();
        let id = db.collection("c").unwrap().insert_one(doc! {}).unwrap();
        assert!(matches!(id, Bson::String(ref s) if s.len() == 36));
    }

    // ========== Lifecycle tests ==========

    #[test]
    fn test_drop_database() {
        let mut db = Database::new("app", EngineOptions::default()).unwrap();
        db.collection("a").unwrap();
        db.drop_database().unwrap();
        assert!(db.list_collection_names().unwrap().is_empty());
    }

    #[test]
    fn test_closed_database() {
        let mut db = Database::new("app", EngineOptions::default()).unwrap();
        db.close();
        db.close();
        assert!(db.is_closed());
        assert!(matches!(db.collection("a"), Err(MemDocError::ConnectionClosed)));
        assert!(matches!(db.list_collection_names(), Err(MemDocError::ConnectionClosed)));
    }
}
