// memdoc-core/src/lib.rs
// In-memory document engine: ordering, paths, updates, projections, aggregation

pub mod aggregation;
pub mod collection;
pub mod database;
pub mod document;
pub mod error;
pub mod expression;
pub mod find_options;
pub mod logging;
pub mod options;
pub mod path;
pub mod projection;
pub mod query;
pub mod sort;
pub mod update;
pub mod value_utils;

// Public exports
pub use aggregation::{Accumulator, Pipeline, Stage};
pub use bson::{self, doc, Bson, Document};
pub use collection::{Collection, FindCursor, IndexDefinition, InsertManyResult};
pub use database::Database;
pub use document::{
    document_from_json, document_to_json, IdGenerator, ObjectIdGenerator, SharedDocument,
    UuidGenerator, ID_FIELD,
};
pub use error::{MemDocError, Result};
pub use expression::Expression;
pub use find_options::{
    DeleteOptions, FindOneAndUpdateOptions, FindOptions, ReturnDocument, UpdateOptions,
    UpdateResult,
};
pub use logging::{get_log_level, set_log_level, LogLevel};
pub use options::{DivideByZeroPolicy, EngineOptions, IdGeneration};
pub use path::{get_path, set_path, unset_path};
pub use projection::{project, Projection};
pub use query::{Matcher, Query};
pub use sort::{SortDirection, SortSpec};
pub use update::{apply_update, UpdateSpec};
pub use value_utils::{compare_directed, compare_values, type_rank};
